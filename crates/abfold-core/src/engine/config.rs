use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("Failed to read configuration file '{path}': {message}")]
    File { path: String, message: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

fn ensure_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be a positive finite number, got {value}")))
    }
}

fn ensure_unit_open(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must lie strictly between 0 and 1, got {value}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SamplerKind {
    Uniform,
    Stochastic,
    Fragment,
    Basin,
}

impl SamplerKind {
    pub const ALL: [SamplerKind; 4] = [
        SamplerKind::Uniform,
        SamplerKind::Stochastic,
        SamplerKind::Fragment,
        SamplerKind::Basin,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SamplerKind::Uniform => "uniform",
            SamplerKind::Stochastic => "stochastic",
            SamplerKind::Fragment => "fragment",
            SamplerKind::Basin => "basin",
        }
    }

    /// Stream identifier mixed into per-candidate seeds.
    pub(crate) fn stream(self) -> u64 {
        match self {
            SamplerKind::Uniform => 1,
            SamplerKind::Stochastic => 2,
            SamplerKind::Fragment => 3,
            SamplerKind::Basin => 4,
        }
    }
}

impl fmt::Display for SamplerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct SamplerSettings {
    pub enabled: bool,
    pub count: usize,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            count: 25,
        }
    }
}

impl SamplerSettings {
    #[inline]
    pub fn effective_count(&self) -> usize {
        if self.enabled { self.count } else { 0 }
    }
}

/// Metropolis walk used by the stochastic sampler. Angles in radians.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct StochasticWalkConfig {
    pub steps: usize,
    pub initial_temperature: f64,
    pub cooling_rate: f64,
    pub step_size: f64,
}

impl Default for StochasticWalkConfig {
    fn default() -> Self {
        Self {
            steps: 150,
            initial_temperature: 5.0,
            cooling_rate: 0.97,
            step_size: 0.35,
        }
    }
}

impl StochasticWalkConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("walk.initial-temperature", self.initial_temperature)?;
        ensure_positive("walk.step-size", self.step_size)?;
        if !(self.cooling_rate > 0.0 && self.cooling_rate <= 1.0) {
            return Err(invalid("walk.cooling-rate", "must lie in (0, 1]"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct FragmentSamplingConfig {
    pub window_len: usize,
    pub overlap: usize,
    /// Best-matching fragments kept per window before weighted selection.
    pub top_n: usize,
    /// Inverse temperature of the similarity/compatibility selection.
    pub selection_beta: f64,
    /// Standard deviation of the Gaussian noise added to stitched angles, in radians.
    pub noise: f64,
}

impl Default for FragmentSamplingConfig {
    fn default() -> Self {
        Self {
            window_len: 3,
            overlap: 1,
            top_n: 8,
            selection_beta: 3.0,
            noise: 0.09,
        }
    }
}

impl FragmentSamplingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.window_len == 0 {
            return Err(invalid("fragment-sampling.window-len", "must be at least 1"));
        }
        if self.overlap >= self.window_len {
            return Err(invalid(
                "fragment-sampling.overlap",
                "must be smaller than the window length",
            ));
        }
        if self.top_n == 0 {
            return Err(invalid("fragment-sampling.top-n", "must be at least 1"));
        }
        ensure_positive("fragment-sampling.selection-beta", self.selection_beta)?;
        if !(self.noise.is_finite() && self.noise >= 0.0) {
            return Err(invalid("fragment-sampling.noise", "must be non-negative"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct BasinSamplingConfig {
    /// Probability of continuing the previous residue's basin.
    pub persistence: f64,
    /// Fraction of the class-scaled basin width used as the perturbation σ.
    pub width_factor: f64,
}

impl Default for BasinSamplingConfig {
    fn default() -> Self {
        Self {
            persistence: 0.7,
            width_factor: 0.5,
        }
    }
}

impl BasinSamplingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..1.0).contains(&self.persistence) {
            return Err(invalid("basin-sampling.persistence", "must lie in [0, 1)"));
        }
        ensure_positive("basin-sampling.width-factor", self.width_factor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SamplingConfig {
    pub uniform: SamplerSettings,
    pub stochastic: SamplerSettings,
    pub fragment: SamplerSettings,
    pub basin: SamplerSettings,
    pub walk: StochasticWalkConfig,
    pub fragments: FragmentSamplingConfig,
    pub basins: BasinSamplingConfig,
}

impl SamplingConfig {
    pub fn settings(&self, kind: SamplerKind) -> &SamplerSettings {
        match kind {
            SamplerKind::Uniform => &self.uniform,
            SamplerKind::Stochastic => &self.stochastic,
            SamplerKind::Fragment => &self.fragment,
            SamplerKind::Basin => &self.basin,
        }
    }

    fn settings_mut(&mut self, kind: SamplerKind) -> &mut SamplerSettings {
        match kind {
            SamplerKind::Uniform => &mut self.uniform,
            SamplerKind::Stochastic => &mut self.stochastic,
            SamplerKind::Fragment => &mut self.fragment,
            SamplerKind::Basin => &mut self.basin,
        }
    }

    pub fn total_candidates(&self) -> usize {
        SamplerKind::ALL
            .iter()
            .map(|&kind| self.settings(kind).effective_count())
            .sum()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.total_candidates() == 0 {
            return Err(invalid(
                "samplers",
                "at least one sampler must be enabled with a non-zero count",
            ));
        }
        self.walk.validate()?;
        self.fragments.validate()?;
        self.basins.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct RelaxationConfig {
    pub max_steps: usize,
    /// Fixed steepest-descent step, in radians per unit gradient.
    pub step_size: f64,
    /// Cap on any single angle change per step, in radians.
    pub max_step: f64,
    pub energy_tolerance: f64,
    pub max_halvings: u32,
}

impl Default for RelaxationConfig {
    fn default() -> Self {
        Self {
            max_steps: 40,
            step_size: 1e-3,
            max_step: 0.05,
            energy_tolerance: 1e-4,
            max_halvings: 6,
        }
    }
}

impl RelaxationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("relaxation.step-size", self.step_size)?;
        ensure_positive("relaxation.max-step", self.max_step)?;
        ensure_positive("relaxation.energy-tolerance", self.energy_tolerance)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct LineSearchConfig {
    /// Sufficient-decrease constant.
    pub c1: f64,
    /// Curvature constant.
    pub c2: f64,
    pub max_evaluations: usize,
    pub initial_step: f64,
    /// Largest change of any single angle along one search line, in radians.
    pub max_step: f64,
}

impl Default for LineSearchConfig {
    fn default() -> Self {
        Self {
            c1: 1e-4,
            c2: 0.9,
            max_evaluations: 20,
            initial_step: 1.0,
            max_step: 0.5,
        }
    }
}

impl LineSearchConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        ensure_unit_open("lbfgs.line-search.c1", self.c1)?;
        ensure_unit_open("lbfgs.line-search.c2", self.c2)?;
        if self.c2 <= self.c1 {
            return Err(invalid("lbfgs.line-search.c2", "must be larger than c1"));
        }
        if self.max_evaluations == 0 {
            return Err(invalid("lbfgs.line-search.max-evaluations", "must be at least 1"));
        }
        ensure_positive("lbfgs.line-search.initial-step", self.initial_step)?;
        ensure_positive("lbfgs.line-search.max-step", self.max_step)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct LbfgsConfig {
    pub max_iterations: usize,
    pub history_size: usize,
    pub gradient_tolerance: f64,
    pub line_search: LineSearchConfig,
}

impl Default for LbfgsConfig {
    fn default() -> Self {
        Self {
            max_iterations: 60,
            history_size: 8,
            gradient_tolerance: 1e-3,
            line_search: LineSearchConfig::default(),
        }
    }
}

impl LbfgsConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.history_size == 0 {
            return Err(invalid("lbfgs.history-size", "must be at least 1"));
        }
        ensure_positive("lbfgs.gradient-tolerance", self.gradient_tolerance)?;
        self.line_search.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct EscapeConfig {
    pub enabled: bool,
    /// Trailing trace entries inspected for stagnation.
    pub window: usize,
    pub stagnation_threshold: f64,
    pub steps: usize,
    pub initial_temperature: f64,
    pub cooling_rate: f64,
    pub step_size: f64,
}

impl Default for EscapeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window: 8,
            stagnation_threshold: 1e-2,
            steps: 120,
            initial_temperature: 2.0,
            cooling_rate: 0.97,
            step_size: 0.3,
        }
    }
}

impl EscapeConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.window < 2 {
            return Err(invalid("escape.window", "must be at least 2"));
        }
        ensure_positive("escape.stagnation-threshold", self.stagnation_threshold)?;
        ensure_positive("escape.initial-temperature", self.initial_temperature)?;
        ensure_positive("escape.step-size", self.step_size)?;
        if !(self.cooling_rate > 0.0 && self.cooling_rate <= 1.0) {
            return Err(invalid("escape.cooling-rate", "must lie in (0, 1]"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct PolishConfig {
    pub max_steps: usize,
    pub step_size: f64,
    pub max_step: f64,
}

impl Default for PolishConfig {
    fn default() -> Self {
        Self {
            max_steps: 25,
            step_size: 5e-3,
            max_step: 0.05,
        }
    }
}

impl PolishConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("polish.step-size", self.step_size)?;
        ensure_positive("polish.max-step", self.max_step)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadeConfig {
    /// Number of best-ranked pool candidates sent through the cascade.
    pub top_k: usize,
    pub relaxation: RelaxationConfig,
    pub lbfgs: LbfgsConfig,
    pub escape: EscapeConfig,
    pub polish: PolishConfig,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            relaxation: RelaxationConfig::default(),
            lbfgs: LbfgsConfig::default(),
            escape: EscapeConfig::default(),
            polish: PolishConfig::default(),
        }
    }
}

impl CascadeConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.top_k == 0 {
            return Err(invalid("top-k", "must be at least 1"));
        }
        self.relaxation.validate()?;
        self.lbfgs.validate()?;
        self.escape.validate()?;
        self.polish.validate()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FragmentSourceConfig {
    pub library_path: Option<PathBuf>,
    pub timeout: Duration,
    pub retries: u32,
}

impl Default for FragmentSourceConfig {
    fn default() -> Self {
        Self {
            library_path: None,
            timeout: Duration::from_secs(10),
            retries: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionConfig {
    pub seed: u64,
    pub sampling: SamplingConfig,
    pub cascade: CascadeConfig,
    /// Finite-difference step for gradients, in radians.
    pub gradient_epsilon: f64,
    pub include_omega: bool,
    pub wall_clock_budget: Option<Duration>,
    pub forcefield_path: Option<PathBuf>,
    pub fragment_source: FragmentSourceConfig,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
struct SamplersFile {
    uniform: Option<SamplerSettings>,
    stochastic: Option<SamplerSettings>,
    fragment: Option<SamplerSettings>,
    basin: Option<SamplerSettings>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
struct FragmentsFile {
    library: Option<PathBuf>,
    timeout_ms: Option<u64>,
    retries: Option<u32>,
}

/// On-disk form of a [`PredictionConfig`]. Every key is optional; relative paths are
/// resolved against the file's directory.
#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct ConfigFile {
    seed: Option<u64>,
    include_omega: Option<bool>,
    gradient_epsilon: Option<f64>,
    wall_clock_seconds: Option<f64>,
    top_k: Option<usize>,
    forcefield: Option<PathBuf>,
    samplers: Option<SamplersFile>,
    walk: Option<StochasticWalkConfig>,
    fragment_sampling: Option<FragmentSamplingConfig>,
    basin_sampling: Option<BasinSamplingConfig>,
    relaxation: Option<RelaxationConfig>,
    lbfgs: Option<LbfgsConfig>,
    escape: Option<EscapeConfig>,
    polish: Option<PolishConfig>,
    fragments: Option<FragmentsFile>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file_error = |message: String| ConfigError::File {
            path: path.to_string_lossy().to_string(),
            message,
        };
        let content = std::fs::read_to_string(path).map_err(|e| file_error(e.to_string()))?;
        let mut file: ConfigFile = toml::from_str(&content).map_err(|e| file_error(e.to_string()))?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        let resolve = |p: PathBuf| if p.is_relative() { base.join(p) } else { p };
        file.forcefield = file.forcefield.map(resolve);
        if let Some(fragments) = file.fragments.as_mut() {
            fragments.library = fragments.library.take().map(resolve);
        }
        Ok(file)
    }
}

#[derive(Default)]
pub struct PredictionConfigBuilder {
    seed: Option<u64>,
    sampling: SamplingConfig,
    cascade: CascadeConfig,
    gradient_epsilon: Option<f64>,
    include_omega: bool,
    wall_clock_budget: Option<Duration>,
    forcefield_path: Option<PathBuf>,
    fragment_source: FragmentSourceConfig,
}

impl PredictionConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn sampler(mut self, kind: SamplerKind, settings: SamplerSettings) -> Self {
        *self.sampling.settings_mut(kind) = settings;
        self
    }
    pub fn sampler_count(mut self, kind: SamplerKind, count: usize) -> Self {
        self.sampling.settings_mut(kind).count = count;
        self
    }
    pub fn enable_sampler(mut self, kind: SamplerKind, enabled: bool) -> Self {
        self.sampling.settings_mut(kind).enabled = enabled;
        self
    }
    pub fn walk(mut self, walk: StochasticWalkConfig) -> Self {
        self.sampling.walk = walk;
        self
    }
    pub fn fragment_sampling(mut self, config: FragmentSamplingConfig) -> Self {
        self.sampling.fragments = config;
        self
    }
    pub fn basin_sampling(mut self, config: BasinSamplingConfig) -> Self {
        self.sampling.basins = config;
        self
    }
    pub fn top_k(mut self, k: usize) -> Self {
        self.cascade.top_k = k;
        self
    }
    pub fn relaxation(mut self, config: RelaxationConfig) -> Self {
        self.cascade.relaxation = config;
        self
    }
    pub fn lbfgs(mut self, config: LbfgsConfig) -> Self {
        self.cascade.lbfgs = config;
        self
    }
    pub fn escape(mut self, config: EscapeConfig) -> Self {
        self.cascade.escape = config;
        self
    }
    pub fn polish(mut self, config: PolishConfig) -> Self {
        self.cascade.polish = config;
        self
    }
    pub fn gradient_epsilon(mut self, epsilon: f64) -> Self {
        self.gradient_epsilon = Some(epsilon);
        self
    }
    pub fn include_omega(mut self, include: bool) -> Self {
        self.include_omega = include;
        self
    }
    pub fn wall_clock_budget(mut self, budget: Duration) -> Self {
        self.wall_clock_budget = Some(budget);
        self
    }
    pub fn forcefield_path(mut self, path: PathBuf) -> Self {
        self.forcefield_path = Some(path);
        self
    }
    pub fn fragment_library_path(mut self, path: PathBuf) -> Self {
        self.fragment_source.library_path = Some(path);
        self
    }
    pub fn fragment_timeout(mut self, timeout: Duration) -> Self {
        self.fragment_source.timeout = timeout;
        self
    }
    pub fn fragment_retries(mut self, retries: u32) -> Self {
        self.fragment_source.retries = retries;
        self
    }

    /// Applies every key present in the TOML file at `path`, overriding values set
    /// earlier on the builder.
    pub fn with_file(self, path: &Path) -> Result<Self, ConfigError> {
        let file = ConfigFile::load(path)?;
        self.apply_file(file)
    }

    fn apply_file(mut self, file: ConfigFile) -> Result<Self, ConfigError> {
        if let Some(seed) = file.seed {
            self.seed = Some(seed);
        }
        if let Some(include) = file.include_omega {
            self.include_omega = include;
        }
        if let Some(epsilon) = file.gradient_epsilon {
            self.gradient_epsilon = Some(epsilon);
        }
        if let Some(seconds) = file.wall_clock_seconds {
            let budget = Duration::try_from_secs_f64(seconds)
                .map_err(|e| invalid("wall-clock-seconds", e.to_string()))?;
            self.wall_clock_budget = Some(budget);
        }
        if let Some(k) = file.top_k {
            self.cascade.top_k = k;
        }
        if let Some(path) = file.forcefield {
            self.forcefield_path = Some(path);
        }
        if let Some(samplers) = file.samplers {
            let entries = [
                (SamplerKind::Uniform, samplers.uniform),
                (SamplerKind::Stochastic, samplers.stochastic),
                (SamplerKind::Fragment, samplers.fragment),
                (SamplerKind::Basin, samplers.basin),
            ];
            for (kind, settings) in entries {
                if let Some(settings) = settings {
                    *self.sampling.settings_mut(kind) = settings;
                }
            }
        }
        if let Some(walk) = file.walk {
            self.sampling.walk = walk;
        }
        if let Some(fragments) = file.fragment_sampling {
            self.sampling.fragments = fragments;
        }
        if let Some(basins) = file.basin_sampling {
            self.sampling.basins = basins;
        }
        if let Some(relaxation) = file.relaxation {
            self.cascade.relaxation = relaxation;
        }
        if let Some(lbfgs) = file.lbfgs {
            self.cascade.lbfgs = lbfgs;
        }
        if let Some(escape) = file.escape {
            self.cascade.escape = escape;
        }
        if let Some(polish) = file.polish {
            self.cascade.polish = polish;
        }
        if let Some(fragments) = file.fragments {
            if let Some(library) = fragments.library {
                self.fragment_source.library_path = Some(library);
            }
            if let Some(ms) = fragments.timeout_ms {
                self.fragment_source.timeout = Duration::from_millis(ms);
            }
            if let Some(retries) = fragments.retries {
                self.fragment_source.retries = retries;
            }
        }
        Ok(self)
    }

    pub fn build(self) -> Result<PredictionConfig, ConfigError> {
        let seed = self.seed.ok_or(ConfigError::MissingParameter("seed"))?;

        let gradient_epsilon = self.gradient_epsilon.unwrap_or(1e-5);
        ensure_positive("gradient-epsilon", gradient_epsilon)?;
        if gradient_epsilon > 0.1 {
            return Err(invalid("gradient-epsilon", "must not exceed 0.1 radians"));
        }
        if let Some(budget) = self.wall_clock_budget {
            if budget.is_zero() {
                return Err(invalid("wall-clock-budget", "must be non-zero when set"));
            }
        }
        if self.fragment_source.timeout.is_zero() {
            return Err(invalid("fragments.timeout", "must be non-zero"));
        }
        self.sampling.validate()?;
        self.cascade.validate()?;

        Ok(PredictionConfig {
            seed,
            sampling: self.sampling,
            cascade: self.cascade,
            gradient_epsilon,
            include_omega: self.include_omega,
            wall_clock_budget: self.wall_clock_budget,
            forcefield_path: self.forcefield_path,
            fragment_source: self.fragment_source,
        })
    }
}
