use crate::core::builder::ConformationBuilder;
use crate::core::forcefield::params::Forcefield;
use crate::core::forcefield::scoring::{Scorer, ScoringError};
use crate::core::fragments::library::FragmentLibrary;
use crate::core::fragments::source::{
    AcquisitionPolicy, CsvFragmentSource, FragmentSource, acquire_fragment_library,
};
use crate::core::models::conformation::{BackboneResidue, Conformation};
use crate::core::models::error::InputError;
use crate::core::models::residue::ResidueType;
use crate::core::models::sequence::Sequence;
use crate::core::models::torsion::DihedralSet;
use crate::core::structure::similarity::{AtomSelection, SimilarityScore, similarity};
use crate::engine::cascade::{self, RefinedCandidate};
use crate::engine::config::{PredictionConfig, SamplerKind};
use crate::engine::context::{Deadline, OptimizationContext};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::samplers::{
    BasinSampler, FragmentSampler, Sampler, SamplingContext, StochasticSampler, UniformSampler,
};
use crate::engine::state::{Candidate, CandidatePool, Diagnostic, StageReport};
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Known backbone of the target, used only to score the prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceStructure {
    residues: Vec<ResidueType>,
    backbone: Vec<BackboneResidue>,
}

impl ReferenceStructure {
    pub fn new(residues: Vec<ResidueType>, backbone: Vec<BackboneResidue>) -> Result<Self, InputError> {
        if residues.is_empty() {
            return Err(InputError::InvalidReference("no residues".to_string()));
        }
        if residues.len() != backbone.len() {
            return Err(InputError::InvalidReference(format!(
                "{} residue types but {} backbone entries",
                residues.len(),
                backbone.len()
            )));
        }
        if let Some(index) = backbone.iter().position(|r| !r.is_finite()) {
            return Err(InputError::InvalidReference(format!(
                "residue {index} has non-finite coordinates"
            )));
        }
        Ok(Self { residues, backbone })
    }

    pub fn from_conformation(conformation: &Conformation) -> Self {
        Self {
            residues: conformation.sequence().residues().to_vec(),
            backbone: conformation.backbone().to_vec(),
        }
    }

    pub fn residues(&self) -> &[ResidueType] {
        &self.residues
    }

    pub fn backbone(&self) -> &[BackboneResidue] {
        &self.backbone
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.residues.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct PredictionInput {
    pub sequence: Sequence,
    pub reference: Option<ReferenceStructure>,
}

impl PredictionInput {
    pub fn new(sequence: Sequence) -> Self {
        Self {
            sequence,
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: ReferenceStructure) -> Self {
        self.reference = Some(reference);
        self
    }

    fn validate(&self) -> Result<(), InputError> {
        self.sequence.ensure_non_empty()?;
        let Some(reference) = &self.reference else {
            return Ok(());
        };
        if reference.len() != self.sequence.len() {
            return Err(InputError::InvalidReference(format!(
                "reference has {} residues, sequence has {}",
                reference.len(),
                self.sequence.len()
            )));
        }
        if let Some(position) = reference
            .residues()
            .iter()
            .zip(self.sequence.iter())
            .position(|(&a, b)| a != b)
        {
            return Err(InputError::InvalidReference(format!(
                "residue {position} differs from the target sequence"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PredictionResult {
    pub best: Candidate,
    pub conformation: Conformation,
    /// Cascade reports of the winning candidate; empty if it was never refined.
    pub stage_reports: Vec<StageReport>,
    pub initial_best_energy: f64,
    pub pool_size: usize,
    pub similarity: Option<SimilarityScore>,
    pub diagnostics: Vec<Diagnostic>,
    pub degraded: bool,
}

/// Runs a prediction with the fragment library named in the configuration, or the
/// built-in library when none is configured.
pub fn run(
    input: &PredictionInput,
    config: &PredictionConfig,
    reporter: &ProgressReporter,
) -> Result<PredictionResult, EngineError> {
    run_with_source(input, config, reporter, None)
}

/// Like [`run`], with an explicit fragment source taking precedence over the configured
/// library file.
#[instrument(skip_all, name = "prediction_workflow", fields(residues = input.sequence.len(), seed = config.seed))]
pub fn run_with_source(
    input: &PredictionInput,
    config: &PredictionConfig,
    reporter: &ProgressReporter,
    source: Option<Arc<dyn FragmentSource>>,
) -> Result<PredictionResult, EngineError> {
    // === Phase 0: Validation and resources ===
    let deadline = Deadline::new(config.wall_clock_budget);
    let mut diagnostics = Vec::new();
    let (forcefield, library) = reporter.phase("Preparation", || -> Result<_, EngineError> {
        input.validate()?;
        let forcefield = match &config.forcefield_path {
            Some(path) => Forcefield::load(path)?,
            None => Forcefield::default(),
        };
        let library = acquire_library(config, &forcefield, source, &mut diagnostics);
        Ok((forcefield, library))
    })?;
    info!(
        fragments = library.len(),
        candidates = config.sampling.total_candidates(),
        "Resources ready."
    );

    let context = OptimizationContext::new(&input.sequence, &forcefield, config, reporter, &deadline);

    // === Phase 1: Candidate generation and scoring ===
    let pool = reporter.phase("Sampling", || generate_pool(&context, &library, &mut diagnostics))?;
    let Some(initial_best) = pool.best().cloned() else {
        return Err(EngineError::PhaseFailed {
            phase: "sampling",
            reason: "no candidate could be scored".to_string(),
        });
    };
    info!(
        pool = pool.len(),
        energy = initial_best.total(),
        "Candidate pool scored."
    );

    // === Phase 2: Cascade refinement of the top candidates ===
    let refined = reporter.phase("Refinement", || refine_top_candidates(&context, &pool, &mut diagnostics))?;

    // === Phase 3: Selection and comparison ===
    let (best, stage_reports, conformation, similarity) =
        reporter.phase("Finalization", || -> Result<_, EngineError> {
            let (best, stage_reports) = select_best(initial_best.clone(), refined);
            let conformation = ConformationBuilder::new(&forcefield.geometry).build(&input.sequence, &best.angles)?;
            let similarity = input
                .reference
                .as_ref()
                .map(|reference| similarity(reference.backbone(), conformation.backbone(), AtomSelection::CalphaOnly))
                .transpose()?;
            Ok((best, stage_reports, conformation, similarity))
        })?;

    let degraded = !diagnostics.is_empty();
    info!(
        initial_energy = initial_best.total(),
        energy = best.total(),
        origin = %best.origin,
        degraded,
        "Prediction complete."
    );
    Ok(PredictionResult {
        best,
        conformation,
        stage_reports,
        initial_best_energy: initial_best.total(),
        pool_size: pool.len(),
        similarity,
        diagnostics,
        degraded,
    })
}

fn acquire_library(
    config: &PredictionConfig,
    forcefield: &Forcefield,
    source: Option<Arc<dyn FragmentSource>>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Arc<FragmentLibrary> {
    let fallback = FragmentLibrary::builtin(forcefield, config.sampling.fragments.window_len);
    if config.sampling.fragment.effective_count() == 0 {
        return Arc::new(fallback);
    }
    let settings = &config.fragment_source;
    let primary = source.or_else(|| {
        settings
            .library_path
            .as_ref()
            .map(|path| Arc::new(CsvFragmentSource::new(path.clone())) as Arc<dyn FragmentSource>)
    });
    let Some(primary) = primary else {
        return Arc::new(fallback);
    };

    let policy = AcquisitionPolicy {
        timeout: settings.timeout,
        retries: settings.retries,
    };
    let name = primary.name().to_string();
    let acquired = acquire_fragment_library(primary, fallback, &policy);
    if acquired.degraded {
        diagnostics.push(Diagnostic::FragmentFallback {
            source: name,
            failures: acquired.failures,
        });
    }
    acquired.library
}

fn sampler_for(kind: SamplerKind, config: &PredictionConfig, library: &Arc<FragmentLibrary>) -> Box<dyn Sampler> {
    let sampling = &config.sampling;
    match kind {
        SamplerKind::Uniform => Box::new(UniformSampler::new()),
        SamplerKind::Stochastic => Box::new(StochasticSampler::new(sampling.walk)),
        SamplerKind::Fragment => Box::new(FragmentSampler::new(Arc::clone(library), sampling.fragments)),
        SamplerKind::Basin => Box::new(BasinSampler::new(sampling.basins)),
    }
}

fn score(
    builder: &ConformationBuilder,
    scorer: &Scorer,
    sequence: &Sequence,
    origin: SamplerKind,
    index: usize,
    angles: DihedralSet,
) -> Result<Candidate, EngineError> {
    let conformation = builder.build(sequence, &angles)?;
    let energy = scorer.score(&conformation).map_err(|e| match e {
        ScoringError::NonFinite { term } => EngineError::NumericalInstability {
            stage: "pool scoring",
            detail: format!("energy term '{term}' is not finite"),
        },
        other => other.into(),
    })?;
    Ok(Candidate {
        angles,
        energy,
        origin,
        index,
    })
}

/// Runs every enabled sampler and scores its output. The deadline is checked between
/// samplers, after the first one, so the pool is never empty on time grounds alone.
#[instrument(skip_all, name = "sampling_phase")]
fn generate_pool(
    context: &OptimizationContext,
    library: &Arc<FragmentLibrary>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<CandidatePool, EngineError> {
    let config = context.config;
    let reporter = context.reporter;
    reporter.report(Progress::TaskStart {
        total_steps: config.sampling.total_candidates() as u64,
    });

    let sampling_context = SamplingContext::new(context.sequence, context.forcefield);
    let builder = ConformationBuilder::new(&context.forcefield.geometry);
    let scorer = Scorer::new(context.forcefield);
    let mut pool = CandidatePool::new();

    for kind in SamplerKind::ALL {
        let count = config.sampling.settings(kind).effective_count();
        if count == 0 {
            continue;
        }
        if !pool.is_empty() && context.deadline.expired() {
            warn!(sampler = %kind, "Wall-clock budget expired, skipping remaining samplers");
            diagnostics.push(Diagnostic::DeadlineReached { phase: "sampling" });
            break;
        }

        let sets = sampler_for(kind, config, library).sample(&sampling_context, count, config.seed)?;

        #[cfg(not(feature = "parallel"))]
        let iterator = sets.into_iter().enumerate();

        #[cfg(feature = "parallel")]
        let iterator = sets.into_par_iter().enumerate();

        let scored: Vec<Result<Candidate, EngineError>> = iterator
            .map(|(index, angles)| {
                let result = score(&builder, &scorer, context.sequence, kind, index, angles);
                reporter.report(Progress::TaskIncrement);
                result
            })
            .collect();

        for (index, result) in scored.into_iter().enumerate() {
            match result {
                Ok(candidate) => pool.push(candidate),
                Err(e) if e.is_candidate_local() => {
                    warn!(sampler = %kind, index, error = %e, "Candidate aborted during scoring");
                    diagnostics.push(Diagnostic::CandidateAborted {
                        origin: kind,
                        index,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
        info!(sampler = %kind, candidates = count, "Sampler finished.");
    }

    reporter.report(Progress::TaskFinish);
    Ok(pool)
}

/// Runs the cascade on the `top_k` best candidates in parallel. Candidates not yet
/// started when the deadline expires are left unrefined.
#[instrument(skip_all, name = "refinement_phase")]
fn refine_top_candidates(
    context: &OptimizationContext,
    pool: &CandidatePool,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<Vec<RefinedCandidate>, EngineError> {
    let reporter = context.reporter;
    let top = pool.top_k(context.config.cascade.top_k);
    reporter.report(Progress::TaskStart {
        total_steps: top.len() as u64,
    });
    info!(candidates = top.len(), "Refining top candidates.");

    #[cfg(not(feature = "parallel"))]
    let iterator = top.iter().enumerate();

    #[cfg(feature = "parallel")]
    let iterator = top.par_iter().enumerate();

    let outcomes: Vec<Option<Result<RefinedCandidate, EngineError>>> = iterator
        .map(|(rank, candidate)| {
            if context.deadline.expired() {
                return None;
            }
            let outcome = cascade::refine(candidate, context);
            if let Ok(refined) = &outcome {
                reporter.report(Progress::CandidateRefined {
                    index: rank,
                    energy: refined.candidate.total(),
                });
            }
            reporter.report(Progress::TaskIncrement);
            Some(outcome)
        })
        .collect();

    let mut refined = Vec::with_capacity(outcomes.len());
    let mut deadline_hit = false;
    for (candidate, outcome) in top.iter().zip(outcomes) {
        match outcome {
            None => deadline_hit = true,
            Some(Ok(result)) => {
                diagnostics.extend(result.diagnostics.iter().cloned());
                refined.push(result);
            }
            Some(Err(e)) if e.is_candidate_local() => {
                warn!(origin = %candidate.origin, index = candidate.index, error = %e, "Candidate aborted during refinement");
                diagnostics.push(Diagnostic::CandidateAborted {
                    origin: candidate.origin,
                    index: candidate.index,
                    reason: e.to_string(),
                });
            }
            Some(Err(e)) => return Err(e),
        }
    }
    if deadline_hit || context.deadline.expired() {
        warn!(refined = refined.len(), "Wall-clock budget expired during refinement");
        diagnostics.push(Diagnostic::DeadlineReached { phase: "refinement" });
    }

    reporter.report(Progress::TaskFinish);
    Ok(refined)
}

/// The lowest-ranked candidate among the refined ones and the unrefined pool best.
fn select_best(pool_best: Candidate, refined: Vec<RefinedCandidate>) -> (Candidate, Vec<StageReport>) {
    let best_refined = refined.into_iter().min_by(|a, b| a.candidate.cmp(&b.candidate));
    match best_refined {
        Some(r) if r.candidate <= pool_best => (r.candidate, r.reports),
        _ => (pool_best, Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fragments::source::InMemoryFragmentSource;
    use crate::engine::config::{
        EscapeConfig, LbfgsConfig, LineSearchConfig, PolishConfig, PredictionConfigBuilder, RelaxationConfig,
        StochasticWalkConfig,
    };
    use std::sync::Mutex;
    use std::time::Duration;

    const TARGET: &str = "MKTAYIAKQRQISFVKSHFS";

    fn quick_builder(seed: u64) -> PredictionConfigBuilder {
        PredictionConfigBuilder::new()
            .seed(seed)
            .walk(StochasticWalkConfig {
                steps: 20,
                ..StochasticWalkConfig::default()
            })
            .relaxation(RelaxationConfig {
                max_steps: 4,
                ..RelaxationConfig::default()
            })
            .lbfgs(LbfgsConfig {
                max_iterations: 3,
                line_search: LineSearchConfig {
                    max_evaluations: 4,
                    ..LineSearchConfig::default()
                },
                ..LbfgsConfig::default()
            })
            .escape(EscapeConfig {
                steps: 15,
                ..EscapeConfig::default()
            })
            .polish(PolishConfig {
                max_steps: 4,
                ..PolishConfig::default()
            })
            .top_k(2)
    }

    fn small_pool(builder: PredictionConfigBuilder, per_sampler: usize) -> PredictionConfigBuilder {
        SamplerKind::ALL
            .iter()
            .fold(builder, |b, &kind| b.sampler_count(kind, per_sampler))
    }

    #[test]
    fn full_pool_prediction_improves_on_the_best_sample() {
        let input = PredictionInput::new(Sequence::parse(TARGET).unwrap());
        let config = quick_builder(2024).build().unwrap();
        let result = run(&input, &config, &ProgressReporter::new()).unwrap();

        assert_eq!(result.pool_size, 100);
        assert!(result.best.total().is_finite());
        assert!(result.best.total() <= result.initial_best_energy);
        assert_eq!(result.stage_reports.len(), 4);
        assert_eq!(result.conformation.len(), 20);
        assert_eq!(result.conformation.angles(), &result.best.angles);
        assert!(result.similarity.is_none());
        assert_eq!(result.degraded, !result.diagnostics.is_empty());
    }

    #[test]
    fn results_are_reproducible_for_a_seed() {
        let input = PredictionInput::new(Sequence::parse("MKVLAGSE").unwrap());
        let config = small_pool(quick_builder(7), 4).build().unwrap();
        let a = run(&input, &config, &ProgressReporter::new()).unwrap();
        let b = run(&input, &config, &ProgressReporter::new()).unwrap();
        assert_eq!(a.best.angles, b.best.angles);
        assert_eq!(a.best.total(), b.best.total());
        assert_eq!((a.best.origin, a.best.index), (b.best.origin, b.best.index));
    }

    #[test]
    fn empty_sequence_fails_before_any_work() {
        let input = PredictionInput::new(Sequence::new(Vec::new()));
        let config = quick_builder(1).build().unwrap();
        let result = run(&input, &config, &ProgressReporter::new());
        assert!(matches!(
            result,
            Err(EngineError::Input {
                source: InputError::EmptySequence
            })
        ));
    }

    #[test]
    fn unreadable_fragment_library_degrades_the_run() {
        let input = PredictionInput::new(Sequence::parse("MKVLAG").unwrap());
        let config = small_pool(quick_builder(3), 2)
            .fragment_library_path("/nonexistent/abfold/fragments.csv".into())
            .fragment_timeout(Duration::from_secs(2))
            .fragment_retries(0)
            .build()
            .unwrap();
        let result = run(&input, &config, &ProgressReporter::new()).unwrap();

        assert!(result.degraded);
        assert!(result.diagnostics.iter().any(|d| matches!(
            d,
            Diagnostic::FragmentFallback { failures, .. } if failures.len() == 1
        )));
        assert_eq!(result.pool_size, 8);
    }

    #[test]
    fn injected_fragment_source_is_used_without_fallback() {
        let input = PredictionInput::new(Sequence::parse("MKVLAG").unwrap());
        let config = small_pool(quick_builder(5), 2).build().unwrap();
        let ff = Forcefield::default();
        let source: Arc<dyn FragmentSource> =
            Arc::new(InMemoryFragmentSource::new("memory", FragmentLibrary::builtin(&ff, 3)));

        let result = run_with_source(&input, &config, &ProgressReporter::new(), Some(source)).unwrap();
        assert!(
            !result
                .diagnostics
                .iter()
                .any(|d| matches!(d, Diagnostic::FragmentFallback { .. }))
        );
    }

    #[test]
    fn reference_structure_is_scored() {
        let sequence = Sequence::parse("MKVLAGSEAT").unwrap();
        let ff = Forcefield::default();
        let helix = DihedralSet::uniform(10, (-60f64).to_radians(), (-45f64).to_radians());
        let native = ConformationBuilder::new(&ff.geometry).build(&sequence, &helix).unwrap();
        let input = PredictionInput::new(sequence).with_reference(ReferenceStructure::from_conformation(&native));

        let config = small_pool(quick_builder(11), 2).build().unwrap();
        let result = run(&input, &config, &ProgressReporter::new()).unwrap();
        let score = result.similarity.unwrap();
        assert!(score.rmsd.is_finite() && score.rmsd >= 0.0);
        assert!((0.0..=1.0).contains(&score.tm_score));
    }

    #[test]
    fn mismatched_reference_is_rejected() {
        let ff = Forcefield::default();
        let other = Sequence::parse("AAAA").unwrap();
        let native = ConformationBuilder::new(&ff.geometry)
            .build(&other, &DihedralSet::extended(4))
            .unwrap();
        let input = PredictionInput::new(Sequence::parse("AAAAA").unwrap())
            .with_reference(ReferenceStructure::from_conformation(&native));
        let config = quick_builder(1).build().unwrap();

        let result = run(&input, &config, &ProgressReporter::new());
        assert!(matches!(
            result,
            Err(EngineError::Input {
                source: InputError::InvalidReference(_)
            })
        ));
    }

    #[test]
    fn reference_constructor_validates_lengths() {
        let result = ReferenceStructure::new(vec![ResidueType::Alanine; 3], Vec::new());
        assert!(matches!(result, Err(InputError::InvalidReference(_))));
    }

    #[test]
    fn reference_constructor_rejects_non_finite_coordinates() {
        let ff = Forcefield::default();
        let sequence = Sequence::parse("AAA").unwrap();
        let native = ConformationBuilder::new(&ff.geometry)
            .build(&sequence, &DihedralSet::extended(3))
            .unwrap();
        let mut backbone = native.backbone().to_vec();
        assert!(ReferenceStructure::new(sequence.residues().to_vec(), backbone.clone()).is_ok());

        backbone[1].o.y = f64::NAN;
        let result = ReferenceStructure::new(sequence.residues().to_vec(), backbone);
        assert!(matches!(result, Err(InputError::InvalidReference(msg)) if msg.contains("residue 1")));
    }

    #[test]
    fn expired_budget_returns_best_sample_unrefined() {
        let input = PredictionInput::new(Sequence::parse("MKVLAG").unwrap());
        let config = small_pool(quick_builder(9), 3)
            .wall_clock_budget(Duration::from_nanos(1))
            .build()
            .unwrap();
        let result = run(&input, &config, &ProgressReporter::new()).unwrap();

        assert!(result.degraded);
        assert!(result.stage_reports.is_empty());
        assert_eq!(result.pool_size, 3);
        assert_eq!(result.best.total(), result.initial_best_energy);
        assert!(
            result
                .diagnostics
                .iter()
                .any(|d| matches!(d, Diagnostic::DeadlineReached { phase: "refinement" }))
        );
    }

    #[test]
    fn progress_reports_each_phase() {
        let phases = Mutex::new(Vec::new());
        let refined = Mutex::new(0usize);
        let reporter = ProgressReporter::with_callback(Box::new(|event| match event {
            Progress::PhaseStart { name } => phases.lock().unwrap().push(name),
            Progress::CandidateRefined { .. } => *refined.lock().unwrap() += 1,
            _ => {}
        }));

        let input = PredictionInput::new(Sequence::parse("MKVLAG").unwrap());
        let config = small_pool(quick_builder(4), 2).build().unwrap();
        run(&input, &config, &reporter).unwrap();
        drop(reporter);

        assert_eq!(
            phases.into_inner().unwrap(),
            vec!["Preparation", "Sampling", "Refinement", "Finalization"]
        );
        assert_eq!(refined.into_inner().unwrap(), 2);
    }

    #[test]
    fn phase_events_stay_paired_when_preparation_fails() {
        let events = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| match event {
            Progress::PhaseStart { name } => events.lock().unwrap().push(format!("start {name}")),
            Progress::PhaseFinish => events.lock().unwrap().push("finish".to_string()),
            _ => {}
        }));

        let empty = PredictionInput::new(Sequence::new(Vec::new()));
        assert!(run(&empty, &quick_builder(1).build().unwrap(), &reporter).is_err());

        let input = PredictionInput::new(Sequence::parse("MKVLAG").unwrap());
        let config = quick_builder(1)
            .forcefield_path("/nonexistent/abfold/forcefield.toml".into())
            .build()
            .unwrap();
        assert!(matches!(
            run(&input, &config, &reporter),
            Err(EngineError::Parameters { .. })
        ));
        drop(reporter);

        assert_eq!(
            events.into_inner().unwrap(),
            vec!["start Preparation", "finish", "start Preparation", "finish"]
        );
    }
}
