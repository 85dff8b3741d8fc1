use crate::core::models::residue::BackboneClass;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Ideal backbone bond lengths (Å) and bond angles (degrees).
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct BackboneGeometry {
    pub n_ca_length: f64,
    pub ca_c_length: f64,
    pub c_n_length: f64,
    pub c_o_length: f64,
    pub n_h_length: f64,
    pub c_n_ca_angle: f64,
    pub n_ca_c_angle: f64,
    pub ca_c_n_angle: f64,
    pub ca_c_o_angle: f64,
}

impl Default for BackboneGeometry {
    fn default() -> Self {
        Self {
            n_ca_length: 1.458,
            ca_c_length: 1.525,
            c_n_length: 1.329,
            c_o_length: 1.231,
            n_h_length: 1.01,
            c_n_ca_angle: 121.7,
            n_ca_c_angle: 111.2,
            ca_c_n_angle: 116.2,
            ca_c_o_angle: 120.5,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum BasinKind {
    AlphaRight,
    Beta,
    #[serde(rename = "polyproline-ii")]
    PolyprolineII,
    AlphaLeft,
}

impl BasinKind {
    pub const ALL: [BasinKind; 4] = [
        BasinKind::AlphaRight,
        BasinKind::Beta,
        BasinKind::PolyprolineII,
        BasinKind::AlphaLeft,
    ];
}

/// A Ramachandran basin centre and its spread, in degrees.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct Basin {
    pub kind: BasinKind,
    pub phi: f64,
    pub psi: f64,
    pub sigma_phi: f64,
    pub sigma_psi: f64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct BasinWeights {
    pub alpha_right: f64,
    pub beta: f64,
    pub polyproline_ii: f64,
    pub alpha_left: f64,
}

impl BasinWeights {
    pub fn get(&self, kind: BasinKind) -> f64 {
        match kind {
            BasinKind::AlphaRight => self.alpha_right,
            BasinKind::Beta => self.beta,
            BasinKind::PolyprolineII => self.polyproline_ii,
            BasinKind::AlphaLeft => self.alpha_left,
        }
    }
}

impl Default for BasinWeights {
    fn default() -> Self {
        Self {
            alpha_right: 1.0,
            beta: 1.0,
            polyproline_ii: 0.9,
            alpha_left: 0.25,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct ClassParams {
    pub width_scale: f64,
    pub cap: f64,
    pub weights: BasinWeights,
}

impl Default for ClassParams {
    fn default() -> Self {
        Self {
            width_scale: 1.0,
            cap: 10.0,
            weights: BasinWeights::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct ResidueClassTable {
    pub general: ClassParams,
    pub glycine: ClassParams,
    pub proline: ClassParams,
}

impl ResidueClassTable {
    #[inline]
    pub fn get(&self, class: BackboneClass) -> &ClassParams {
        match class {
            BackboneClass::General => &self.general,
            BackboneClass::Glycine => &self.glycine,
            BackboneClass::Proline => &self.proline,
        }
    }
}

impl Default for ResidueClassTable {
    fn default() -> Self {
        Self {
            general: ClassParams::default(),
            glycine: ClassParams {
                width_scale: 1.5,
                cap: 6.0,
                weights: BasinWeights {
                    alpha_right: 0.9,
                    beta: 0.8,
                    polyproline_ii: 0.8,
                    alpha_left: 0.9,
                },
            },
            proline: ClassParams {
                width_scale: 0.7,
                cap: 15.0,
                weights: BasinWeights {
                    alpha_right: 1.0,
                    beta: 0.3,
                    polyproline_ii: 1.0,
                    alpha_left: 0.05,
                },
            },
        }
    }
}

/// Thresholds, in units of the class-scaled basin sigma, separating favored, allowed
/// and outlier (phi, psi) pairs.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct RegionParams {
    pub favored_radius: f64,
    pub allowed_radius: f64,
    pub min_basin_weight: f64,
}

impl Default for RegionParams {
    fn default() -> Self {
        Self {
            favored_radius: 1.5,
            allowed_radius: 2.5,
            min_basin_weight: 0.5,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct EnergyWeights {
    pub bond: f64,
    pub angle: f64,
    pub backbone: f64,
    pub vdw: f64,
    pub electrostatic: f64,
    pub hbond: f64,
    pub solvation: f64,
}

impl Default for EnergyWeights {
    fn default() -> Self {
        Self {
            bond: 1.0,
            angle: 1.0,
            backbone: 1.0,
            vdw: 1.0,
            electrostatic: 1.0,
            hbond: 1.0,
            solvation: 0.5,
        }
    }
}

/// Harmonic force constants: kcal/(mol·Å²) for bonds, kcal/(mol·rad²) for angles.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct BondedParams {
    pub bond_force_constant: f64,
    pub angle_force_constant: f64,
}

impl Default for BondedParams {
    fn default() -> Self {
        Self {
            bond_force_constant: 300.0,
            angle_force_constant: 80.0,
        }
    }
}

/// Per-atom Lennard-Jones minimum distance, well depth and partial charge. Pair
/// parameters combine by arithmetic mean (radius) and geometric mean (depth).
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct AtomParams {
    pub radius: f64,
    pub well_depth: f64,
    pub charge: f64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct NonBondedParams {
    pub n: AtomParams,
    pub ca: AtomParams,
    pub c: AtomParams,
    pub o: AtomParams,
    pub exclusion_window: usize,
    pub cutoff: f64,
    pub switch_on: f64,
    pub softening: f64,
    pub dielectric_slope: f64,
}

impl Default for NonBondedParams {
    fn default() -> Self {
        Self {
            n: AtomParams {
                radius: 3.7,
                well_depth: 0.20,
                charge: -0.16,
            },
            ca: AtomParams {
                radius: 4.0,
                well_depth: 0.10,
                charge: 0.16,
            },
            c: AtomParams {
                radius: 4.0,
                well_depth: 0.11,
                charge: 0.51,
            },
            o: AtomParams {
                radius: 3.4,
                well_depth: 0.12,
                charge: -0.51,
            },
            exclusion_window: 1,
            cutoff: 9.0,
            switch_on: 7.5,
            softening: 1.5,
            dielectric_slope: 4.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct HBondParams {
    pub well_depth: f64,
    pub optimal_distance: f64,
    pub min_distance: f64,
    pub max_distance: f64,
    pub min_angle: f64,
    pub min_separation: usize,
}

impl Default for HBondParams {
    fn default() -> Self {
        Self {
            well_depth: 2.0,
            optimal_distance: 2.9,
            min_distance: 2.5,
            max_distance: 3.5,
            min_angle: 120.0,
            min_separation: 3,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct SolvationParams {
    pub neighbor_radius: f64,
    pub switch_width: f64,
    pub max_neighbors: f64,
    pub reference_exposure: f64,
    pub coefficient: f64,
}

impl Default for SolvationParams {
    fn default() -> Self {
        Self {
            neighbor_radius: 10.0,
            switch_width: 1.0,
            max_neighbors: 16.0,
            reference_exposure: 0.5,
            coefficient: 0.1,
        }
    }
}

/// The complete, immutable parameter set of the energy function and the builder.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Forcefield {
    pub geometry: BackboneGeometry,
    pub weights: EnergyWeights,
    pub bonded: BondedParams,
    pub basins: Vec<Basin>,
    pub classes: ResidueClassTable,
    pub regions: RegionParams,
    pub non_bonded: NonBondedParams,
    pub hbond: HBondParams,
    pub solvation: SolvationParams,
}

impl Default for Forcefield {
    fn default() -> Self {
        Self {
            geometry: BackboneGeometry::default(),
            weights: EnergyWeights::default(),
            bonded: BondedParams::default(),
            basins: default_basins(),
            classes: ResidueClassTable::default(),
            regions: RegionParams::default(),
            non_bonded: NonBondedParams::default(),
            hbond: HBondParams::default(),
            solvation: SolvationParams::default(),
        }
    }
}

fn default_basins() -> Vec<Basin> {
    vec![
        Basin {
            kind: BasinKind::AlphaRight,
            phi: -63.0,
            psi: -43.0,
            sigma_phi: 15.0,
            sigma_psi: 15.0,
        },
        Basin {
            kind: BasinKind::Beta,
            phi: -120.0,
            psi: 130.0,
            sigma_phi: 25.0,
            sigma_psi: 25.0,
        },
        Basin {
            kind: BasinKind::PolyprolineII,
            phi: -75.0,
            psi: 145.0,
            sigma_phi: 15.0,
            sigma_psi: 15.0,
        },
        Basin {
            kind: BasinKind::AlphaLeft,
            phi: 57.0,
            psi: 47.0,
            sigma_phi: 15.0,
            sigma_psi: 15.0,
        },
    ]
}

#[derive(Debug, Error)]
pub enum ParamLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Invalid parameter '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl Forcefield {
    pub fn load(path: &Path) -> Result<Self, ParamLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| ParamLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let forcefield: Self = toml::from_str(&content).map_err(|e| ParamLoadError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        forcefield.validate()?;
        Ok(forcefield)
    }

    pub fn basin(&self, kind: BasinKind) -> Option<&Basin> {
        self.basins.iter().find(|b| b.kind == kind)
    }

    pub fn validate(&self) -> Result<(), ParamLoadError> {
        let g = &self.geometry;
        let lengths = [
            g.n_ca_length,
            g.ca_c_length,
            g.c_n_length,
            g.c_o_length,
            g.n_h_length,
        ];
        if lengths.iter().any(|&l| !(l.is_finite() && l > 0.0)) {
            return Err(invalid("geometry", "bond lengths must be positive"));
        }
        let angles = [g.c_n_ca_angle, g.n_ca_c_angle, g.ca_c_n_angle, g.ca_c_o_angle];
        if angles.iter().any(|&a| !(a > 0.0 && a < 180.0)) {
            return Err(invalid("geometry", "bond angles must lie in (0, 180) degrees"));
        }
        if self.basins.is_empty() {
            return Err(invalid("basins", "at least one basin is required"));
        }
        if self
            .basins
            .iter()
            .any(|b| !(b.sigma_phi > 0.0 && b.sigma_psi > 0.0))
        {
            return Err(invalid("basins", "basin widths must be positive"));
        }
        for class in [&self.classes.general, &self.classes.glycine, &self.classes.proline] {
            if !(class.width_scale > 0.0 && class.cap >= 0.0) {
                return Err(invalid(
                    "classes",
                    "width scale must be positive and cap non-negative",
                ));
            }
            let weights: Vec<f64> = self.basins.iter().map(|b| class.weights.get(b.kind)).collect();
            if weights.iter().any(|&w| !(w.is_finite() && w >= 0.0)) {
                return Err(invalid("classes", "basin weights must be finite and non-negative"));
            }
            if weights.iter().all(|&w| w == 0.0) {
                return Err(invalid(
                    "classes",
                    "every class needs a positive weight on at least one basin",
                ));
            }
        }
        let nb = &self.non_bonded;
        if !(nb.switch_on < nb.cutoff && nb.switch_on > 0.0) {
            return Err(invalid("non-bonded", "switch-on must lie in (0, cutoff)"));
        }
        if !(nb.softening > 0.0 && nb.dielectric_slope > 0.0) {
            return Err(invalid(
                "non-bonded",
                "softening and dielectric slope must be positive",
            ));
        }
        let hb = &self.hbond;
        if !(hb.min_distance < hb.optimal_distance && hb.optimal_distance < hb.max_distance) {
            return Err(invalid(
                "hbond",
                "distances must satisfy min < optimal < max",
            ));
        }
        if !(hb.min_angle > 0.0 && hb.min_angle < 180.0) {
            return Err(invalid("hbond", "min-angle must lie in (0, 180) degrees"));
        }
        let sol = &self.solvation;
        if !(sol.max_neighbors > 0.0 && sol.switch_width > 0.0) {
            return Err(invalid(
                "solvation",
                "max-neighbors and switch-width must be positive",
            ));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ParamLoadError {
    ParamLoadError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
