use crate::core::forcefield::params::Forcefield;
use crate::core::models::residue::{BackboneClass, ResidueType};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FragmentLibraryError {
    #[error("CSV parsing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Invalid fragment record {record}: {reason}")]
    InvalidRecord { record: usize, reason: String },
    #[error("Fragment library contains no fragments")]
    Empty,
}

/// One library entry: a local sequence and the (φ, ψ) pair, in radians, of each residue.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub window: Vec<ResidueType>,
    pub angles: Vec<(f64, f64)>,
}

impl Fragment {
    #[inline]
    pub fn len(&self) -> usize {
        self.window.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct FragmentRecord {
    window: String,
    phi: String,
    psi: String,
}

/// Fragments grouped by window length.
#[derive(Debug, Clone, Default)]
pub struct FragmentLibrary {
    by_length: BTreeMap<usize, Vec<Fragment>>,
}

impl FragmentLibrary {
    pub fn new(fragments: Vec<Fragment>) -> Result<Self, FragmentLibraryError> {
        if fragments.is_empty() {
            return Err(FragmentLibraryError::Empty);
        }
        let mut by_length: BTreeMap<usize, Vec<Fragment>> = BTreeMap::new();
        for (record, fragment) in fragments.into_iter().enumerate() {
            if fragment.is_empty() || fragment.window.len() != fragment.angles.len() {
                return Err(FragmentLibraryError::InvalidRecord {
                    record,
                    reason: format!(
                        "{} residues but {} angle pairs",
                        fragment.window.len(),
                        fragment.angles.len()
                    ),
                });
            }
            by_length.entry(fragment.len()).or_default().push(fragment);
        }
        Ok(Self { by_length })
    }

    pub fn load_csv(path: &Path) -> Result<Self, FragmentLibraryError> {
        let reader = csv::Reader::from_path(path).map_err(|e| FragmentLibraryError::Csv {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::from_csv(reader, &path.to_string_lossy())
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, FragmentLibraryError> {
        Self::from_csv(csv::Reader::from_reader(reader), "<reader>")
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>, origin: &str) -> Result<Self, FragmentLibraryError> {
        let mut fragments = Vec::new();
        for (record, result) in reader.deserialize::<FragmentRecord>().enumerate() {
            let row = result.map_err(|e| FragmentLibraryError::Csv {
                path: origin.to_string(),
                source: e,
            })?;
            fragments.push(parse_record(record, &row)?);
        }
        Self::new(fragments)
    }

    /// A reduced library with one homopolymer window per residue type and basin the
    /// residue's class treats as allowed, at the basin centre.
    pub fn builtin(forcefield: &Forcefield, window_len: usize) -> Self {
        let window_len = window_len.max(1);
        let min_weight = forcefield.regions.min_basin_weight;
        let mut fragments = Vec::new();
        for residue in ResidueType::ALL {
            let class = forcefield.classes.get(residue.backbone_class());
            for basin in &forcefield.basins {
                if class.weights.get(basin.kind) < min_weight {
                    continue;
                }
                fragments.push(Fragment {
                    window: vec![residue; window_len],
                    angles: vec![(basin.phi.to_radians(), basin.psi.to_radians()); window_len],
                });
            }
        }
        let mut by_length = BTreeMap::new();
        by_length.insert(window_len, fragments);
        Self { by_length }
    }

    pub fn fragments_of_len(&self, len: usize) -> &[Fragment] {
        self.by_length.get(&len).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn window_lengths(&self) -> impl Iterator<Item = usize> + '_ {
        self.by_length.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.by_length.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn parse_record(record: usize, row: &FragmentRecord) -> Result<Fragment, FragmentLibraryError> {
    let invalid = |reason: String| FragmentLibraryError::InvalidRecord { record, reason };

    let window = row
        .window
        .trim()
        .chars()
        .map(|c| ResidueType::from_one_letter(c).ok_or_else(|| invalid(format!("unknown residue code '{c}'"))))
        .collect::<Result<Vec<_>, _>>()?;
    let parse_angles = |field: &str, text: &str| -> Result<Vec<f64>, FragmentLibraryError> {
        text.split(';')
            .map(|value| {
                value
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| invalid(format!("bad {field} value '{}'", value.trim())))
                    .and_then(|deg| {
                        if deg.is_finite() && (-180.0..=180.0).contains(&deg) {
                            Ok(deg.to_radians())
                        } else {
                            Err(invalid(format!("{field} value {deg} outside [-180, 180]")))
                        }
                    })
            })
            .collect()
    };
    let phi = parse_angles("phi", &row.phi)?;
    let psi = parse_angles("psi", &row.psi)?;
    if phi.len() != window.len() || psi.len() != window.len() {
        return Err(invalid(format!(
            "window of {} residues has {} phi and {} psi values",
            window.len(),
            phi.len(),
            psi.len()
        )));
    }
    Ok(Fragment {
        window,
        angles: phi.into_iter().zip(psi).collect(),
    })
}

/// Local sequence similarity of two equal-length windows, normalized to [-1, 1].
/// Identical residues score highest, shared chemical class scores partially, and a
/// glycine or proline mismatch is penalized since those residues shape the backbone.
pub fn window_similarity(target: &[ResidueType], candidate: &[ResidueType]) -> f64 {
    if target.is_empty() || target.len() != candidate.len() {
        return 0.0;
    }
    let score: f64 = target
        .iter()
        .zip(candidate)
        .map(|(&a, &b)| {
            if a == b {
                1.0
            } else if a.backbone_class() != b.backbone_class()
                && (a.backbone_class() != BackboneClass::General
                    || b.backbone_class() != BackboneClass::General)
            {
                -1.0
            } else if a.chemical_class() == b.chemical_class() {
                0.5
            } else {
                0.0
            }
        })
        .sum();
    score / target.len() as f64
}
