use super::error::InputError;
use crate::core::utils::geometry::wrap_angle;
use nalgebra::DVector;
use std::f64::consts::PI;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TorsionKind {
    Phi,
    Psi,
    Omega,
}

impl fmt::Display for TorsionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                TorsionKind::Phi => "phi",
                TorsionKind::Psi => "psi",
                TorsionKind::Omega => "omega",
            }
        )
    }
}

/// Backbone torsions of one residue, in radians. `None` marks an angle that is
/// undefined because the neighbouring residue it depends on does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ResidueTorsions {
    pub phi: Option<f64>,
    pub psi: Option<f64>,
    pub omega: Option<f64>,
}

impl ResidueTorsions {
    #[inline]
    pub fn get(&self, kind: TorsionKind) -> Option<f64> {
        match kind {
            TorsionKind::Phi => self.phi,
            TorsionKind::Psi => self.psi,
            TorsionKind::Omega => self.omega,
        }
    }

    #[inline]
    pub fn set(&mut self, kind: TorsionKind, value: Option<f64>) {
        match kind {
            TorsionKind::Phi => self.phi = value,
            TorsionKind::Psi => self.psi = value,
            TorsionKind::Omega => self.omega = value,
        }
    }

    pub fn phi_psi(&self) -> Option<(f64, f64)> {
        Some((self.phi?, self.psi?))
    }
}

#[inline]
pub fn is_valid_angle(value: f64) -> bool {
    value.is_finite() && value > -PI && value <= PI
}

/// Per-residue backbone dihedrals of a chain.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DihedralSet {
    torsions: Vec<ResidueTorsions>,
}

impl DihedralSet {
    pub fn new(torsions: Vec<ResidueTorsions>) -> Self {
        Self { torsions }
    }

    /// Builds a set from one (phi, psi) pair per residue. Angles the chain ends
    /// cannot define are dropped, omega is trans, and every value is wrapped.
    pub fn from_phi_psi(pairs: &[(f64, f64)]) -> Self {
        let last = pairs.len().saturating_sub(1);
        let torsions = pairs
            .iter()
            .enumerate()
            .map(|(i, &(phi, psi))| ResidueTorsions {
                phi: (i > 0).then(|| wrap_angle(phi)),
                psi: (i < last).then(|| wrap_angle(psi)),
                omega: (i > 0).then_some(PI),
            })
            .collect();
        Self { torsions }
    }

    pub fn uniform(len: usize, phi: f64, psi: f64) -> Self {
        Self::from_phi_psi(&vec![(phi, psi); len])
    }

    pub fn extended(len: usize) -> Self {
        Self::uniform(len, (-120f64).to_radians(), 120f64.to_radians())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.torsions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.torsions.is_empty()
    }

    #[inline]
    pub fn torsions(&self) -> &[ResidueTorsions] {
        &self.torsions
    }

    pub fn get(&self, residue: usize) -> Option<&ResidueTorsions> {
        self.torsions.get(residue)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResidueTorsions> {
        self.torsions.iter()
    }

    /// Overwrites phi and psi of `residue` where they are already defined; slots the
    /// chain ends leave undefined stay undefined.
    pub fn set_phi_psi(&mut self, residue: usize, phi: f64, psi: f64) {
        if let Some(t) = self.torsions.get_mut(residue) {
            if t.phi.is_some() {
                t.phi = Some(wrap_angle(phi));
            }
            if t.psi.is_some() {
                t.psi = Some(wrap_angle(psi));
            }
        }
    }

    pub fn phi_psi_pairs(&self) -> impl Iterator<Item = (usize, (f64, f64))> + '_ {
        self.torsions
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.phi_psi().map(|pair| (i, pair)))
    }

    pub fn validate(&self, expected_len: usize) -> Result<(), InputError> {
        if expected_len == 0 {
            return Err(InputError::EmptySequence);
        }
        if self.len() != expected_len {
            return Err(InputError::LengthMismatch {
                field: "dihedral set",
                expected: expected_len,
                found: self.len(),
            });
        }
        let last = expected_len - 1;
        for (residue, torsions) in self.torsions.iter().enumerate() {
            for kind in [TorsionKind::Phi, TorsionKind::Psi, TorsionKind::Omega] {
                let Some(value) = torsions.get(kind) else {
                    continue;
                };
                let terminal = match kind {
                    TorsionKind::Phi | TorsionKind::Omega => residue == 0,
                    TorsionKind::Psi => residue == last,
                };
                if terminal {
                    return Err(InputError::UnexpectedTerminalAngle {
                        residue,
                        field: kind,
                    });
                }
                if !is_valid_angle(value) {
                    return Err(InputError::AngleOutOfRange {
                        residue,
                        field: kind,
                        value,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Ordered free variables of an optimization: every defined phi and psi, plus
/// omega when requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AngleLayout {
    slots: Vec<(usize, TorsionKind)>,
}

impl AngleLayout {
    pub fn new(set: &DihedralSet, include_omega: bool) -> Self {
        let mut slots = Vec::with_capacity(set.len() * 3);
        for (residue, torsions) in set.iter().enumerate() {
            if torsions.phi.is_some() {
                slots.push((residue, TorsionKind::Phi));
            }
            if torsions.psi.is_some() {
                slots.push((residue, TorsionKind::Psi));
            }
            if include_omega && torsions.omega.is_some() {
                slots.push((residue, TorsionKind::Omega));
            }
        }
        Self { slots }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub fn slots(&self) -> &[(usize, TorsionKind)] {
        &self.slots
    }

    pub fn index_of(&self, residue: usize, kind: TorsionKind) -> Option<usize> {
        self.slots.iter().position(|&slot| slot == (residue, kind))
    }

    /// Variable indices grouped by residue, skipping residues without any free angle.
    pub fn residue_groups(&self) -> Vec<Vec<usize>> {
        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut current: Option<usize> = None;
        for (index, &(residue, _)) in self.slots.iter().enumerate() {
            if current == Some(residue) {
                if let Some(group) = groups.last_mut() {
                    group.push(index);
                }
            } else {
                groups.push(vec![index]);
                current = Some(residue);
            }
        }
        groups
    }

    pub fn extract(&self, set: &DihedralSet) -> Result<DVector<f64>, InputError> {
        let mut values = DVector::zeros(self.slots.len());
        for (index, &(residue, kind)) in self.slots.iter().enumerate() {
            values[index] = set
                .get(residue)
                .and_then(|t| t.get(kind))
                .ok_or(InputError::MissingAngle {
                    residue,
                    field: kind,
                })?;
        }
        Ok(values)
    }

    /// Writes `values` into a copy of `base`, wrapping each into (-π, π].
    pub fn apply(&self, base: &DihedralSet, values: &DVector<f64>) -> DihedralSet {
        debug_assert_eq!(values.len(), self.slots.len());
        let mut set = base.clone();
        for (&(residue, kind), &value) in self.slots.iter().zip(values.iter()) {
            if let Some(t) = set.torsions.get_mut(residue) {
                t.set(kind, Some(wrap_angle(value)));
            }
        }
        set
    }
}
