use crate::core::models::conformation::BackboneResidue;
use crate::core::utils::geometry::{calculate_rmsd, centroid};
use nalgebra::{Matrix3, Point3, Rotation3, Vector3};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimilarityError {
    #[error("Cannot superpose empty coordinate sets")]
    Empty,
    #[error("Coordinate sets differ in length: reference has {reference}, candidate has {candidate}")]
    LengthMismatch { reference: usize, candidate: usize },
    #[error("Singular value decomposition failed to produce rotation factors")]
    Decomposition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AtomSelection {
    #[default]
    CalphaOnly,
    Backbone,
}

/// Optimal rigid motion mapping a mobile point set onto a reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Superposition {
    pub rotation: Rotation3<f64>,
    pub translation: Vector3<f64>,
    pub rmsd: f64,
}

impl Superposition {
    #[inline]
    pub fn apply(&self, point: &Point3<f64>) -> Point3<f64> {
        self.rotation * point + self.translation
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityScore {
    pub rmsd: f64,
    pub tm_score: f64,
    pub aligned_atoms: usize,
}

/// Kabsch superposition of `mobile` onto `reference`, reflection-corrected.
pub fn superpose(
    reference: &[Point3<f64>],
    mobile: &[Point3<f64>],
) -> Result<Superposition, SimilarityError> {
    if reference.len() != mobile.len() {
        return Err(SimilarityError::LengthMismatch {
            reference: reference.len(),
            candidate: mobile.len(),
        });
    }
    let (Some(ref_center), Some(mob_center)) = (centroid(reference), centroid(mobile)) else {
        return Err(SimilarityError::Empty);
    };

    let mut covariance = Matrix3::zeros();
    for (r, m) in reference.iter().zip(mobile) {
        covariance += (m - mob_center) * (r - ref_center).transpose();
    }

    let svd = covariance.svd(true, true);
    let u = svd.u.ok_or(SimilarityError::Decomposition)?;
    let v_t = svd.v_t.ok_or(SimilarityError::Decomposition)?;

    let mut correction = Matrix3::identity();
    if (v_t.transpose() * u.transpose()).determinant() < 0.0 {
        let weakest = svd.singular_values.imin();
        correction[(weakest, weakest)] = -1.0;
    }
    let rotation = Rotation3::from_matrix_unchecked(v_t.transpose() * correction * u.transpose());
    let translation = ref_center.coords - rotation * mob_center.coords;

    let moved: Vec<Point3<f64>> = mobile.iter().map(|p| rotation * p + translation).collect();
    let rmsd = calculate_rmsd(reference, &moved).ok_or(SimilarityError::Empty)?;

    Ok(Superposition {
        rotation,
        translation,
        rmsd,
    })
}

/// TM-score normalization distance for a chain of `len` residues.
pub fn tm_d0(len: usize) -> f64 {
    let l = len as f64;
    if l <= 15.0 {
        return 0.5;
    }
    (1.24 * (l - 15.0).cbrt() - 1.8).max(0.5)
}

/// TM-like score of already superposed Cα pairs, in [0, 1].
pub fn tm_score(reference_ca: &[Point3<f64>], superposed_ca: &[Point3<f64>]) -> f64 {
    if reference_ca.is_empty() || reference_ca.len() != superposed_ca.len() {
        return 0.0;
    }
    let d0 = tm_d0(reference_ca.len());
    let sum: f64 = reference_ca
        .iter()
        .zip(superposed_ca)
        .map(|(r, c)| 1.0 / (1.0 + ((r - c).norm() / d0).powi(2)))
        .sum();
    sum / reference_ca.len() as f64
}

fn select(residues: &[BackboneResidue], selection: AtomSelection) -> Vec<Point3<f64>> {
    match selection {
        AtomSelection::CalphaOnly => residues.iter().map(|r| r.ca).collect(),
        AtomSelection::Backbone => residues
            .iter()
            .flat_map(|r| [r.n, r.ca, r.c, r.o])
            .collect(),
    }
}

/// RMSD over the selected atoms after optimal superposition, and the TM-like score
/// of the Cα trace under the same superposition.
pub fn similarity(
    reference: &[BackboneResidue],
    candidate: &[BackboneResidue],
    selection: AtomSelection,
) -> Result<SimilarityScore, SimilarityError> {
    if reference.len() != candidate.len() {
        return Err(SimilarityError::LengthMismatch {
            reference: reference.len(),
            candidate: candidate.len(),
        });
    }
    if reference.is_empty() {
        return Err(SimilarityError::Empty);
    }
    let ref_atoms = select(reference, selection);
    let cand_atoms = select(candidate, selection);
    let fit = superpose(&ref_atoms, &cand_atoms)?;

    let ref_ca = select(reference, AtomSelection::CalphaOnly);
    let moved_ca: Vec<Point3<f64>> = candidate.iter().map(|r| fit.apply(&r.ca)).collect();

    Ok(SimilarityScore {
        rmsd: fit.rmsd,
        tm_score: tm_score(&ref_ca, &moved_ca),
        aligned_atoms: ref_atoms.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::builder::ConformationBuilder;
    use crate::core::forcefield::params::BackboneGeometry;
    use crate::core::models::sequence::Sequence;
    use crate::core::models::torsion::DihedralSet;
    use nalgebra::Unit;

    fn helix(len: usize) -> Vec<BackboneResidue> {
        let seq = Sequence::new(vec![crate::core::models::residue::ResidueType::Alanine; len]);
        let angles = DihedralSet::uniform(len, (-57f64).to_radians(), (-47f64).to_radians());
        ConformationBuilder::new(&BackboneGeometry::default())
            .build(&seq, &angles)
            .unwrap()
            .backbone()
            .to_vec()
    }

    fn strand(len: usize) -> Vec<BackboneResidue> {
        let seq = Sequence::new(vec![crate::core::models::residue::ResidueType::Alanine; len]);
        ConformationBuilder::new(&BackboneGeometry::default())
            .build(&seq, &DihedralSet::extended(len))
            .unwrap()
            .backbone()
            .to_vec()
    }

    fn moved(residues: &[BackboneResidue], rotation: &Rotation3<f64>, shift: Vector3<f64>) -> Vec<BackboneResidue> {
        let t = |p: Point3<f64>| rotation * p + shift;
        residues
            .iter()
            .map(|r| BackboneResidue {
                n: t(r.n),
                ca: t(r.ca),
                c: t(r.c),
                o: t(r.o),
            })
            .collect()
    }

    #[test]
    fn identical_structures_have_zero_rmsd_and_unit_tm_score() {
        let a = helix(20);
        let score = similarity(&a, &a, AtomSelection::CalphaOnly).unwrap();
        assert!(score.rmsd < 1e-6);
        assert!((score.tm_score - 1.0).abs() < 1e-9);
        assert_eq!(score.aligned_atoms, 20);
    }

    #[test]
    fn translation_does_not_change_rmsd() {
        let a = helix(20);
        let b = moved(&a, &Rotation3::identity(), Vector3::new(5.0, 0.0, 0.0));
        let score = similarity(&a, &b, AtomSelection::Backbone).unwrap();
        assert!(score.rmsd < 1e-6);
        assert_eq!(score.aligned_atoms, 80);
    }

    #[test]
    fn rmsd_is_invariant_under_rigid_motion_of_either_structure() {
        let a = helix(16);
        let b = strand(16);
        let base = similarity(&a, &b, AtomSelection::CalphaOnly).unwrap();
        let rotation = Rotation3::from_axis_angle(&Unit::new_normalize(Vector3::new(1.0, 2.0, -0.5)), 1.1);
        let b_moved = moved(&b, &rotation, Vector3::new(-3.0, 7.5, 2.0));
        let a_moved = moved(&a, &rotation.inverse(), Vector3::new(10.0, 0.0, -4.0));
        let s1 = similarity(&a, &b_moved, AtomSelection::CalphaOnly).unwrap();
        let s2 = similarity(&a_moved, &b, AtomSelection::CalphaOnly).unwrap();
        assert!(base.rmsd > 1.0);
        assert!((s1.rmsd - base.rmsd).abs() < 1e-6);
        assert!((s2.rmsd - base.rmsd).abs() < 1e-6);
        assert!((s1.tm_score - base.tm_score).abs() < 1e-6);
    }

    #[test]
    fn different_folds_score_below_identical() {
        let a = helix(30);
        let b = strand(30);
        let score = similarity(&a, &b, AtomSelection::CalphaOnly).unwrap();
        assert!(score.tm_score < 0.5);
        assert!(score.tm_score > 0.0);
    }

    #[test]
    fn superpose_never_returns_a_reflection() {
        let a = helix(12);
        let ca: Vec<Point3<f64>> = a.iter().map(|r| r.ca).collect();
        let mirrored: Vec<Point3<f64>> = ca.iter().map(|p| Point3::new(-p.x, p.y, p.z)).collect();
        let fit = superpose(&ca, &mirrored).unwrap();
        assert!((fit.rotation.matrix().determinant() - 1.0).abs() < 1e-9);
        assert!(fit.rmsd > 0.1);
    }

    #[test]
    fn mismatched_or_empty_inputs_are_rejected() {
        let a = helix(5);
        let b = helix(6);
        assert_eq!(
            similarity(&a, &b, AtomSelection::CalphaOnly),
            Err(SimilarityError::LengthMismatch {
                reference: 5,
                candidate: 6
            })
        );
        assert_eq!(similarity(&[], &[], AtomSelection::Backbone), Err(SimilarityError::Empty));
    }

    #[test]
    fn tm_d0_has_floor_for_short_chains() {
        assert_eq!(tm_d0(10), 0.5);
        assert!(tm_d0(100) > 3.0);
    }
}
