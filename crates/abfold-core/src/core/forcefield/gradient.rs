use super::params::Forcefield;
use super::ramachandran::backbone_penalty_with_gradient;
use crate::core::models::sequence::Sequence;
use crate::core::models::torsion::{AngleLayout, DihedralSet, TorsionKind};
use nalgebra::DVector;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Symmetric finite-difference gradient of `f` at `x`. Each variable is perturbed
/// independently, so the partial derivatives are computed in parallel when the
/// `parallel` feature is enabled. The first error returned by `f` aborts the pass.
pub fn finite_difference<F, E>(x: &DVector<f64>, epsilon: f64, f: F) -> Result<DVector<f64>, E>
where
    F: Fn(&DVector<f64>) -> Result<f64, E> + Sync,
    E: Send,
{
    let partial = |index: usize| -> Result<f64, E> {
        let mut forward = x.clone();
        forward[index] += epsilon;
        let mut backward = x.clone();
        backward[index] -= epsilon;
        Ok((f(&forward)? - f(&backward)?) / (2.0 * epsilon))
    };

    #[cfg(not(feature = "parallel"))]
    let partials = (0..x.len()).map(partial).collect::<Result<Vec<f64>, E>>()?;

    #[cfg(feature = "parallel")]
    let partials = (0..x.len())
        .into_par_iter()
        .map(partial)
        .collect::<Result<Vec<f64>, E>>()?;

    Ok(DVector::from_vec(partials))
}

/// Analytic gradient of the weighted backbone-conformational term with respect to
/// the layout's variables. Omega variables, and residues missing phi or psi, get zero.
pub fn backbone_gradient(
    sequence: &Sequence,
    angles: &DihedralSet,
    layout: &AngleLayout,
    forcefield: &Forcefield,
) -> DVector<f64> {
    let weight = forcefield.weights.backbone;
    let mut gradient = DVector::zeros(layout.len());
    for (index, &(residue, kind)) in layout.slots().iter().enumerate() {
        if kind == TorsionKind::Omega {
            continue;
        }
        let Some((phi, psi)) = angles.get(residue).and_then(|t| t.phi_psi()) else {
            continue;
        };
        let Some(residue_type) = sequence.get(residue) else {
            continue;
        };
        let (_, d_phi, d_psi) =
            backbone_penalty_with_gradient(phi, psi, residue_type.backbone_class(), forcefield);
        gradient[index] = weight * if kind == TorsionKind::Phi { d_phi } else { d_psi };
    }
    gradient
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::builder::ConformationBuilder;
    use crate::core::forcefield::scoring::{Scorer, TermMask};

    #[test]
    fn finite_difference_of_quadratic_is_exact() {
        let x = DVector::from_vec(vec![1.0, -2.0, 0.5]);
        let g = finite_difference(&x, 1e-4, |v: &DVector<f64>| -> Result<f64, ()> {
            Ok(v.iter().map(|a| a * a).sum())
        })
        .unwrap();
        for i in 0..3 {
            assert!((g[i] - 2.0 * x[i]).abs() < 1e-8);
        }
    }

    #[test]
    fn finite_difference_propagates_errors() {
        let x = DVector::from_vec(vec![0.0, 0.0]);
        let result = finite_difference(&x, 1e-4, |_: &DVector<f64>| -> Result<f64, &'static str> {
            Err("boom")
        });
        assert_eq!(result, Err("boom"));
    }

    #[test]
    fn analytic_backbone_gradient_matches_finite_differences_of_scorer() {
        let ff = Forcefield::default();
        let sequence: Sequence = "AGPSVA".parse().unwrap();
        let pairs: Vec<(f64, f64)> = [
            (-100.0, 80.0),
            (-30.0, -80.0),
            (100.0, 10.0),
            (-150.0, 100.0),
            (-95.0, -10.0),
            (-60.0, 150.0),
        ]
        .iter()
        .map(|&(a, b): &(f64, f64)| (a.to_radians(), b.to_radians()))
        .collect();
        let angles = DihedralSet::from_phi_psi(&pairs);
        let layout = AngleLayout::new(&angles, false);
        let x = layout.extract(&angles).unwrap();

        let builder = ConformationBuilder::new(&ff.geometry);
        let scorer = Scorer::new(&ff);
        let numeric = finite_difference(&x, 1e-6, |v: &DVector<f64>| {
            let conf = builder.build(&sequence, &layout.apply(&angles, v)).unwrap();
            Ok::<f64, ()>(scorer.score_masked(&conf, TermMask::BACKBONE_ONLY).unwrap().backbone)
        })
        .unwrap();
        let analytic = backbone_gradient(&sequence, &angles, &layout, &ff);

        for i in 0..x.len() {
            let tol = 1e-4 * (1.0 + numeric[i].abs());
            assert!(
                (analytic[i] - numeric[i]).abs() < tol,
                "variable {i}: analytic {} numeric {}",
                analytic[i],
                numeric[i]
            );
        }
    }
}
