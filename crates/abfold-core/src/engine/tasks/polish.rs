use super::{StageOutcome, StagePoint};
use crate::core::forcefield::ramachandran::project_to_allowed;
use crate::core::forcefield::scoring::TermMask;
use crate::core::models::torsion::TorsionKind;
use crate::engine::config::PolishConfig;
use crate::engine::context::Deadline;
use crate::engine::error::EngineError;
use crate::engine::objective::Objective;
use nalgebra::DVector;
use tracing::{debug, instrument, trace};

/// Residues whose phi and psi are both free variables, as (residue, phi index, psi index).
fn projectable_slots(objective: &Objective) -> Vec<(usize, usize, usize)> {
    let layout = objective.layout();
    (0..objective.sequence().len())
        .filter_map(|residue| {
            let phi = layout.index_of(residue, TorsionKind::Phi)?;
            let psi = layout.index_of(residue, TorsionKind::Psi)?;
            Some((residue, phi, psi))
        })
        .collect()
}

/// Moves every outlier (φ, ψ) pair onto the allowed boundary of its nearest basin.
/// Returns the projected point and the number of residues moved.
pub fn project(objective: &Objective, x: &DVector<f64>) -> (DVector<f64>, usize) {
    let mut projected = x.clone();
    let mut moved = 0;
    for (residue, phi_index, psi_index) in projectable_slots(objective) {
        let Some(residue_type) = objective.sequence().get(residue) else {
            continue;
        };
        if let Some((phi, psi)) = project_to_allowed(
            x[phi_index],
            x[psi_index],
            residue_type.backbone_class(),
            objective.forcefield(),
        ) {
            projected[phi_index] = phi;
            projected[psi_index] = psi;
            moved += 1;
        }
    }
    (projected, moved)
}

/// Hard projection of outliers followed by small moves along the backbone-conformational
/// and solvation gradient, re-projecting after each move. Only moves that lower the total
/// energy are kept; a rejected move halves the step.
#[instrument(skip_all, name = "polish_task", fields(variables = objective.dimension()))]
pub fn run(
    objective: &Objective,
    start: &StagePoint,
    config: &PolishConfig,
    deadline: &Deadline,
) -> Result<StageOutcome, EngineError> {
    if objective.dimension() == 0 {
        return Ok(StageOutcome::unchanged(start));
    }

    let (projected, moved) = project(objective, &start.point);
    let mut current = if moved > 0 {
        StagePoint::evaluate(objective, projected)?
    } else {
        start.clone()
    };
    debug!(moved, energy = current.total(), "Projected outlier residues");

    let mut trace = vec![start.total(), current.total()];
    let min_step = config.step_size / 64.0;
    let mut step = config.step_size;
    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_steps {
        if deadline.expired() {
            debug!(iterations, "Deadline reached during polish");
            break;
        }
        iterations += 1;

        let gradient = objective.backbone_gradient(&current.point)
            + objective.masked_gradient(&current.point, TermMask::SOLVATION_ONLY)?;
        if gradient.amax() == 0.0 {
            converged = true;
            break;
        }

        let delta = gradient.map(|g| (-step * g).clamp(-config.max_step, config.max_step));
        let (trial, _) = project(objective, &Objective::wrap(&(&current.point + delta)));
        let proposal = StagePoint::evaluate(objective, trial)?;

        if proposal.total() < current.total() {
            trace!(iterations, energy = proposal.total(), "Polish move accepted");
            current = proposal;
        } else {
            step *= 0.5;
            if step < min_step {
                converged = true;
                break;
            }
        }
        trace.push(current.total());
    }

    Ok(StageOutcome {
        best: current,
        iterations,
        converged,
        budget_exhausted: !converged && iterations >= config.max_steps,
        trace,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::params::Forcefield;
    use crate::core::forcefield::ramachandran::{RegionClass, classify_region};
    use crate::core::models::sequence::Sequence;
    use crate::core::models::torsion::DihedralSet;
    use crate::engine::tasks::test_support::{objective, start};

    fn outlier_template(len: usize) -> DihedralSet {
        // (+100°, -100°) lies outside every basin a general residue allows.
        DihedralSet::from_phi_psi(&vec![(100f64.to_radians(), -100f64.to_radians()); len])
    }

    fn regions(objective: &Objective, x: &DVector<f64>) -> Vec<RegionClass> {
        let ff = objective.forcefield();
        projectable_slots(objective)
            .into_iter()
            .map(|(residue, phi, psi)| {
                let class = objective.sequence().get(residue).unwrap().backbone_class();
                classify_region(x[phi], x[psi], class, ff)
            })
            .collect()
    }

    #[test]
    fn projection_clears_every_outlier() {
        let sequence = Sequence::parse("AVLKA").unwrap();
        let ff = Forcefield::default();
        let objective = objective(&sequence, &ff, &outlier_template(5));
        let x = objective.initial_point().unwrap();

        assert!(regions(&objective, &x).iter().all(|r| *r == RegionClass::Outlier));
        let (projected, moved) = project(&objective, &x);
        assert_eq!(moved, 3);
        assert!(regions(&objective, &projected).iter().all(|r| *r != RegionClass::Outlier));

        let (again, moved_again) = project(&objective, &projected);
        assert_eq!(moved_again, 0);
        assert_eq!(again, projected);
    }

    #[test]
    fn polish_leaves_no_outliers_and_only_accepts_improvements() {
        let sequence = Sequence::parse("AVLKGSEA").unwrap();
        let ff = Forcefield::default();
        let objective = objective(&sequence, &ff, &outlier_template(8));
        let start = start(&objective);

        let config = PolishConfig {
            max_steps: 8,
            ..PolishConfig::default()
        };
        let outcome = run(&objective, &start, &config, &Deadline::unbounded()).unwrap();

        assert!(regions(&objective, &outcome.best.point).iter().all(|r| *r != RegionClass::Outlier));
        assert!(outcome.trace[1..].windows(2).all(|w| w[1] <= w[0]));
        assert!(outcome.best.total() < start.total());
    }
}
