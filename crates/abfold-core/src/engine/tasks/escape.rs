use super::{StageOutcome, StagePoint};
use crate::engine::config::EscapeConfig;
use crate::engine::context::Deadline;
use crate::engine::error::EngineError;
use crate::engine::objective::Objective;
use crate::engine::utils::sampling::metropolis_accept;
use crate::core::utils::geometry::wrap_angle;
use itertools::{Itertools, MinMaxResult};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use tracing::{debug, instrument, trace};

/// Whether the trailing `window` entries of an energy trace span less than `threshold`.
/// Traces shorter than the window are never considered stagnant.
pub fn is_stagnant(trace: &[f64], window: usize, threshold: f64) -> bool {
    if window < 2 || trace.len() < window {
        return false;
    }
    match trace[trace.len() - window..].iter().minmax_by(|a, b| a.total_cmp(b)) {
        MinMaxResult::MinMax(low, high) => high - low < threshold,
        _ => false,
    }
}

/// Metropolis search with geometric cooling. Each move perturbs every free angle of one
/// residue; the best state seen is returned, not the last one.
#[instrument(skip_all, name = "escape_task", fields(steps = config.steps))]
pub fn run(
    objective: &Objective,
    start: &StagePoint,
    config: &EscapeConfig,
    deadline: &Deadline,
    rng: &mut impl Rng,
) -> Result<StageOutcome, EngineError> {
    let groups = objective.layout().residue_groups();
    if groups.is_empty() || config.steps == 0 {
        return Ok(StageOutcome {
            converged: false,
            ..StageOutcome::unchanged(start)
        });
    }
    let noise = Normal::new(0.0, config.step_size)
        .map_err(|e| EngineError::Internal(format!("escape move distribution: {e}")))?;

    let mut current = start.clone();
    let mut best = start.clone();
    let mut trace = vec![start.total()];
    let mut temperature = config.initial_temperature;
    let mut accepted = 0usize;
    let mut iterations = 0usize;

    for step in 0..config.steps {
        if deadline.expired() {
            debug!(step, "Deadline reached during escape");
            break;
        }
        iterations += 1;

        let group = &groups[rng.gen_range(0..groups.len())];
        let mut point = current.point.clone();
        for &index in group {
            point[index] = wrap_angle(point[index] + noise.sample(rng));
        }
        let proposal = StagePoint::evaluate(objective, point)?;

        if metropolis_accept(proposal.total() - current.total(), temperature, rng) {
            accepted += 1;
            current = proposal;
            if current.total() < best.total() {
                trace!(step, energy = current.total(), "New best state");
                best = current.clone();
            }
        }
        trace.push(current.total());
        temperature *= config.cooling_rate;
    }

    debug!(
        iterations,
        accepted,
        best = best.total(),
        start = start.total(),
        "Escape finished"
    );
    Ok(StageOutcome {
        best,
        iterations,
        converged: false,
        budget_exhausted: false,
        trace,
    })
}
