use super::{StageOutcome, StagePoint};
use crate::engine::config::RelaxationConfig;
use crate::engine::context::Deadline;
use crate::engine::error::EngineError;
use crate::engine::objective::Objective;
use crate::engine::state::OptimizationState;
use tracing::{debug, instrument, trace};

/// Steepest descent with a fixed small step. Each component of a move is clamped to
/// `max_step`; a move that does not lower the energy is retried at half size, up to
/// `max_halvings` times, and the step never grows back above the fixed size.
#[instrument(skip_all, name = "relaxation_task", fields(variables = objective.dimension()))]
pub fn run(
    objective: &Objective,
    start: &StagePoint,
    config: &RelaxationConfig,
    deadline: &Deadline,
) -> Result<StageOutcome, EngineError> {
    if objective.dimension() == 0 || config.max_steps == 0 {
        return Ok(StageOutcome::unchanged(start));
    }

    let gradient = objective.gradient(&start.point)?;
    let mut state = OptimizationState::new(start.point.clone(), start.evaluation.clone(), gradient, 0);

    while state.iteration < config.max_steps {
        if deadline.expired() {
            debug!(iteration = state.iteration, "Deadline reached during relaxation");
            break;
        }
        if state.gradient.amax() == 0.0 {
            state.converged = true;
            break;
        }

        let mut step = config.step_size;
        let mut accepted = None;
        for _ in 0..=config.max_halvings {
            let delta = state
                .gradient
                .map(|g| (-step * g).clamp(-config.max_step, config.max_step));
            let trial = Objective::wrap(&(&state.point + delta));
            let evaluation = objective.evaluate(&trial)?;
            if evaluation.total() < state.total() {
                accepted = Some((trial, evaluation));
                break;
            }
            step *= 0.5;
        }

        let Some((point, evaluation)) = accepted else {
            trace!(iteration = state.iteration, "No improving step at minimum size");
            state.converged = true;
            break;
        };

        let decrease = state.total() - evaluation.total();
        let gradient = objective.gradient(&point)?;
        state.advance(point, evaluation, gradient);
        trace!(iteration = state.iteration, energy = state.total(), decrease);

        if decrease < config.energy_tolerance {
            state.converged = true;
            break;
        }
    }

    debug!(
        iterations = state.iteration,
        energy = state.total(),
        converged = state.converged,
        "Relaxation finished"
    );
    let budget_exhausted = !state.converged && state.iteration >= config.max_steps;
    Ok(StageOutcome {
        best: StagePoint {
            point: state.point,
            evaluation: state.evaluation,
        },
        iterations: state.iteration,
        converged: state.converged,
        budget_exhausted,
        trace: state.trace,
    })
}
