use super::line_search::strong_wolfe;
use super::{StageOutcome, StagePoint};
use crate::core::utils::geometry::angular_difference;
use crate::engine::config::LbfgsConfig;
use crate::engine::context::Deadline;
use crate::engine::error::EngineError;
use crate::engine::objective::Objective;
use crate::engine::state::{CurvaturePair, OptimizationState};
use nalgebra::DVector;
use std::collections::VecDeque;
use tracing::{debug, instrument, trace};

/// Two-loop recursion: approximates `-H⁻¹ g` from the stored curvature pairs, oldest
/// first in `history`. With no history the result is steepest descent.
pub fn two_loop_direction(history: &VecDeque<CurvaturePair>, gradient: &DVector<f64>) -> DVector<f64> {
    let mut q = gradient.clone();
    let mut alphas = Vec::with_capacity(history.len());
    for pair in history.iter().rev() {
        let alpha = pair.rho * pair.s.dot(&q);
        q.axpy(-alpha, &pair.y, 1.0);
        alphas.push(alpha);
    }

    let gamma = history.back().map_or(1.0, |pair| {
        let yy = pair.y.dot(&pair.y);
        if yy > 0.0 { pair.s.dot(&pair.y) / yy } else { 1.0 }
    });
    let mut r = q * gamma;

    for (pair, alpha) in history.iter().zip(alphas.iter().rev()) {
        let beta = pair.rho * pair.y.dot(&r);
        r.axpy(alpha - beta, &pair.s, 1.0);
    }
    -r
}

/// Circular displacement between two angle vectors.
fn displacement(to: &DVector<f64>, from: &DVector<f64>) -> DVector<f64> {
    to.zip_map(from, angular_difference)
}

/// Limited-memory BFGS in angle space with a strong-Wolfe line search. The history is
/// cleared and the step falls back to steepest descent whenever the quasi-Newton
/// direction fails to descend or its line search finds no acceptable step.
#[instrument(skip_all, name = "lbfgs_task", fields(variables = objective.dimension()))]
pub fn run(
    objective: &Objective,
    start: &StagePoint,
    config: &LbfgsConfig,
    deadline: &Deadline,
) -> Result<StageOutcome, EngineError> {
    if objective.dimension() == 0 || config.max_iterations == 0 {
        return Ok(StageOutcome::unchanged(start));
    }

    let gradient = objective.gradient(&start.point)?;
    let mut state = OptimizationState::new(
        start.point.clone(),
        start.evaluation.clone(),
        gradient,
        config.history_size,
    );

    while state.iteration < config.max_iterations {
        if state.gradient.amax() < config.gradient_tolerance {
            state.converged = true;
            break;
        }
        if deadline.expired() {
            debug!(iteration = state.iteration, "Deadline reached during L-BFGS");
            break;
        }

        let current = StagePoint {
            point: state.point.clone(),
            evaluation: state.evaluation.clone(),
        };

        let mut direction = two_loop_direction(state.history(), &state.gradient);
        if !(direction.dot(&state.gradient) < 0.0) {
            trace!(iteration = state.iteration, "Not a descent direction, resetting history");
            state.clear_history();
            direction = -&state.gradient;
        }

        let mut step = strong_wolfe(objective, &current, &state.gradient, &direction, &config.line_search)?;
        if step.is_none() && !state.history().is_empty() {
            trace!(iteration = state.iteration, "Line search failed, retrying along steepest descent");
            state.clear_history();
            direction = -&state.gradient;
            step = strong_wolfe(objective, &current, &state.gradient, &direction, &config.line_search)?;
        }
        let Some(step) = step else {
            debug!(iteration = state.iteration, "No acceptable step along steepest descent");
            break;
        };

        let s = displacement(&step.point.point, &state.point);
        let y = &step.gradient - &state.gradient;
        state.push_pair(s, y);
        state.advance(step.point.point, step.point.evaluation, step.gradient);
        trace!(
            iteration = state.iteration,
            energy = state.total(),
            alpha = step.alpha,
            evaluations = step.evaluations
        );
    }

    if !state.converged && state.gradient.amax() < config.gradient_tolerance {
        state.converged = true;
    }
    debug!(
        iterations = state.iteration,
        energy = state.total(),
        converged = state.converged,
        "L-BFGS finished"
    );
    let budget_exhausted = !state.converged && state.iteration >= config.max_iterations;
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
