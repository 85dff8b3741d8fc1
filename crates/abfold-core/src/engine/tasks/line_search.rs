use super::StagePoint;
use crate::engine::config::LineSearchConfig;
use crate::engine::error::EngineError;
use crate::engine::objective::Objective;
use nalgebra::DVector;
use tracing::trace;

#[derive(Debug, Clone)]
pub struct LineSearchResult {
    pub alpha: f64,
    pub point: StagePoint,
    pub gradient: DVector<f64>,
    pub evaluations: usize,
}

#[derive(Debug, Clone)]
struct Trial {
    alpha: f64,
    point: StagePoint,
    gradient: DVector<f64>,
    value: f64,
    slope: f64,
}

struct LineFunction<'a, 'o> {
    objective: &'a Objective<'o>,
    origin: &'a DVector<f64>,
    direction: &'a DVector<f64>,
    evaluations: usize,
}

impl LineFunction<'_, '_> {
    fn probe(&mut self, alpha: f64) -> Result<Trial, EngineError> {
        self.evaluations += 1;
        let point = Objective::wrap(&(self.origin + self.direction * alpha));
        let point = StagePoint::evaluate(self.objective, point)?;
        let gradient = self.objective.gradient(&point.point)?;
        let slope = gradient.dot(self.direction);
        trace!(alpha, value = point.total(), slope, "Line search probe");
        Ok(Trial {
            alpha,
            value: point.total(),
            point,
            gradient,
            slope,
        })
    }
}

impl Trial {
    fn into_result(self, evaluations: usize) -> LineSearchResult {
        LineSearchResult {
            alpha: self.alpha,
            point: self.point,
            gradient: self.gradient,
            evaluations,
        }
    }
}

/// Bracketing and zoom search for a step satisfying the strong Wolfe conditions along
/// `direction`, which must be a descent direction at `start`. The step is limited so that
/// no angle moves by more than `max_step`.
///
/// Returns `None` when no step lowering the energy was found within the evaluation
/// budget. When the budget runs out after a sufficient-decrease step was seen, that step
/// is returned even if the curvature condition does not hold.
pub fn strong_wolfe(
    objective: &Objective,
    start: &StagePoint,
    gradient: &DVector<f64>,
    direction: &DVector<f64>,
    config: &LineSearchConfig,
) -> Result<Option<LineSearchResult>, EngineError> {
    let value0 = start.total();
    let slope0 = gradient.dot(direction);
    let largest = direction.amax();
    if !(slope0 < 0.0) || largest == 0.0 {
        return Ok(None);
    }

    let alpha_max = config.max_step / largest;
    let sufficient = |alpha: f64, value: f64| value <= value0 + config.c1 * alpha * slope0;
    let curvature = |slope: f64| slope.abs() <= -config.c2 * slope0;

    let mut line = LineFunction {
        objective,
        origin: &start.point,
        direction,
        evaluations: 0,
    };

    let mut previous: Option<Trial> = None;
    let mut alpha = config.initial_step.min(alpha_max);

    while line.evaluations < config.max_evaluations {
        let trial = line.probe(alpha)?;
        let previous_value = previous.as_ref().map_or(value0, |p| p.value);

        if !sufficient(trial.alpha, trial.value) || (previous.is_some() && trial.value >= previous_value) {
            return zoom(&mut line, previous, trial, value0, slope0, config);
        }
        if curvature(trial.slope) {
            return Ok(Some(trial.into_result(line.evaluations)));
        }
        if trial.slope >= 0.0 {
            let low = trial;
            return zoom_from(&mut line, low, previous, value0, slope0, config);
        }
        if alpha >= alpha_max {
            return Ok(Some(trial.into_result(line.evaluations)));
        }
        alpha = (2.0 * alpha).min(alpha_max);
        previous = Some(trial);
    }

    Ok(previous.map(|p| p.into_result(line.evaluations)))
}

/// Zoom with `low` the last acceptable trial (or the origin when `None`) and `high` the
/// trial that overshot.
fn zoom(
    line: &mut LineFunction,
    low: Option<Trial>,
    high: Trial,
    value0: f64,
    slope0: f64,
    config: &LineSearchConfig,
) -> Result<Option<LineSearchResult>, EngineError> {
    let high_alpha = high.alpha;
    refine(line, low, high_alpha, value0, slope0, config)
}

/// Zoom when `low` already satisfies sufficient decrease but the slope turned
/// non-negative; the interval runs back towards the previous trial (or the origin).
fn zoom_from(
    line: &mut LineFunction,
    low: Trial,
    previous: Option<Trial>,
    value0: f64,
    slope0: f64,
    config: &LineSearchConfig,
) -> Result<Option<LineSearchResult>, EngineError> {
    let high_alpha = previous.map_or(0.0, |p| p.alpha);
    refine(line, Some(low), high_alpha, value0, slope0, config)
}

fn refine(
    line: &mut LineFunction,
    mut low: Option<Trial>,
    mut high_alpha: f64,
    value0: f64,
    slope0: f64,
    config: &LineSearchConfig,
) -> Result<Option<LineSearchResult>, EngineError> {
    while line.evaluations < config.max_evaluations {
        let (low_alpha, low_value) = low.as_ref().map_or((0.0, value0), |t| (t.alpha, t.value));
        let alpha = 0.5 * (low_alpha + high_alpha);
        if (alpha - low_alpha).abs() < 1e-12 {
            break;
        }

        let trial = line.probe(alpha)?;
        if trial.value > value0 + config.c1 * trial.alpha * slope0 || trial.value >= low_value {
            high_alpha = trial.alpha;
            continue;
        }
        if trial.slope.abs() <= -config.c2 * slope0 {
            return Ok(Some(trial.into_result(line.evaluations)));
        }
        if trial.slope * (high_alpha - low_alpha) >= 0.0 {
            high_alpha = low_alpha;
        }
        low = Some(trial);
    }

    Ok(low.map(|t| t.into_result(line.evaluations)))
}
