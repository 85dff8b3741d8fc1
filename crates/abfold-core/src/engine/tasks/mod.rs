//! Optimizer stages of the refinement cascade.
//!
//! Each stage starts from a [`StagePoint`] and returns the best point it found as a
//! [`StageOutcome`]. Stages work purely in angle space through an
//! [`Objective`](crate::engine::objective::Objective) and check the run deadline inside
//! their loops.

pub mod escape;
pub mod lbfgs;
pub mod line_search;
pub mod polish;
pub mod relaxation;

use crate::engine::objective::{Evaluation, Objective};
use crate::engine::error::EngineError;
use nalgebra::DVector;

/// A variable vector together with its evaluation.
#[derive(Debug, Clone)]
pub struct StagePoint {
    pub point: DVector<f64>,
    pub evaluation: Evaluation,
}

impl StagePoint {
    pub fn evaluate(objective: &Objective, point: DVector<f64>) -> Result<Self, EngineError> {
        let evaluation = objective.evaluate(&point)?;
        Ok(Self { point, evaluation })
    }

    #[inline]
    pub fn total(&self) -> f64 {
        self.evaluation.total()
    }
}

#[derive(Debug, Clone)]
pub struct StageOutcome {
    pub best: StagePoint,
    pub iterations: usize,
    pub converged: bool,
    /// The iteration budget ran out before the stage's own stopping criterion held.
    pub budget_exhausted: bool,
    pub trace: Vec<f64>,
}

impl StageOutcome {
    /// Outcome of a stage that did no work.
    pub fn unchanged(start: &StagePoint) -> Self {
        Self {
            best: start.clone(),
            iterations: 0,
            converged: true,
            budget_exhausted: false,
            trace: vec![start.total()],
        }
    }
}
