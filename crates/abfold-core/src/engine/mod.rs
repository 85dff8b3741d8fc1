//! # Engine Module
//!
//! Stateful orchestration of a prediction run: candidates are drawn from the samplers,
//! scored through the angle-space [`objective::Objective`], and refined stage by stage by
//! the [`cascade`].
//!
//! - **Configuration** ([`config`]) - Sampler budgets, optimizer settings, seed and deadlines
//! - **State Tracking** ([`state`]) - Candidates, the candidate pool, stage reports and diagnostics
//! - **Candidate Generation** ([`samplers`]) - Uniform, stochastic, fragment and basin samplers
//! - **Refinement** ([`tasks`], [`cascade`]) - Relaxation, L-BFGS, escape and polish stages
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//! - **Error Handling** ([`error`]) - Engine-level error type

pub mod cascade;
pub mod config;
pub mod context;
pub mod error;
pub mod objective;
pub mod progress;
pub mod samplers;
pub mod state;
pub mod tasks;
pub(crate) mod utils;
