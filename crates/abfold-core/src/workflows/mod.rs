//! # Workflows Module
//!
//! Top-level entry points that run a complete prediction from a sequence to a ranked,
//! refined backbone.
//!
//! ## Overview
//!
//! A workflow owns resource loading (forcefield parameters and the fragment library),
//! candidate generation, refinement of the most promising candidates, and assembly of
//! the final result. Progress is reported through a
//! [`ProgressReporter`](crate::engine::progress::ProgressReporter); non-fatal problems
//! are collected as [`Diagnostic`](crate::engine::state::Diagnostic)s and mark the
//! result as degraded instead of failing the run.
//!
//! ## Architecture
//!
//! - **Prediction Workflow** ([`predict`]) - Sampling, scoring, the per-candidate
//!   optimizer cascade, and optional comparison against a reference structure.

pub mod predict;
