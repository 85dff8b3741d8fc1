//! # abfold Core Library
//!
//! Ab initio prediction of protein backbone structure from sequence alone: candidate
//! backbones are generated in dihedral-angle space, refined by a staged optimizer cascade
//! against a physics-inspired energy, and the lowest-energy structure is returned.
//!
//! ## Architectural Philosophy
//!
//! The library keeps the same three-layer split throughout:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Sequence`, `DihedralSet`,
//!   `Conformation`), the dihedral-to-coordinate builder, forcefield parameters, potentials
//!   and the scorer, fragment libraries, and structural similarity.
//!
//! - **[`engine`]: The Logic Core.** Candidate samplers, the angle-space objective, the
//!   optimizer stages (relaxation, L-BFGS, stochastic escape, constraint polish), and the
//!   per-candidate cascade that chains them.
//!
//! - **[`workflows`]: The Public API.** [`workflows::predict::run`] ties sampling,
//!   refinement and optional comparison against a reference into one call.

pub mod core;
pub mod engine;
pub mod workflows;
