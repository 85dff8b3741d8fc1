//! Helpers shared by the samplers and optimizer stages: Boltzmann selection,
//! Metropolis acceptance, and per-candidate seed derivation.

pub mod sampling;
