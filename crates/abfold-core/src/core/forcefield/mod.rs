//! # Force Field Module
//!
//! Potential energy of a protein backbone as a function of its dihedral angles.
//!
//! ## Overview
//!
//! The energy is decomposed into seven weighted terms, reported individually in
//! [`term::EnergyTerm`]:
//!
//! - **Bond and angle** harmonic penalties against the ideal backbone geometry. Coordinates
//!   produced by the builder satisfy these exactly, so the terms act as a consistency check.
//! - **Backbone-conformational** penalty from class-weighted Ramachandran basins
//!   ([`ramachandran`]), with an analytic gradient.
//! - **Van der Waals** (soft-core Lennard-Jones 12-6) and **electrostatics** (Coulomb with a
//!   distance-dependent dielectric), both smoothly switched off at the cutoff.
//! - **Hydrogen bonds** between amide N-H donors and carbonyl O acceptors.
//! - **Solvation** from a smooth Cα neighbour count and residue hydrophobicity.
//!
//! Every pairwise potential is softened at zero separation, so any finite geometry has
//! a finite energy. A non-finite component is reported as an error rather than replaced.
//!
//! ## Key Components
//!
//! - [`params`] - The immutable [`params::Forcefield`] parameter set, loadable from TOML
//! - [`scoring`] - [`scoring::Scorer`], the entry point for energy evaluation
//! - [`gradient`] - Finite-difference and analytic gradients in angle space
//! - [`term`] - Energy term aggregation and reporting

pub(crate) mod energy;
pub mod gradient;
pub mod params;
pub(crate) mod potentials;
pub mod ramachandran;
pub mod scoring;
pub mod term;
