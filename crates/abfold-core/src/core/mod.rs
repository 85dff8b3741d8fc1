//! # Core Module
//!
//! Data structures and pure computations that the optimization engine is built on.
//! Nothing in here holds mutable state between calls.
//!
//! - **Chain Representation** ([`models`]) - Residues, sequences, dihedral sets and built conformations
//! - **Coordinate Construction** ([`builder`]) - Backbone atoms from dihedral angles
//! - **Energy Calculations** ([`forcefield`]) - Parameters, potentials, scoring and gradients
//! - **Fragment Libraries** ([`fragments`]) - Local-structure fragments and their acquisition
//! - **Structure Comparison** ([`structure`]) - Superposition, RMSD and TM-score
//! - **Geometry** ([`utils`]) - Angle arithmetic and small vector helpers

pub mod builder;
pub mod forcefield;
pub mod fragments;
pub mod models;
pub mod structure;
pub mod utils;
