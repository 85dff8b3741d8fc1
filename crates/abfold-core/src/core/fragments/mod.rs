//! Backbone fragment libraries: short windows of (φ, ψ) pairs observed for a local
//! sequence, used to seed candidates with native-like local structure.
//!
//! - [`library`] - Storage, CSV loading, and the built-in reduced library
//! - [`source`] - The [`source::FragmentSource`] capability and bounded-time acquisition

pub mod library;
pub mod source;
