pub mod conformation;
pub mod error;
pub mod residue;
pub mod sequence;
pub mod torsion;
