use super::torsion::TorsionKind;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum InputError {
    #[error("Sequence is empty, at least one residue is required")]
    EmptySequence,
    #[error("Unrecognized residue token '{token}' at position {position}")]
    UnknownResidue { position: usize, token: String },
    #[error("Length mismatch for {field}: expected {expected}, found {found}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Angle {field} of residue {residue} is {value}, which is outside (-pi, pi]")]
    AngleOutOfRange {
        residue: usize,
        field: TorsionKind,
        value: f64,
    },
    #[error("Residue {residue} defines {field} but has no neighbouring residue to define it")]
    UnexpectedTerminalAngle { residue: usize, field: TorsionKind },
    #[error("Residue {residue} has no value for the free variable {field}")]
    MissingAngle { residue: usize, field: TorsionKind },
    #[error("Invalid reference structure: {0}")]
    InvalidReference(String),
}
