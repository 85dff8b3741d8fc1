use thiserror::Error;

use super::config::ConfigError;
use super::utils::sampling::SamplingError;
use crate::core::forcefield::params::ParamLoadError;
use crate::core::forcefield::scoring::ScoringError;
use crate::core::models::error::InputError;
use crate::core::structure::similarity::SimilarityError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid input: {source}")]
    Input {
        #[from]
        source: InputError,
    },

    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Failed to load forcefield parameters: {source}")]
    Parameters {
        #[from]
        source: ParamLoadError,
    },

    #[error("Energy scoring failed: {source}")]
    Scoring {
        #[from]
        source: ScoringError,
    },

    #[error("Numerical instability in {stage}: {detail}")]
    NumericalInstability { stage: &'static str, detail: String },

    #[error("Candidate sampling failed: {source}")]
    Sampling {
        #[from]
        source: SamplingError,
    },

    #[error("Structure comparison failed: {source}")]
    Similarity {
        #[from]
        source: SimilarityError,
    },

    #[error("Optimization phase '{phase}' failed: {reason}")]
    PhaseFailed { phase: &'static str, reason: String },

    #[error("Internal logic error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Errors confined to one candidate; the run continues without it.
    pub fn is_candidate_local(&self) -> bool {
        matches!(self, EngineError::NumericalInstability { .. })
    }
}
