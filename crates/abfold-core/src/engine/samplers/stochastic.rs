use super::{Sampler, SamplingContext};
use crate::core::builder::ConformationBuilder;
use crate::core::forcefield::scoring::{Scorer, ScoringError};
use crate::core::models::torsion::DihedralSet;
use crate::engine::config::{SamplerKind, StochasticWalkConfig};
use crate::engine::error::EngineError;
use crate::engine::utils::sampling::metropolis_accept;
use rand::Rng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use tracing::trace;

/// A state visited by a walk, with its total energy.
#[derive(Debug, Clone)]
pub struct WalkState {
    pub angles: DihedralSet,
    pub energy: f64,
}

/// Simulated-annealing walk in (phi, psi) space starting from the extended chain.
#[derive(Debug, Clone, Copy)]
pub struct StochasticSampler {
    config: StochasticWalkConfig,
}

impl StochasticSampler {
    pub fn new(config: StochasticWalkConfig) -> Self {
        Self { config }
    }

    /// Runs one walk and returns every accepted state, the starting chain first.
    /// Proposals whose energy is not finite are rejected.
    pub fn walk(&self, context: &SamplingContext, rng: &mut impl Rng) -> Result<Vec<WalkState>, EngineError> {
        context.sequence.ensure_non_empty()?;
        let builder = ConformationBuilder::new(&context.forcefield.geometry);
        let scorer = Scorer::new(context.forcefield);
        let energy_of = |angles: &DihedralSet| -> Result<Option<f64>, EngineError> {
            let conformation = builder.build(context.sequence, angles)?;
            match scorer.score(&conformation) {
                Ok(energy) => Ok(Some(energy.total())),
                Err(ScoringError::NonFinite { .. }) => Ok(None),
                Err(e) => Err(e.into()),
            }
        };

        let start = DihedralSet::extended(context.sequence.len());
        let Some(start_energy) = energy_of(&start)? else {
            return Err(EngineError::NumericalInstability {
                stage: "stochastic sampler",
                detail: "extended chain has a non-finite energy".to_string(),
            });
        };

        let movable: Vec<usize> = start
            .iter()
            .enumerate()
            .filter(|(_, t)| t.phi.is_some() || t.psi.is_some())
            .map(|(i, _)| i)
            .collect();
        let mut accepted = vec![WalkState {
            angles: start,
            energy: start_energy,
        }];
        if movable.is_empty() {
            return Ok(accepted);
        }

        let noise = Normal::new(0.0, self.config.step_size)
            .map_err(|e| EngineError::Internal(format!("walk move distribution: {e}")))?;
        let mut current = accepted[0].clone();
        let mut temperature = self.config.initial_temperature;

        for step in 0..self.config.steps {
            let residue = movable[rng.gen_range(0..movable.len())];
            let torsions = current.angles.torsions()[residue];
            let mut proposal = current.angles.clone();
            proposal.set_phi_psi(
                residue,
                torsions.phi.unwrap_or_default() + noise.sample(rng),
                torsions.psi.unwrap_or_default() + noise.sample(rng),
            );

            if let Some(energy) = energy_of(&proposal)? {
                if metropolis_accept(energy - current.energy, temperature, rng) {
                    trace!(step, residue, energy, temperature, "Walk move accepted");
                    current = WalkState {
                        angles: proposal,
                        energy,
                    };
                    accepted.push(current.clone());
                }
            }
            temperature *= self.config.cooling_rate;
        }
        Ok(accepted)
    }
}

impl Sampler for StochasticSampler {
    fn kind(&self) -> SamplerKind {
        SamplerKind::Stochastic
    }

    fn generate(
        &self,
        context: &SamplingContext,
        _index: usize,
        rng: &mut StdRng,
    ) -> Result<DihedralSet, EngineError> {
        let states = self.walk(context, rng)?;
        states
            .into_iter()
            .min_by(|a, b| a.energy.total_cmp(&b.energy))
            .map(|state| state.angles)
            .ok_or_else(|| EngineError::Internal("walk produced no states".to_string()))
    }
}
