//! # Samplers Module
//!
//! Generators of initial backbone dihedral sets for the candidate pool.
//!
//! ## Submodules
//!
//! - **Uniform** (`uniform`) - Low-discrepancy coverage of the (phi, psi) torus
//! - **Stochastic** (`stochastic`) - Metropolis walks from the extended chain
//! - **Fragment** (`fragment`) - Stitching of sequence-matched library fragments
//! - **Basin** (`basin`) - Class-weighted draws around the named Ramachandran basins
//!
//! Every candidate owns an RNG seeded from the run seed, the sampler's stream and the
//! candidate index, so a pool can be generated in parallel and still be reproducible.

pub mod basin;
pub mod fragment;
pub mod stochastic;
pub mod uniform;

use super::config::SamplerKind;
use super::error::EngineError;
use super::utils::sampling::derive_seed;
use crate::core::forcefield::params::Forcefield;
use crate::core::models::sequence::Sequence;
use crate::core::models::torsion::DihedralSet;
use itertools::Itertools;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::f64::consts::{PI, TAU};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

pub use basin::BasinSampler;
pub use fragment::FragmentSampler;
pub use stochastic::StochasticSampler;
pub use uniform::UniformSampler;

/// Read-only inputs shared by every sampler.
#[derive(Debug, Clone, Copy)]
pub struct SamplingContext<'a> {
    pub sequence: &'a Sequence,
    pub forcefield: &'a Forcefield,
}

impl<'a> SamplingContext<'a> {
    pub fn new(sequence: &'a Sequence, forcefield: &'a Forcefield) -> Self {
        Self {
            sequence,
            forcefield,
        }
    }
}

pub trait Sampler: Sync {
    fn kind(&self) -> SamplerKind;

    /// Produces the candidate with the given index from its own generator.
    fn generate(
        &self,
        context: &SamplingContext,
        index: usize,
        rng: &mut StdRng,
    ) -> Result<DihedralSet, EngineError>;

    /// Exactly `count` candidates, index order preserved.
    fn sample(
        &self,
        context: &SamplingContext,
        count: usize,
        seed: u64,
    ) -> Result<Vec<DihedralSet>, EngineError> {
        context.sequence.ensure_non_empty()?;
        let stream = self.kind().stream();

        #[cfg(not(feature = "parallel"))]
        let iterator = 0..count;

        #[cfg(feature = "parallel")]
        let iterator = (0..count).into_par_iter();

        iterator
            .map(|index| {
                let mut rng = StdRng::seed_from_u64(derive_seed(seed, stream, index as u64));
                self.generate(context, index, &mut rng)
            })
            .collect()
    }
}

fn cell(angle: f64, bins: usize) -> usize {
    let unit = (angle + PI) / TAU;
    ((unit * bins as f64).floor() as usize).min(bins - 1)
}

/// Fraction of cells of a `bins x bins` (phi, psi) grid occupied by at least one
/// interior residue of any of the sets.
pub fn coverage_density(sets: &[DihedralSet], bins: usize) -> f64 {
    if bins == 0 {
        return 0.0;
    }
    let occupied = sets
        .iter()
        .flat_map(|set| set.phi_psi_pairs())
        .map(|(_, (phi, psi))| (cell(phi, bins), cell(psi, bins)))
        .unique()
        .count();
    occupied as f64 / (bins * bins) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coverage_counts_distinct_interior_cells() {
        let a = DihedralSet::uniform(4, -1.0, -0.7);
        let b = DihedralSet::uniform(4, 1.0, 0.8);
        assert_eq!(coverage_density(&[a.clone()], 4), 1.0 / 16.0);
        assert_eq!(coverage_density(&[a.clone(), a.clone()], 4), 1.0 / 16.0);
        assert_eq!(coverage_density(&[a, b], 4), 2.0 / 16.0);
    }

    #[test]
    fn coverage_of_nothing_is_zero() {
        assert_eq!(coverage_density(&[], 10), 0.0);
        assert_eq!(coverage_density(&[DihedralSet::extended(2)], 10), 0.0);
        assert_eq!(coverage_density(&[DihedralSet::extended(5)], 0), 0.0);
    }

    #[test]
    fn angle_pi_falls_in_the_last_cell() {
        assert_eq!(cell(PI, 8), 7);
        assert_eq!(cell(-PI + 1e-12, 8), 0);
    }
}
