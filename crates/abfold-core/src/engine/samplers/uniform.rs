use super::{Sampler, SamplingContext};
use crate::engine::config::SamplerKind;
use crate::engine::error::EngineError;
use crate::core::models::torsion::DihedralSet;
use rand::rngs::StdRng;
use std::f64::consts::{PI, TAU};

/// Plastic number, the two-dimensional generalization of the golden ratio.
const PLASTIC: f64 = 1.324_717_957_244_746;

#[inline]
fn fract(x: f64) -> f64 {
    x - x.floor()
}

/// Additive recurrence with per-axis increments `1/g` and `1/g²`; every residue gets its
/// own irrational start so that residues do not move in lockstep.
///
/// Candidate `k` depends only on `k`, so the first `n` candidates of a larger request are
/// exactly the `n`-candidate result.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformSampler;

impl UniformSampler {
    pub fn new() -> Self {
        Self
    }

    fn point(index: usize, residue: usize) -> (f64, f64) {
        let a1 = 1.0 / PLASTIC;
        let a2 = 1.0 / (PLASTIC * PLASTIC);
        let r = residue as f64 + 1.0;
        let offset_phi = fract(r * std::f64::consts::SQRT_2);
        let offset_psi = fract(r * 3f64.sqrt());
        let n = index as f64 + 1.0;
        (
            PI - TAU * fract(offset_phi + n * a1),
            PI - TAU * fract(offset_psi + n * a2),
        )
    }
}

impl Sampler for UniformSampler {
    fn kind(&self) -> SamplerKind {
        SamplerKind::Uniform
    }

    fn generate(
        &self,
        context: &SamplingContext,
        index: usize,
        _rng: &mut StdRng,
    ) -> Result<DihedralSet, EngineError> {
        let pairs: Vec<(f64, f64)> = (0..context.sequence.len())
            .map(|residue| Self::point(index, residue))
            .collect();
        Ok(DihedralSet::from_phi_psi(&pairs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::params::Forcefield;
    use crate::core::models::error::InputError;
    use crate::core::models::sequence::Sequence;
    use crate::engine::samplers::coverage_density;

    #[test]
    fn produces_valid_sets_of_requested_size() {
        let sequence = Sequence::parse("MKTAYIAKQR").unwrap();
        let ff = Forcefield::default();
        let ctx = SamplingContext::new(&sequence, &ff);
        let sets = UniformSampler::new().sample(&ctx, 12, 3).unwrap();
        assert_eq!(sets.len(), 12);
        for set in &sets {
            set.validate(sequence.len()).unwrap();
        }
        assert!(UniformSampler::new().sample(&ctx, 0, 3).unwrap().is_empty());
    }

    #[test]
    fn smaller_requests_are_prefixes() {
        let sequence = Sequence::parse("ACDEFG").unwrap();
        let ff = Forcefield::default();
        let ctx = SamplingContext::new(&sequence, &ff);
        let sampler = UniformSampler::new();
        let small = sampler.sample(&ctx, 7, 11).unwrap();
        let large = sampler.sample(&ctx, 30, 99).unwrap();
        assert_eq!(small[..], large[..7]);
    }

    #[test]
    fn coverage_never_decreases_with_count() {
        let sequence = Sequence::parse("AVLKGSEAT").unwrap();
        let ff = Forcefield::default();
        let ctx = SamplingContext::new(&sequence, &ff);
        let sampler = UniformSampler::new();

        let mut previous = 0.0;
        for count in [1, 2, 5, 10, 20, 40, 80] {
            let coverage = coverage_density(&sampler.sample(&ctx, count, 0).unwrap(), 12);
            assert!(coverage >= previous, "{count}: {coverage} < {previous}");
            previous = coverage;
        }
        assert!(previous > 0.5);
    }

    #[test]
    fn residues_are_not_in_lockstep() {
        let sequence = Sequence::parse("AAAA").unwrap();
        let ff = Forcefield::default();
        let ctx = SamplingContext::new(&sequence, &ff);
        let set = &UniformSampler::new().sample(&ctx, 1, 0).unwrap()[0];
        let (_, first) = set.phi_psi_pairs().next().unwrap();
        assert!(set.phi_psi_pairs().skip(1).all(|(_, pair)| pair != first));
    }

    #[test]
    fn empty_sequence_is_rejected() {
        let sequence = Sequence::new(Vec::new());
        let ff = Forcefield::default();
        let ctx = SamplingContext::new(&sequence, &ff);
        let result = UniformSampler::new().sample(&ctx, 3, 0);
        assert!(matches!(
            result,
            Err(EngineError::Input {
                source: InputError::EmptySequence
            })
        ));
    }
}
