use super::{Sampler, SamplingContext};
use crate::core::forcefield::params::{Basin, Forcefield};
use crate::core::models::residue::ResidueType;
use crate::core::models::torsion::DihedralSet;
use crate::engine::config::{BasinSamplingConfig, SamplerKind};
use crate::engine::error::EngineError;
use crate::engine::utils::sampling::SamplingError;
use rand::distributions::WeightedIndex;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Draws each residue from one of the named Ramachandran basins. A residue continues the
/// previous residue's basin with probability `persistence`, which produces runs of
/// helix- or strand-like residues.
#[derive(Debug, Clone, Copy)]
pub struct BasinSampler {
    config: BasinSamplingConfig,
}

impl BasinSampler {
    pub fn new(config: BasinSamplingConfig) -> Self {
        Self { config }
    }

    fn choose_basin(
        &self,
        forcefield: &Forcefield,
        residue: ResidueType,
        previous: Option<usize>,
        rng: &mut StdRng,
    ) -> Result<usize, EngineError> {
        let weights = &forcefield.classes.get(residue.backbone_class()).weights;
        if let Some(previous) = previous {
            let usable = weights.get(forcefield.basins[previous].kind) > 0.0;
            if usable && rng.r#gen::<f64>() < self.config.persistence {
                return Ok(previous);
            }
        }
        let preference: Vec<f64> = forcefield.basins.iter().map(|b| weights.get(b.kind)).collect();
        let dist = WeightedIndex::new(&preference).map_err(SamplingError::from)?;
        Ok(dist.sample(rng))
    }

    fn perturb(&self, basin: &Basin, width_scale: f64, rng: &mut StdRng) -> Result<(f64, f64), EngineError> {
        let spread = |sigma: f64| {
            Normal::new(0.0, (sigma * width_scale * self.config.width_factor).to_radians())
                .map_err(|e| EngineError::Internal(format!("basin perturbation distribution: {e}")))
        };
        let phi = basin.phi.to_radians() + spread(basin.sigma_phi)?.sample(rng);
        let psi = basin.psi.to_radians() + spread(basin.sigma_psi)?.sample(rng);
        Ok((phi, psi))
    }
}

impl Sampler for BasinSampler {
    fn kind(&self) -> SamplerKind {
        SamplerKind::Basin
    }

    fn generate(
        &self,
        context: &SamplingContext,
        _index: usize,
        rng: &mut StdRng,
    ) -> Result<DihedralSet, EngineError> {
        let forcefield = context.forcefield;
        let mut previous = None;
        let mut pairs = Vec::with_capacity(context.sequence.len());
        for residue in context.sequence.iter() {
            let chosen = self.choose_basin(forcefield, residue, previous, rng)?;
            let width_scale = forcefield.classes.get(residue.backbone_class()).width_scale;
            pairs.push(self.perturb(&forcefield.basins[chosen], width_scale, rng)?);
            previous = Some(chosen);
        }
        Ok(DihedralSet::from_phi_psi(&pairs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::params::BasinKind;
    use crate::core::forcefield::ramachandran::nearest_basin;
    use crate::core::models::sequence::Sequence;

    fn residue_basins(set: &DihedralSet, sequence: &Sequence, ff: &Forcefield) -> Vec<Option<BasinKind>> {
        set.phi_psi_pairs()
            .map(|(i, (phi, psi))| {
                let residue = sequence.get(i).unwrap();
                nearest_basin(phi, psi, residue.backbone_class(), ff)
            })
            .collect()
    }

    #[test]
    fn samples_are_valid_and_reproducible() {
        let sequence = Sequence::parse("MKTAYIAKQRQISFVKSHFS").unwrap();
        let ff = Forcefield::default();
        let ctx = SamplingContext::new(&sequence, &ff);
        let sampler = BasinSampler::new(BasinSamplingConfig::default());

        let a = sampler.sample(&ctx, 8, 3).unwrap();
        let b = sampler.sample(&ctx, 8, 3).unwrap();
        assert_eq!(a, b);
        for set in &a {
            set.validate(20).unwrap();
        }
        assert_ne!(a[0], a[1]);
    }

    #[test]
    fn zero_weight_basins_are_never_chosen() {
        let mut ff = Forcefield::default();
        ff.classes.general.weights.alpha_left = 0.0;
        ff.classes.general.weights.beta = 0.0;
        ff.classes.general.weights.polyproline_ii = 0.0;
        let sequence = Sequence::parse("AVLKMEAA").unwrap();
        let ctx = SamplingContext::new(&sequence, &ff);
        let sampler = BasinSampler::new(BasinSamplingConfig {
            persistence: 0.0,
            width_factor: 0.1,
        });

        for set in sampler.sample(&ctx, 5, 9).unwrap() {
            for basin in residue_basins(&set, &sequence, &ff) {
                assert_eq!(basin, Some(BasinKind::AlphaRight));
            }
        }
    }

    #[test]
    fn high_persistence_produces_long_runs() {
        let sequence = Sequence::new(vec![ResidueType::Alanine; 30]);
        let ff = Forcefield::default();
        let ctx = SamplingContext::new(&sequence, &ff);
        let sticky = BasinSampler::new(BasinSamplingConfig {
            persistence: 0.95,
            width_factor: 0.05,
        });
        let loose = BasinSampler::new(BasinSamplingConfig {
            persistence: 0.0,
            width_factor: 0.05,
        });

        let switches = |sampler: &BasinSampler| -> usize {
            sampler
                .sample(&ctx, 20, 17)
                .unwrap()
                .iter()
                .map(|set| {
                    residue_basins(set, &sequence, &ff)
                        .windows(2)
                        .filter(|w| w[0] != w[1])
                        .count()
                })
                .sum()
        };
        assert!(switches(&sticky) < switches(&loose));
    }
}
