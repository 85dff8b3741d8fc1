use rand::{distributions::WeightedIndex, prelude::*};
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error)]
pub enum SamplingError {
    #[error("Input energies list is empty, cannot perform sampling")]
    EmptyEnergies,
    #[error(
        "All energies are too high or beta is zero, resulting in zero total weight for sampling"
    )]
    ZeroTotalWeight,
    #[error("Invalid beta value: {0}. Beta must be positive for Boltzmann sampling")]
    InvalidBeta(f64),
    #[error("Failed to create weighted distribution: {source}")]
    DistributionError {
        #[from]
        source: rand::distributions::WeightedError,
    },
}

/// Draws an index with probability proportional to `exp(-beta * (E_i - E_min))`.
#[instrument(level = "trace", skip_all, fields(beta))]
pub fn boltzmann_sample(
    energies: &[f64],
    beta: f64,
    rng: &mut impl Rng,
) -> Result<usize, SamplingError> {
    if energies.is_empty() {
        return Err(SamplingError::EmptyEnergies);
    }
    if !(beta > 0.0 && beta.is_finite()) {
        return Err(SamplingError::InvalidBeta(beta));
    }

    let min_energy = energies
        .iter()
        .copied()
        .filter(|e| e.is_finite())
        .min_by(f64::total_cmp)
        .ok_or(SamplingError::ZeroTotalWeight)?;

    let weights: Vec<f64> = energies
        .iter()
        .map(|&e| {
            if e.is_finite() {
                (-(e - min_energy) * beta).exp()
            } else {
                0.0
            }
        })
        .collect();

    let dist = WeightedIndex::new(&weights)?;
    Ok(dist.sample(rng))
}

/// Metropolis criterion: downhill moves always pass, uphill moves pass with
/// probability `exp(-delta / temperature)`.
#[inline]
pub fn metropolis_accept(delta: f64, temperature: f64, rng: &mut impl Rng) -> bool {
    if delta <= 0.0 {
        return true;
    }
    if !(temperature > 0.0) || !delta.is_finite() {
        return false;
    }
    rng.r#gen::<f64>() < (-delta / temperature).exp()
}

/// Independent 64-bit seed for `(stream, index)` under a run seed, via SplitMix64
/// finalization so that neighbouring indices give uncorrelated generators.
pub fn derive_seed(seed: u64, stream: u64, index: u64) -> u64 {
    let mut z = seed
        ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ index.wrapping_mul(0xD1B5_4A32_D192_ED03);
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;

    #[test]
    fn boltzmann_sample_rejects_invalid_input() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            boltzmann_sample(&[], 1.0, &mut rng),
            Err(SamplingError::EmptyEnergies)
        ));
        assert!(matches!(
            boltzmann_sample(&[1.0], 0.0, &mut rng),
            Err(SamplingError::InvalidBeta(_))
        ));
        assert!(matches!(
            boltzmann_sample(&[f64::NAN, f64::INFINITY], 1.0, &mut rng),
            Err(SamplingError::ZeroTotalWeight)
        ));
    }

    #[test]
    fn boltzmann_sample_prefers_low_energies() {
        let mut rng = StdRng::seed_from_u64(2);
        let energies = [0.0, 5.0, 10.0];
        let mut counts = [0usize; 3];
        for _ in 0..2000 {
            counts[boltzmann_sample(&energies, 1.0, &mut rng).unwrap()] += 1;
        }
        assert!(counts[0] > counts[1]);
        assert!(counts[1] >= counts[2]);
        assert!(counts[0] > 1900);
    }

    #[test]
    fn boltzmann_sample_skips_non_finite_entries() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            assert_eq!(boltzmann_sample(&[f64::NAN, 1.0], 1.0, &mut rng).unwrap(), 1);
        }
    }

    #[test]
    fn metropolis_accepts_downhill_and_rejects_at_zero_temperature() {
        let mut rng = StdRng::seed_from_u64(4);
        assert!(metropolis_accept(-1.0, 0.0, &mut rng));
        assert!(!metropolis_accept(1.0, 0.0, &mut rng));
        assert!(!metropolis_accept(f64::NAN, 1.0, &mut rng));
        let accepted = (0..2000)
            .filter(|_| metropolis_accept(1.0, 1.0, &mut rng))
            .count();
        // exp(-1) ≈ 0.37
        assert!((600..900).contains(&accepted), "accepted {accepted}");
    }

    #[test]
    fn derive_seed_separates_streams_and_indices() {
        let a = derive_seed(42, 1, 0);
        assert_eq!(a, derive_seed(42, 1, 0));
        assert_ne!(a, derive_seed(42, 1, 1));
        assert_ne!(a, derive_seed(42, 2, 0));
        assert_ne!(a, derive_seed(43, 1, 0));
    }
}
