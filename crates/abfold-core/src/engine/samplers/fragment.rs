use super::{Sampler, SamplingContext};
use crate::core::fragments::library::{Fragment, FragmentLibrary, window_similarity};
use crate::core::models::residue::ResidueType;
use crate::core::models::torsion::DihedralSet;
use crate::engine::config::{FragmentSamplingConfig, SamplerKind};
use crate::engine::error::EngineError;
use crate::engine::utils::sampling::boltzmann_sample;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use std::sync::Arc;
use tracing::trace;

/// Assembles chains from library fragments matched to the target sequence window by window.
#[derive(Debug, Clone)]
pub struct FragmentSampler {
    library: Arc<FragmentLibrary>,
    config: FragmentSamplingConfig,
}

struct Window<'l> {
    start: usize,
    choices: Vec<(f64, &'l Fragment)>,
}

impl FragmentSampler {
    pub fn new(library: Arc<FragmentLibrary>, config: FragmentSamplingConfig) -> Self {
        Self { library, config }
    }

    pub fn library(&self) -> &FragmentLibrary {
        &self.library
    }

    /// The configured window length when the library has it, otherwise the closest
    /// length it does have.
    fn library_length(&self) -> Option<usize> {
        let wanted = self.config.window_len;
        self.library
            .window_lengths()
            .min_by_key(|&len| (len.abs_diff(wanted), len))
    }

    fn window_starts(len: usize, width: usize, overlap: usize) -> Vec<usize> {
        let stride = width - overlap;
        let mut starts = Vec::new();
        let mut start = 0;
        loop {
            starts.push(start);
            if start + width >= len {
                break;
            }
            start = (start + stride).min(len - width);
        }
        starts
    }

    fn windows(&self, residues: &[ResidueType]) -> Result<(usize, Vec<Window<'_>>), EngineError> {
        let library_len = self
            .library_length()
            .ok_or_else(|| EngineError::Internal("fragment library is empty".to_string()))?;
        let width = library_len.min(residues.len());
        let overlap = self.config.overlap.min(width - 1);
        let fragments = self.library.fragments_of_len(library_len);

        let windows = Self::window_starts(residues.len(), width, overlap)
            .into_iter()
            .map(|start| {
                let target = &residues[start..start + width];
                let mut choices: Vec<(f64, &Fragment)> = fragments
                    .iter()
                    .map(|f| (window_similarity(target, &f.window[..width]), f))
                    .collect();
                choices.sort_by(|a, b| b.0.total_cmp(&a.0));
                choices.truncate(self.config.top_n);
                Window { start, choices }
            })
            .collect();
        Ok((width, windows))
    }
}

/// Mean of `1 - cos(Δ)` over the already placed positions a fragment would overlap,
/// in [0, 2]; zero when nothing overlaps.
fn incompatibility(placed: &[Option<(f64, f64)>], start: usize, angles: &[(f64, f64)]) -> f64 {
    let (sum, n) = angles
        .iter()
        .enumerate()
        .filter_map(|(j, &(phi, psi))| {
            placed[start + j].map(|(p, q)| ((1.0 - (phi - p).cos()) + (1.0 - (psi - q).cos())) / 2.0)
        })
        .fold((0.0, 0usize), |(s, n), d| (s + d, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

#[inline]
fn circular_mean(a: f64, b: f64) -> f64 {
    (a.sin() + b.sin()).atan2(a.cos() + b.cos())
}

impl Sampler for FragmentSampler {
    fn kind(&self) -> SamplerKind {
        SamplerKind::Fragment
    }

    fn generate(
        &self,
        context: &SamplingContext,
        index: usize,
        rng: &mut StdRng,
    ) -> Result<DihedralSet, EngineError> {
        context.sequence.ensure_non_empty()?;
        let residues = context.sequence.residues();
        let (width, windows) = self.windows(residues)?;
        let mut placed: Vec<Option<(f64, f64)>> = vec![None; residues.len()];

        for window in &windows {
            let energies: Vec<f64> = window
                .choices
                .iter()
                .map(|(similarity, fragment)| {
                    -similarity + incompatibility(&placed, window.start, &fragment.angles[..width])
                })
                .collect();
            let chosen = boltzmann_sample(&energies, self.config.selection_beta, rng)?;
            let (similarity, fragment) = window.choices[chosen];
            trace!(index, start = window.start, similarity, "Fragment placed");

            for (j, &(phi, psi)) in fragment.angles[..width].iter().enumerate() {
                let slot = &mut placed[window.start + j];
                *slot = Some(match *slot {
                    Some((p, q)) => (circular_mean(p, phi), circular_mean(q, psi)),
                    None => (phi, psi),
                });
            }
        }

        let mut pairs: Vec<(f64, f64)> = placed.into_iter().map(Option::unwrap_or_default).collect();
        if self.config.noise > 0.0 {
            let noise = Normal::new(0.0, self.config.noise)
                .map_err(|e| EngineError::Internal(format!("fragment noise distribution: {e}")))?;
            for pair in &mut pairs {
                pair.0 += noise.sample(rng);
                pair.1 += noise.sample(rng);
            }
        }
        Ok(DihedralSet::from_phi_psi(&pairs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::params::Forcefield;
    use crate::core::models::sequence::Sequence;
    use crate::core::utils::geometry::angular_difference;

    fn homopolymer(code: char, len: usize, phi: f64, psi: f64) -> Fragment {
        Fragment {
            window: vec![ResidueType::from_one_letter(code).unwrap(); len],
            angles: vec![(phi.to_radians(), psi.to_radians()); len],
        }
    }

    fn quiet(config: FragmentSamplingConfig) -> FragmentSamplingConfig {
        FragmentSamplingConfig { noise: 0.0, ..config }
    }

    fn assert_all_near(set: &DihedralSet, phi: f64, psi: f64) {
        for (i, (p, q)) in set.phi_psi_pairs() {
            assert!(angular_difference(p, phi.to_radians()).abs() < 1e-9, "residue {i} phi");
            assert!(angular_difference(q, psi.to_radians()).abs() < 1e-9, "residue {i} psi");
        }
    }

    #[test]
    fn windows_cover_the_whole_chain_with_overlap() {
        assert_eq!(FragmentSampler::window_starts(7, 3, 1), vec![0, 2, 4]);
        assert_eq!(FragmentSampler::window_starts(8, 3, 1), vec![0, 2, 4, 5]);
        assert_eq!(FragmentSampler::window_starts(3, 3, 1), vec![0]);
        assert_eq!(FragmentSampler::window_starts(6, 3, 0), vec![0, 3]);
    }

    #[test]
    fn single_fragment_library_reproduces_its_angles() {
        let library = FragmentLibrary::new(vec![homopolymer('A', 3, -60.0, -45.0)]).unwrap();
        let sampler = FragmentSampler::new(Arc::new(library), quiet(FragmentSamplingConfig::default()));
        let sequence = Sequence::parse("MKVLAGSE").unwrap();
        let ff = Forcefield::default();
        let ctx = SamplingContext::new(&sequence, &ff);

        for set in sampler.sample(&ctx, 3, 2).unwrap() {
            set.validate(8).unwrap();
            assert_all_near(&set, -60.0, -45.0);
        }
    }

    #[test]
    fn matching_sequence_is_strongly_preferred() {
        let library = FragmentLibrary::new(vec![
            homopolymer('G', 3, 80.0, -170.0),
            homopolymer('A', 3, -63.0, -43.0),
        ])
        .unwrap();
        let config = FragmentSamplingConfig {
            selection_beta: 50.0,
            ..quiet(FragmentSamplingConfig::default())
        };
        let sampler = FragmentSampler::new(Arc::new(library), config);
        let sequence = Sequence::parse("AAAAAAA").unwrap();
        let ff = Forcefield::default();
        let ctx = SamplingContext::new(&sequence, &ff);

        for set in sampler.sample(&ctx, 5, 13).unwrap() {
            assert_all_near(&set, -63.0, -43.0);
        }
    }

    #[test]
    fn falls_back_to_the_closest_available_window_length() {
        let library = FragmentLibrary::new(vec![homopolymer('L', 5, -120.0, 130.0)]).unwrap();
        let sampler = FragmentSampler::new(Arc::new(library), quiet(FragmentSamplingConfig::default()));
        let sequence = Sequence::parse("LLLL").unwrap();
        let ff = Forcefield::default();
        let ctx = SamplingContext::new(&sequence, &ff);

        let set = &sampler.sample(&ctx, 1, 0).unwrap()[0];
        set.validate(4).unwrap();
        assert_all_near(set, -120.0, 130.0);
    }

    #[test]
    fn builtin_library_sampling_is_reproducible() {
        let ff = Forcefield::default();
        let library = Arc::new(FragmentLibrary::builtin(&ff, 3));
        let sampler = FragmentSampler::new(library, FragmentSamplingConfig::default());
        let sequence = Sequence::parse("MKTAYIAKQRQISFVKSHFS").unwrap();
        let ctx = SamplingContext::new(&sequence, &ff);

        let a = sampler.sample(&ctx, 6, 42).unwrap();
        let b = sampler.sample(&ctx, 6, 42).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 6);
        for set in &a {
            set.validate(20).unwrap();
        }
    }

    #[test]
    fn incompatibility_measures_overlap_disagreement() {
        let placed = vec![Some((0.0, 0.0)), None, None];
        assert_eq!(incompatibility(&placed, 0, &[(0.0, 0.0), (1.0, 1.0)]), 0.0);
        let opposite = incompatibility(&placed, 0, &[(std::f64::consts::PI, std::f64::consts::PI)]);
        assert!((opposite - 2.0).abs() < 1e-12);
        assert_eq!(incompatibility(&placed, 1, &[(1.0, 1.0), (2.0, 2.0)]), 0.0);
    }
}
