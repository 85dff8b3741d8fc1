use super::config::SamplerKind;
use super::objective::Evaluation;
use crate::core::forcefield::term::EnergyTerm;
use crate::core::models::conformation::Conformation;
use crate::core::models::torsion::DihedralSet;
use nalgebra::DVector;
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt;

/// One member of the candidate pool. Ordering is by total energy, then by origin
/// sampler, then by index, so ranking never depends on the order candidates arrived in.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub angles: DihedralSet,
    pub energy: EnergyTerm,
    pub origin: SamplerKind,
    pub index: usize,
}

impl Candidate {
    #[inline]
    pub fn total(&self) -> f64 {
        self.energy.total()
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.total()
            .total_cmp(&other.total())
            .then(self.origin.cmp(&other.origin))
            .then(self.index.cmp(&other.index))
    }
}

#[derive(Debug, Clone, Default)]
pub struct CandidatePool {
    candidates: Vec<Candidate>,
}

impl CandidatePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, candidate: Candidate) {
        self.candidates.push(candidate);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn best(&self) -> Option<&Candidate> {
        self.candidates.iter().min()
    }

    /// The `k` lowest-ranked candidates, best first.
    pub fn top_k(&self, k: usize) -> Vec<Candidate> {
        let mut ranked = self.candidates.clone();
        ranked.sort_unstable();
        ranked.truncate(k);
        ranked
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter()
    }
}

impl Extend<Candidate> for CandidatePool {
    fn extend<T: IntoIterator<Item = Candidate>>(&mut self, iter: T) {
        self.candidates.extend(iter);
    }
}

impl FromIterator<Candidate> for CandidatePool {
    fn from_iter<T: IntoIterator<Item = Candidate>>(iter: T) -> Self {
        Self {
            candidates: iter.into_iter().collect(),
        }
    }
}

/// Curvature information from one accepted quasi-Newton step.
#[derive(Debug, Clone)]
pub struct CurvaturePair {
    pub s: DVector<f64>,
    pub y: DVector<f64>,
    pub rho: f64,
}

/// Working state of a gradient-based stage: current point, its evaluation and
/// gradient, a bounded curvature history, and the energy trace.
#[derive(Debug, Clone)]
pub struct OptimizationState {
    pub point: DVector<f64>,
    pub evaluation: Evaluation,
    pub gradient: DVector<f64>,
    pub iteration: usize,
    pub converged: bool,
    pub trace: Vec<f64>,
    history: VecDeque<CurvaturePair>,
    capacity: usize,
}

impl OptimizationState {
    pub fn new(point: DVector<f64>, evaluation: Evaluation, gradient: DVector<f64>, capacity: usize) -> Self {
        let trace = vec![evaluation.total()];
        Self {
            point,
            evaluation,
            gradient,
            iteration: 0,
            converged: false,
            trace,
            history: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    #[inline]
    pub fn total(&self) -> f64 {
        self.evaluation.total()
    }

    #[inline]
    pub fn conformation(&self) -> &Conformation {
        &self.evaluation.conformation
    }

    pub fn history(&self) -> &VecDeque<CurvaturePair> {
        &self.history
    }

    /// Stores a pair, evicting the oldest once the history is full. Pairs failing the
    /// curvature condition `s·y > 0` are dropped; returns whether the pair was kept.
    pub fn push_pair(&mut self, s: DVector<f64>, y: DVector<f64>) -> bool {
        let sy = s.dot(&y);
        if !(sy > 1e-10) || self.capacity == 0 {
            return false;
        }
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(CurvaturePair { s, y, rho: 1.0 / sy });
        true
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Moves to a new point and records its energy in the trace.
    pub fn advance(&mut self, point: DVector<f64>, evaluation: Evaluation, gradient: DVector<f64>) {
        self.point = point;
        self.evaluation = evaluation;
        self.gradient = gradient;
        self.iteration += 1;
        self.trace.push(self.evaluation.total());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Relaxation,
    QuasiNewton,
    StochasticEscape,
    ConstraintPolish,
}

impl StageKind {
    pub const ALL: [StageKind; 4] = [
        StageKind::Relaxation,
        StageKind::QuasiNewton,
        StageKind::StochasticEscape,
        StageKind::ConstraintPolish,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StageKind::Relaxation => "relaxation",
            StageKind::QuasiNewton => "l-bfgs",
            StageKind::StochasticEscape => "stochastic escape",
            StageKind::ConstraintPolish => "constraint polish",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What one cascade stage did to one candidate.
///
/// `energy_after` is the energy carried forward, which equals `proposed_energy` when
/// the stage was accepted and `energy_before` otherwise.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage: StageKind,
    pub energy_before: f64,
    pub proposed_energy: f64,
    pub energy_after: f64,
    pub terms_after: EnergyTerm,
    pub iterations: usize,
    /// Whether the stage met its own stopping criterion. Escape has none and never sets it.
    pub converged: bool,
    pub accepted: bool,
    pub skipped: bool,
    pub trace: Vec<f64>,
}

impl StageReport {
    pub fn skipped(stage: StageKind, energy: EnergyTerm) -> Self {
        let total = energy.total();
        Self {
            stage,
            energy_before: total,
            proposed_energy: total,
            energy_after: total,
            terms_after: energy,
            iterations: 0,
            converged: false,
            accepted: false,
            skipped: true,
            trace: Vec::new(),
        }
    }
}

/// Non-fatal conditions collected during a run. Any of them marks the result degraded.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    ConvergenceWarning {
        origin: SamplerKind,
        index: usize,
        stage: StageKind,
        iterations: usize,
    },
    CandidateAborted {
        origin: SamplerKind,
        index: usize,
        reason: String,
    },
    FragmentFallback {
        source: String,
        failures: Vec<String>,
    },
    DeadlineReached {
        phase: &'static str,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::ConvergenceWarning {
                origin,
                index,
                stage,
                iterations,
            } => write!(
                f,
                "{stage} did not converge for {origin} candidate {index} within {iterations} iterations"
            ),
            Diagnostic::CandidateAborted {
                origin,
                index,
                reason,
            } => write!(f, "{origin} candidate {index} aborted: {reason}"),
            Diagnostic::FragmentFallback { source, failures } => write!(
                f,
                "fragment source '{source}' unavailable after {} attempt(s), using fallback library",
                failures.len()
            ),
            Diagnostic::DeadlineReached { phase } => {
                write!(f, "wall-clock budget expired during {phase}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(total: f64, origin: SamplerKind, index: usize) -> Candidate {
        Candidate {
            angles: DihedralSet::extended(3),
            energy: EnergyTerm {
                backbone: total,
                ..EnergyTerm::default()
            },
            origin,
            index,
        }
    }

    #[test]
    fn candidates_rank_by_energy_then_origin_then_index() {
        let a = candidate(1.0, SamplerKind::Basin, 0);
        let b = candidate(1.0, SamplerKind::Uniform, 5);
        let c = candidate(1.0, SamplerKind::Uniform, 2);
        let d = candidate(-3.0, SamplerKind::Fragment, 9);

        let forward: CandidatePool = vec![a.clone(), b.clone(), c.clone(), d.clone()].into_iter().collect();
        let backward: CandidatePool = vec![d.clone(), c.clone(), b.clone(), a.clone()].into_iter().collect();

        for pool in [&forward, &backward] {
            let ranked = pool.top_k(4);
            let keys: Vec<_> = ranked.iter().map(|c| (c.origin, c.index)).collect();
            assert_eq!(
                keys,
                vec![
                    (SamplerKind::Fragment, 9),
                    (SamplerKind::Uniform, 2),
                    (SamplerKind::Uniform, 5),
                    (SamplerKind::Basin, 0)
                ]
            );
            assert_eq!(pool.best().map(|c| c.index), Some(9));
        }
    }

    #[test]
    fn top_k_truncates_and_handles_small_pools() {
        let pool: CandidatePool = (0..3)
            .map(|i| candidate(i as f64, SamplerKind::Uniform, i))
            .collect();
        assert_eq!(pool.top_k(2).len(), 2);
        assert_eq!(pool.top_k(10).len(), 3);
        assert!(CandidatePool::new().best().is_none());
    }

    #[test]
    fn stage_kind_names_are_distinct() {
        let names: std::collections::HashSet<_> = StageKind::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(names.len(), 4);
    }

    #[test]
    fn diagnostics_render_readable_messages() {
        let d = Diagnostic::FragmentFallback {
            source: "frags.csv".to_string(),
            failures: vec!["timeout".to_string(); 2],
        };
        assert!(d.to_string().contains("2 attempt"));
        let d = Diagnostic::DeadlineReached { phase: "refinement" };
        assert!(d.to_string().contains("refinement"));
    }
}
