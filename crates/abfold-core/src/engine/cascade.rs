use super::config::PredictionConfig;
use super::context::{Deadline, OptimizationContext};
use super::error::EngineError;
use super::objective::Objective;
use super::state::{Candidate, Diagnostic, StageKind, StageReport};
use super::tasks::{self, StageOutcome, StagePoint};
use super::utils::sampling::derive_seed;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, instrument, warn};

/// Seed stream reserved for the escape stage, disjoint from the sampler streams.
const ESCAPE_STREAM: u64 = 0x45_53_43;

/// A candidate after the full cascade, with its per-stage reports.
#[derive(Debug, Clone)]
pub struct RefinedCandidate {
    pub candidate: Candidate,
    pub initial_energy: f64,
    pub reports: Vec<StageReport>,
    pub diagnostics: Vec<Diagnostic>,
}

struct CascadeRun<'a> {
    candidate: &'a Candidate,
    best: StagePoint,
    reports: Vec<StageReport>,
    diagnostics: Vec<Diagnostic>,
    trace: Vec<f64>,
}

impl CascadeRun<'_> {
    /// Keeps the stage output only if it does not raise the energy.
    fn record(&mut self, stage: StageKind, outcome: StageOutcome) {
        let energy_before = self.best.total();
        let proposed_energy = outcome.best.total();
        let accepted = proposed_energy <= energy_before;

        if outcome.budget_exhausted {
            warn!(
                stage = stage.name(),
                origin = %self.candidate.origin,
                index = self.candidate.index,
                iterations = outcome.iterations,
                "Stage exhausted its iteration budget"
            );
            self.diagnostics.push(Diagnostic::ConvergenceWarning {
                origin: self.candidate.origin,
                index: self.candidate.index,
                stage,
                iterations: outcome.iterations,
            });
        }
        if !accepted {
            debug!(
                stage = stage.name(),
                energy_before, proposed_energy, "Stage raised the energy, keeping previous best"
            );
        }

        self.trace.extend(outcome.trace.iter().skip(1));
        if accepted {
            self.best = outcome.best;
        }
        self.reports.push(StageReport {
            stage,
            energy_before,
            proposed_energy,
            energy_after: self.best.total(),
            terms_after: self.best.evaluation.energy,
            iterations: outcome.iterations,
            converged: outcome.converged,
            accepted,
            skipped: false,
            trace: outcome.trace,
        });
    }

    fn skip(&mut self, stage: StageKind) {
        self.reports
            .push(StageReport::skipped(stage, self.best.evaluation.energy));
    }
}

fn escape_seed(config: &PredictionConfig, candidate: &Candidate) -> u64 {
    let index = (candidate.origin.stream() << 32) | candidate.index as u64;
    derive_seed(config.seed, ESCAPE_STREAM, index)
}

/// Runs relaxation, L-BFGS, the conditional escape and the constraint polish on one
/// candidate. Each stage consumes the best output so far; a stage whose result is worse
/// than its input is discarded.
#[instrument(skip_all, name = "cascade", fields(origin = %candidate.origin, index = candidate.index))]
pub fn refine(candidate: &Candidate, context: &OptimizationContext) -> Result<RefinedCandidate, EngineError> {
    let config = context.config;
    let settings = &config.cascade;
    let deadline: &Deadline = context.deadline;

    let objective = Objective::new(
        context.sequence,
        context.forcefield,
        &candidate.angles,
        config.include_omega,
        config.gradient_epsilon,
    )?;
    let start = StagePoint::evaluate(&objective, objective.initial_point()?)?;
    let initial_energy = start.total();

    let mut run = CascadeRun {
        candidate,
        trace: vec![initial_energy],
        best: start,
        reports: Vec::with_capacity(StageKind::ALL.len()),
        diagnostics: Vec::new(),
    };

    let outcome = tasks::relaxation::run(&objective, &run.best, &settings.relaxation, deadline)?;
    run.record(StageKind::Relaxation, outcome);

    let outcome = tasks::lbfgs::run(&objective, &run.best, &settings.lbfgs, deadline)?;
    run.record(StageKind::QuasiNewton, outcome);

    let escape = &settings.escape;
    if escape.enabled && tasks::escape::is_stagnant(&run.trace, escape.window, escape.stagnation_threshold) {
        let mut rng = StdRng::seed_from_u64(escape_seed(config, candidate));
        let outcome = tasks::escape::run(&objective, &run.best, escape, deadline, &mut rng)?;
        run.record(StageKind::StochasticEscape, outcome);
    } else {
        run.skip(StageKind::StochasticEscape);
    }

    let outcome = tasks::polish::run(&objective, &run.best, &settings.polish, deadline)?;
    run.record(StageKind::ConstraintPolish, outcome);

    let final_energy = run.best.total();
    debug!(initial_energy, final_energy, "Cascade finished");

    Ok(RefinedCandidate {
        candidate: Candidate {
            angles: objective.angles(&run.best.point),
            energy: run.best.evaluation.energy,
            origin: candidate.origin,
            index: candidate.index,
        },
        initial_energy,
        reports: run.reports,
        diagnostics: run.diagnostics,
    })
}
