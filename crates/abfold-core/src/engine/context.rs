use super::config::PredictionConfig;
use super::progress::ProgressReporter;
use crate::core::forcefield::params::Forcefield;
use crate::core::models::sequence::Sequence;
use std::time::{Duration, Instant};

/// Wall-clock budget of a run. Without a budget it never expires.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    budget: Option<Duration>,
}

impl Deadline {
    pub fn new(budget: Option<Duration>) -> Self {
        Self {
            start: Instant::now(),
            budget,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    #[inline]
    pub fn expired(&self) -> bool {
        self.budget.is_some_and(|budget| self.start.elapsed() >= budget)
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.budget
            .map(|budget| budget.saturating_sub(self.start.elapsed()))
    }
}

#[derive(Clone, Copy)]
pub struct OptimizationContext<'a> {
    pub sequence: &'a Sequence,
    pub forcefield: &'a Forcefield,
    pub config: &'a PredictionConfig,
    pub reporter: &'a ProgressReporter<'a>,
    pub deadline: &'a Deadline,
}

impl<'a> OptimizationContext<'a> {
    pub fn new(
        sequence: &'a Sequence,
        forcefield: &'a Forcefield,
        config: &'a PredictionConfig,
        reporter: &'a ProgressReporter<'a>,
        deadline: &'a Deadline,
    ) -> Self {
        Self {
            sequence,
            forcefield,
            config,
            reporter,
            deadline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_deadline_never_expires() {
        let deadline = Deadline::unbounded();
        assert!(!deadline.expired());
        assert_eq!(deadline.remaining(), None);
    }

    #[test]
    fn zero_budget_expires_immediately() {
        let deadline = Deadline::new(Some(Duration::ZERO));
        assert!(deadline.expired());
        assert_eq!(deadline.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn generous_budget_has_time_left() {
        let deadline = Deadline::new(Some(Duration::from_secs(3600)));
        assert!(!deadline.expired());
        assert!(deadline.remaining().unwrap() > Duration::from_secs(3500));
    }
}
