//! Built-in constraint rules.
//!
//! # Categories
//!
//! - **Eligibility**: skill match, availability containment
//! - **Exclusion**: no overlapping assignments per worker
//! - **Load**: per-worker maximum load (hard or soft)
//! - **Spacing**: rest gap between consecutive assignments (soft)
//!
//! # Reference
//! Burke et al. (2004), "The State of the Art of Nurse Rostering"

use super::{ConstraintKind, ConstraintRule, Evaluation, PairContext, HOUR_MS};
use crate::models::{Task, Worker};

/// Worker skill set must cover the task's required skills.
#[derive(Debug, Clone, Copy)]
pub struct SkillMatch;

impl ConstraintRule for SkillMatch {
    fn name(&self) -> &'static str {
        "skill-match"
    }

    fn kind(&self) -> ConstraintKind {
        ConstraintKind::Hard
    }

    fn evaluate(&self, task: &Task, worker: &Worker, _ctx: &PairContext<'_>) -> Evaluation {
        if worker.qualifies_for(task) {
            Evaluation::pass()
        } else {
            Evaluation::fail()
        }
    }

    fn description(&self) -> &'static str {
        "worker has every skill the task requires"
    }
}

/// Task window must lie inside one of the worker's availability windows
/// and intersect no blocked period.
#[derive(Debug, Clone, Copy)]
pub struct AvailabilityContainment;

impl ConstraintRule for AvailabilityContainment {
    fn name(&self) -> &'static str {
        "availability"
    }

    fn kind(&self) -> ConstraintKind {
        ConstraintKind::Hard
    }

    fn evaluate(&self, task: &Task, worker: &Worker, _ctx: &PairContext<'_>) -> Evaluation {
        if worker.is_available_for(&task.window) {
            Evaluation::pass()
        } else {
            Evaluation::fail()
        }
    }

    fn description(&self) -> &'static str {
        "task window inside worker availability"
    }
}

/// A worker cannot hold two assignments with overlapping windows.
#[derive(Debug, Clone, Copy)]
pub struct NoOverlap;

impl ConstraintRule for NoOverlap {
    fn name(&self) -> &'static str {
        "no-overlap"
    }

    fn kind(&self) -> ConstraintKind {
        ConstraintKind::Hard
    }

    fn evaluate(&self, task: &Task, worker: &Worker, ctx: &PairContext<'_>) -> Evaluation {
        let clashes = ctx
            .windows_for(&worker.id)
            .any(|w| w.overlaps(&task.window));
        if clashes {
            Evaluation::fail()
        } else {
            Evaluation::pass()
        }
    }

    fn description(&self) -> &'static str {
        "no overlapping assignments per worker"
    }
}

/// Projected worker load must stay under the worker's cap.
///
/// Hard by default; a soft variant penalizes the overage in hours.
#[derive(Debug, Clone, Copy)]
pub struct MaxLoad {
    soft_weight: Option<f64>,
}

impl MaxLoad {
    /// Hard variant: exceeding the cap makes the pair infeasible.
    pub fn hard() -> Self {
        Self { soft_weight: None }
    }

    /// Soft variant: overage is penalized at `weight` per hour.
    pub fn soft(weight: f64) -> Self {
        Self {
            soft_weight: Some(weight),
        }
    }
}

impl ConstraintRule for MaxLoad {
    fn name(&self) -> &'static str {
        "max-load"
    }

    fn kind(&self) -> ConstraintKind {
        match self.soft_weight {
            None => ConstraintKind::Hard,
            Some(weight) => ConstraintKind::Soft { weight },
        }
    }

    fn evaluate(&self, task: &Task, worker: &Worker, ctx: &PairContext<'_>) -> Evaluation {
        let Some(max) = worker.max_load_ms else {
            return Evaluation::pass();
        };
        let projected = ctx.load(&worker.id) + task.duration_ms();
        if projected <= max {
            return Evaluation::pass();
        }
        match self.soft_weight {
            None => Evaluation::fail(),
            Some(_) => Evaluation::penalized((projected - max) as f64 / HOUR_MS as f64),
        }
    }

    fn description(&self) -> &'static str {
        "projected load within the worker's cap"
    }
}

/// Penalizes back-to-back assignments closer than a configured rest gap.
///
/// Soft: the shortfall below the gap is penalized in hours, summed over
/// the worker's neighboring assignments.
#[derive(Debug, Clone, Copy)]
pub struct RestGap {
    min_gap_ms: i64,
    weight: f64,
}

impl RestGap {
    /// Creates a rest-gap rule with weight 1.0.
    pub fn new(min_gap_ms: i64) -> Self {
        Self {
            min_gap_ms,
            weight: 1.0,
        }
    }

    /// Sets the penalty weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

impl ConstraintRule for RestGap {
    fn name(&self) -> &'static str {
        "rest-gap"
    }

    fn kind(&self) -> ConstraintKind {
        ConstraintKind::Soft {
            weight: self.weight,
        }
    }

    fn evaluate(&self, task: &Task, worker: &Worker, ctx: &PairContext<'_>) -> Evaluation {
        if self.min_gap_ms <= 0 {
            return Evaluation::pass();
        }
        let mut shortfall: f64 = 0.0;
        for window in ctx.windows_for(&worker.id) {
            if let Some(gap) = window.gap_to(&task.window) {
                if gap < self.min_gap_ms {
                    shortfall += (self.min_gap_ms - gap) as f64 / HOUR_MS as f64;
                }
            }
        }
        if shortfall > 0.0 {
            Evaluation::penalized(shortfall)
        } else {
            Evaluation::pass()
        }
    }

    fn description(&self) -> &'static str {
        "rest gap between consecutive assignments"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimeWindow;
    use std::collections::HashMap;

    fn empty_ctx<'a>(
        intervals: &'a HashMap<String, Vec<(String, TimeWindow)>>,
        loads: &'a HashMap<String, i64>,
    ) -> PairContext<'a> {
        PairContext::new(intervals, loads)
    }

    #[test]
    fn test_skill_match() {
        let intervals = HashMap::new();
        let loads = HashMap::new();
        let ctx = empty_ctx(&intervals, &loads);

        let task = Task::new("T1", 0, 1_000).with_skill("driving");
        let qualified = Worker::new("W1").with_skill("driving");
        let unqualified = Worker::new("W2");

        assert!(SkillMatch.evaluate(&task, &qualified, &ctx).satisfied);
        assert!(!SkillMatch.evaluate(&task, &unqualified, &ctx).satisfied);
        assert!(SkillMatch.kind().is_hard());
    }

    #[test]
    fn test_availability_containment() {
        let intervals = HashMap::new();
        let loads = HashMap::new();
        let ctx = empty_ctx(&intervals, &loads);

        let task = Task::new("T1", 2_000, 8_000);
        let available = Worker::new("W1").with_window(0, 10_000);
        let partial = Worker::new("W2").with_window(0, 5_000);

        assert!(
            AvailabilityContainment
                .evaluate(&task, &available, &ctx)
                .satisfied
        );
        assert!(
            !AvailabilityContainment
                .evaluate(&task, &partial, &ctx)
                .satisfied
        );
    }

    #[test]
    fn test_no_overlap() {
        let mut intervals: HashMap<String, Vec<(String, TimeWindow)>> = HashMap::new();
        intervals.insert(
            "W1".into(),
            vec![("T0".into(), TimeWindow::new(0, 5_000))],
        );
        let loads = HashMap::new();
        let ctx = empty_ctx(&intervals, &loads);

        let worker = Worker::new("W1");
        let clashing = Task::new("T1", 4_000, 9_000);
        let clear = Task::new("T2", 5_000, 9_000);

        assert!(!NoOverlap.evaluate(&clashing, &worker, &ctx).satisfied);
        assert!(NoOverlap.evaluate(&clear, &worker, &ctx).satisfied);
    }

    #[test]
    fn test_no_overlap_excludes_own_task() {
        let mut intervals: HashMap<String, Vec<(String, TimeWindow)>> = HashMap::new();
        intervals.insert(
            "W1".into(),
            vec![("T1".into(), TimeWindow::new(0, 5_000))],
        );
        let loads = HashMap::new();
        let ctx = PairContext::excluding(&intervals, &loads, "T1");

        // Re-evaluating the already-placed pair must not clash with itself
        let worker = Worker::new("W1");
        let task = Task::new("T1", 0, 5_000);
        assert!(NoOverlap.evaluate(&task, &worker, &ctx).satisfied);
    }

    #[test]
    fn test_max_load_hard() {
        let intervals = HashMap::new();
        let mut loads = HashMap::new();
        loads.insert("W1".to_string(), 3 * HOUR_MS);
        let ctx = empty_ctx(&intervals, &loads);

        let worker = Worker::new("W1").with_max_load(4 * HOUR_MS);
        let fits = Task::new("T1", 0, HOUR_MS);
        let too_much = Task::new("T2", 0, 2 * HOUR_MS);

        assert!(MaxLoad::hard().evaluate(&fits, &worker, &ctx).satisfied);
        let over = MaxLoad::hard().evaluate(&too_much, &worker, &ctx);
        assert!(!over.satisfied);
        assert_eq!(over.penalty, 0.0);
    }

    #[test]
    fn test_max_load_soft_penalty() {
        let intervals = HashMap::new();
        let mut loads = HashMap::new();
        loads.insert("W1".to_string(), 3 * HOUR_MS);
        let ctx = empty_ctx(&intervals, &loads);

        let worker = Worker::new("W1").with_max_load(4 * HOUR_MS);
        let task = Task::new("T1", 0, 3 * HOUR_MS); // projected 6h, cap 4h

        let eval = MaxLoad::soft(1.0).evaluate(&task, &worker, &ctx);
        assert!(!eval.satisfied);
        assert!((eval.penalty - 2.0).abs() < 1e-10); // 2h over
    }

    #[test]
    fn test_max_load_uncapped() {
        let intervals = HashMap::new();
        let loads = HashMap::new();
        let ctx = empty_ctx(&intervals, &loads);

        let worker = Worker::new("W1");
        let task = Task::new("T1", 0, 100 * HOUR_MS);
        assert!(MaxLoad::hard().evaluate(&task, &worker, &ctx).satisfied);
    }

    #[test]
    fn test_rest_gap() {
        let mut intervals: HashMap<String, Vec<(String, TimeWindow)>> = HashMap::new();
        intervals.insert(
            "W1".into(),
            vec![("T0".into(), TimeWindow::new(0, 2 * HOUR_MS))],
        );
        let loads = HashMap::new();
        let ctx = empty_ctx(&intervals, &loads);

        let worker = Worker::new("W1");
        let rule = RestGap::new(8 * HOUR_MS);

        // Starts 2h after the previous assignment ends: 6h short of 8h rest
        let close = Task::new("T1", 4 * HOUR_MS, 6 * HOUR_MS);
        let eval = rule.evaluate(&close, &worker, &ctx);
        assert!(!eval.satisfied);
        assert!((eval.penalty - 6.0).abs() < 1e-10);

        // Starts 10h after: enough rest
        let rested = Task::new("T2", 12 * HOUR_MS, 14 * HOUR_MS);
        assert!(rule.evaluate(&rested, &worker, &ctx).satisfied);
    }

    #[test]
    fn test_rest_gap_disabled() {
        let mut intervals: HashMap<String, Vec<(String, TimeWindow)>> = HashMap::new();
        intervals.insert("W1".into(), vec![("T0".into(), TimeWindow::new(0, 1_000))]);
        let loads = HashMap::new();
        let ctx = empty_ctx(&intervals, &loads);

        let worker = Worker::new("W1");
        let task = Task::new("T1", 1_000, 2_000);
        assert!(RestGap::new(0).evaluate(&task, &worker, &ctx).satisfied);
    }
}
