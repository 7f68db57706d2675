//! Ordered collection of constraint rules.
//!
//! The set is what the allocator consults: hard rules gate candidate
//! pairs, soft rules price them. Rules are evaluated in insertion order;
//! `first_hard_failure` short-circuits on the first violated hard rule.

use std::sync::Arc;

use super::{ConstraintKind, ConstraintReport, ConstraintRule, PairContext};
use crate::models::{Task, Worker};

/// An ordered set of constraint rules.
///
/// # Example
/// ```
/// use workshare::constraints::{ConstraintSet, rules};
///
/// let set = ConstraintSet::standard()
///     .with_rule(rules::RestGap::new(8 * 3_600_000));
/// assert_eq!(set.len(), 5);
/// ```
#[derive(Clone)]
pub struct ConstraintSet {
    rules: Vec<Arc<dyn ConstraintRule>>,
}

impl ConstraintSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// The standard hard rules: skill match, availability containment,
    /// no-overlap, and a hard per-worker load cap.
    pub fn standard() -> Self {
        Self::new()
            .with_rule(super::rules::SkillMatch)
            .with_rule(super::rules::AvailabilityContainment)
            .with_rule(super::rules::NoOverlap)
            .with_rule(super::rules::MaxLoad::hard())
    }

    /// Adds a rule.
    pub fn with_rule<R: ConstraintRule + 'static>(mut self, rule: R) -> Self {
        self.rules.push(Arc::new(rule));
        self
    }

    /// Name of the first violated hard rule, if any.
    pub fn first_hard_failure(
        &self,
        task: &Task,
        worker: &Worker,
        ctx: &PairContext<'_>,
    ) -> Option<&'static str> {
        self.rules
            .iter()
            .filter(|r| r.kind().is_hard())
            .find(|r| !r.evaluate(task, worker, ctx).satisfied)
            .map(|r| r.name())
    }

    /// Names of every violated hard rule.
    pub fn hard_failures(
        &self,
        task: &Task,
        worker: &Worker,
        ctx: &PairContext<'_>,
    ) -> Vec<&'static str> {
        self.rules
            .iter()
            .filter(|r| r.kind().is_hard())
            .filter(|r| !r.evaluate(task, worker, ctx).satisfied)
            .map(|r| r.name())
            .collect()
    }

    /// Violated soft rules with their weighted penalties.
    pub fn soft_failures(
        &self,
        task: &Task,
        worker: &Worker,
        ctx: &PairContext<'_>,
    ) -> Vec<(&'static str, f64)> {
        self.rules
            .iter()
            .filter_map(|r| match r.kind() {
                ConstraintKind::Hard => None,
                ConstraintKind::Soft { weight } => {
                    let eval = r.evaluate(task, worker, ctx);
                    if eval.satisfied {
                        None
                    } else {
                        Some((r.name(), weight * eval.penalty))
                    }
                }
            })
            .collect()
    }

    /// Total weighted soft penalty for a pair.
    pub fn soft_penalty(&self, task: &Task, worker: &Worker, ctx: &PairContext<'_>) -> f64 {
        self.soft_failures(task, worker, ctx)
            .iter()
            .map(|(_, p)| p)
            .sum()
    }

    /// Verdict of every rule for a pair, in rule order.
    pub fn explain(
        &self,
        task: &Task,
        worker: &Worker,
        ctx: &PairContext<'_>,
    ) -> Vec<ConstraintReport> {
        self.rules
            .iter()
            .map(|r| {
                let eval = r.evaluate(task, worker, ctx);
                let (hard, penalty) = match r.kind() {
                    ConstraintKind::Hard => (true, 0.0),
                    ConstraintKind::Soft { weight } => (false, weight * eval.penalty),
                };
                ConstraintReport {
                    constraint: r.name().to_string(),
                    hard,
                    satisfied: eval.satisfied,
                    penalty,
                }
            })
            .collect()
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the set has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for ConstraintSet {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for ConstraintSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstraintSet")
            .field(
                "rules",
                &self
                    .rules
                    .iter()
                    .map(|r| format!("{}({:?})", r.name(), r.kind()))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::rules;
    use crate::constraints::HOUR_MS;
    use crate::models::TimeWindow;
    use std::collections::HashMap;

    #[test]
    fn test_standard_set() {
        let set = ConstraintSet::standard();
        assert_eq!(set.len(), 4);
        assert!(!set.is_empty());
    }

    #[test]
    fn test_first_hard_failure_order() {
        let intervals = HashMap::new();
        let loads = HashMap::new();
        let ctx = PairContext::new(&intervals, &loads);

        let set = ConstraintSet::standard();
        let task = Task::new("T1", 0, 1_000).with_skill("driving");
        // Fails both skill match and availability; skill-match comes first
        let worker = Worker::new("W1").with_window(5_000, 9_000);

        assert_eq!(set.first_hard_failure(&task, &worker, &ctx), Some("skill-match"));
        assert_eq!(
            set.hard_failures(&task, &worker, &ctx),
            vec!["skill-match", "availability"]
        );
    }

    #[test]
    fn test_no_failure_for_eligible_pair() {
        let intervals = HashMap::new();
        let loads = HashMap::new();
        let ctx = PairContext::new(&intervals, &loads);

        let set = ConstraintSet::standard();
        let task = Task::new("T1", 0, 1_000);
        let worker = Worker::new("W1");

        assert_eq!(set.first_hard_failure(&task, &worker, &ctx), None);
        assert!(set.hard_failures(&task, &worker, &ctx).is_empty());
    }

    #[test]
    fn test_soft_penalty_sums_weighted() {
        let mut intervals: HashMap<String, Vec<(String, TimeWindow)>> = HashMap::new();
        intervals.insert(
            "W1".into(),
            vec![("T0".into(), TimeWindow::new(0, 2 * HOUR_MS))],
        );
        let loads = HashMap::new();
        let ctx = PairContext::new(&intervals, &loads);

        let set = ConstraintSet::new().with_rule(rules::RestGap::new(8 * HOUR_MS).with_weight(0.5));
        let worker = Worker::new("W1");
        // 2h gap, 6h short, weight 0.5 → 3.0
        let task = Task::new("T1", 4 * HOUR_MS, 6 * HOUR_MS);

        let failures = set.soft_failures(&task, &worker, &ctx);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "rest-gap");
        assert!((failures[0].1 - 3.0).abs() < 1e-10);
        assert!((set.soft_penalty(&task, &worker, &ctx) - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_explain_reports_every_rule() {
        let intervals = HashMap::new();
        let loads = HashMap::new();
        let ctx = PairContext::new(&intervals, &loads);

        let set = ConstraintSet::standard().with_rule(rules::RestGap::new(HOUR_MS));
        let task = Task::new("T1", 0, 1_000).with_skill("driving");
        let worker = Worker::new("W1");

        let reports = set.explain(&task, &worker, &ctx);
        assert_eq!(reports.len(), 5);
        assert_eq!(reports[0].constraint, "skill-match");
        assert!(!reports[0].satisfied);
        assert!(reports[0].hard);
        // rest-gap passes and is soft
        let rest = reports.iter().find(|r| r.constraint == "rest-gap").unwrap();
        assert!(rest.satisfied);
        assert!(!rest.hard);
    }
}
