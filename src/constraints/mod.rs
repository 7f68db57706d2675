//! Assignment constraints and the constraint rule set.
//!
//! Constraints are typed predicates over a candidate (task, worker) pair,
//! evaluated against the roster built so far. Hard constraints gate
//! feasibility; soft constraints contribute penalty to the objective.
//!
//! Rules are pure functions of (task, worker, context) — no hidden state —
//! so the allocator can evaluate them repeatedly during search. New rule
//! kinds plug in through [`ConstraintRule`] without touching the allocator.
//!
//! # Usage
//!
//! ```
//! use workshare::constraints::{ConstraintSet, rules};
//!
//! let set = ConstraintSet::standard()
//!     .with_rule(rules::RestGap::new(8 * 3_600_000));
//! ```
//!
//! # References
//!
//! - Burke et al. (2004), "The State of the Art of Nurse Rostering"
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 2

mod set;

pub mod rules;

pub use set::ConstraintSet;

use std::collections::HashMap;
use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::models::{Task, TimeWindow, Worker};

/// One hour in milliseconds. Soft penalties are expressed in hours so they
/// share a scale with the fairness variance term.
pub const HOUR_MS: i64 = 3_600_000;

/// Whether a constraint gates feasibility or only penalizes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstraintKind {
    /// Must hold; violation makes the candidate infeasible.
    Hard,
    /// May give way; violation adds `weight * penalty` to the objective.
    Soft {
        /// Multiplier applied to the rule's raw penalty.
        weight: f64,
    },
}

impl ConstraintKind {
    /// Whether this is a hard constraint.
    pub fn is_hard(&self) -> bool {
        matches!(self, ConstraintKind::Hard)
    }
}

/// Result of evaluating one rule against one candidate pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// Whether the constraint holds.
    pub satisfied: bool,
    /// Raw penalty (hours-scale). Zero when satisfied.
    pub penalty: f64,
}

impl Evaluation {
    /// A satisfied evaluation.
    pub fn pass() -> Self {
        Self {
            satisfied: true,
            penalty: 0.0,
        }
    }

    /// A violated evaluation with no penalty (hard rules).
    pub fn fail() -> Self {
        Self {
            satisfied: false,
            penalty: 0.0,
        }
    }

    /// A violated evaluation with a raw penalty (soft rules).
    pub fn penalized(penalty: f64) -> Self {
        Self {
            satisfied: false,
            penalty,
        }
    }
}

/// Roster-so-far view passed to rule evaluation.
///
/// Carries each worker's in-plan assignments and projected loads. When
/// scoring a pair that is already in the plan, the pair's own task is
/// excluded so rules see the state "as if the candidate were not placed".
#[derive(Debug, Clone, Copy)]
pub struct PairContext<'a> {
    intervals: &'a HashMap<String, Vec<(String, TimeWindow)>>,
    loads: &'a HashMap<String, i64>,
    excluded_task: Option<&'a str>,
}

impl<'a> PairContext<'a> {
    /// Context for a candidate not yet in the plan.
    pub fn new(
        intervals: &'a HashMap<String, Vec<(String, TimeWindow)>>,
        loads: &'a HashMap<String, i64>,
    ) -> Self {
        Self {
            intervals,
            loads,
            excluded_task: None,
        }
    }

    /// Context that hides one task's own placement from the rules.
    pub fn excluding(
        intervals: &'a HashMap<String, Vec<(String, TimeWindow)>>,
        loads: &'a HashMap<String, i64>,
        task_id: &'a str,
    ) -> Self {
        Self {
            intervals,
            loads,
            excluded_task: Some(task_id),
        }
    }

    /// In-plan windows for a worker, excluded task filtered out.
    pub fn windows_for(&self, worker_id: &str) -> impl Iterator<Item = &'a TimeWindow> + '_ {
        let excluded = self.excluded_task;
        self.intervals
            .get(worker_id)
            .into_iter()
            .flatten()
            .filter(move |(tid, _)| Some(tid.as_str()) != excluded)
            .map(|(_, w)| w)
    }

    /// Projected load for a worker (ms), excluded task subtracted.
    pub fn load(&self, worker_id: &str) -> i64 {
        let base = self.loads.get(worker_id).copied().unwrap_or(0);
        match self.excluded_task {
            Some(excluded) => {
                let held: i64 = self
                    .intervals
                    .get(worker_id)
                    .into_iter()
                    .flatten()
                    .filter(|(tid, _)| tid == excluded)
                    .map(|(_, w)| w.duration_ms())
                    .sum();
                base - held
            }
            None => base,
        }
    }
}

/// A typed assignment constraint.
///
/// # Purity
/// `evaluate` must be a pure function of its arguments. The allocator
/// calls it many times per search with no ordering guarantees.
pub trait ConstraintRule: Send + Sync + Debug {
    /// Constraint name (e.g., "skill-match").
    fn name(&self) -> &'static str;

    /// Hard or soft, with weight.
    fn kind(&self) -> ConstraintKind;

    /// Evaluates the candidate pair against the roster-so-far.
    fn evaluate(&self, task: &Task, worker: &Worker, ctx: &PairContext<'_>) -> Evaluation;

    /// Rule description.
    fn description(&self) -> &'static str {
        self.name()
    }
}

/// One rule's verdict for a pair, as surfaced by diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintReport {
    /// Constraint name.
    pub constraint: String,
    /// Whether the constraint is hard.
    pub hard: bool,
    /// Whether it held for the pair.
    pub satisfied: bool,
    /// Weighted penalty (soft rules; zero otherwise).
    pub penalty: f64,
}
