//! Engine facade: plan, rebalance, explain.
//!
//! One planning run is a synchronous computation over an immutable
//! [`PlanningSnapshot`]. Independent runs may execute in parallel on
//! their own snapshots; the only shared state is the ledger, which is
//! written solely through staged commits after a roster is accepted —
//! never from inside a run. Cancelling a run therefore leaves no partial
//! ledger write behind.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::allocator::{Allocator, AllocatorConfig, Lookup, PlanState};
use crate::constraints::{ConstraintReport, ConstraintSet, PairContext};
use crate::error::EngineError;
use crate::ledger::FairnessLedger;
use crate::models::{Roster, Task, Worker};
use crate::rebalance::{ChangeEvent, Rebalancer, Repair};
use crate::validation::validate_input;

/// Immutable input to one planning run.
///
/// Loaded from a store, never mutated by the engine. The version ties a
/// produced roster back to the store state it was planned against, so a
/// concurrent modification surfaces as a commit conflict instead of a
/// blind overwrite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningSnapshot {
    /// Tasks to distribute.
    pub tasks: Vec<Task>,
    /// Worker pool.
    pub workers: Vec<Worker>,
    /// Committed load history.
    pub ledger: FairnessLedger,
    /// Store version this snapshot was read at.
    pub version: u64,
}

impl PlanningSnapshot {
    /// Creates a snapshot at version 0 with an empty ledger.
    pub fn new(tasks: Vec<Task>, workers: Vec<Worker>) -> Self {
        Self {
            tasks,
            workers,
            ledger: FairnessLedger::new(),
            version: 0,
        }
    }

    /// Sets the ledger.
    pub fn with_ledger(mut self, ledger: FairnessLedger) -> Self {
        self.ledger = ledger;
        self
    }

    /// Sets the version.
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }
}

/// Shared cancellation flag for an in-flight planning run.
///
/// Clones share the flag. The search loops poll it and abort with
/// [`EngineError::Cancelled`]; since ledger writes are staged after the
/// run, a cancelled run commits nothing.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// A worker's constraint verdicts for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerExplanation {
    /// The worker the verdicts are about.
    pub worker_id: String,
    /// Whether this worker currently holds the task.
    pub assigned: bool,
    /// Every rule's verdict, in rule order.
    pub reports: Vec<ConstraintReport>,
}

/// The work-distribution engine.
///
/// # Example
/// ```
/// use workshare::engine::{CancelToken, Engine, PlanningSnapshot};
/// use workshare::models::{Task, Worker};
///
/// let snapshot = PlanningSnapshot::new(
///     vec![Task::new("T1", 0, 3_600_000)],
///     vec![Worker::new("W1")],
/// );
/// let roster = Engine::new().plan(&snapshot, &CancelToken::new()).unwrap();
/// assert!(roster.is_fully_assigned());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Engine {
    allocator: Allocator,
}

impl Engine {
    /// Creates an engine with the standard constraints and configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the constraint set.
    pub fn with_constraints(mut self, constraints: ConstraintSet) -> Self {
        self.allocator = self.allocator.with_constraints(constraints);
        self
    }

    /// Sets the allocator configuration.
    pub fn with_config(mut self, config: AllocatorConfig) -> Self {
        self.allocator = self.allocator.with_config(config);
        self
    }

    /// Plans a full roster for the snapshot.
    ///
    /// Validates the input first and reports all structural problems
    /// per entity. The produced roster carries generation
    /// `snapshot.version + 1`; committing it (and its ledger delta) is
    /// the caller's step, through a store.
    pub fn plan(
        &self,
        snapshot: &PlanningSnapshot,
        cancel: &CancelToken,
    ) -> Result<Roster, EngineError> {
        validate_input(&snapshot.tasks, &snapshot.workers).map_err(EngineError::Validation)?;
        self.allocator.allocate(
            &snapshot.tasks,
            &snapshot.workers,
            &snapshot.ledger,
            snapshot.version + 1,
            cancel,
        )
    }

    /// Repairs a committed roster after a change event.
    ///
    /// Minimally disruptive: only entries the change invalidates are
    /// re-planned, and improvement is scoped to tasks touching the
    /// change's windows or skills. The result's generation is
    /// `prior.generation + 1`.
    pub fn rebalance(
        &self,
        snapshot: &PlanningSnapshot,
        prior: &Roster,
        event: &ChangeEvent,
        cancel: &CancelToken,
    ) -> Result<Repair, EngineError> {
        Rebalancer::new(&self.allocator).repair(
            &snapshot.tasks,
            &snapshot.workers,
            &snapshot.ledger,
            prior,
            event,
            cancel,
        )
    }

    /// Constraint verdicts for a task against a roster.
    ///
    /// For an assigned task, reports each assigned worker. For an
    /// unassigned task, reports every worker in the pool, which names the
    /// rules keeping each of them out.
    pub fn explain(
        &self,
        snapshot: &PlanningSnapshot,
        roster: &Roster,
        task_id: &str,
    ) -> Vec<WorkerExplanation> {
        let lookup = Lookup::new(&snapshot.tasks, &snapshot.workers);
        let Some(&task) = lookup.tasks.get(task_id) else {
            return Vec::new();
        };

        let mut state = PlanState::new(&snapshot.workers, &snapshot.ledger);
        for entry in &roster.entries {
            state.charge_entry(entry);
        }

        let entry = roster.entry_for_task(task_id);
        let candidates: Vec<&Worker> = match entry {
            Some(e) => e
                .worker_ids
                .iter()
                .filter_map(|id| lookup.workers_by_id.get(id.as_str()).copied())
                .collect(),
            None => lookup.workers.iter().collect(),
        };

        debug!(task_id, candidates = candidates.len(), "explaining");
        candidates
            .into_iter()
            .map(|worker| {
                let ctx = PairContext::excluding(&state.intervals, &state.loads, task_id);
                WorkerExplanation {
                    worker_id: worker.id.clone(),
                    assigned: entry.map_or(false, |e| e.has_worker(&worker.id)),
                    reports: self.allocator.constraints().explain(task, worker, &ctx),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::HOUR_MS;
    use crate::validation::ValidationErrorKind;

    fn hours(h: i64) -> i64 {
        h * HOUR_MS
    }

    fn snapshot() -> PlanningSnapshot {
        PlanningSnapshot::new(
            vec![
                Task::new("T1", 0, hours(2)),
                Task::new("T2", hours(3), hours(5)),
            ],
            vec![Worker::new("W1"), Worker::new("W2")],
        )
    }

    #[test]
    fn test_plan_generation_follows_snapshot_version() {
        let snapshot = snapshot().with_version(6);
        let roster = Engine::new().plan(&snapshot, &CancelToken::new()).unwrap();
        assert_eq!(roster.generation, 7);
        assert!(roster.is_fully_assigned());
    }

    #[test]
    fn test_plan_rejects_invalid_input() {
        let snapshot = PlanningSnapshot::new(
            vec![Task::new("T1", 0, hours(1)), Task::new("T1", 0, hours(1))],
            vec![Worker::new("W1")],
        );
        let err = Engine::new()
            .plan(&snapshot, &CancelToken::new())
            .unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::DuplicateId));
    }

    #[test]
    fn test_rebalance_delegates() {
        let snapshot = snapshot();
        let engine = Engine::new();
        let roster = engine.plan(&snapshot, &CancelToken::new()).unwrap();

        let event = ChangeEvent::TaskAdded(Task::new("T3", hours(6), hours(8)));
        let repair = engine
            .rebalance(&snapshot, &roster, &event, &CancelToken::new())
            .unwrap();
        assert_eq!(repair.roster.generation, roster.generation + 1);
        assert!(repair.roster.entry_for_task("T3").is_some());
    }

    #[test]
    fn test_explain_assigned_task() {
        let snapshot = snapshot();
        let engine = Engine::new();
        let roster = engine.plan(&snapshot, &CancelToken::new()).unwrap();

        let explanations = engine.explain(&snapshot, &roster, "T1");
        assert_eq!(explanations.len(), 1);
        assert!(explanations[0].assigned);
        assert!(explanations[0].reports.iter().all(|r| r.satisfied));
    }

    #[test]
    fn test_explain_unassigned_task_names_blockers() {
        let snapshot = PlanningSnapshot::new(
            vec![
                Task::new("T1", 0, hours(2)).with_skill("crane"),
                Task::new("T2", 0, hours(2)),
            ],
            vec![
                Worker::new("W1").with_skill("crane"),
                Worker::new("W2"),
            ],
        );
        let engine = Engine::new();
        let roster = engine.plan(&snapshot, &CancelToken::new()).unwrap();

        // T9 is not part of the plan at all
        assert!(engine.explain(&snapshot, &roster, "T9").is_empty());

        // W2 cannot take T1: skill-match must be reported unsatisfied
        let mut no_crane = snapshot.clone();
        no_crane.tasks.push(Task::new("T3", 0, hours(2)).with_skill("crane"));
        // T3 overlaps T1, and only W1 has the skill → unassigned
        let roster = match engine.plan(&no_crane, &CancelToken::new()) {
            Ok(r) => r,
            Err(e) => panic!("unexpected: {e}"),
        };
        assert!(!roster.is_fully_assigned());
        let unassigned_id = &roster.unassigned[0].task_id;

        let explanations = engine.explain(&no_crane, &roster, unassigned_id);
        assert_eq!(explanations.len(), 2); // every worker reported
        let w2 = explanations
            .iter()
            .find(|e| e.worker_id == "W2")
            .unwrap();
        assert!(!w2.assigned);
        assert!(w2
            .reports
            .iter()
            .any(|r| r.constraint == "skill-match" && !r.satisfied));
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_cancelled_plan_aborts() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = Engine::new().plan(&snapshot(), &cancel).unwrap_err();
        assert!(matches!(err, EngineError::Cancelled));
    }

    #[test]
    fn test_plan_is_pure_against_snapshot() {
        let snapshot = snapshot();
        let engine = Engine::new();
        let before = snapshot.ledger.clone();
        let _ = engine.plan(&snapshot, &CancelToken::new()).unwrap();
        // The ledger inside the snapshot is untouched by planning
        assert_eq!(snapshot.ledger.version(), before.version());
        assert_eq!(snapshot.ledger.loads(), before.loads());
    }
}
