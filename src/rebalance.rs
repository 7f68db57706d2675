//! Incremental repair of a committed roster.
//!
//! Given a prior roster and a change event, produces a new generation
//! that restores feasibility while disturbing as few existing
//! assignments as possible: only entries invalidated by the change are
//! released and re-planned, and the improvement pass is scoped to tasks
//! touching the change's time windows or skills.
//!
//! # States
//! A repair runs `Stable → Repairing → Stable`, or ends `Degraded` when
//! one or more tasks cannot be covered; those are surfaced exactly like
//! the allocator's unassigned tasks, and untouched entries are preserved
//! verbatim.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::allocator::{order_tasks, Allocator, Lookup, PlanState};
use crate::constraints::PairContext;
use crate::engine::CancelToken;
use crate::error::EngineError;
use crate::ledger::FairnessLedger;
use crate::models::{PlanQuality, Roster, RosterEntry, Task, TimeWindow, UnassignedTask, Worker};

/// An incremental change to the planning inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChangeEvent {
    /// A new task entered the pool.
    TaskAdded(Task),
    /// A task was cancelled; its assignment is dropped.
    TaskCancelled(String),
    /// A task was edited; its assignment is re-planned.
    TaskChanged(Task),
    /// A worker left the pool; their assignments are re-planned.
    WorkerUnavailable(String),
    /// A worker's skills, availability, or load cap changed; their
    /// assignments are kept where still feasible.
    WorkerChanged(Worker),
}

/// Outcome state of a repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepairState {
    /// Feasibility restored for every task.
    Stable,
    /// One or more tasks remain uncovered; see `Roster::unassigned`.
    Degraded,
}

/// Result of a repair: the next-generation roster and its state.
#[derive(Debug, Clone)]
pub struct Repair {
    /// The repaired roster, generation = input generation + 1.
    pub roster: Roster,
    /// Whether feasibility was fully restored.
    pub state: RepairState,
}

/// Time windows and skills a change touches, used to scope the repair.
struct ChangeScope {
    windows: Vec<TimeWindow>,
    skills: BTreeSet<String>,
}

impl ChangeScope {
    fn touches(&self, task: &Task) -> bool {
        self.windows.iter().any(|w| w.overlaps(&task.window))
            || task.required_skills.iter().any(|s| self.skills.contains(s))
    }
}

/// Repairs rosters against change events, reusing the allocator's
/// seeding and improvement machinery on the affected subset.
#[derive(Debug)]
pub struct Rebalancer<'a> {
    allocator: &'a Allocator,
}

impl<'a> Rebalancer<'a> {
    /// Creates a rebalancer over an allocator.
    pub fn new(allocator: &'a Allocator) -> Self {
        Self { allocator }
    }

    /// Applies a change event to a committed roster.
    ///
    /// `tasks` and `workers` are the snapshot the prior roster was planned
    /// against; the event is applied on top of them. The ledger is read
    /// only.
    pub fn repair(
        &self,
        tasks: &[Task],
        workers: &[Worker],
        ledger: &FairnessLedger,
        prior: &Roster,
        event: &ChangeEvent,
        cancel: &CancelToken,
    ) -> Result<Repair, EngineError> {
        debug!(
            generation = prior.generation,
            ?event,
            "repairing roster"
        );

        let (next_tasks, next_workers) = apply_event(tasks, workers, event);
        let scope = change_scope(event, tasks, workers, prior);
        let lookup = Lookup::new(&next_tasks, &next_workers);

        // Keep every entry the change does not invalidate.
        let force_release: Option<&str> = match event {
            ChangeEvent::TaskChanged(t) => Some(t.id.as_str()),
            _ => None,
        };
        let mut kept: Vec<RosterEntry> = Vec::new();
        let mut released: BTreeSet<String> = BTreeSet::new();
        for entry in &prior.entries {
            let Some(task) = lookup.tasks.get(entry.task_id.as_str()) else {
                continue; // task cancelled: assignment dropped
            };
            let invalidated = force_release == Some(entry.task_id.as_str())
                || entry
                    .worker_ids
                    .iter()
                    .any(|w| !lookup.workers_by_id.contains_key(w.as_str()))
                || entry.worker_ids.len() != task.required_workers as usize
                || entry.window != task.window;
            if invalidated {
                released.insert(entry.task_id.clone());
            } else {
                kept.push(entry.clone());
            }
        }

        let mut state = PlanState::new(&next_workers, ledger);
        for entry in &kept {
            state.charge_entry(entry);
        }

        // A changed worker keeps assignments only where still feasible.
        if let ChangeEvent::WorkerChanged(changed) = event {
            let mut still_kept = Vec::with_capacity(kept.len());
            for entry in kept {
                let feasible = match lookup.tasks.get(entry.task_id.as_str()) {
                    Some(&task) if entry.has_worker(&changed.id) => {
                        let ctx = PairContext::excluding(
                            &state.intervals,
                            &state.loads,
                            &entry.task_id,
                        );
                        self.allocator
                            .constraints()
                            .first_hard_failure(task, changed, &ctx)
                            .is_none()
                    }
                    _ => true,
                };
                if feasible {
                    still_kept.push(entry);
                } else {
                    for worker_id in &entry.worker_ids {
                        state.release(worker_id, &entry.task_id);
                    }
                    released.insert(entry.task_id.clone());
                }
            }
            kept = still_kept;
        }

        // Tasks to (re)plan: released entries, the event's own task, and
        // previously unassigned tasks the change could have unblocked.
        let mut replan: BTreeSet<String> = released.clone();
        match event {
            ChangeEvent::TaskAdded(t) | ChangeEvent::TaskChanged(t) => {
                replan.insert(t.id.clone());
            }
            _ => {}
        }
        let mut unassigned: Vec<UnassignedTask> = Vec::new();
        for unmet in &prior.unassigned {
            match lookup.tasks.get(unmet.task_id.as_str()) {
                Some(&task) if scope.touches(task) => {
                    replan.insert(unmet.task_id.clone());
                }
                Some(_) => unassigned.push(unmet.clone()),
                None => {} // unassigned task was cancelled
            }
        }

        let replan_tasks: Vec<&Task> = order_tasks(&next_tasks)
            .into_iter()
            .filter(|t| replan.contains(&t.id))
            .collect();

        let mut entries = kept;
        let mut placed: BTreeSet<String> = BTreeSet::new();
        for &task in &replan_tasks {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            match self.allocator.assign_task(task, &lookup, &mut state, ledger) {
                Ok(worker_ids) => {
                    placed.insert(task.id.clone());
                    entries.push(RosterEntry::new(&task.id, worker_ids, task.window));
                }
                Err(unmet) => unassigned.push(unmet),
            }
        }

        // No-op change: nothing released, nothing to replan. The prior
        // entries stand unchanged under the next generation.
        let quality = if replan_tasks.is_empty() && released.is_empty() {
            prior.quality
        } else {
            // Improvement scoped to the change: re-planned tasks plus kept
            // entries touching the same windows or skills.
            let mut affected = placed;
            for entry in &entries {
                if let Some(&task) = lookup.tasks.get(entry.task_id.as_str()) {
                    if scope.touches(task) {
                        affected.insert(entry.task_id.clone());
                    }
                }
            }
            let converged =
                self.allocator
                    .improve(&mut entries, &mut state, &affected, &lookup, cancel)?;
            if converged {
                PlanQuality::Heuristic
            } else {
                PlanQuality::BudgetExhausted
            }
        };

        let (objective, violations) = self.allocator.score(&entries, &lookup, &state);
        let roster = Roster {
            entries,
            generation: prior.generation + 1,
            objective,
            violations,
            unassigned,
            quality,
        };
        let repair_state = if roster.unassigned.is_empty() {
            RepairState::Stable
        } else {
            RepairState::Degraded
        };
        debug!(
            generation = roster.generation,
            state = ?repair_state,
            objective = roster.objective,
            "repair finished"
        );
        Ok(Repair {
            roster,
            state: repair_state,
        })
    }
}

/// The task and worker sets after applying the event.
fn apply_event(
    tasks: &[Task],
    workers: &[Worker],
    event: &ChangeEvent,
) -> (Vec<Task>, Vec<Worker>) {
    let mut next_tasks = tasks.to_vec();
    let mut next_workers = workers.to_vec();
    match event {
        ChangeEvent::TaskAdded(task) => {
            next_tasks.retain(|t| t.id != task.id);
            next_tasks.push(task.clone());
        }
        ChangeEvent::TaskCancelled(task_id) => {
            next_tasks.retain(|t| &t.id != task_id);
        }
        ChangeEvent::TaskChanged(task) => {
            match next_tasks.iter_mut().find(|t| t.id == task.id) {
                Some(slot) => *slot = task.clone(),
                None => next_tasks.push(task.clone()),
            }
        }
        ChangeEvent::WorkerUnavailable(worker_id) => {
            next_workers.retain(|w| &w.id != worker_id);
        }
        ChangeEvent::WorkerChanged(worker) => {
            match next_workers.iter_mut().find(|w| w.id == worker.id) {
                Some(slot) => *slot = worker.clone(),
                None => next_workers.push(worker.clone()),
            }
        }
    }
    (next_tasks, next_workers)
}

/// Windows and skills the change touches, for affected-set scoping.
fn change_scope(
    event: &ChangeEvent,
    tasks: &[Task],
    workers: &[Worker],
    prior: &Roster,
) -> ChangeScope {
    let mut windows = Vec::new();
    let mut skills = BTreeSet::new();

    fn add_task(task: &Task, windows: &mut Vec<TimeWindow>, skills: &mut BTreeSet<String>) {
        windows.push(task.window);
        skills.extend(task.required_skills.iter().cloned());
    }

    match event {
        ChangeEvent::TaskAdded(task) => add_task(task, &mut windows, &mut skills),
        ChangeEvent::TaskCancelled(task_id) => {
            if let Some(task) = tasks.iter().find(|t| &t.id == task_id) {
                add_task(task, &mut windows, &mut skills);
            }
        }
        ChangeEvent::TaskChanged(task) => {
            add_task(task, &mut windows, &mut skills);
            if let Some(old) = tasks.iter().find(|t| t.id == task.id) {
                add_task(old, &mut windows, &mut skills);
            }
        }
        ChangeEvent::WorkerUnavailable(worker_id) | ChangeEvent::WorkerChanged(Worker { id: worker_id, .. }) => {
            for entry in prior.entries_for_worker(worker_id) {
                windows.push(entry.window);
            }
            if let Some(old) = workers.iter().find(|w| &w.id == worker_id) {
                skills.extend(old.skills.iter().cloned());
            }
            if let ChangeEvent::WorkerChanged(new) = event {
                skills.extend(new.skills.iter().cloned());
            }
        }
    }

    ChangeScope { windows, skills }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::HOUR_MS;

    fn hours(h: i64) -> i64 {
        h * HOUR_MS
    }

    fn entry(task_id: &str, worker_id: &str, start_h: i64, end_h: i64) -> RosterEntry {
        RosterEntry::new(
            task_id,
            vec![worker_id.to_string()],
            TimeWindow::new(hours(start_h), hours(end_h)),
        )
    }

    /// T1 [0,2) and T2 [3,5) on W1; T3 [6,8) on W2.
    fn base_snapshot() -> (Vec<Task>, Vec<Worker>, Roster) {
        let tasks = vec![
            Task::new("T1", 0, hours(2)),
            Task::new("T2", hours(3), hours(5)),
            Task::new("T3", hours(6), hours(8)),
        ];
        let workers = vec![Worker::new("W1"), Worker::new("W2")];
        let mut prior = Roster::new(1);
        prior.add_entry(entry("T1", "W1", 0, 2));
        prior.add_entry(entry("T2", "W1", 3, 5));
        prior.add_entry(entry("T3", "W2", 6, 8));
        (tasks, workers, prior)
    }

    #[test]
    fn test_task_added() {
        let (tasks, workers, prior) = base_snapshot();
        let allocator = Allocator::new();
        let rebalancer = Rebalancer::new(&allocator);

        let event = ChangeEvent::TaskAdded(Task::new("T4", hours(9), hours(11)));
        let repair = rebalancer
            .repair(&tasks, &workers, &FairnessLedger::new(), &prior, &event, &CancelToken::new())
            .unwrap();

        assert_eq!(repair.state, RepairState::Stable);
        assert_eq!(repair.roster.generation, 2);
        assert!(repair.roster.entry_for_task("T4").is_some());
        // Prior entries survive
        for task_id in ["T1", "T2", "T3"] {
            assert!(repair.roster.entry_for_task(task_id).is_some());
        }
    }

    #[test]
    fn test_task_cancelled_leaves_others_untouched() {
        let (tasks, workers, prior) = base_snapshot();
        let allocator = Allocator::new();
        let rebalancer = Rebalancer::new(&allocator);

        let event = ChangeEvent::TaskCancelled("T2".into());
        let repair = rebalancer
            .repair(&tasks, &workers, &FairnessLedger::new(), &prior, &event, &CancelToken::new())
            .unwrap();

        assert_eq!(repair.state, RepairState::Stable);
        assert!(repair.roster.entry_for_task("T2").is_none());
        assert_eq!(
            repair.roster.entry_for_task("T1").unwrap().worker_ids,
            vec!["W1"]
        );
        assert_eq!(
            repair.roster.entry_for_task("T3").unwrap().worker_ids,
            vec!["W2"]
        );
    }

    #[test]
    fn test_worker_unavailable_reassigns_their_tasks() {
        // A worker holding two assignments drops out; both move to other
        // qualified workers, unaffected entries untouched.
        let (tasks, workers, prior) = base_snapshot();
        let allocator = Allocator::new();
        let rebalancer = Rebalancer::new(&allocator);

        let event = ChangeEvent::WorkerUnavailable("W1".into());
        let repair = rebalancer
            .repair(&tasks, &workers, &FairnessLedger::new(), &prior, &event, &CancelToken::new())
            .unwrap();

        assert_eq!(repair.state, RepairState::Stable);
        assert_eq!(
            repair.roster.entry_for_task("T1").unwrap().worker_ids,
            vec!["W2"]
        );
        assert_eq!(
            repair.roster.entry_for_task("T2").unwrap().worker_ids,
            vec!["W2"]
        );
        // T3 untouched: same worker as before
        assert_eq!(
            repair.roster.entry_for_task("T3").unwrap().worker_ids,
            vec!["W2"]
        );
    }

    #[test]
    fn test_worker_unavailable_degraded() {
        // The only remaining worker lacks the skill: both orphaned tasks
        // surface as degraded with the blocker named.
        let tasks = vec![
            Task::new("T1", 0, hours(2)).with_skill("crane"),
            Task::new("T2", hours(3), hours(5)).with_skill("crane"),
            Task::new("T3", hours(6), hours(8)),
        ];
        let workers = vec![
            Worker::new("W1").with_skill("crane"),
            Worker::new("W2"),
        ];
        let mut prior = Roster::new(4);
        prior.add_entry(entry("T1", "W1", 0, 2));
        prior.add_entry(entry("T2", "W1", 3, 5));
        prior.add_entry(entry("T3", "W2", 6, 8));

        let allocator = Allocator::new();
        let rebalancer = Rebalancer::new(&allocator);
        let event = ChangeEvent::WorkerUnavailable("W1".into());
        let repair = rebalancer
            .repair(&tasks, &workers, &FairnessLedger::new(), &prior, &event, &CancelToken::new())
            .unwrap();

        assert_eq!(repair.state, RepairState::Degraded);
        assert_eq!(repair.roster.generation, 5);
        assert_eq!(repair.roster.unassigned.len(), 2);
        for unmet in &repair.roster.unassigned {
            assert!(unmet.blocking.contains(&"skill-match".to_string()));
        }
        // The unaffected entry is preserved verbatim
        assert_eq!(
            repair.roster.entry_for_task("T3").unwrap().worker_ids,
            vec!["W2"]
        );
    }

    #[test]
    fn test_noop_change_only_bumps_generation() {
        let (tasks, workers, prior) = base_snapshot();
        let allocator = Allocator::new();
        let rebalancer = Rebalancer::new(&allocator);

        // Re-submitting W1 unchanged is a no-op delta
        let event = ChangeEvent::WorkerChanged(Worker::new("W1"));
        let repair = rebalancer
            .repair(&tasks, &workers, &FairnessLedger::new(), &prior, &event, &CancelToken::new())
            .unwrap();

        assert_eq!(repair.state, RepairState::Stable);
        assert_eq!(repair.roster.generation, prior.generation + 1);
        assert_eq!(repair.roster.entries, prior.entries);
        assert_eq!(repair.roster.quality, prior.quality);
    }

    #[test]
    fn test_task_changed_replans_it() {
        let (tasks, workers, prior) = base_snapshot();
        let allocator = Allocator::new();
        let rebalancer = Rebalancer::new(&allocator);

        // T2 moves to overlap T1, so it cannot stay on W1
        let changed = tasks[1].revise(|t| t.window = TimeWindow::new(0, hours(2)));
        let event = ChangeEvent::TaskChanged(changed);
        let repair = rebalancer
            .repair(&tasks, &workers, &FairnessLedger::new(), &prior, &event, &CancelToken::new())
            .unwrap();

        assert_eq!(repair.state, RepairState::Stable);
        let t2 = repair.roster.entry_for_task("T2").unwrap();
        assert_eq!(t2.window, TimeWindow::new(0, hours(2)));
        assert_eq!(t2.worker_ids, vec!["W2"]);
        // T1 stays where it was
        assert_eq!(
            repair.roster.entry_for_task("T1").unwrap().worker_ids,
            vec!["W1"]
        );
    }

    #[test]
    fn test_worker_changed_releases_infeasible_entries() {
        let tasks = vec![
            Task::new("T1", 0, hours(2)).with_skill("crane"),
            Task::new("T2", hours(6), hours(8)),
        ];
        let workers = vec![
            Worker::new("W1").with_skill("crane"),
            Worker::new("W2").with_skill("crane"),
        ];
        let mut prior = Roster::new(1);
        prior.add_entry(entry("T1", "W1", 0, 2));
        prior.add_entry(entry("T2", "W1", 6, 8));

        let allocator = Allocator::new();
        let rebalancer = Rebalancer::new(&allocator);
        // W1 loses the crane skill: T1 must move, T2 may stay
        let event = ChangeEvent::WorkerChanged(Worker::new("W1"));
        let repair = rebalancer
            .repair(&tasks, &workers, &FairnessLedger::new(), &prior, &event, &CancelToken::new())
            .unwrap();

        assert_eq!(repair.state, RepairState::Stable);
        assert_eq!(
            repair.roster.entry_for_task("T1").unwrap().worker_ids,
            vec!["W2"]
        );
        assert_eq!(
            repair.roster.entry_for_task("T2").unwrap().worker_ids,
            vec!["W1"]
        );
    }

    #[test]
    fn test_cancellation_retries_blocked_unassigned() {
        // T1 holds the only worker over [0,2); T2 over the same window was
        // unassigned. Cancelling T1 frees the capacity and T2 gets placed.
        let tasks = vec![
            Task::new("T1", 0, hours(2)),
            Task::new("T2", 0, hours(2)),
        ];
        let workers = vec![Worker::new("W1")];
        let mut prior = Roster::new(1);
        prior.add_entry(entry("T1", "W1", 0, 2));
        prior.unassigned.push(UnassignedTask {
            task_id: "T2".into(),
            blocking: vec!["no-overlap".into()],
            message: "no eligible worker for slot 1 of 1".into(),
        });

        let allocator = Allocator::new();
        let rebalancer = Rebalancer::new(&allocator);
        let event = ChangeEvent::TaskCancelled("T1".into());
        let repair = rebalancer
            .repair(&tasks, &workers, &FairnessLedger::new(), &prior, &event, &CancelToken::new())
            .unwrap();

        assert_eq!(repair.state, RepairState::Stable);
        assert_eq!(
            repair.roster.entry_for_task("T2").unwrap().worker_ids,
            vec!["W1"]
        );
    }

    #[test]
    fn test_unrelated_unassigned_is_carried() {
        // The unassigned task shares no window or skill with the change,
        // so it is carried over untouched rather than retried.
        let (tasks, workers, mut prior) = base_snapshot();
        let mut tasks = tasks;
        tasks.push(Task::new("T9", hours(20), hours(22)).with_skill("crane"));
        prior.unassigned.push(UnassignedTask {
            task_id: "T9".into(),
            blocking: vec!["skill-match".into()],
            message: "no eligible worker for slot 1 of 1".into(),
        });

        let allocator = Allocator::new();
        let rebalancer = Rebalancer::new(&allocator);
        let event = ChangeEvent::TaskAdded(Task::new("T4", hours(9), hours(11)));
        let repair = rebalancer
            .repair(&tasks, &workers, &FairnessLedger::new(), &prior, &event, &CancelToken::new())
            .unwrap();

        assert_eq!(repair.state, RepairState::Degraded);
        assert_eq!(repair.roster.unassigned.len(), 1);
        assert_eq!(repair.roster.unassigned[0].task_id, "T9");
    }

    #[test]
    fn test_repair_is_deterministic() {
        let (tasks, workers, prior) = base_snapshot();
        let allocator = Allocator::new();
        let rebalancer = Rebalancer::new(&allocator);
        let event = ChangeEvent::WorkerUnavailable("W1".into());

        let a = rebalancer
            .repair(&tasks, &workers, &FairnessLedger::new(), &prior, &event, &CancelToken::new())
            .unwrap();
        let b = rebalancer
            .repair(&tasks, &workers, &FairnessLedger::new(), &prior, &event, &CancelToken::new())
            .unwrap();
        assert_eq!(a.roster.entries, b.roster.entries);
    }
}
