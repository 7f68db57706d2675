//! Roster (solution) model.
//!
//! A roster is a complete distribution of tasks over workers for one
//! planning run: who takes what, which soft constraints gave way, and
//! which tasks could not be placed at all.

use serde::{Deserialize, Serialize};

use super::TimeWindow;

/// A committed distribution of tasks over workers.
///
/// Produced by the allocator, superseded (never mutated in place) by the
/// rebalancer. Generation numbers increase by one per committed roster.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Roster {
    /// Task-to-workers assignments.
    pub entries: Vec<RosterEntry>,
    /// Monotonically increasing roster version.
    pub generation: u64,
    /// Total objective: soft-constraint penalty plus fairness variance.
    pub objective: f64,
    /// Soft constraints that gave way, with their penalties.
    pub violations: Vec<SoftViolation>,
    /// Tasks no eligible worker combination could cover.
    pub unassigned: Vec<UnassignedTask>,
    /// How the result was obtained.
    pub quality: PlanQuality,
}

/// One task's assignment: the ordered workers covering it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    /// Assigned task ID.
    pub task_id: String,
    /// Workers covering the task, in selection order.
    /// Length equals the task's required worker count.
    pub worker_ids: Vec<String>,
    /// Task window (denormalized for overlap queries).
    pub window: TimeWindow,
}

/// A soft constraint that was violated by an assignment pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftViolation {
    /// Name of the violated constraint.
    pub constraint: String,
    /// Task side of the pair.
    pub task_id: String,
    /// Worker side of the pair.
    pub worker_id: String,
    /// Weighted penalty contributed to the objective.
    pub penalty: f64,
}

/// A task the engine could not place.
///
/// Surfaced explicitly; the engine never silently drops a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnassignedTask {
    /// The task that could not be covered.
    pub task_id: String,
    /// Names of the hard constraints that blocked every candidate.
    pub blocking: Vec<String>,
    /// Human-readable summary.
    pub message: String,
}

/// How a roster was produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanQuality {
    /// Certified by exact matching on a small instance.
    Exact,
    /// Greedy seed plus local-search improvement, run to convergence.
    #[default]
    Heuristic,
    /// Search aborted by the iteration budget; best effort, not converged.
    BudgetExhausted,
}

impl RosterEntry {
    /// Creates a new entry.
    pub fn new(task_id: impl Into<String>, worker_ids: Vec<String>, window: TimeWindow) -> Self {
        Self {
            task_id: task_id.into(),
            worker_ids,
            window,
        }
    }

    /// Whether the entry includes a given worker.
    pub fn has_worker(&self, worker_id: &str) -> bool {
        self.worker_ids.iter().any(|w| w == worker_id)
    }

    /// Load this entry puts on each of its workers (ms).
    #[inline]
    pub fn duration_ms(&self) -> i64 {
        self.window.duration_ms()
    }
}

impl Roster {
    /// Creates an empty roster at the given generation.
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            ..Self::default()
        }
    }

    /// Adds an entry.
    pub fn add_entry(&mut self, entry: RosterEntry) {
        self.entries.push(entry);
    }

    /// Finds the entry for a task.
    pub fn entry_for_task(&self, task_id: &str) -> Option<&RosterEntry> {
        self.entries.iter().find(|e| e.task_id == task_id)
    }

    /// All entries a worker appears in.
    pub fn entries_for_worker(&self, worker_id: &str) -> Vec<&RosterEntry> {
        self.entries
            .iter()
            .filter(|e| e.has_worker(worker_id))
            .collect()
    }

    /// Total assigned load for a worker (ms).
    pub fn assigned_load_ms(&self, worker_id: &str) -> i64 {
        self.entries_for_worker(worker_id)
            .iter()
            .map(|e| e.duration_ms())
            .sum()
    }

    /// Whether every task handed to the engine was placed.
    pub fn is_fully_assigned(&self) -> bool {
        self.unassigned.is_empty()
    }

    /// Number of entries.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}
