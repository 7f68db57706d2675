//! Roster persistence contract.
//!
//! The engine computes; stores persist. A store hands out versioned
//! snapshots and accepts staged commits of a roster plus its ledger
//! delta. A commit against a stale version is rejected as a conflict —
//! the caller reloads and re-plans, never blind-overwrites.
//!
//! [`MemoryStore`] is the reference implementation, used by tests and
//! embeddings that keep state in process.

use crate::engine::PlanningSnapshot;
use crate::error::EngineError;
use crate::ledger::{FairnessLedger, LedgerDelta};
use crate::models::{Roster, Task, Worker};

/// Result of a staged commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Commit applied; the store is now at this version.
    Ack {
        /// New store version.
        version: u64,
    },
    /// The snapshot the roster was planned against is stale.
    Conflict {
        /// Version the caller planned against.
        expected: u64,
        /// Version the store currently holds.
        actual: u64,
    },
}

impl CommitOutcome {
    /// Converts a conflict into [`EngineError::StaleSnapshot`].
    pub fn ack_or_stale(self) -> Result<u64, EngineError> {
        match self {
            CommitOutcome::Ack { version } => Ok(version),
            CommitOutcome::Conflict { expected, actual } => Err(EngineError::StaleSnapshot {
                found: expected,
                current: actual,
            }),
        }
    }
}

/// Read/write contract to external persistence.
///
/// Implementations serialize commits; the engine itself never holds a
/// store across a planning run — it reads a snapshot before and writes
/// a result after.
pub trait RosterStore {
    /// Reads an immutable snapshot of tasks, workers, and ledger.
    fn load_snapshot(&self) -> Result<PlanningSnapshot, EngineError>;

    /// Commits a roster and its ledger delta atomically.
    ///
    /// `snapshot_version` is the version the roster was planned against;
    /// a mismatch yields [`CommitOutcome::Conflict`] and writes nothing.
    fn commit(
        &mut self,
        snapshot_version: u64,
        roster: &Roster,
        delta: &LedgerDelta,
    ) -> Result<CommitOutcome, EngineError>;
}

/// In-process store with optimistic versioning and commit history.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tasks: Vec<Task>,
    workers: Vec<Worker>,
    ledger: FairnessLedger,
    version: u64,
    history: Vec<(Roster, LedgerDelta)>,
}

impl MemoryStore {
    /// Creates a store over the given tasks and workers.
    pub fn new(tasks: Vec<Task>, workers: Vec<Worker>) -> Self {
        Self {
            tasks,
            workers,
            ..Self::default()
        }
    }

    /// The currently committed roster, if any.
    pub fn current(&self) -> Option<&Roster> {
        self.history.last().map(|(roster, _)| roster)
    }

    /// Current store version.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The ledger as committed so far.
    pub fn ledger(&self) -> &FairnessLedger {
        &self.ledger
    }

    /// Replaces the task set (external edit path).
    pub fn set_tasks(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
        self.version += 1;
    }

    /// Replaces the worker pool (external edit path).
    pub fn set_workers(&mut self, workers: Vec<Worker>) {
        self.workers = workers;
        self.version += 1;
    }

    /// Reverses the most recent commit: the roster is retired and its
    /// ledger delta reverted, atomically. Returns the retired roster.
    pub fn undo_commit(&mut self) -> Option<Roster> {
        let (roster, delta) = self.history.pop()?;
        self.ledger.revert(&delta);
        self.version += 1;
        Some(roster)
    }
}

impl RosterStore for MemoryStore {
    fn load_snapshot(&self) -> Result<PlanningSnapshot, EngineError> {
        Ok(PlanningSnapshot {
            tasks: self.tasks.clone(),
            workers: self.workers.clone(),
            ledger: self.ledger.clone(),
            version: self.version,
        })
    }

    fn commit(
        &mut self,
        snapshot_version: u64,
        roster: &Roster,
        delta: &LedgerDelta,
    ) -> Result<CommitOutcome, EngineError> {
        if snapshot_version != self.version {
            return Ok(CommitOutcome::Conflict {
                expected: snapshot_version,
                actual: self.version,
            });
        }
        self.ledger.commit(delta);
        self.history.push((roster.clone(), delta.clone()));
        self.version += 1;
        Ok(CommitOutcome::Ack {
            version: self.version,
        })
    }
}
