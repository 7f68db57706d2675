//! Fairness ledger.
//!
//! Tracks committed load per worker so planning can bias new assignments
//! toward workers who have carried less. Updated only by successful
//! commits — speculative trial assignments during search never touch it.
//!
//! # Idempotency
//! Deltas carry a unique id. Committing the same delta twice is a no-op,
//! and a revert only applies to a previously committed id, so callers
//! with at-least-once delivery cannot drift the totals.
//!
//! # Concurrency
//! The ledger is a single-writer type: commits require `&mut self` and the
//! version bumps on every effective change, giving stores an optimistic
//! compare-and-commit hook. Wrap it in a mutex for shared writers.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::constraints::HOUR_MS;
use crate::models::{Roster, Task};

/// Per-worker committed load with idempotent delta application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FairnessLedger {
    loads: BTreeMap<String, i64>,
    applied: BTreeSet<String>,
    version: u64,
}

/// A signed load adjustment, applied atomically and exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerDelta {
    /// Unique delta identifier (idempotency key).
    pub delta_id: String,
    adjustments: BTreeMap<String, i64>,
}

impl LedgerDelta {
    /// Creates an empty delta.
    pub fn new(delta_id: impl Into<String>) -> Self {
        Self {
            delta_id: delta_id.into(),
            adjustments: BTreeMap::new(),
        }
    }

    /// Builder: accumulates an adjustment for a worker (ms).
    pub fn with_adjustment(mut self, worker_id: impl Into<String>, load_ms: i64) -> Self {
        self.add(worker_id, load_ms);
        self
    }

    /// Accumulates an adjustment for a worker (ms).
    pub fn add(&mut self, worker_id: impl Into<String>, load_ms: i64) {
        *self.adjustments.entry(worker_id.into()).or_insert(0) += load_ms;
    }

    /// The full load delta of a roster: each entry's duration charged to
    /// each of its workers. Keyed by the roster's generation.
    pub fn for_roster(roster: &Roster) -> Self {
        let mut delta = Self::new(format!("roster-gen-{}", roster.generation));
        for entry in &roster.entries {
            for worker_id in &entry.worker_ids {
                delta.add(worker_id.clone(), entry.duration_ms());
            }
        }
        delta
    }

    /// Per-worker adjustments.
    pub fn adjustments(&self) -> &BTreeMap<String, i64> {
        &self.adjustments
    }

    /// Whether the delta adjusts nothing.
    pub fn is_empty(&self) -> bool {
        self.adjustments.is_empty()
    }
}

impl FairnessLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed load for a worker (ms). Unknown workers carry zero.
    pub fn load(&self, worker_id: &str) -> i64 {
        self.loads.get(worker_id).copied().unwrap_or(0)
    }

    /// All committed loads.
    pub fn loads(&self) -> &BTreeMap<String, i64> {
        &self.loads
    }

    /// Load the worker would carry if also assigned the task (ms).
    pub fn projected_load(&self, worker_id: &str, task: &Task) -> i64 {
        self.load(worker_id) + task.duration_ms()
    }

    /// Applies a delta. Returns `false` (and changes nothing) when the
    /// delta id was already committed.
    pub fn commit(&mut self, delta: &LedgerDelta) -> bool {
        if !self.applied.insert(delta.delta_id.clone()) {
            return false;
        }
        for (worker_id, load_ms) in &delta.adjustments {
            *self.loads.entry(worker_id.clone()).or_insert(0) += load_ms;
        }
        self.version += 1;
        true
    }

    /// Reverses a previously committed delta. Returns `false` (and changes
    /// nothing) when the delta id was never committed or already reverted.
    pub fn revert(&mut self, delta: &LedgerDelta) -> bool {
        if !self.applied.remove(&delta.delta_id) {
            return false;
        }
        for (worker_id, load_ms) in &delta.adjustments {
            *self.loads.entry(worker_id.clone()).or_insert(0) -= load_ms;
        }
        self.version += 1;
        true
    }

    /// Whether a delta id is currently committed.
    pub fn is_applied(&self, delta_id: &str) -> bool {
        self.applied.contains(delta_id)
    }

    /// Ledger version; bumps on every effective commit or revert.
    pub fn version(&self) -> u64 {
        self.version
    }
}

/// Variance of loads (hours squared).
///
/// Dispersion of assigned load across workers; one of the two objective
/// terms. The caller supplies loads in a deterministic worker order.
pub fn fairness_variance(loads: impl IntoIterator<Item = i64>) -> f64 {
    let hours: Vec<f64> = loads
        .into_iter()
        .map(|ms| ms as f64 / HOUR_MS as f64)
        .collect();
    if hours.is_empty() {
        return 0.0;
    }
    let mean = hours.iter().sum::<f64>() / hours.len() as f64;
    hours.iter().map(|h| (h - mean) * (h - mean)).sum::<f64>() / hours.len() as f64
}
