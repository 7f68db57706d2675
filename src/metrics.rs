//! Roster quality metrics.
//!
//! Computes distribution indicators from a produced roster and its
//! input tasks and workers.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Load per worker | Sum of assigned entry durations |
//! | Load spread | Max load minus min load |
//! | Fairness variance | Variance of loads (hours squared) |
//! | Fill rate | Filled slots / required slots |
//! | Unassigned count | Tasks the engine could not place |

use std::collections::BTreeMap;

use crate::ledger::fairness_variance;
use crate::models::{Roster, Task, Worker};

/// Distribution quality indicators for one roster.
///
/// Loads measure this roster only; committed history lives in the
/// ledger, not here.
#[derive(Debug, Clone)]
pub struct RosterMetrics {
    /// Assigned load per worker (ms), including idle workers at zero.
    pub load_by_worker: BTreeMap<String, i64>,
    /// Mean assigned load (ms).
    pub mean_load_ms: f64,
    /// Max minus min assigned load (ms).
    pub load_spread_ms: i64,
    /// Variance of assigned loads (hours squared).
    pub fairness_variance: f64,
    /// Fraction of required worker slots that were filled (0.0..1.0).
    pub fill_rate: f64,
    /// Number of tasks left unassigned.
    pub unassigned_count: usize,
}

impl RosterMetrics {
    /// Computes metrics from a roster and its inputs.
    pub fn calculate(roster: &Roster, tasks: &[Task], workers: &[Worker]) -> Self {
        let load_by_worker: BTreeMap<String, i64> = workers
            .iter()
            .map(|w| (w.id.clone(), roster.assigned_load_ms(&w.id)))
            .collect();

        let (mean_load_ms, load_spread_ms) = if load_by_worker.is_empty() {
            (0.0, 0)
        } else {
            let sum: i64 = load_by_worker.values().sum();
            let max = load_by_worker.values().max().copied().unwrap_or(0);
            let min = load_by_worker.values().min().copied().unwrap_or(0);
            (sum as f64 / load_by_worker.len() as f64, max - min)
        };

        let required_slots: u32 = tasks.iter().map(|t| t.required_workers).sum();
        let filled_slots: usize = roster.entries.iter().map(|e| e.worker_ids.len()).sum();
        let fill_rate = if required_slots == 0 {
            1.0
        } else {
            filled_slots as f64 / f64::from(required_slots)
        };

        Self {
            fairness_variance: fairness_variance(load_by_worker.values().copied()),
            load_by_worker,
            mean_load_ms,
            load_spread_ms,
            fill_rate,
            unassigned_count: roster.unassigned.len(),
        }
    }

    /// Whether the roster meets the given quality thresholds.
    pub fn meets_thresholds(&self, max_spread_ms: i64, min_fill_rate: f64) -> bool {
        self.load_spread_ms <= max_spread_ms && self.fill_rate >= min_fill_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::HOUR_MS;
    use crate::models::{RosterEntry, TimeWindow, UnassignedTask};

    fn hours(h: i64) -> i64 {
        h * HOUR_MS
    }

    fn sample() -> (Roster, Vec<Task>, Vec<Worker>) {
        let tasks = vec![
            Task::new("T1", 0, hours(4)),
            Task::new("T2", hours(5), hours(7)),
            Task::new("T3", hours(8), hours(10)),
        ];
        let workers = vec![Worker::new("W1"), Worker::new("W2"), Worker::new("W3")];
        let mut roster = Roster::new(1);
        roster.add_entry(RosterEntry::new(
            "T1",
            vec!["W1".into()],
            TimeWindow::new(0, hours(4)),
        ));
        roster.add_entry(RosterEntry::new(
            "T2",
            vec!["W2".into()],
            TimeWindow::new(hours(5), hours(7)),
        ));
        roster.add_entry(RosterEntry::new(
            "T3",
            vec!["W2".into()],
            TimeWindow::new(hours(8), hours(10)),
        ));
        (roster, tasks, workers)
    }

    #[test]
    fn test_loads_and_spread() {
        let (roster, tasks, workers) = sample();
        let metrics = RosterMetrics::calculate(&roster, &tasks, &workers);

        assert_eq!(metrics.load_by_worker["W1"], hours(4));
        assert_eq!(metrics.load_by_worker["W2"], hours(4));
        assert_eq!(metrics.load_by_worker["W3"], 0);
        assert_eq!(metrics.load_spread_ms, hours(4));
        assert!((metrics.mean_load_ms - hours(8) as f64 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_fill_rate_full() {
        let (roster, tasks, workers) = sample();
        let metrics = RosterMetrics::calculate(&roster, &tasks, &workers);
        assert!((metrics.fill_rate - 1.0).abs() < 1e-10);
        assert_eq!(metrics.unassigned_count, 0);
    }

    #[test]
    fn test_fill_rate_partial() {
        let (mut roster, mut tasks, workers) = sample();
        tasks.push(Task::new("T4", 0, hours(2)).with_required_workers(2));
        roster.unassigned.push(UnassignedTask {
            task_id: "T4".into(),
            blocking: vec!["no-overlap".into()],
            message: "no eligible worker for slot 1 of 2".into(),
        });

        let metrics = RosterMetrics::calculate(&roster, &tasks, &workers);
        // 3 of 5 required slots filled
        assert!((metrics.fill_rate - 0.6).abs() < 1e-10);
        assert_eq!(metrics.unassigned_count, 1);
    }

    #[test]
    fn test_fairness_variance_even_loads() {
        let tasks = vec![Task::new("T1", 0, hours(2)), Task::new("T2", 0, hours(2))];
        let workers = vec![Worker::new("W1"), Worker::new("W2")];
        let mut roster = Roster::new(1);
        roster.add_entry(RosterEntry::new(
            "T1",
            vec!["W1".into()],
            TimeWindow::new(0, hours(2)),
        ));
        roster.add_entry(RosterEntry::new(
            "T2",
            vec!["W2".into()],
            TimeWindow::new(0, hours(2)),
        ));

        let metrics = RosterMetrics::calculate(&roster, &tasks, &workers);
        assert!(metrics.fairness_variance.abs() < 1e-10);
        assert_eq!(metrics.load_spread_ms, 0);
    }

    #[test]
    fn test_meets_thresholds() {
        let (roster, tasks, workers) = sample();
        let metrics = RosterMetrics::calculate(&roster, &tasks, &workers);

        assert!(metrics.meets_thresholds(hours(4), 1.0));
        assert!(!metrics.meets_thresholds(hours(3), 1.0));
        assert!(!metrics.meets_thresholds(hours(4), 1.1));
    }

    #[test]
    fn test_empty_inputs() {
        let metrics = RosterMetrics::calculate(&Roster::new(0), &[], &[]);
        assert_eq!(metrics.load_spread_ms, 0);
        assert!((metrics.fill_rate - 1.0).abs() < 1e-10);
        assert_eq!(metrics.unassigned_count, 0);
    }
}
