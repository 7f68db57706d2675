//! Input validation for distribution problems.
//!
//! Checks structural integrity of tasks and workers before planning.
//! Detects:
//! - Duplicate IDs
//! - Empty or inverted task windows
//! - Zero required worker counts
//! - Overlapping availability windows on a worker
//! - Tasks whose skill filter leaves too few candidate workers
//!
//! All problems are collected and reported together, per entity — a
//! malformed task never surfaces as a generic planning failure.

use crate::models::{Task, Worker};
use std::collections::HashSet;

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Two entities share the same ID.
    DuplicateId,
    /// A task window has zero or negative duration.
    EmptyWindow,
    /// A task requires zero workers.
    ZeroWorkerCount,
    /// A worker's availability windows overlap each other.
    OverlappingAvailability,
    /// Fewer workers pass a task's skill filter than the task requires.
    NoQualifiedWorker,
}

impl ValidationError {
    /// Creates a validation error.
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Validates the input data for a planning run.
///
/// Checks:
/// 1. No duplicate task IDs
/// 2. No duplicate worker IDs
/// 3. Every task window has positive duration
/// 4. Every task requires at least one worker
/// 5. No worker has overlapping availability windows
/// 6. Every task's skill filter passes at least its required worker count
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_input(tasks: &[Task], workers: &[Worker]) -> ValidationResult {
    let mut errors = Vec::new();

    let mut worker_ids = HashSet::new();
    for w in workers {
        if !worker_ids.insert(w.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate worker ID: {}", w.id),
            ));
        }

        if let Some(overlap) = first_window_overlap(w) {
            errors.push(ValidationError::new(
                ValidationErrorKind::OverlappingAvailability,
                format!(
                    "Worker '{}' has overlapping availability windows at {}ms",
                    w.id, overlap
                ),
            ));
        }
    }

    let mut task_ids = HashSet::new();
    for task in tasks {
        if !task_ids.insert(task.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate task ID: {}", task.id),
            ));
        }

        if task.window.duration_ms() <= 0 {
            errors.push(ValidationError::new(
                ValidationErrorKind::EmptyWindow,
                format!(
                    "Task '{}' window [{}, {}) has no duration",
                    task.id, task.window.start_ms, task.window.end_ms
                ),
            ));
        }

        if task.required_workers == 0 {
            errors.push(ValidationError::new(
                ValidationErrorKind::ZeroWorkerCount,
                format!("Task '{}' requires zero workers", task.id),
            ));
        }
    }

    // Skill filter must leave enough candidates per task
    for task in tasks {
        let qualified = workers.iter().filter(|w| w.qualifies_for(task)).count();
        if qualified < task.required_workers as usize {
            errors.push(ValidationError::new(
                ValidationErrorKind::NoQualifiedWorker,
                format!(
                    "Task '{}' requires {} worker(s) but only {} pass its skill filter",
                    task.id, task.required_workers, qualified
                ),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Start of the first overlap between a worker's availability windows.
fn first_window_overlap(worker: &Worker) -> Option<i64> {
    let mut windows = worker.availability.windows.clone();
    windows.sort_by_key(|w| (w.start_ms, w.end_ms));
    windows
        .windows(2)
        .find(|pair| pair[0].overlaps(&pair[1]))
        .map(|pair| pair[1].start_ms)
}
