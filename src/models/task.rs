//! Task model.
//!
//! A task is a discrete unit of work to be distributed: a shift, a project
//! slot, a volunteer duty. It has a fixed time window, skill requirements,
//! and a headcount.
//!
//! # Reference
//! Ernst et al. (2004), "Staff scheduling and rostering: A review"

use serde::{Deserialize, Serialize};

use super::TimeWindow;

/// A unit of work to be assigned to workers.
///
/// Tasks are immutable once planned; edits go through [`Task::revise`],
/// which produces a new version of the same task.
///
/// # Time Representation
/// The window is in milliseconds relative to a planning epoch (t=0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// When the work happens.
    pub window: TimeWindow,
    /// Skills a worker must have to take this task.
    pub required_skills: Vec<String>,
    /// Number of workers the task needs (>= 1).
    pub required_workers: u32,
    /// Assignment priority (higher = assigned first).
    pub priority: i32,
    /// Edit version. Starts at 1, bumped by [`Task::revise`].
    pub version: u32,
}

impl Task {
    /// Creates a new single-worker task over the given window.
    pub fn new(id: impl Into<String>, start_ms: i64, end_ms: i64) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            window: TimeWindow::new(start_ms, end_ms),
            required_skills: Vec::new(),
            required_workers: 1,
            priority: 0,
            version: 1,
        }
    }

    /// Sets the task name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds a required skill.
    pub fn with_skill(mut self, skill: impl Into<String>) -> Self {
        self.required_skills.push(skill.into());
        self
    }

    /// Sets the full required skill list.
    pub fn with_skills(mut self, skills: Vec<String>) -> Self {
        self.required_skills = skills;
        self
    }

    /// Sets the required worker count.
    pub fn with_required_workers(mut self, count: u32) -> Self {
        self.required_workers = count;
        self
    }

    /// Sets the assignment priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Produces an edited copy carrying the next version number.
    ///
    /// The closure mutates the copy; the id is preserved.
    pub fn revise(&self, edit: impl FnOnce(&mut Task)) -> Task {
        let mut next = self.clone();
        edit(&mut next);
        next.id = self.id.clone();
        next.version = self.version + 1;
        next
    }

    /// Duration of the task window (ms).
    #[inline]
    pub fn duration_ms(&self) -> i64 {
        self.window.duration_ms()
    }

    /// Total load this task places on the worker pool (ms).
    pub fn total_load_ms(&self) -> i64 {
        self.duration_ms() * i64::from(self.required_workers)
    }
}
