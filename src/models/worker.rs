//! Worker model.
//!
//! Workers are the people work is distributed over. Each worker has a
//! skill set, availability windows, and an optional load cap for the
//! planning period.
//!
//! # Reference
//! Ernst et al. (2004), "Staff scheduling and rostering: A review"

use serde::{Deserialize, Serialize};

use super::{Availability, Task, TimeWindow};

/// A worker that can take assignments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    /// Unique worker identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Skills this worker has.
    pub skills: Vec<String>,
    /// When this worker can be assigned.
    pub availability: Availability,
    /// Maximum assigned load over the planning period (ms).
    /// `None` = uncapped.
    pub max_load_ms: Option<i64>,
}

impl Worker {
    /// Creates a new always-available worker.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            skills: Vec::new(),
            availability: Availability::always(),
            max_load_ms: None,
        }
    }

    /// Sets the worker name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds a skill.
    pub fn with_skill(mut self, skill: impl Into<String>) -> Self {
        self.skills.push(skill.into());
        self
    }

    /// Sets the availability.
    pub fn with_availability(mut self, availability: Availability) -> Self {
        self.availability = availability;
        self
    }

    /// Adds an availability window (shorthand).
    pub fn with_window(mut self, start_ms: i64, end_ms: i64) -> Self {
        self.availability.windows.push(TimeWindow::new(start_ms, end_ms));
        self
    }

    /// Sets the maximum load for the planning period.
    pub fn with_max_load(mut self, max_load_ms: i64) -> Self {
        self.max_load_ms = Some(max_load_ms);
        self
    }

    /// Whether this worker has a given skill.
    pub fn has_skill(&self, skill: &str) -> bool {
        self.skills.iter().any(|s| s == skill)
    }

    /// Whether this worker has every skill the task requires.
    pub fn qualifies_for(&self, task: &Task) -> bool {
        task.required_skills.iter().all(|s| self.has_skill(s))
    }

    /// Whether this worker's availability covers the window.
    pub fn is_available_for(&self, window: &TimeWindow) -> bool {
        self.availability.covers(window)
    }
}
