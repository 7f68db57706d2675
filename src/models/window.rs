//! Time window and worker availability models.
//!
//! Defines when work happens and when workers can take it: task windows,
//! availability windows, and blocked periods (leave, appointments).
//!
//! # Time Model
//! All times are in milliseconds relative to a planning epoch (t=0).
//! The consumer defines what the epoch means (e.g., start of the week).
//!
//! # Precedence
//! Blocked periods override availability windows. A task window is covered
//! iff it lies entirely inside one availability window AND does not touch
//! any blocked period.

use serde::{Deserialize, Serialize};

/// A time interval [start, end).
///
/// Half-open interval: includes start, excludes end.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TimeWindow {
    /// Interval start (ms, inclusive).
    pub start_ms: i64,
    /// Interval end (ms, exclusive).
    pub end_ms: i64,
}

impl TimeWindow {
    /// Creates a new time window.
    pub fn new(start_ms: i64, end_ms: i64) -> Self {
        Self { start_ms, end_ms }
    }

    /// Duration of this window (ms).
    #[inline]
    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }

    /// Whether a timestamp falls within this window.
    #[inline]
    pub fn contains(&self, time_ms: i64) -> bool {
        time_ms >= self.start_ms && time_ms < self.end_ms
    }

    /// Whether two windows overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start_ms < other.end_ms && other.start_ms < self.end_ms
    }

    /// Whether `other` lies entirely within this window.
    pub fn encloses(&self, other: &Self) -> bool {
        self.start_ms <= other.start_ms && other.end_ms <= self.end_ms
    }

    /// Gap between two non-overlapping windows (ms).
    ///
    /// Returns `None` when the windows overlap.
    pub fn gap_to(&self, other: &Self) -> Option<i64> {
        if self.overlaps(other) {
            return None;
        }
        if self.end_ms <= other.start_ms {
            Some(other.start_ms - self.end_ms)
        } else {
            Some(self.start_ms - other.end_ms)
        }
    }
}

/// Worker availability.
///
/// Combines positive availability windows with negative blocked periods.
/// If no windows are defined, the worker is always available (subject to
/// blocked periods).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Availability {
    /// Periods when the worker can be assigned.
    /// Empty = always available.
    pub windows: Vec<TimeWindow>,
    /// Periods when the worker is unavailable (overrides windows).
    pub blocked: Vec<TimeWindow>,
}

impl Availability {
    /// Creates an availability with no constraints (always available).
    pub fn always() -> Self {
        Self::default()
    }

    /// Adds an availability window.
    pub fn with_window(mut self, start_ms: i64, end_ms: i64) -> Self {
        self.windows.push(TimeWindow::new(start_ms, end_ms));
        self
    }

    /// Adds a blocked period.
    pub fn with_blocked(mut self, start_ms: i64, end_ms: i64) -> Self {
        self.blocked.push(TimeWindow::new(start_ms, end_ms));
        self
    }

    /// Whether a task window is fully covered.
    ///
    /// Requires the window to lie inside a single availability window
    /// (or no windows to be defined) and to intersect no blocked period.
    pub fn covers(&self, window: &TimeWindow) -> bool {
        if self.blocked.iter().any(|b| b.overlaps(window)) {
            return false;
        }
        if self.windows.is_empty() {
            return true;
        }
        self.windows.iter().any(|w| w.encloses(window))
    }

    /// Whether a timestamp is within available time.
    pub fn is_available_at(&self, time_ms: i64) -> bool {
        if self.blocked.iter().any(|b| b.contains(time_ms)) {
            return false;
        }
        if self.windows.is_empty() {
            return true;
        }
        self.windows.iter().any(|w| w.contains(time_ms))
    }

    /// Total available time within a range [start, end) (ms).
    pub fn available_time_in_range(&self, start_ms: i64, end_ms: i64) -> i64 {
        if end_ms <= start_ms {
            return 0;
        }

        let range = TimeWindow::new(start_ms, end_ms);

        if self.windows.is_empty() {
            let blocked: i64 = self
                .blocked
                .iter()
                .filter_map(|b| overlap_duration(&range, b))
                .sum();
            return range.duration_ms() - blocked;
        }

        let mut available: i64 = 0;
        for w in &self.windows {
            if let Some(dur) = overlap_duration(&range, w) {
                available += dur;
            }
        }

        let blocked: i64 = self
            .blocked
            .iter()
            .filter_map(|b| overlap_duration(&range, b))
            .sum();

        (available - blocked).max(0)
    }
}

/// Computes overlap duration between two time windows.
fn overlap_duration(a: &TimeWindow, b: &TimeWindow) -> Option<i64> {
    let start = a.start_ms.max(b.start_ms);
    let end = a.end_ms.min(b.end_ms);
    if end > start {
        Some(end - start)
    } else {
        None
    }
}
