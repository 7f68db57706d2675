//! Engine error taxonomy.
//!
//! Only conditions that stop a planning run are errors. Domain outcomes —
//! tasks nobody can cover, budget-limited search — are structured data on
//! the [`Roster`](crate::models::Roster) (`unassigned`, `quality`), so
//! callers can decide policy instead of catching failures.

use thiserror::Error;

use crate::validation::ValidationError;

/// Errors that abort a planning or commit call.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Input failed structural validation; no search was attempted.
    #[error("input validation failed with {} error(s)", .0.len())]
    Validation(Vec<ValidationError>),

    /// The caller cancelled the run. No ledger delta was committed.
    #[error("planning run cancelled")]
    Cancelled,

    /// A commit was attempted against a snapshot the store has moved past.
    /// The caller must reload and re-run planning; nothing was written.
    #[error("snapshot version {found} is stale, store is at {current}")]
    StaleSnapshot {
        /// Version the caller planned against.
        found: u64,
        /// Version the store currently holds.
        current: u64,
    },
}

impl EngineError {
    /// The validation errors, when this is a validation failure.
    pub fn validation_errors(&self) -> Option<&[ValidationError]> {
        match self {
            EngineError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}
