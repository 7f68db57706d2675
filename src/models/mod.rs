//! Work-distribution domain models.
//!
//! Provides the core data types for describing distribution problems and
//! their solutions. Domain-agnostic within workforce scheduling — tasks can
//! be shifts, project slots, or volunteer duties.
//!
//! # Domain Mappings
//!
//! | workshare | Shift planning | Projects | Volunteering |
//! |-----------|----------------|----------|--------------|
//! | Task | Shift | Work package | Duty slot |
//! | Worker | Employee | Team member | Volunteer |
//! | Roster | Shift plan | Allocation | Duty roster |

mod roster;
mod task;
mod window;
mod worker;

pub use roster::{PlanQuality, Roster, RosterEntry, SoftViolation, UnassignedTask};
pub use task::Task;
pub use window::{Availability, TimeWindow};
pub use worker::Worker;
