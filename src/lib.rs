//! Work-distribution engine.
//!
//! Fair, constraint-respecting assignment of discrete units of work to a
//! pool of workers over time, with incremental repair when constraints or
//! availability change.
//!
//! # Modules
//!
//! - **`models`**: Domain types — `Task`, `Worker`, `TimeWindow`,
//!   `Availability`, `Roster`
//! - **`constraints`**: Hard/soft predicate rules and the rule set
//! - **`ledger`**: Per-worker committed load with idempotent deltas
//! - **`allocator`**: Greedy seed, local-search improvement, exact
//!   matching fallback
//! - **`rebalance`**: Change events and minimally-disruptive repair
//! - **`engine`**: Plan/rebalance/explain facade over a snapshot
//! - **`store`**: Versioned persistence contract with conflict detection
//! - **`validation`**: Input integrity checks before search
//! - **`metrics`**: Roster quality indicators
//!
//! # Architecture
//!
//! Planning is a synchronous computation over an immutable snapshot.
//! Concurrency is snapshot isolation plus optimistic commit: parallel
//! runs each read their own snapshot, and a store rejects commits whose
//! snapshot version has moved. The ledger is written only by staged
//! commits after a roster is accepted, so a cancelled run leaves no
//! partial state.
//!
//! # References
//!
//! - Ernst et al. (2004), "Staff scheduling and rostering: A review"
//! - Burke et al. (2004), "The State of the Art of Nurse Rostering"
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems"
//! - Kuhn (1955), "The Hungarian method for the assignment problem"

pub mod allocator;
pub mod constraints;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod models;
pub mod rebalance;
pub mod store;
pub mod validation;
