//! Allocation engine.
//!
//! Produces a feasible roster for a snapshot, minimizing soft-constraint
//! penalty plus fairness variance.
//!
//! # Algorithm
//!
//! 1. **Greedy feasible seed**: tasks in priority order (ties: earliest
//!    start, then task id); each slot goes to the eligible worker with the
//!    lowest projected load (ties: lowest committed load, then worker id).
//! 2. **Local-search improvement**: pairwise reassignments and swaps,
//!    accepted only when hard-feasible and strictly reducing the
//!    objective; bounded by an iteration budget.
//! 3. **Exact fallback**: small single-worker instances whose task
//!    windows pairwise overlap are solved as a min-cost assignment
//!    problem instead of step 2, certifying the result.
//!
//! Tasks no worker combination can cover are surfaced on the roster,
//! never dropped.
//!
//! # Complexity
//! Seeding is O(tasks × workers); each improvement step rescoring is
//! O(entries × workers). Sized for team-scale inputs (tens to low
//! thousands of entities).
//!
//! # Reference
//! Burke et al. (2004), "The State of the Art of Nurse Rostering"

mod matching;

use std::collections::{BTreeSet, HashMap};

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, trace};

use crate::constraints::{ConstraintSet, PairContext};
use crate::engine::CancelToken;
use crate::error::EngineError;
use crate::ledger::{fairness_variance, FairnessLedger};
use crate::models::{
    PlanQuality, Roster, RosterEntry, SoftViolation, Task, TimeWindow, UnassignedTask, Worker,
};

/// Search limits and determinism knobs.
#[derive(Debug, Clone)]
pub struct AllocatorConfig {
    /// Maximum local-search move evaluations per run.
    pub improvement_budget: u32,
    /// Maximum candidate-edge count for the exact fallback; 0 disables it.
    pub exact_threshold: usize,
    /// Step bound for the exact matching; exceeding it aborts to the
    /// heuristic result.
    pub matching_budget: u32,
    /// Seed for the local-search move order.
    pub seed: u64,
    /// Minimum objective decrease for a move to count as improvement.
    pub epsilon: f64,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            improvement_budget: 5_000,
            exact_threshold: 200,
            matching_budget: 100_000,
            seed: 0,
            epsilon: 1e-9,
        }
    }
}

impl AllocatorConfig {
    /// Sets the local-search budget.
    pub fn with_improvement_budget(mut self, budget: u32) -> Self {
        self.improvement_budget = budget;
        self
    }

    /// Sets the exact-fallback edge threshold.
    pub fn with_exact_threshold(mut self, threshold: usize) -> Self {
        self.exact_threshold = threshold;
        self
    }

    /// Sets the matching step bound.
    pub fn with_matching_budget(mut self, budget: u32) -> Self {
        self.matching_budget = budget;
        self
    }

    /// Sets the move-order seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Mutable search bookkeeping: per-worker in-plan windows and loads.
///
/// Loads start at the ledger's committed values so fairness decisions see
/// history, not just the plan being built.
#[derive(Debug, Clone)]
pub(crate) struct PlanState {
    pub(crate) intervals: HashMap<String, Vec<(String, TimeWindow)>>,
    pub(crate) loads: HashMap<String, i64>,
}

impl PlanState {
    pub(crate) fn new(workers: &[Worker], ledger: &FairnessLedger) -> Self {
        let mut intervals = HashMap::new();
        let mut loads = HashMap::new();
        for w in workers {
            intervals.insert(w.id.clone(), Vec::new());
            loads.insert(w.id.clone(), ledger.load(&w.id));
        }
        Self { intervals, loads }
    }

    pub(crate) fn place(&mut self, worker_id: &str, task_id: &str, window: TimeWindow) {
        self.intervals
            .entry(worker_id.to_string())
            .or_default()
            .push((task_id.to_string(), window));
        *self.loads.entry(worker_id.to_string()).or_insert(0) += window.duration_ms();
    }

    pub(crate) fn release(&mut self, worker_id: &str, task_id: &str) {
        if let Some(list) = self.intervals.get_mut(worker_id) {
            if let Some(pos) = list.iter().position(|(tid, _)| tid == task_id) {
                let (_, window) = list.remove(pos);
                *self.loads.entry(worker_id.to_string()).or_insert(0) -= window.duration_ms();
            }
        }
    }

    pub(crate) fn charge_entry(&mut self, entry: &RosterEntry) {
        for worker_id in &entry.worker_ids {
            self.place(worker_id, &entry.task_id, entry.window);
        }
    }

    pub(crate) fn load(&self, worker_id: &str) -> i64 {
        self.loads.get(worker_id).copied().unwrap_or(0)
    }
}

/// Id-indexed views over the snapshot's tasks and workers.
pub(crate) struct Lookup<'a> {
    pub(crate) tasks: HashMap<&'a str, &'a Task>,
    pub(crate) workers: &'a [Worker],
    pub(crate) workers_by_id: HashMap<&'a str, &'a Worker>,
}

impl<'a> Lookup<'a> {
    pub(crate) fn new(tasks: &'a [Task], workers: &'a [Worker]) -> Self {
        Self {
            tasks: tasks.iter().map(|t| (t.id.as_str(), t)).collect(),
            workers,
            workers_by_id: workers.iter().map(|w| (w.id.as_str(), w)).collect(),
        }
    }
}

/// A candidate local-search move.
#[derive(Debug, Clone, Copy)]
enum Move {
    /// Hand one slot of an entry to a different worker.
    Reassign {
        entry: usize,
        slot: usize,
        worker: usize,
    },
    /// Exchange the workers of two slots across two entries.
    Swap {
        a: usize,
        a_slot: usize,
        b: usize,
        b_slot: usize,
    },
}

/// The allocation engine.
#[derive(Debug, Clone)]
pub struct Allocator {
    constraints: ConstraintSet,
    config: AllocatorConfig,
}

impl Allocator {
    /// Creates an allocator with the standard constraint set.
    pub fn new() -> Self {
        Self {
            constraints: ConstraintSet::standard(),
            config: AllocatorConfig::default(),
        }
    }

    /// Sets the constraint set.
    pub fn with_constraints(mut self, constraints: ConstraintSet) -> Self {
        self.constraints = constraints;
        self
    }

    /// Sets the search configuration.
    pub fn with_config(mut self, config: AllocatorConfig) -> Self {
        self.config = config;
        self
    }

    /// The constraint set in use.
    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    /// The search configuration in use.
    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Produces a roster for the given inputs.
    ///
    /// The ledger is read, never written; committing the result is the
    /// caller's staged step. Tasks that cannot be covered are listed on
    /// `Roster::unassigned` with the blocking constraints named.
    pub fn allocate(
        &self,
        tasks: &[Task],
        workers: &[Worker],
        ledger: &FairnessLedger,
        generation: u64,
        cancel: &CancelToken,
    ) -> Result<Roster, EngineError> {
        debug!(
            tasks = tasks.len(),
            workers = workers.len(),
            generation,
            "allocating"
        );

        let lookup = Lookup::new(tasks, workers);
        let ordered = order_tasks(tasks);

        let mut state = PlanState::new(workers, ledger);
        let mut entries: Vec<RosterEntry> = Vec::new();
        let mut unassigned: Vec<UnassignedTask> = Vec::new();

        for &task in &ordered {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            match self.assign_task(task, &lookup, &mut state, ledger) {
                Ok(worker_ids) => {
                    entries.push(RosterEntry::new(&task.id, worker_ids, task.window));
                }
                Err(unmet) => unassigned.push(unmet),
            }
        }

        let mut quality = PlanQuality::Heuristic;

        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        if let Some(exact) = self.try_exact(&ordered, &lookup, ledger) {
            debug!(entries = exact.len(), "exact matching replaced heuristic");
            let mut exact_state = PlanState::new(workers, ledger);
            for entry in &exact {
                exact_state.charge_entry(entry);
            }
            entries = exact;
            state = exact_state;
            unassigned.clear();
            quality = PlanQuality::Exact;
        } else {
            let affected: BTreeSet<String> =
                entries.iter().map(|e| e.task_id.clone()).collect();
            let converged = self.improve(&mut entries, &mut state, &affected, &lookup, cancel)?;
            if !converged {
                quality = PlanQuality::BudgetExhausted;
            }
        }

        let (objective, violations) = self.score(&entries, &lookup, &state);
        debug!(
            objective,
            assigned = entries.len(),
            unassigned = unassigned.len(),
            ?quality,
            "allocation finished"
        );

        Ok(Roster {
            entries,
            generation,
            objective,
            violations,
            unassigned,
            quality,
        })
    }

    /// Fills one task's slots greedily, or reports why it cannot be filled.
    ///
    /// Slot selection: lowest projected load, then lowest committed
    /// (ledger) load, then worker id.
    pub(crate) fn assign_task(
        &self,
        task: &Task,
        lookup: &Lookup<'_>,
        state: &mut PlanState,
        ledger: &FairnessLedger,
    ) -> Result<Vec<String>, UnassignedTask> {
        let mut chosen: Vec<String> = Vec::new();

        for slot in 0..task.required_workers {
            let ctx = PairContext::new(&state.intervals, &state.loads);
            let mut best: Option<(i64, i64, &str)> = None;

            for worker in lookup.workers {
                if chosen.iter().any(|c| c == &worker.id) {
                    continue;
                }
                if self
                    .constraints
                    .first_hard_failure(task, worker, &ctx)
                    .is_some()
                {
                    continue;
                }
                let projected = state.load(&worker.id) + task.duration_ms();
                let committed = ledger.load(&worker.id);
                let key = (projected, committed, worker.id.as_str());
                let better = match best {
                    None => true,
                    Some(current) => key < current,
                };
                if better {
                    best = Some(key);
                }
            }

            match best {
                Some((_, _, worker_id)) => {
                    let worker_id = worker_id.to_string();
                    state.place(&worker_id, &task.id, task.window);
                    chosen.push(worker_id);
                }
                None => {
                    // Collect the blockers before rolling back, so
                    // no-overlap and load checks reflect the attempt.
                    let ctx = PairContext::new(&state.intervals, &state.loads);
                    let mut blocking: BTreeSet<&'static str> = BTreeSet::new();
                    for worker in lookup.workers {
                        if chosen.iter().any(|c| c == &worker.id) {
                            continue;
                        }
                        for name in self.constraints.hard_failures(task, worker, &ctx) {
                            blocking.insert(name);
                        }
                    }
                    for worker_id in &chosen {
                        state.release(worker_id, &task.id);
                    }
                    return Err(UnassignedTask {
                        task_id: task.id.clone(),
                        blocking: blocking.into_iter().map(String::from).collect(),
                        message: format!(
                            "no eligible worker for slot {} of {}",
                            slot + 1,
                            task.required_workers
                        ),
                    });
                }
            }
        }

        Ok(chosen)
    }

    /// Local-search improvement over the affected entries.
    ///
    /// Returns `Ok(true)` when no improving move remains, `Ok(false)` when
    /// the budget ran out first.
    pub(crate) fn improve(
        &self,
        entries: &mut Vec<RosterEntry>,
        state: &mut PlanState,
        affected: &BTreeSet<String>,
        lookup: &Lookup<'_>,
        cancel: &CancelToken,
    ) -> Result<bool, EngineError> {
        let mut rng = SmallRng::seed_from_u64(self.config.seed);
        let mut budget = self.config.improvement_budget;
        let mut current = self.objective(entries, lookup, state);

        loop {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            let mut moves = self.candidate_moves(entries, affected, lookup);
            moves.shuffle(&mut rng);

            let mut improved = false;
            for mv in moves {
                if budget == 0 {
                    debug!("improvement budget exhausted");
                    return Ok(false);
                }
                budget -= 1;
                if let Some(new_objective) = self.try_move(&mv, entries, state, lookup, current) {
                    trace!(objective = new_objective, ?mv, "accepted move");
                    current = new_objective;
                    improved = true;
                    break;
                }
            }

            if !improved {
                return Ok(true);
            }
        }
    }

    /// All reassignments and swaps touching only affected entries.
    fn candidate_moves(
        &self,
        entries: &[RosterEntry],
        affected: &BTreeSet<String>,
        lookup: &Lookup<'_>,
    ) -> Vec<Move> {
        let movable: Vec<usize> = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| affected.contains(&e.task_id))
            .map(|(i, _)| i)
            .collect();

        let mut moves = Vec::new();
        for &i in &movable {
            for slot in 0..entries[i].worker_ids.len() {
                for (wi, worker) in lookup.workers.iter().enumerate() {
                    if entries[i].has_worker(&worker.id) {
                        continue;
                    }
                    moves.push(Move::Reassign {
                        entry: i,
                        slot,
                        worker: wi,
                    });
                }
            }
        }
        for (pos, &i) in movable.iter().enumerate() {
            for &j in &movable[pos + 1..] {
                for a_slot in 0..entries[i].worker_ids.len() {
                    for b_slot in 0..entries[j].worker_ids.len() {
                        moves.push(Move::Swap {
                            a: i,
                            a_slot,
                            b: j,
                            b_slot,
                        });
                    }
                }
            }
        }
        moves
    }

    /// Applies a move if it is hard-feasible and strictly improving.
    ///
    /// Only the touched pairs are re-checked for hard feasibility: the
    /// built-in rules are per-pair or symmetric in the worker's total
    /// load, so an untouched pair cannot become infeasible.
    fn try_move(
        &self,
        mv: &Move,
        entries: &mut [RosterEntry],
        state: &mut PlanState,
        lookup: &Lookup<'_>,
        current: f64,
    ) -> Option<f64> {
        match *mv {
            Move::Reassign { entry, slot, worker } => {
                let task = *lookup.tasks.get(entries[entry].task_id.as_str())?;
                let new_worker = &lookup.workers[worker];
                let old_id = entries[entry].worker_ids[slot].clone();
                let window = entries[entry].window;

                state.release(&old_id, &task.id);
                state.place(&new_worker.id, &task.id, window);
                entries[entry].worker_ids[slot] = new_worker.id.clone();

                let undo = |entries: &mut [RosterEntry], state: &mut PlanState| {
                    state.release(&new_worker.id, &task.id);
                    state.place(&old_id, &task.id, window);
                    entries[entry].worker_ids[slot] = old_id.clone();
                };

                let ctx = PairContext::excluding(&state.intervals, &state.loads, &task.id);
                if self
                    .constraints
                    .first_hard_failure(task, new_worker, &ctx)
                    .is_some()
                {
                    undo(entries, state);
                    return None;
                }

                let objective = self.objective(entries, lookup, state);
                if objective < current - self.config.epsilon {
                    Some(objective)
                } else {
                    undo(entries, state);
                    None
                }
            }
            Move::Swap { a, a_slot, b, b_slot } => {
                let worker_a = entries[a].worker_ids[a_slot].clone();
                let worker_b = entries[b].worker_ids[b_slot].clone();
                if worker_a == worker_b
                    || entries[a].has_worker(&worker_b)
                    || entries[b].has_worker(&worker_a)
                {
                    return None;
                }
                let task_a = *lookup.tasks.get(entries[a].task_id.as_str())?;
                let task_b = *lookup.tasks.get(entries[b].task_id.as_str())?;
                let window_a = entries[a].window;
                let window_b = entries[b].window;

                let apply = |entries: &mut [RosterEntry], state: &mut PlanState| {
                    let wa = entries[a].worker_ids[a_slot].clone();
                    let wb = entries[b].worker_ids[b_slot].clone();
                    state.release(&wa, &task_a.id);
                    state.release(&wb, &task_b.id);
                    state.place(&wb, &task_a.id, window_a);
                    state.place(&wa, &task_b.id, window_b);
                    entries[a].worker_ids[a_slot] = wb.clone();
                    entries[b].worker_ids[b_slot] = wa;
                };

                apply(entries, state);

                let feasible = {
                    let ctx_a =
                        PairContext::excluding(&state.intervals, &state.loads, &task_a.id);
                    let pair_a_ok = lookup
                        .workers_by_id
                        .get(worker_b.as_str())
                        .copied()
                        .map(|w| self.constraints.first_hard_failure(task_a, w, &ctx_a).is_none())
                        .unwrap_or(false);
                    let ctx_b =
                        PairContext::excluding(&state.intervals, &state.loads, &task_b.id);
                    let pair_b_ok = lookup
                        .workers_by_id
                        .get(worker_a.as_str())
                        .copied()
                        .map(|w| self.constraints.first_hard_failure(task_b, w, &ctx_b).is_none())
                        .unwrap_or(false);
                    pair_a_ok && pair_b_ok
                };

                if !feasible {
                    apply(entries, state); // swap is its own inverse
                    return None;
                }

                let objective = self.objective(entries, lookup, state);
                if objective < current - self.config.epsilon {
                    Some(objective)
                } else {
                    apply(entries, state);
                    None
                }
            }
        }
    }

    /// Objective value of the entry set: weighted soft penalty plus
    /// fairness variance of projected loads.
    pub(crate) fn objective(
        &self,
        entries: &[RosterEntry],
        lookup: &Lookup<'_>,
        state: &PlanState,
    ) -> f64 {
        let mut soft_total = 0.0;
        for entry in entries {
            let Some(&task) = lookup.tasks.get(entry.task_id.as_str()) else {
                continue;
            };
            for worker_id in &entry.worker_ids {
                let Some(&worker) = lookup.workers_by_id.get(worker_id.as_str()) else {
                    continue;
                };
                let ctx = PairContext::excluding(&state.intervals, &state.loads, &entry.task_id);
                soft_total += self.constraints.soft_penalty(task, worker, &ctx);
            }
        }
        soft_total + fairness_variance(lookup.workers.iter().map(|w| state.load(&w.id)))
    }

    /// Objective plus the per-pair soft violations behind it.
    pub(crate) fn score(
        &self,
        entries: &[RosterEntry],
        lookup: &Lookup<'_>,
        state: &PlanState,
    ) -> (f64, Vec<SoftViolation>) {
        let mut violations = Vec::new();
        let mut soft_total = 0.0;
        for entry in entries {
            let Some(&task) = lookup.tasks.get(entry.task_id.as_str()) else {
                continue;
            };
            for worker_id in &entry.worker_ids {
                let Some(&worker) = lookup.workers_by_id.get(worker_id.as_str()) else {
                    continue;
                };
                let ctx = PairContext::excluding(&state.intervals, &state.loads, &entry.task_id);
                for (name, penalty) in self.constraints.soft_failures(task, worker, &ctx) {
                    soft_total += penalty;
                    violations.push(SoftViolation {
                        constraint: name.to_string(),
                        task_id: entry.task_id.clone(),
                        worker_id: worker_id.clone(),
                        penalty,
                    });
                }
            }
        }
        let objective =
            soft_total + fairness_variance(lookup.workers.iter().map(|w| state.load(&w.id)));
        (objective, violations)
    }

    /// Exact assignment for small single-worker instances.
    ///
    /// Sound only when each worker can take at most one of the tasks,
    /// which holds when every pair of task windows overlaps. Costs are
    /// projected load (seconds) plus scaled soft penalty, so the matching
    /// minimizes the same pressure the heuristic does.
    fn try_exact(
        &self,
        ordered: &[&Task],
        lookup: &Lookup<'_>,
        ledger: &FairnessLedger,
    ) -> Option<Vec<RosterEntry>> {
        if ordered.is_empty() || self.config.exact_threshold == 0 {
            return None;
        }
        if ordered.iter().any(|t| t.required_workers != 1) {
            return None;
        }
        for (i, a) in ordered.iter().enumerate() {
            for b in &ordered[i + 1..] {
                if !a.window.overlaps(&b.window) {
                    return None;
                }
            }
        }

        let base = PlanState::new(lookup.workers, ledger);
        let ctx = PairContext::new(&base.intervals, &base.loads);

        let mut cost = vec![vec![None; lookup.workers.len()]; ordered.len()];
        let mut edges = 0usize;
        for (ti, task) in ordered.iter().enumerate() {
            for (wi, worker) in lookup.workers.iter().enumerate() {
                if self
                    .constraints
                    .first_hard_failure(task, worker, &ctx)
                    .is_none()
                {
                    let projected_s = (ledger.load(&worker.id) + task.duration_ms()) / 1_000;
                    let soft_s =
                        (self.constraints.soft_penalty(task, worker, &ctx) * 3_600.0).round() as i64;
                    cost[ti][wi] = Some(projected_s + soft_s);
                    edges += 1;
                }
            }
        }
        if edges > self.config.exact_threshold {
            return None;
        }

        let mut budget = self.config.matching_budget;
        let columns = matching::min_cost_assignment(&cost, lookup.workers.len(), &mut budget)?;

        Some(
            ordered
                .iter()
                .zip(columns)
                .map(|(task, wi)| {
                    RosterEntry::new(
                        &task.id,
                        vec![lookup.workers[wi].id.clone()],
                        task.window,
                    )
                })
                .collect(),
        )
    }
}

impl Default for Allocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Tasks in assignment order: priority descending, then earliest start,
/// then task id.
pub(crate) fn order_tasks(tasks: &[Task]) -> Vec<&Task> {
    let mut ordered: Vec<&Task> = tasks.iter().collect();
    ordered.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(a.window.start_ms.cmp(&b.window.start_ms))
            .then(a.id.cmp(&b.id))
    });
    ordered
}
