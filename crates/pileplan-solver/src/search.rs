//! Search engine: parallel depth-first branch-and-bound.
//!
//! Explores (pile, machine) placements over the immutable
//! [`ScheduleModel`], timing each placement at its earliest feasible
//! start under the machine, exclusion, forbidden-zone and zone-penalty
//! rules. Workers share a single atomic best bound used for pruning and a
//! mutex-held incumbent; everything else is worker-local. The whole
//! search honors one wall-clock deadline and returns the best incumbent
//! found when it expires.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use pileplan_core::{PilePlanError, Result, SearchStatistics, SolveStatus};

use crate::model::ScheduleModel;

/// Grow the root frontier to this many subproblems per worker before
/// handing it to the pool.
const FRONTIER_PER_WORKER: usize = 4;
const FRONTIER_EXPANSION_CAP: usize = 4096;

/// A complete machine/start assignment, in ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub machine: Vec<usize>,
    pub start: Vec<i64>,
    pub makespan: i64,
}

/// Outcome of one search run.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub status: SolveStatus,
    pub assignment: Option<Assignment>,
    pub statistics: SearchStatistics,
}

/// Solves the model within the given worker and wall-clock budget.
pub fn search(model: &ScheduleModel, num_workers: usize, deadline: Instant) -> Result<SearchOutcome> {
    let started = Instant::now();
    let n = model.num_piles();

    if model.is_infeasible() {
        return Ok(SearchOutcome {
            status: SolveStatus::Infeasible,
            assignment: None,
            statistics: stats(0, 0, started),
        });
    }
    if n == 0 {
        return Ok(SearchOutcome {
            status: SolveStatus::Optimal,
            assignment: Some(Assignment {
                machine: Vec::new(),
                start: Vec::new(),
                makespan: 0,
            }),
            statistics: stats(0, 0, started),
        });
    }

    let shared = Shared::new(model, deadline);

    // Expand a root frontier breadth-first, then let the pool race over
    // the subproblems depth-first.
    let mut frontier = vec![PartialSchedule::root(model)];
    let target = num_workers * FRONTIER_PER_WORKER;
    let mut expansions = 0usize;
    while frontier.len() < target && expansions < FRONTIER_EXPANSION_CAP {
        let Some(pos) = frontier.iter().position(|s| s.placed_count < n) else {
            break;
        };
        let state = frontier.swap_remove(pos);
        expansions += 1;
        for child in shared.children(&state) {
            frontier.push(child);
        }
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_workers)
        .build()
        .map_err(|e| PilePlanError::Internal(format!("search worker pool: {e}")))?;
    pool.install(|| {
        rayon::scope(|scope| {
            for state in frontier {
                let shared = &shared;
                scope.spawn(move |_| shared.dfs(state));
            }
        })
    });

    let timed_out = shared.timed_out.load(Ordering::SeqCst);
    let assignment = shared.incumbent.lock().expect("incumbent lock").take();
    let status = match (&assignment, timed_out) {
        (Some(_), false) => SolveStatus::Optimal,
        (Some(_), true) => SolveStatus::Feasible,
        (None, true) => SolveStatus::Unknown,
        // Exhausted without ever completing a schedule.
        (None, false) => SolveStatus::Infeasible,
    };
    let statistics = stats(
        shared.branches.load(Ordering::Relaxed),
        shared.conflicts.load(Ordering::Relaxed),
        started,
    );
    tracing::info!(
        ?status,
        branches = statistics.branches,
        conflicts = statistics.conflicts,
        wall_time = statistics.wall_time,
        "search finished"
    );
    Ok(SearchOutcome {
        status,
        assignment,
        statistics,
    })
}

fn stats(branches: u64, conflicts: u64, started: Instant) -> SearchStatistics {
    SearchStatistics {
        branches,
        conflicts,
        wall_time: started.elapsed().as_secs_f64(),
    }
}

/// State shared by all search workers.
struct Shared<'m> {
    model: &'m ScheduleModel,
    /// Best known makespan in ticks; pruning bound.
    best: AtomicI64,
    incumbent: Mutex<Option<Assignment>>,
    branches: AtomicU64,
    conflicts: AtomicU64,
    deadline: Instant,
    timed_out: AtomicBool,
    /// Static branching order: by zone, then input position.
    order: Vec<usize>,
}

impl<'m> Shared<'m> {
    fn new(model: &'m ScheduleModel, deadline: Instant) -> Self {
        let mut order: Vec<usize> = (0..model.num_piles()).collect();
        order.sort_by_key(|&i| (model.zones[i], i));
        Shared {
            model,
            best: AtomicI64::new(i64::MAX),
            incumbent: Mutex::new(None),
            branches: AtomicU64::new(0),
            conflicts: AtomicU64::new(0),
            deadline,
            timed_out: AtomicBool::new(false),
            order,
        }
    }

    fn best_bound(&self) -> i64 {
        self.best.load(Ordering::SeqCst)
    }

    /// Atomic compare-and-improve of the shared bound. Equal-makespan
    /// candidates are tie-broken by a total order on the assignment
    /// vectors so the final incumbent does not depend on which worker
    /// finished first.
    fn offer(&self, state: &PartialSchedule) {
        let makespan = state.makespan;
        let previous = self.best.fetch_min(makespan, Ordering::SeqCst);
        if makespan <= previous {
            let mut slot = self.incumbent.lock().expect("incumbent lock");
            let improved = slot.as_ref().map_or(true, |a| {
                (makespan, &state.machine, &state.start) < (a.makespan, &a.machine, &a.start)
            });
            if improved {
                tracing::debug!(makespan_ticks = makespan, "improved incumbent");
                *slot = Some(Assignment {
                    machine: state.machine.clone(),
                    start: state.start.clone(),
                    makespan,
                });
            }
        }
    }

    fn out_of_time(&self) -> bool {
        if Instant::now() >= self.deadline {
            self.timed_out.store(true, Ordering::SeqCst);
            true
        } else {
            false
        }
    }

    /// Expands all children of a node: every unplaced pile on every
    /// machine allowed by the symmetry-breaking prefix rule.
    fn children(&self, state: &PartialSchedule) -> Vec<PartialSchedule> {
        self.branches.fetch_add(1, Ordering::Relaxed);
        let machine_limit = state
            .max_used_machine
            .map_or(1, |m| (m + 2).min(self.model.num_machines));
        let mut children = Vec::new();
        for &pile in &self.order {
            if state.placed[pile] {
                continue;
            }
            for machine in 0..machine_limit {
                let mut child = state.clone();
                let bumps = child.place(self.model, pile, machine);
                self.conflicts.fetch_add(bumps, Ordering::Relaxed);
                children.push(child);
            }
        }
        children
    }

    fn dfs(&self, state: PartialSchedule) {
        if self.out_of_time() {
            return;
        }
        if state.placed_count == self.model.num_piles() {
            self.offer(&state);
            return;
        }
        // Prune strictly-worse bounds only: equal-bound subtrees are kept
        // so every optimal leaf is visited and the tie-break in `offer`
        // picks the same incumbent on every run.
        if state.lower_bound(self.model) > self.best_bound() {
            return;
        }
        for child in self.children(&state) {
            if self.out_of_time() {
                return;
            }
            if child.lower_bound(self.model) <= self.best_bound() {
                self.dfs(child);
            }
        }
    }
}

/// A partial schedule: placements so far plus per-machine frontier state.
#[derive(Debug, Clone)]
struct PartialSchedule {
    start: Vec<i64>,
    end: Vec<i64>,
    machine: Vec<usize>,
    placed: Vec<bool>,
    placed_count: usize,
    machine_ready: Vec<i64>,
    machine_last_zone: Vec<Option<usize>>,
    max_used_machine: Option<usize>,
    makespan: i64,
    remaining_work: i64,
}

impl PartialSchedule {
    fn root(model: &ScheduleModel) -> Self {
        let n = model.num_piles();
        PartialSchedule {
            start: vec![0; n],
            end: vec![0; n],
            machine: vec![0; n],
            placed: vec![false; n],
            placed_count: 0,
            machine_ready: vec![0; model.num_machines],
            machine_last_zone: vec![None; model.num_machines],
            max_used_machine: None,
            makespan: 0,
            remaining_work: model.durations.iter().sum(),
        }
    }

    /// Places `pile` on `machine` at its earliest feasible start.
    /// Returns the number of start-time bumps (detected conflicts).
    fn place(&mut self, model: &ScheduleModel, pile: usize, machine: usize) -> u64 {
        let duration = model.durations[pile];
        let mut s = self.machine_ready[machine];
        if let Some(last_zone) = self.machine_last_zone[machine] {
            if last_zone != model.zones[pile] {
                s += model.zone_penalty;
            }
        }

        let mut bumps = 0u64;
        loop {
            let before = s;
            // No concurrent work within the exclusion distance.
            for &q in &model.exclusion[pile] {
                if self.placed[q] && s < self.end[q] && s + duration > self.start[q] {
                    s = self.end[q];
                    bumps += 1;
                }
            }
            // `pile` sits inside q's forbidden zone: finish before q
            // starts, or wait out the window after q ends.
            for &q in &model.forbidden_sources[pile] {
                if self.placed[q]
                    && s + duration > self.start[q]
                    && s < self.end[q] + model.forbidden_gap
                {
                    s = self.end[q] + model.forbidden_gap;
                    bumps += 1;
                }
            }
            // q sits inside `pile`'s forbidden zone: q is already fixed,
            // so `pile` may only start once q has completed (it cannot
            // open a window across q's fixed start).
            for &q in &model.forbidden_targets[pile] {
                if self.placed[q] && self.end[q] > s && self.start[q] < s + duration + model.forbidden_gap
                {
                    s = self.end[q];
                    bumps += 1;
                }
            }
            if s == before {
                break;
            }
        }

        let e = s + duration;
        self.start[pile] = s;
        self.end[pile] = e;
        self.machine[pile] = machine;
        self.placed[pile] = true;
        self.placed_count += 1;
        self.machine_ready[machine] = e;
        self.machine_last_zone[machine] = Some(model.zones[pile]);
        self.max_used_machine = Some(self.max_used_machine.map_or(machine, |m| m.max(machine)));
        self.makespan = self.makespan.max(e);
        self.remaining_work -= duration;
        bumps
    }

    /// Admissible bound: the remaining work split perfectly over all
    /// machines cannot finish before this.
    fn lower_bound(&self, model: &ScheduleModel) -> i64 {
        let min_ready = self.machine_ready.iter().copied().min().unwrap_or(0);
        let spread = min_ready + self.remaining_work / model.num_machines as i64;
        self.makespan.max(spread)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{hours_to_ticks, ScheduleModel};
    use pileplan_core::{Pile, SolveRequest};
    use std::time::Duration;

    fn pile(id: u64, x: f64, y: f64) -> Pile {
        Pile {
            id,
            x,
            y,
            pile_type: 1,
            diameter: 1.0,
        }
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(30)
    }

    fn build(piles: Vec<Pile>, machines: usize, durations: &[f64]) -> ScheduleModel {
        let mut req = SolveRequest::new(piles, machines);
        req.simultaneous_exclude_half_side = 5.0;
        req.zone_penalty_hours = 0.0;
        let zones = vec![0; req.piles.len()];
        ScheduleModel::build(&req, zones, durations)
    }

    #[test]
    fn single_machine_serializes_tasks() {
        // two piles far apart, one machine: makespan = d1 + d2
        let model = build(vec![pile(1, 0.0, 0.0), pile(2, 1000.0, 0.0)], 1, &[10.0, 14.0]);
        let out = search(&model, 2, far_deadline()).unwrap();
        assert_eq!(out.status, SolveStatus::Optimal);
        let a = out.assignment.unwrap();
        assert_eq!(a.makespan, hours_to_ticks(24.0));
    }

    #[test]
    fn two_machines_run_independent_piles_in_parallel() {
        let model = build(vec![pile(1, 0.0, 0.0), pile(2, 1000.0, 0.0)], 2, &[10.0, 14.0]);
        let out = search(&model, 2, far_deadline()).unwrap();
        let a = out.assignment.unwrap();
        assert_eq!(out.status, SolveStatus::Optimal);
        assert_eq!(a.makespan, hours_to_ticks(14.0));
        assert_ne!(a.machine[0], a.machine[1]);
    }

    #[test]
    fn exclusion_forbids_overlap_across_machines() {
        // 3 m apart, within the 5 m exclusion distance
        let model = build(vec![pile(1, 0.0, 0.0), pile(2, 3.0, 0.0)], 2, &[10.0, 10.0]);
        let out = search(&model, 2, far_deadline()).unwrap();
        let a = out.assignment.unwrap();
        // forced sequential even with a spare machine
        assert_eq!(a.makespan, hours_to_ticks(20.0));
    }

    #[test]
    fn mutual_forbidden_pair_serializes_with_gap() {
        let mut req = SolveRequest::new(vec![pile(1, 0.0, 0.0), pile(2, 3.0, 0.0)], 2);
        req.simultaneous_exclude_half_side = 0.0;
        req.forbidden_zone_diameter_multiplier = 12.0; // radius 6 m covers both ways
        req.forbidden_duration_hours = 36.0;
        req.zone_penalty_hours = 0.0;
        let model = ScheduleModel::build(&req, vec![0, 0], &[10.0, 10.0]);
        let out = search(&model, 2, far_deadline()).unwrap();
        let a = out.assignment.unwrap();
        let (first, second) = if a.start[0] <= a.start[1] { (0, 1) } else { (1, 0) };
        let first_end = a.start[first] + model.durations[first];
        assert!(a.start[second] >= first_end + model.forbidden_gap);
        assert_eq!(a.makespan, hours_to_ticks(10.0 + 36.0 + 10.0));
    }

    #[test]
    fn zero_machines_reports_infeasible() {
        let mut req = SolveRequest::new(vec![pile(1, 0.0, 0.0)], 1);
        req.num_machines = 0;
        let model = ScheduleModel::build(&req, vec![0], &[10.0]);
        let out = search(&model, 1, far_deadline()).unwrap();
        assert_eq!(out.status, SolveStatus::Infeasible);
        assert!(out.assignment.is_none());
    }

    #[test]
    fn no_piles_is_trivially_optimal() {
        let req = SolveRequest::new(Vec::new(), 2);
        let model = ScheduleModel::build(&req, Vec::new(), &[]);
        let out = search(&model, 1, far_deadline()).unwrap();
        assert_eq!(out.status, SolveStatus::Optimal);
        assert_eq!(out.assignment.unwrap().makespan, 0);
    }

    #[test]
    fn expired_deadline_with_no_incumbent_is_unknown() {
        let piles: Vec<Pile> = (0..12).map(|i| pile(i, i as f64 * 100.0, 0.0)).collect();
        let durations = vec![10.0; 12];
        let model = build(piles, 3, &durations);
        let out = search(&model, 2, Instant::now()).unwrap();
        assert_eq!(out.status, SolveStatus::Unknown);
        assert!(out.assignment.is_none());
    }

    #[test]
    fn zone_penalty_inserts_relocation_gap() {
        // two piles in different zones on one machine
        let mut req = SolveRequest::new(vec![pile(1, 0.0, 0.0), pile(2, 1000.0, 0.0)], 1);
        req.simultaneous_exclude_half_side = 0.0;
        req.zone_penalty_hours = 10.0;
        let model = ScheduleModel::build(&req, vec![0, 1], &[10.0, 10.0]);
        let out = search(&model, 1, far_deadline()).unwrap();
        let a = out.assignment.unwrap();
        assert_eq!(a.makespan, hours_to_ticks(10.0 + 10.0 + 10.0));
    }

    #[test]
    fn statistics_reported_on_every_outcome() {
        let model = build(vec![pile(1, 0.0, 0.0)], 1, &[10.0]);
        let out = search(&model, 1, far_deadline()).unwrap();
        assert!(out.statistics.branches > 0);
        assert!(out.statistics.wall_time >= 0.0);
    }
}
