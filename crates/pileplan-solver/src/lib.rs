//! PilePlan Solver Engine
//!
//! Constraint-based scheduling of pile-driving tasks across a fixed
//! machine fleet, plus a Monte-Carlo estimate of how reliable the
//! resulting plan is under stochastic task durations:
//! - Zone partitioner (seeded k-means over pile positions)
//! - Duration resolver (per-type log-normal scenarios)
//! - Constraint model builder (machine, exclusion, forbidden-zone and
//!   zone-penalty rules)
//! - Parallel branch-and-bound search with a shared best bound
//! - Risk simulator (duration re-sampling against the fixed assignment)
//!
//! The engine is a pure compute module: one [`solve`] call validates the
//! request, runs the pipeline within the request's wall-clock budget and
//! returns a single [`OptimizationResult`]. No state crosses invocations.

pub mod duration;
pub mod extract;
pub mod model;
pub mod risk;
pub mod search;
pub mod zoning;

use std::time::{Duration, Instant};

use pileplan_core::{OptimizationResult, PilePlanError, Result, SolveRequest};

pub use duration::DurationModel;
pub use extract::extract_schedule;
pub use model::ScheduleModel;
pub use risk::{simulate_risk, RiskEstimate};
pub use search::{search, Assignment, SearchOutcome};
pub use zoning::partition_zones;

/// Budgets beyond a year are effectively unbounded; clamping keeps the
/// deadline arithmetic within `Duration`/`Instant` range.
const MAX_BUDGET_SECS: f64 = 366.0 * 24.0 * 3600.0;

/// Runs the full pipeline for one request: validate, partition, resolve
/// durations, build the model, search, extract, simulate.
///
/// Search and simulation share the request's `solver_max_time` budget;
/// on expiry each returns its best partial result (an unproven incumbent,
/// a reduced trial count) rather than failing.
pub fn solve(request: &SolveRequest) -> Result<OptimizationResult> {
    request.validate()?;
    let span = tracing::info_span!(
        "solve",
        piles = request.piles.len(),
        machines = request.num_machines
    );
    let _guard = span.enter();

    let budget = Duration::from_secs_f64(request.solver_max_time.min(MAX_BUDGET_SECS));
    let deadline = Instant::now() + budget;
    let seed = request.effective_seed();

    let zones = partition_zones(&request.piles, request.effective_num_zones(), seed);
    let durations = DurationModel::with_overrides(&request.duration_params);
    let scenario_hours = durations.resolve(&request.piles, request.duration_scenario, seed)?;
    let model = ScheduleModel::build(request, zones, &scenario_hours);

    let outcome = search(&model, request.solver_num_workers, deadline)?;
    if !outcome.status.has_solution() {
        return Ok(OptimizationResult::without_solution(
            outcome.status,
            outcome.statistics,
        ));
    }
    let Some(assignment) = outcome.assignment else {
        return Err(PilePlanError::Internal(
            "search reported a solution without an assignment".into(),
        ));
    };

    let (schedule, makespan_hours) = extract_schedule(&model, &assignment);
    let buffered_makespan = makespan_hours + request.weather_buffer_hours;
    let risk = simulate_risk(
        &schedule,
        &durations,
        request.zone_penalty_hours,
        request.monte_carlo_simulations,
        seed,
        buffered_makespan,
        deadline,
    )?;
    let (completion_probability, simulated_stats) = match risk {
        Some(estimate) => (Some(estimate.completion_probability), Some(estimate.stats)),
        None => (None, None),
    };

    Ok(OptimizationResult {
        status: outcome.status,
        makespan_hours: Some(makespan_hours),
        estimated_makespan_with_buffer: Some(buffered_makespan),
        completion_probability,
        simulated_stats,
        schedule,
        statistics: outcome.statistics,
    })
}
