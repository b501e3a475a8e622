//! Monte-Carlo risk simulator.
//!
//! Re-samples every pile's duration many times against the fixed machine
//! assignment and per-machine task order, replays the machine timelines
//! (zone-transition penalties included, spatial rules not re-checked:
//! only durations vary), and aggregates the trial makespans into
//! percentile statistics and a completion probability.

use std::time::Instant;

use pileplan_core::{Result, ScheduledTask, SimulatedStats};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, LogNormal};
use rayon::prelude::*;

use crate::duration::DurationModel;

/// Risk estimate for a fixed schedule.
#[derive(Debug, Clone)]
pub struct RiskEstimate {
    /// Fraction of trials whose makespan stayed within the buffered
    /// deterministic makespan.
    pub completion_probability: f64,
    pub stats: SimulatedStats,
}

/// Runs up to `num_trials` independent trials; trials not started before
/// `deadline` are skipped and the reduced count is reported in
/// `stats.num_simulations`. Returns `None` when no trial completed.
pub fn simulate_risk(
    schedule: &[ScheduledTask],
    durations: &DurationModel,
    zone_penalty_hours: f64,
    num_trials: usize,
    base_seed: u64,
    buffered_makespan: f64,
    deadline: Instant,
) -> Result<Option<RiskEstimate>> {
    if schedule.is_empty() || num_trials == 0 {
        return Ok(None);
    }

    // One distribution per task, in schedule order; trial draws follow
    // this order so a trial's samples depend only on its seed.
    let dists: Vec<LogNormal<f64>> = schedule
        .iter()
        .map(|task| {
            let params = durations.params_for(task.pile_type)?;
            LogNormal::new(params.mu, params.sigma).map_err(|e| {
                pileplan_core::PilePlanError::Internal(format!("log-normal parameters: {e}"))
            })
        })
        .collect::<Result<_>>()?;
    let machine_order = per_machine_order(schedule);

    let makespans: Vec<f64> = (0..num_trials as u64)
        .into_par_iter()
        .filter_map(|trial| {
            if Instant::now() >= deadline {
                return None;
            }
            let mut rng = ChaCha8Rng::seed_from_u64(trial_seed(base_seed, trial));
            let sampled: Vec<f64> = dists.iter().map(|d| d.sample(&mut rng)).collect();
            Some(replay(schedule, &machine_order, &sampled, zone_penalty_hours))
        })
        .collect();

    let executed = makespans.len();
    if executed == 0 {
        tracing::warn!("simulation deadline expired before any trial completed");
        return Ok(None);
    }
    if executed < num_trials {
        tracing::debug!(
            requested = num_trials,
            executed,
            "simulation underrun: deadline expired"
        );
    }

    let within = makespans.iter().filter(|m| **m <= buffered_makespan).count();
    let stats = aggregate(makespans);
    Ok(Some(RiskEstimate {
        completion_probability: within as f64 / executed as f64,
        stats,
    }))
}

fn trial_seed(base_seed: u64, trial: u64) -> u64 {
    base_seed ^ trial.wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Task indices grouped by machine, preserving the schedule's start
/// order within each machine.
fn per_machine_order(schedule: &[ScheduledTask]) -> Vec<Vec<usize>> {
    let max_machine = schedule.iter().map(|t| t.machine).max().unwrap_or(0);
    let mut order = vec![Vec::new(); max_machine + 1];
    for (i, task) in schedule.iter().enumerate() {
        order[task.machine].push(i);
    }
    order
}

/// Replays the machine timelines with the sampled durations. Assignment
/// and per-machine order stay fixed; only the durations change.
fn replay(
    schedule: &[ScheduledTask],
    machine_order: &[Vec<usize>],
    sampled: &[f64],
    zone_penalty_hours: f64,
) -> f64 {
    let mut makespan = 0.0f64;
    for tasks in machine_order {
        let mut clock = 0.0f64;
        let mut last_zone: Option<usize> = None;
        for &i in tasks {
            let task = &schedule[i];
            if last_zone.is_some_and(|z| z != task.zone_id) {
                clock += zone_penalty_hours;
            }
            clock += sampled[i];
            last_zone = Some(task.zone_id);
            makespan = makespan.max(clock);
        }
    }
    makespan
}

/// Order-independent aggregation: sums and a sorted percentile sweep.
fn aggregate(mut makespans: Vec<f64>) -> SimulatedStats {
    makespans.sort_by(f64::total_cmp);
    let n = makespans.len();
    let mean = makespans.iter().sum::<f64>() / n as f64;
    let variance = makespans.iter().map(|m| (m - mean) * (m - mean)).sum::<f64>() / n as f64;
    SimulatedStats {
        mean,
        median: percentile(&makespans, 50.0),
        std: variance.sqrt(),
        p10: percentile(&makespans, 10.0),
        p25: percentile(&makespans, 25.0),
        p75: percentile(&makespans, 75.0),
        p90: percentile(&makespans, 90.0),
        min: makespans[0],
        max: makespans[n - 1],
        num_simulations: n,
    }
}

/// Linear-interpolated percentile over a sorted slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let rank = p / 100.0 * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = rank - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}
