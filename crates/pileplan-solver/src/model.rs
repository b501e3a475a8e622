//! Constraint model builder.
//!
//! Turns piles, machines and safety rules into an explicit scheduling
//! model: integer-tick durations, a feasible horizon, and precomputed
//! pairwise conflict sets. Time is discretized to tenth-hour ticks so the
//! search engine compares and hashes times exactly.

use pileplan_core::{Pile, SolveRequest, ZoneId};
use smallvec::SmallVec;

/// Internal time resolution: tenths of an hour.
pub const TICKS_PER_HOUR: i64 = 10;

/// Conflict adjacency list; most piles conflict with a handful of
/// neighbors.
pub type ConflictList = SmallVec<[usize; 8]>;

/// An explicit, immutable scheduling model for one solve.
#[derive(Debug, Clone)]
pub struct ScheduleModel {
    pub piles: Vec<Pile>,
    /// Zone per pile, parallel to `piles`.
    pub zones: Vec<ZoneId>,
    /// Scenario duration per pile, in ticks (at least 1).
    pub durations: Vec<i64>,
    pub num_machines: usize,
    /// Upper bound on any feasible makespan, in ticks.
    pub horizon: i64,
    /// Post-completion wait, in ticks.
    pub forbidden_gap: i64,
    /// Relocation idle gap between zones, in ticks.
    pub zone_penalty: i64,
    /// `exclusion[p]` lists piles that may never overlap `p` in time,
    /// regardless of machine. Symmetric.
    pub exclusion: Vec<ConflictList>,
    /// `forbidden_sources[b]` lists piles `a` whose forbidden zone covers
    /// `b`: `b` must either finish before `a` starts or start at least
    /// `forbidden_gap` after `a` ends.
    pub forbidden_sources: Vec<ConflictList>,
    /// Transpose of `forbidden_sources`.
    pub forbidden_targets: Vec<ConflictList>,
}

impl ScheduleModel {
    /// Builds the model from a validated request, the zone partition and
    /// the resolved scenario durations (hours).
    pub fn build(request: &SolveRequest, zones: Vec<ZoneId>, duration_hours: &[f64]) -> Self {
        let piles = request.piles.clone();
        let n = piles.len();
        debug_assert_eq!(zones.len(), n);
        debug_assert_eq!(duration_hours.len(), n);

        let durations: Vec<i64> = duration_hours.iter().map(|h| hours_to_ticks(*h)).collect();
        let forbidden_gap = hours_to_ticks(request.forbidden_duration_hours);
        let zone_penalty = hours_to_ticks(request.zone_penalty_hours);

        let mut exclusion = vec![ConflictList::new(); n];
        let mut forbidden_sources = vec![ConflictList::new(); n];
        let mut forbidden_targets = vec![ConflictList::new(); n];
        for a in 0..n {
            for b in 0..n {
                if a == b {
                    continue;
                }
                let dist = piles[a].distance_to(&piles[b]);
                if a < b && dist <= request.simultaneous_exclude_half_side {
                    exclusion[a].push(b);
                    exclusion[b].push(a);
                }
                let radius = piles[a].diameter * request.forbidden_zone_diameter_multiplier / 2.0;
                if dist <= radius {
                    forbidden_sources[b].push(a);
                    forbidden_targets[a].push(b);
                }
            }
        }

        // Worst case every task waits out a forbidden window and every
        // transition crosses zones.
        let total_work: i64 = durations.iter().sum();
        let horizon = total_work + (n as i64) * (forbidden_gap + zone_penalty);

        let model = ScheduleModel {
            piles,
            zones,
            durations,
            num_machines: request.num_machines,
            horizon,
            forbidden_gap,
            zone_penalty,
            exclusion,
            forbidden_sources,
            forbidden_targets,
        };
        tracing::debug!(
            piles = n,
            machines = model.num_machines,
            exclusion_pairs = model.exclusion.iter().map(|c| c.len()).sum::<usize>() / 2,
            forbidden_pairs = model.forbidden_sources.iter().map(|c| c.len()).sum::<usize>(),
            horizon_ticks = model.horizon,
            "built schedule model"
        );
        model
    }

    pub fn num_piles(&self) -> usize {
        self.piles.len()
    }

    /// A model with piles but no machines admits no assignment.
    pub fn is_infeasible(&self) -> bool {
        self.num_machines == 0 && !self.piles.is_empty()
    }
}

/// Rounds hours to ticks; positive durations never collapse to zero.
pub fn hours_to_ticks(hours: f64) -> i64 {
    let ticks = (hours * TICKS_PER_HOUR as f64).round() as i64;
    if hours > 0.0 {
        ticks.max(1)
    } else {
        ticks.max(0)
    }
}

/// Converts ticks back to hours for reporting.
pub fn ticks_to_hours(ticks: i64) -> f64 {
    ticks as f64 / TICKS_PER_HOUR as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use pileplan_core::SolveRequest;

    fn pile(id: u64, x: f64, y: f64, diameter: f64) -> Pile {
        Pile {
            id,
            x,
            y,
            pile_type: 1,
            diameter,
        }
    }

    fn request(piles: Vec<Pile>) -> SolveRequest {
        let mut req = SolveRequest::new(piles, 2);
        req.simultaneous_exclude_half_side = 10.0;
        req.forbidden_zone_diameter_multiplier = 12.0;
        req
    }

    #[test]
    fn exclusion_pairs_are_symmetric_and_distance_based() {
        // piles 0/1 are 5 m apart (within 10), pile 2 is 100 m away
        let req = request(vec![
            pile(1, 0.0, 0.0, 1.0),
            pile(2, 5.0, 0.0, 1.0),
            pile(3, 100.0, 0.0, 1.0),
        ]);
        let zones = vec![0, 0, 0];
        let model = ScheduleModel::build(&req, zones, &[10.0, 10.0, 10.0]);
        assert_eq!(model.exclusion[0].as_slice(), &[1]);
        assert_eq!(model.exclusion[1].as_slice(), &[0]);
        assert!(model.exclusion[2].is_empty());
    }

    #[test]
    fn forbidden_pairs_are_directional_on_diameter() {
        // radius of pile 0 = 2.0 * 12 / 2 = 12 m covers pile 1 at 8 m;
        // radius of pile 1 = 1.0 * 12 / 2 = 6 m does not cover pile 0.
        let req = request(vec![pile(1, 0.0, 0.0, 2.0), pile(2, 8.0, 0.0, 1.0)]);
        let model = ScheduleModel::build(&req, vec![0, 0], &[10.0, 10.0]);
        assert_eq!(model.forbidden_sources[1].as_slice(), &[0]);
        assert!(model.forbidden_sources[0].is_empty());
        assert_eq!(model.forbidden_targets[0].as_slice(), &[1]);
    }

    #[test]
    fn durations_convert_to_ticks() {
        assert_eq!(hours_to_ticks(23.57), 236);
        assert_eq!(hours_to_ticks(0.0), 0);
        assert_eq!(hours_to_ticks(0.01), 1);
        assert_eq!(ticks_to_hours(236), 23.6);
    }

    #[test]
    fn zero_machines_is_infeasible() {
        let mut req = request(vec![pile(1, 0.0, 0.0, 1.0)]);
        req.num_machines = 0;
        let model = ScheduleModel::build(&req, vec![0], &[10.0]);
        assert!(model.is_infeasible());
    }
}
