//! Domain model for pile-driving schedule optimization.
//!
//! These are the value types that flow through a solve: the immutable
//! `Pile` facts, the `ScheduledTask` assignments produced by the search
//! engine, and the `OptimizationResult` record returned to the caller.

use serde::{Deserialize, Serialize};

/// Zone identifier assigned by the partitioner (`0..num_zones`).
pub type ZoneId = usize;

/// A pile to be driven. Immutable problem fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pile {
    /// Unique pile identifier.
    pub id: u64,
    /// Plan-view position, metres.
    pub x: f64,
    pub y: f64,
    /// Pile class; selects the duration distribution.
    #[serde(rename = "type")]
    pub pile_type: u32,
    /// Shaft diameter, metres. Drives the forbidden-zone radius.
    pub diameter: f64,
}

impl Pile {
    /// Euclidean distance to another pile.
    pub fn distance_to(&self, other: &Pile) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// One scheduled pile task in the final plan.
///
/// All times are hours from a common origin (hour 0). `machine` is
/// reported 1-based, matching the record the downstream consumers expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub pile_id: u64,
    pub x: f64,
    pub y: f64,
    #[serde(rename = "type")]
    pub pile_type: u32,
    pub diameter: f64,
    pub zone_id: ZoneId,
    pub start_hour: f64,
    pub end_hour: f64,
    pub duration_hour: f64,
    pub machine: usize,
}

/// Outcome of a solve attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveStatus {
    /// Search space exhausted within the budget; incumbent is optimal.
    Optimal,
    /// Budget expired with an incumbent whose optimality is unproven.
    Feasible,
    /// The model admits no assignment.
    Infeasible,
    /// Budget expired before any feasible assignment was found.
    Unknown,
}

impl SolveStatus {
    /// True when a schedule was produced.
    pub fn has_solution(self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::Feasible)
    }
}

/// Search-tree counters and timing, reported regardless of outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchStatistics {
    /// Branch nodes explored.
    pub branches: u64,
    /// Placement conflicts detected (start-time bumps during propagation).
    pub conflicts: u64,
    /// Elapsed wall time, seconds.
    pub wall_time: f64,
}

/// Aggregate statistics over simulated trial makespans.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulatedStats {
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation; 0 for a single trial.
    pub std: f64,
    pub p10: f64,
    pub p25: f64,
    pub p75: f64,
    pub p90: f64,
    pub min: f64,
    pub max: f64,
    /// Trials actually executed (may undercut the request on deadline).
    pub num_simulations: usize,
}

/// Complete result record for one solve invocation. Read-only afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub status: SolveStatus,
    pub makespan_hours: Option<f64>,
    pub estimated_makespan_with_buffer: Option<f64>,
    pub completion_probability: Option<f64>,
    pub simulated_stats: Option<SimulatedStats>,
    /// Tasks ordered by start hour; empty unless `status.has_solution()`.
    pub schedule: Vec<ScheduledTask>,
    pub statistics: SearchStatistics,
}

impl OptimizationResult {
    /// Result for a solve that produced no schedule.
    pub fn without_solution(status: SolveStatus, statistics: SearchStatistics) -> Self {
        OptimizationResult {
            status,
            makespan_hours: None,
            estimated_makespan_with_buffer: None,
            completion_probability: None,
            simulated_stats: None,
            schedule: Vec::new(),
            statistics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pile(id: u64, x: f64, y: f64) -> Pile {
        Pile {
            id,
            x,
            y,
            pile_type: 1,
            diameter: 1.5,
        }
    }

    #[test]
    fn distance_is_euclidean() {
        let a = pile(1, 0.0, 0.0);
        let b = pile(2, 3.0, 4.0);
        assert_eq!(a.distance_to(&b), 5.0);
        assert_eq!(b.distance_to(&a), 5.0);
    }

    #[test]
    fn status_serializes_screaming_case() {
        assert_eq!(
            serde_json::to_string(&SolveStatus::Optimal).unwrap(),
            "\"OPTIMAL\""
        );
        assert_eq!(
            serde_json::from_str::<SolveStatus>("\"INFEASIBLE\"").unwrap(),
            SolveStatus::Infeasible
        );
    }

    #[test]
    fn pile_json_uses_type_key() {
        let p: Pile = serde_json::from_str(
            r#"{"id":7,"x":2.0,"y":-1.0,"type":2,"diameter":1.2}"#,
        )
        .unwrap();
        assert_eq!(p.pile_type, 2);
        assert_eq!(p.id, 7);
    }
}
