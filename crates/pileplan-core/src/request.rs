//! Solve request: the single, fully-validated configuration structure
//! constructed once per solve invocation.
//!
//! Load a request from a TOML file to drive a solve without code changes:
//!
//! ```
//! use pileplan_core::SolveRequest;
//!
//! let request = SolveRequest::from_toml_str(r#"
//!     num_machines = 2
//!     duration_scenario = "expected"
//!     solver_max_time = 10.0
//!
//!     [[piles]]
//!     id = 1
//!     x = 0.0
//!     y = 0.0
//!     type = 1
//!     diameter = 1.5
//! "#).unwrap();
//!
//! assert_eq!(request.num_machines, 2);
//! request.validate().unwrap();
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::Pile;
use crate::error::{PilePlanError, Result};

/// Selector for how scenario durations are derived from the per-type
/// log-normal distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationScenario {
    /// Distribution mean, `exp(mu + sigma^2 / 2)`.
    #[default]
    Expected,
    /// 90th percentile, `exp(mu + sigma * z_0.9)`.
    #[serde(rename = "pessimistic_90")]
    Pessimistic90,
    /// Distribution mode, `exp(mu - sigma^2)`.
    MostLikely,
    /// One seeded draw per pile.
    RandomSample,
}

/// Log-normal shape parameters for one pile type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogNormalParams {
    /// Log-space mean.
    pub mu: f64,
    /// Log-space standard deviation.
    pub sigma: f64,
}

/// A complete solve request. All parameters for one invocation of the
/// engine; no implicit global defaults are consulted after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SolveRequest {
    /// Piles to schedule.
    pub piles: Vec<Pile>,

    /// Number of pile-driving machines available.
    pub num_machines: usize,

    /// Scenario used to resolve the deterministic solve durations.
    #[serde(default)]
    pub duration_scenario: DurationScenario,

    /// Weather contingency added on top of the deterministic makespan.
    #[serde(default)]
    pub weather_buffer_hours: f64,

    /// Monte-Carlo trial count for the risk estimate.
    #[serde(default = "default_monte_carlo_simulations")]
    pub monte_carlo_simulations: usize,

    /// Post-completion curing window during which nearby piles may not
    /// start, hours.
    #[serde(default = "default_forbidden_duration_hours")]
    pub forbidden_duration_hours: f64,

    /// Minimum distance below which two piles may never be worked
    /// simultaneously, metres.
    #[serde(default = "default_simultaneous_exclude_half_side")]
    pub simultaneous_exclude_half_side: f64,

    /// Forbidden-zone radius is `diameter * multiplier / 2`.
    #[serde(default = "default_forbidden_zone_diameter_multiplier")]
    pub forbidden_zone_diameter_multiplier: f64,

    /// Target spatial zone count; defaults to `num_machines` when absent.
    #[serde(default)]
    pub num_zones: Option<usize>,

    /// Idle relocation gap charged when a machine crosses zones between
    /// consecutive tasks, hours.
    #[serde(default = "default_zone_penalty_hours")]
    pub zone_penalty_hours: f64,

    /// Parallel search workers sharing the best-known bound.
    #[serde(default = "default_solver_num_workers")]
    pub solver_num_workers: usize,

    /// Wall-clock budget for search plus simulation, seconds.
    #[serde(default = "default_solver_max_time")]
    pub solver_max_time: f64,

    /// Seed for all stochastic draws (zone init, sampled durations,
    /// Monte-Carlo trials). A fixed seed makes the whole solve
    /// reproducible.
    #[serde(default)]
    pub random_seed: Option<u64>,

    /// Per-type overrides of the built-in duration distributions.
    #[serde(default)]
    pub duration_params: BTreeMap<u32, LogNormalParams>,
}

fn default_monte_carlo_simulations() -> usize {
    1000
}
fn default_forbidden_duration_hours() -> f64 {
    36.0
}
fn default_simultaneous_exclude_half_side() -> f64 {
    16.0
}
fn default_forbidden_zone_diameter_multiplier() -> f64 {
    12.0
}
fn default_zone_penalty_hours() -> f64 {
    10.0
}
fn default_solver_num_workers() -> usize {
    3
}
fn default_solver_max_time() -> f64 {
    300.0
}

impl SolveRequest {
    /// Creates a request with default parameters for the given piles and
    /// machine count.
    pub fn new(piles: Vec<Pile>, num_machines: usize) -> Self {
        SolveRequest {
            piles,
            num_machines,
            duration_scenario: DurationScenario::default(),
            weather_buffer_hours: 0.0,
            monte_carlo_simulations: default_monte_carlo_simulations(),
            forbidden_duration_hours: default_forbidden_duration_hours(),
            simultaneous_exclude_half_side: default_simultaneous_exclude_half_side(),
            forbidden_zone_diameter_multiplier: default_forbidden_zone_diameter_multiplier(),
            num_zones: None,
            zone_penalty_hours: default_zone_penalty_hours(),
            solver_num_workers: default_solver_num_workers(),
            solver_max_time: default_solver_max_time(),
            random_seed: None,
            duration_params: BTreeMap::new(),
        }
    }

    /// Loads a request from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| PilePlanError::Configuration(format!("cannot read request: {e}")))?;
        Self::from_toml_str(&contents)
    }

    /// Parses a request from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| PilePlanError::Configuration(e.to_string()))
    }

    /// Effective zone count: the configured value, degraded to 1 when
    /// zero, defaulting to `num_machines`.
    pub fn effective_num_zones(&self) -> usize {
        self.num_zones.unwrap_or(self.num_machines).max(1)
    }

    /// Effective root seed for all stochastic draws.
    pub fn effective_seed(&self) -> u64 {
        self.random_seed.unwrap_or(42)
    }

    /// Rejects malformed or contradictory input before any model is
    /// built. A request that passes here either solves or reports an
    /// `INFEASIBLE`/`UNKNOWN` status; it never errors later on shape.
    pub fn validate(&self) -> Result<()> {
        if self.num_machines == 0 {
            return Err(PilePlanError::Validation(
                "num_machines must be at least 1".into(),
            ));
        }
        if self.monte_carlo_simulations == 0 {
            return Err(PilePlanError::Validation(
                "monte_carlo_simulations must be at least 1".into(),
            ));
        }
        if self.solver_num_workers == 0 {
            return Err(PilePlanError::Validation(
                "solver_num_workers must be at least 1".into(),
            ));
        }
        if !self.solver_max_time.is_finite() || self.solver_max_time <= 0.0 {
            return Err(PilePlanError::Validation(format!(
                "solver_max_time must be a positive finite number, got {}",
                self.solver_max_time
            )));
        }
        for (name, v) in [
            ("weather_buffer_hours", self.weather_buffer_hours),
            ("forbidden_duration_hours", self.forbidden_duration_hours),
            (
                "simultaneous_exclude_half_side",
                self.simultaneous_exclude_half_side,
            ),
            (
                "forbidden_zone_diameter_multiplier",
                self.forbidden_zone_diameter_multiplier,
            ),
            ("zone_penalty_hours", self.zone_penalty_hours),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(PilePlanError::Validation(format!(
                    "{name} must be a non-negative finite number, got {v}"
                )));
            }
        }

        let mut seen = HashSet::with_capacity(self.piles.len());
        for pile in &self.piles {
            if !seen.insert(pile.id) {
                return Err(PilePlanError::Validation(format!(
                    "duplicate pile id {}",
                    pile.id
                )));
            }
            if !pile.x.is_finite() || !pile.y.is_finite() {
                return Err(PilePlanError::Validation(format!(
                    "pile {} has non-finite coordinates",
                    pile.id
                )));
            }
            if !pile.diameter.is_finite() || pile.diameter <= 0.0 {
                return Err(PilePlanError::Validation(format!(
                    "pile {} has non-positive diameter {}",
                    pile.id, pile.diameter
                )));
            }
        }
        for (pile_type, params) in &self.duration_params {
            if !params.mu.is_finite() || !params.sigma.is_finite() || params.sigma <= 0.0 {
                return Err(PilePlanError::Validation(format!(
                    "duration_params for type {pile_type} must have finite mu and positive sigma"
                )));
            }
        }
        Ok(())
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
    fn defaults_match_reference_values() {
        let req = SolveRequest::new(vec![pile(1, 0.0, 0.0)], 3);
        assert_eq!(req.monte_carlo_simulations, 1000);
        assert_eq!(req.forbidden_duration_hours, 36.0);
        assert_eq!(req.simultaneous_exclude_half_side, 16.0);
        assert_eq!(req.forbidden_zone_diameter_multiplier, 12.0);
        assert_eq!(req.zone_penalty_hours, 10.0);
        assert_eq!(req.effective_num_zones(), 3);
        req.validate().unwrap();
    }

    #[test]
    fn json_request_round_trips() {
        let json = r#"{
            "piles": [
                {"id": 1, "x": 2.0, "y": -1.0, "type": 1, "diameter": 1.5},
                {"id": 2, "x": 6.0, "y": -1.0, "type": 2, "diameter": 1.2}
            ],
            "num_machines": 2,
            "duration_scenario": "pessimistic_90",
            "weather_buffer_hours": 12.0,
            "num_zones": 2
        }"#;
        let req: SolveRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.duration_scenario, DurationScenario::Pessimistic90);
        assert_eq!(req.effective_num_zones(), 2);
        let back = serde_json::to_string(&req).unwrap();
        let again: SolveRequest = serde_json::from_str(&back).unwrap();
        assert_eq!(again.piles, req.piles);
    }

    #[test]
    fn unknown_scenario_is_rejected_at_parse() {
        let toml = r#"
            num_machines = 1
            duration_scenario = "optimistic"
            piles = []
        "#;
        assert!(SolveRequest::from_toml_str(toml).is_err());
    }

    #[test]
    fn duplicate_pile_ids_rejected() {
        let req = SolveRequest::new(vec![pile(1, 0.0, 0.0), pile(1, 5.0, 5.0)], 2);
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate pile id 1"));
    }

    #[test]
    fn zero_machines_rejected() {
        let req = SolveRequest::new(vec![pile(1, 0.0, 0.0)], 0);
        assert!(req.validate().is_err());
    }

    #[test]
    fn non_finite_coordinates_rejected() {
        let req = SolveRequest::new(vec![pile(1, f64::NAN, 0.0)], 1);
        assert!(req.validate().is_err());
    }

    #[test]
    fn zero_simulations_rejected() {
        let mut req = SolveRequest::new(vec![pile(1, 0.0, 0.0)], 1);
        req.monte_carlo_simulations = 0;
        assert!(req.validate().is_err());
    }

    #[test]
    fn zero_workers_rejected() {
        let mut req = SolveRequest::new(vec![pile(1, 0.0, 0.0)], 1);
        req.solver_num_workers = 0;
        assert!(req.validate().is_err());
    }

    #[test]
    fn non_positive_or_non_finite_solver_max_time_rejected() {
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let mut req = SolveRequest::new(vec![pile(1, 0.0, 0.0)], 1);
            req.solver_max_time = bad;
            assert!(req.validate().is_err(), "accepted solver_max_time {bad}");
        }
    }

    #[test]
    fn zero_zones_degrades_to_one() {
        let mut req = SolveRequest::new(vec![pile(1, 0.0, 0.0)], 2);
        req.num_zones = Some(0);
        assert_eq!(req.effective_num_zones(), 1);
        req.validate().unwrap();
    }
}
