//! PilePlan Core - Domain types for pile-driving schedule optimization
//!
//! This crate provides the shared vocabulary of the engine:
//! - Problem facts (`Pile`) and plan records (`ScheduledTask`,
//!   `OptimizationResult`)
//! - The fully-validated `SolveRequest` configuration
//! - The error taxonomy

pub mod domain;
pub mod error;
pub mod request;

pub use domain::{
    OptimizationResult, Pile, ScheduledTask, SearchStatistics, SimulatedStats, SolveStatus, ZoneId,
};
pub use error::{PilePlanError, Result};
pub use request::{DurationScenario, LogNormalParams, SolveRequest};
