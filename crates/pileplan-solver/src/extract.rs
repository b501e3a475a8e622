//! Result extraction: turns a search assignment into the task sequence
//! reported to the caller. Pure and deterministic given a solution.

use pileplan_core::ScheduledTask;

use crate::model::{ticks_to_hours, ScheduleModel};
use crate::search::Assignment;

/// Builds the schedule record, ordered by start hour, machines reported
/// 1-based. Returns the tasks and the makespan in hours.
pub fn extract_schedule(model: &ScheduleModel, assignment: &Assignment) -> (Vec<ScheduledTask>, f64) {
    let mut tasks: Vec<ScheduledTask> = model
        .piles
        .iter()
        .enumerate()
        .map(|(i, pile)| {
            let start_ticks = assignment.start[i];
            let duration_ticks = model.durations[i];
            ScheduledTask {
                pile_id: pile.id,
                x: pile.x,
                y: pile.y,
                pile_type: pile.pile_type,
                diameter: pile.diameter,
                zone_id: model.zones[i],
                start_hour: ticks_to_hours(start_ticks),
                // converted from the tick sum so the reported makespan
                // equals max(end_hour) exactly
                end_hour: ticks_to_hours(start_ticks + duration_ticks),
                duration_hour: ticks_to_hours(duration_ticks),
                machine: assignment.machine[i] + 1,
            }
        })
        .collect();
    tasks.sort_by(|a, b| {
        a.start_hour
            .total_cmp(&b.start_hour)
            .then(a.pile_id.cmp(&b.pile_id))
    });
    let makespan = ticks_to_hours(assignment.makespan);
    (tasks, makespan)
}
