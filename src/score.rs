use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::aggregate::{AgentWorkLog, CategoryBreakdown};
use crate::models::AgentMetrics;

/// Derives per-agent metrics. Returns `None` when the agent has no worked
/// days or no completions; such agents are left out of the cohort entirely
/// rather than scored as zero.
pub fn compute(
    categories: &[CategoryBreakdown],
    worked_dates: &BTreeSet<NaiveDate>,
) -> Option<AgentMetrics> {
    let total_completed: u64 = categories.iter().map(|c| c.count).sum();
    let days_worked = worked_dates.len() as u32;
    if total_completed == 0 || days_worked == 0 {
        return None;
    }

    let weighted_points: f64 = categories.iter().map(|c| c.points).sum();
    let total_seconds: f64 = categories.iter().map(|c| c.total_handle_seconds).sum();
    let active_hours = total_seconds / 3600.0;

    // Per-hour rates only consider work that carries a handle time.
    let timed = categories.iter().filter(|c| c.avg_handle_seconds.is_some());
    let (timed_count, timed_points) =
        timed.fold((0u64, 0.0f64), |(count, points), c| (count + c.count, points + c.points));
    let (pts_per_active_hour, tasks_per_active_hour) = if active_hours > 0.0 {
        (
            Some(timed_points / active_hours),
            Some(timed_count as f64 / active_hours),
        )
    } else {
        (None, None)
    };

    Some(AgentMetrics {
        total_completed,
        weighted_points,
        days_worked,
        weighted_daily_avg: weighted_points / days_worked as f64,
        tasks_per_day: total_completed as f64 / days_worked as f64,
        active_hours,
        pts_per_active_hour,
        tasks_per_active_hour,
    })
}

pub fn score_log(log: &AgentWorkLog) -> Option<AgentMetrics> {
    compute(&log.group_by_category(), &log.worked_dates())
}
