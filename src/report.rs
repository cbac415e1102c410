use std::fmt::Write;

use crate::calendar::WindowKind;
use crate::engine::{AgentProfile, Standings};
use crate::models::AgentScorecard;
use crate::profile::ProfileView;

fn format_optional(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.1}"))
}

fn window_label(standings: &Standings) -> String {
    let window = &standings.window;
    match (window.kind, window.sprint_number) {
        (WindowKind::Sprint, Some(number)) if window.is_current => {
            format!("Sprint {number} (current)")
        }
        (WindowKind::Sprint, Some(number)) => format!("Sprint {number}"),
        (WindowKind::Lifetime, _) => "Lifetime".to_string(),
        _ => format!(
            "Custom range {} to {}",
            window.start.format("%Y-%m-%d %H:%M UTC"),
            window.end.format("%Y-%m-%d %H:%M UTC")
        ),
    }
}

fn scorecard_line(card: &AgentScorecard) -> String {
    let badge = if card.is_champion {
        " [champion]"
    } else if card.is_top_three {
        " [top 3]"
    } else {
        ""
    };
    let rank = card
        .ranks
        .weighted_daily_avg
        .map_or_else(|| "-".to_string(), |rank| format!("#{rank}"));
    let tier = card.tier.map(|t| t.label()).unwrap_or("Unranked");

    format!(
        "{} {} ({}){} {:.1} pts/day, {:.1} tasks/day, hybrid {} | {} tasks, {:.1} pts over {} days | {}",
        rank,
        card.display_name,
        card.email,
        badge,
        card.metrics.weighted_daily_avg,
        card.metrics.tasks_per_day,
        format_optional(card.hybrid_score),
        card.metrics.total_completed,
        card.metrics.weighted_points,
        card.metrics.days_worked,
        tier,
    )
}

pub fn build_report(standings: &Standings) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Task Leaderboard");
    let _ = writeln!(output, "Standings for {}", window_label(standings));
    if let Some(info) = standings.sprint_info {
        let _ = writeln!(
            output,
            "Current sprint {}: day {} with {} days remaining",
            info.number, info.days_elapsed, info.days_remaining
        );
    }
    let _ = writeln!(output);

    let _ = writeln!(output, "## Rankings");
    if standings.competitive.is_empty() {
        let _ = writeln!(output, "No qualified agents in this window.");
    } else {
        for card in &standings.competitive {
            let _ = writeln!(output, "- {}", scorecard_line(card));
        }
    }

    let averages = &standings.averages;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Cohort Averages");
    if averages.agent_count == 0 {
        let _ = writeln!(output, "No ranked agents to average.");
    } else {
        let _ = writeln!(
            output,
            "- {} ranked agents averaging {} tasks and {} pts over {} days",
            averages.agent_count,
            format_optional(averages.total_completed),
            format_optional(averages.weighted_points),
            format_optional(averages.days_worked)
        );
        let _ = writeln!(
            output,
            "- {} pts/day, {} tasks/day, {} active hours, {} pts/active hour, hybrid {}",
            format_optional(averages.weighted_daily_avg),
            format_optional(averages.tasks_per_day),
            format_optional(averages.active_hours),
            format_optional(averages.pts_per_active_hour),
            format_optional(averages.hybrid_score)
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Not Yet Qualified");
    if standings.unqualified.is_empty() {
        let _ = writeln!(output, "Everyone active met the qualification threshold.");
    } else {
        for card in &standings.unqualified {
            let _ = writeln!(output, "- {}", scorecard_line(card));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Senior Agents");
    if standings.seniors.is_empty() {
        let _ = writeln!(output, "No senior agents active in this window.");
    } else {
        for card in &standings.seniors {
            let _ = writeln!(output, "- {}", scorecard_line(card));
        }
    }

    let weights = &standings.weight_summary;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Weights");
    let _ = writeln!(
        output,
        "- {} categories, {} labeled outcomes, range {} to {} (mean {}), floor {:.1}",
        weights.categories,
        weights.labeled_pairs,
        format_optional(weights.min),
        format_optional(weights.max),
        format_optional(weights.mean),
        weights.floor
    );

    if let Some(archive) = standings.archive {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "Archived {} final standings for sprint {} ({} failed).",
            archive.written, archive.sprint_number, archive.failed
        );
    }

    output
}

pub fn build_profile_report(name: &str, profile: &AgentProfile) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Productivity Profile: {name}");
    let _ = writeln!(
        output,
        "Window {} to {}",
        profile.window.start.format("%Y-%m-%d %H:%M UTC"),
        profile.window.end.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);

    match profile.metrics {
        Some(metrics) => {
            let _ = writeln!(
                output,
                "{} tasks, {:.1} pts over {} days ({:.1} pts/day, {:.1} active hours)",
                metrics.total_completed,
                metrics.weighted_points,
                metrics.days_worked,
                metrics.weighted_daily_avg,
                metrics.active_hours
            );
        }
        None => {
            let _ = writeln!(output, "No worked days in this window.");
        }
    }
    if profile.skipped > 0 {
        let _ = writeln!(output, "{} incomplete records skipped.", profile.skipped);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Categories");
    for category in &profile.categories {
        let _ = writeln!(
            output,
            "- {}: {} tasks, {:.1} pts, avg handle {}s",
            category.category,
            category.count,
            category.points,
            format_optional(category.avg_handle_seconds)
        );
        for outcome in profile.outcomes.get(&category.category).into_iter().flatten() {
            let _ = writeln!(
                output,
                "  - {}: {} tasks, {:.1} pts, avg handle {:.0}s",
                outcome.outcome_label, outcome.count, outcome.points, outcome.avg_handle_seconds
            );
        }
    }

    let _ = writeln!(output);
    match profile.view {
        ProfileView::Hourly => {
            let _ = writeln!(output, "## By Hour");
            for bucket in profile.hourly.iter().filter(|b| b.count > 0) {
                let _ = writeln!(
                    output,
                    "- {:02}:00 {} tasks, {:.1} pts",
                    bucket.hour, bucket.count, bucket.points
                );
            }
        }
        ProfileView::Daily => {
            let _ = writeln!(output, "## By Day");
            for (date, bucket) in &profile.daily {
                let _ = writeln!(
                    output,
                    "- {}: {} tasks, {:.1} pts, {:.1} active hours",
                    date, bucket.count, bucket.points, bucket.active_hours
                );
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::ResolvedWindow;
    use crate::engine::cohort_averages;
    use crate::models::{Agent, AgentMetrics, CohortAverages, Tier};
    use crate::weights::WeightTable;
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    fn standings() -> Standings {
        let start = Utc.with_ymd_and_hms(2025, 2, 17, 5, 0, 0).unwrap();
        let agent = Agent {
            id: Uuid::new_v4(),
            display_name: "Avery Lee".to_string(),
            email: "avery.lee@groupscholar.com".to_string(),
            categories: vec![],
            is_senior: false,
        };
        let mut card = AgentScorecard::new(
            &agent,
            AgentMetrics {
                total_completed: 24,
                weighted_points: 144.0,
                days_worked: 4,
                weighted_daily_avg: 36.0,
                tasks_per_day: 6.0,
                ..AgentMetrics::default()
            },
        );
        card.ranks.weighted_daily_avg = Some(1);
        card.is_champion = true;
        card.is_top_three = true;
        card.tier = Some(Tier::Elite);
        card.hybrid_score = Some(100.0);

        Standings {
            window: ResolvedWindow {
                kind: WindowKind::Sprint,
                start,
                end: start + Duration::days(14),
                sprint_number: Some(4),
                is_current: true,
            },
            sprint_info: None,
            competitive: vec![card],
            unqualified: vec![],
            seniors: vec![],
            averages: CohortAverages::default(),
            weight_summary: WeightTable::new(1.0).summary(),
            archive: None,
        }
    }

    #[test]
    fn report_lists_ranked_agents() {
        let report = build_report(&standings());
        assert!(report.contains("Standings for Sprint 4 (current)"));
        assert!(report.contains("#1 Avery Lee (avery.lee@groupscholar.com) [champion] 36.0 pts/day"));
        assert!(report.contains("hybrid 100.0"));
        assert!(report.contains("| Elite"));
        assert!(report.contains("Everyone active met the qualification threshold."));
    }

    #[test]
    fn empty_cohort_is_reported() {
        let mut standings = standings();
        standings.competitive.clear();
        standings.averages = cohort_averages(&standings.competitive);
        let report = build_report(&standings);
        assert!(report.contains("No qualified agents in this window."));
        assert!(report.contains("No ranked agents to average."));
        assert!(!report.contains("averaging"));
    }
}
