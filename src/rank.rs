use std::cmp::Ordering;

use serde::Serialize;

use crate::models::{AgentScorecard, Tier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMetric {
    WeightedPoints,
    WeightedDailyAvg,
    TotalCompleted,
    TasksPerDay,
    Hybrid,
}

impl RankMetric {
    pub const ALL: [RankMetric; 5] = [
        RankMetric::WeightedPoints,
        RankMetric::WeightedDailyAvg,
        RankMetric::TotalCompleted,
        RankMetric::TasksPerDay,
        RankMetric::Hybrid,
    ];

    /// Metric that drives percentile, tier and the champion flags.
    pub const PRIMARY: RankMetric = RankMetric::WeightedDailyAvg;

    pub fn value(&self, card: &AgentScorecard) -> Option<f64> {
        let value = match self {
            Self::WeightedPoints => card.metrics.weighted_points,
            Self::WeightedDailyAvg => card.metrics.weighted_daily_avg,
            Self::TotalCompleted => card.metrics.total_completed as f64,
            Self::TasksPerDay => card.metrics.tasks_per_day,
            Self::Hybrid => card.hybrid_score?,
        };
        value.is_finite().then_some(value)
    }

    fn slot<'a>(&self, card: &'a mut AgentScorecard) -> &'a mut Option<u32> {
        match self {
            Self::WeightedPoints => &mut card.ranks.weighted_points,
            Self::WeightedDailyAvg => &mut card.ranks.weighted_daily_avg,
            Self::TotalCompleted => &mut card.ranks.total_completed,
            Self::TasksPerDay => &mut card.ranks.tasks_per_day,
            Self::Hybrid => &mut card.ranks.hybrid,
        }
    }
}

/// Ranks `cohort` by `metric`, highest first, returning one entry per card
/// in input order. Ranks run 1..=n without gaps or repeats; equal values are
/// ordered by agent id so the result never depends on fetch order. Cards
/// without a value for the metric get `None`.
pub fn rank_by(cohort: &[AgentScorecard], metric: RankMetric) -> Vec<Option<u32>> {
    let mut scored: Vec<(usize, f64)> = cohort
        .iter()
        .enumerate()
        .filter_map(|(index, card)| metric.value(card).map(|value| (index, value)))
        .collect();
    scored.sort_by(|(a_index, a), (b_index, b)| {
        b.partial_cmp(a)
            .unwrap_or(Ordering::Equal)
            .then_with(|| cohort[*a_index].agent_id.cmp(&cohort[*b_index].agent_id))
    });

    let mut ranks = vec![None; cohort.len()];
    for (position, (index, _)) in scored.into_iter().enumerate() {
        ranks[index] = Some(position as u32 + 1);
    }
    ranks
}

pub fn percentile_of(rank: u32, cohort_size: u32) -> u32 {
    if cohort_size == 0 || rank == 0 || rank > cohort_size {
        return 0;
    }
    let at_or_below = (cohort_size - rank + 1) as f64;
    (at_or_below * 100.0 / cohort_size as f64).round() as u32
}

pub fn tier_of(percentile: u32) -> Tier {
    match percentile {
        90.. => Tier::Elite,
        75..=89 => Tier::HighPerformer,
        50..=74 => Tier::SolidContributor,
        25..=49 => Tier::Developing,
        _ => Tier::NeedsImprovement,
    }
}

/// Ranks the competitive cohort on every metric, classifies each card from
/// its primary rank, and sorts the cohort by that rank.
pub fn apply_rankings(cohort: &mut [AgentScorecard]) {
    for metric in RankMetric::ALL {
        let ranks = rank_by(cohort, metric);
        for (card, rank) in cohort.iter_mut().zip(ranks) {
            *metric.slot(card) = rank;
        }
    }

    let size = cohort.len() as u32;
    for card in cohort.iter_mut() {
        let Some(rank) = card.ranks.weighted_daily_avg else {
            continue;
        };
        let percentile = percentile_of(rank, size);
        card.percentile = Some(percentile);
        card.tier = Some(tier_of(percentile));
        card.is_champion = rank == 1;
        card.is_top_three = rank <= 3;
    }

    cohort.sort_by_key(|card| (card.ranks.weighted_daily_avg.unwrap_or(u32::MAX), card.agent_id));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Agent, AgentMetrics};
    use uuid::Uuid;

    fn card(id: u128, weighted_daily_avg: f64, total_completed: u64) -> AgentScorecard {
        let agent = Agent {
            id: Uuid::from_u128(id),
            display_name: format!("Agent {id}"),
            email: format!("agent{id}@groupscholar.com"),
            categories: vec![],
            is_senior: false,
        };
        AgentScorecard::new(
            &agent,
            AgentMetrics {
                total_completed,
                weighted_points: weighted_daily_avg * 3.0,
                days_worked: 3,
                weighted_daily_avg,
                tasks_per_day: total_completed as f64 / 3.0,
                ..AgentMetrics::default()
            },
        )
    }

    #[test]
    fn ranks_form_a_permutation() {
        let mut cohort = vec![
            card(4, 12.0, 30),
            card(2, 40.0, 30),
            card(9, 12.0, 12),
            card(1, 7.5, 45),
            card(3, 40.0, 9),
        ];
        apply_rankings(&mut cohort);

        for metric in RankMetric::ALL.into_iter().filter(|m| *m != RankMetric::Hybrid) {
            let mut ranks: Vec<u32> = rank_by(&cohort, metric).into_iter().flatten().collect();
            ranks.sort_unstable();
            assert_eq!(ranks, vec![1, 2, 3, 4, 5], "{metric:?}");
        }
        assert!(cohort.iter().all(|c| c.ranks.hybrid.is_none()));
    }

    #[test]
    fn ties_break_by_agent_id() {
        let cohort = vec![card(7, 25.0, 10), card(3, 25.0, 10)];
        let ranks = rank_by(&cohort, RankMetric::WeightedDailyAvg);
        assert_eq!(ranks, vec![Some(2), Some(1)]);
    }

    #[test]
    fn percentile_edges() {
        for n in 1..=40 {
            assert_eq!(percentile_of(1, n), 100);
            assert_eq!(percentile_of(n, n), (100.0 / n as f64).round() as u32);
        }
        assert_eq!(percentile_of(3, 4), 50);
    }

    #[test]
    fn tiers_use_inclusive_lower_bounds() {
        assert_eq!(tier_of(100), Tier::Elite);
        assert_eq!(tier_of(90), Tier::Elite);
        assert_eq!(tier_of(89), Tier::HighPerformer);
        assert_eq!(tier_of(75), Tier::HighPerformer);
        assert_eq!(tier_of(50), Tier::SolidContributor);
        assert_eq!(tier_of(25), Tier::Developing);
        assert_eq!(tier_of(24), Tier::NeedsImprovement);
        assert_eq!(tier_of(0), Tier::NeedsImprovement);
    }

    #[test]
    fn podium_flags_follow_primary_rank() {
        let mut cohort = vec![
            card(1, 10.0, 10),
            card(2, 50.0, 10),
            card(3, 30.0, 10),
            card(4, 20.0, 10),
        ];
        apply_rankings(&mut cohort);

        let names: Vec<&str> = cohort.iter().map(|c| c.display_name.as_str()).collect();
        assert_eq!(names, vec!["Agent 2", "Agent 3", "Agent 4", "Agent 1"]);
        assert!(cohort[0].is_champion && cohort[0].is_top_three);
        assert!(!cohort[1].is_champion && cohort[1].is_top_three);
        assert!(cohort[2].is_top_three);
        assert!(!cohort[3].is_top_three);
        assert_eq!(cohort[0].percentile, Some(100));
        assert_eq!(cohort[0].tier, Some(Tier::Elite));
        assert_eq!(cohort[3].percentile, Some(25));
        assert_eq!(cohort[3].tier, Some(Tier::Developing));
    }
}
