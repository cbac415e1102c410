use tracing::debug;

use crate::config::HybridWeights;
use crate::error::{RankingError, RankingResult};
use crate::models::{AgentScorecard, NormalizedMetrics};

/// Per-metric maxima over the competitive cohort. Rebuilt for every request
/// since cohort membership changes between requests.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CohortMaxima {
    pub tasks_per_day: f64,
    pub weighted_daily_avg: f64,
}

impl CohortMaxima {
    pub fn from_cohort<'a>(cohort: impl IntoIterator<Item = &'a AgentScorecard>) -> Self {
        cohort.into_iter().fold(Self::default(), |max, card| Self {
            tasks_per_day: max.tasks_per_day.max(card.metrics.tasks_per_day),
            weighted_daily_avg: max.weighted_daily_avg.max(card.metrics.weighted_daily_avg),
        })
    }
}

/// Scales `value` to a 0-100 share of the cohort maximum.
pub fn normalize(value: f64, cohort_max: f64, metric: &'static str) -> RankingResult<f64> {
    if !(cohort_max.is_finite() && cohort_max > 0.0) {
        return Err(RankingError::DegenerateCohort { metric });
    }
    Ok(value / cohort_max * 100.0)
}

pub fn hybrid_score(normalized: &NormalizedMetrics, weights: HybridWeights) -> Option<f64> {
    Some(
        normalized.tasks_per_day? * weights.volume
            + normalized.weighted_daily_avg? * weights.complexity,
    )
}

/// Fills normalized values and the hybrid score. Degenerate metrics are left
/// as `None` instead of producing NaN.
pub fn blend(card: &mut AgentScorecard, maxima: &CohortMaxima, weights: HybridWeights) {
    let tasks = normalize(card.metrics.tasks_per_day, maxima.tasks_per_day, "tasks_per_day");
    let complexity = normalize(
        card.metrics.weighted_daily_avg,
        maxima.weighted_daily_avg,
        "weighted_daily_avg",
    );
    if let Err(err) = &tasks {
        debug!(agent_id = %card.agent_id, error = %err, "metric left unnormalized");
    }
    if let Err(err) = &complexity {
        debug!(agent_id = %card.agent_id, error = %err, "metric left unnormalized");
    }

    card.normalized = NormalizedMetrics {
        tasks_per_day: tasks.ok(),
        weighted_daily_avg: complexity.ok(),
    };
    card.hybrid_score = hybrid_score(&card.normalized, weights);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Agent, AgentMetrics};
    use uuid::Uuid;

    fn card(tasks_per_day: f64, weighted_daily_avg: f64) -> AgentScorecard {
        let agent = Agent {
            id: Uuid::new_v4(),
            display_name: "Rowan Hale".to_string(),
            email: "rowan.hale@groupscholar.com".to_string(),
            categories: vec![],
            is_senior: false,
        };
        AgentScorecard::new(
            &agent,
            AgentMetrics {
                tasks_per_day,
                weighted_daily_avg,
                ..AgentMetrics::default()
            },
        )
    }

    #[test]
    fn hybrid_blends_thirty_seventy() {
        let cohort = vec![card(10.0, 40.0), card(5.0, 80.0)];
        let maxima = CohortMaxima::from_cohort(&cohort);
        assert_eq!(maxima.tasks_per_day, 10.0);
        assert_eq!(maxima.weighted_daily_avg, 80.0);

        let mut first = cohort[0].clone();
        blend(&mut first, &maxima, HybridWeights::default());
        assert_eq!(first.normalized.tasks_per_day, Some(100.0));
        assert_eq!(first.normalized.weighted_daily_avg, Some(50.0));
        assert!((first.hybrid_score.unwrap() - 65.0).abs() < 1e-9);
    }

    #[test]
    fn zero_maximum_is_degenerate() {
        assert!(matches!(
            normalize(3.0, 0.0, "weighted_daily_avg"),
            Err(RankingError::DegenerateCohort { metric: "weighted_daily_avg" })
        ));

        let mut zero = card(2.0, 0.0);
        let maxima = CohortMaxima::from_cohort([&zero]);
        blend(&mut zero, &maxima, HybridWeights::default());
        assert_eq!(zero.normalized.tasks_per_day, Some(100.0));
        assert_eq!(zero.normalized.weighted_daily_avg, None);
        assert_eq!(zero.hybrid_score, None);
    }

    #[test]
    fn hybrid_is_monotone_in_each_input() {
        let maxima = CohortMaxima {
            tasks_per_day: 20.0,
            weighted_daily_avg: 100.0,
        };
        let score = |tasks: f64, avg: f64| {
            let mut c = card(tasks, avg);
            blend(&mut c, &maxima, HybridWeights::default());
            c.hybrid_score.unwrap()
        };

        let mut previous = f64::MIN;
        for tasks in [0.0, 1.0, 5.5, 12.0, 20.0] {
            let current = score(tasks, 50.0);
            assert!(current >= previous);
            previous = current;
        }
        let mut previous = f64::MIN;
        for avg in [0.0, 10.0, 49.9, 50.0, 100.0] {
            let current = score(8.0, avg);
            assert!(current >= previous);
            previous = current;
        }
    }
}
