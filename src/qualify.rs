use crate::calendar::WindowKind;
use crate::config::QualificationThresholds;
use crate::models::{AgentMetrics, AgentScorecard};

pub fn is_qualified(
    kind: WindowKind,
    metrics: &AgentMetrics,
    thresholds: &QualificationThresholds,
) -> bool {
    match kind {
        WindowKind::Lifetime => metrics.total_completed >= u64::from(thresholds.lifetime_min_completed),
        WindowKind::Sprint => metrics.days_worked >= thresholds.sprint_min_days,
        WindowKind::Custom => metrics.total_completed >= u64::from(thresholds.custom_min_completed),
    }
}

#[derive(Debug, Default)]
pub struct Buckets {
    pub competitive: Vec<AgentScorecard>,
    pub unqualified: Vec<AgentScorecard>,
    pub seniors: Vec<AgentScorecard>,
}

/// Splits scored agents into the three output buckets. Seniors never
/// compete, whatever their activity; only qualified non-seniors are ranked.
pub fn partition(
    cards: Vec<AgentScorecard>,
    kind: WindowKind,
    thresholds: &QualificationThresholds,
) -> Buckets {
    let mut buckets = Buckets::default();
    for mut card in cards {
        card.qualified = is_qualified(kind, &card.metrics, thresholds);
        if card.is_senior {
            buckets.seniors.push(card);
        } else if card.qualified {
            buckets.competitive.push(card);
        } else {
            buckets.unqualified.push(card);
        }
    }
    buckets
}
