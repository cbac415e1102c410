use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Work category key. The set of categories grows operationally, so this is
/// an open string key rather than an enum. Stored upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Category(String);

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(|name| Self::new(&name))
    }
}

impl Category {
    pub fn new(name: &str) -> Self {
        Self(name.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Category {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    pub display_name: String,
    pub email: String,
    pub categories: Vec<Category>,
    pub is_senior: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    Assigned,
    Completed,
    Cancelled,
}

impl WorkStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "assigned" => Some(Self::Assigned),
            "completed" | "done" => Some(Self::Completed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assigned => "assigned",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// One task record as the work store returns it. Fields are optional
/// because imported history is incomplete; the aggregator decides what is
/// usable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedWorkItem {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub category: Category,
    pub outcome_label: Option<String>,
    pub status: WorkStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub handle_seconds: Option<f64>,
}

/// Per-day count for a bulk-imported category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkDayCount {
    pub agent_id: Uuid,
    pub category: Category,
    pub date: NaiveDate,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightRow {
    pub category: Category,
    pub outcome_label: Option<String>,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct AgentMetrics {
    pub total_completed: u64,
    pub weighted_points: f64,
    pub days_worked: u32,
    pub weighted_daily_avg: f64,
    pub tasks_per_day: f64,
    pub active_hours: f64,
    pub pts_per_active_hour: Option<f64>,
    pub tasks_per_active_hour: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    Elite,
    HighPerformer,
    SolidContributor,
    Developing,
    NeedsImprovement,
}

impl Tier {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Elite => "Elite",
            Self::HighPerformer => "High Performer",
            Self::SolidContributor => "Solid Contributor",
            Self::Developing => "Developing",
            Self::NeedsImprovement => "Needs Improvement",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct NormalizedMetrics {
    pub tasks_per_day: Option<f64>,
    pub weighted_daily_avg: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MetricRanks {
    pub weighted_points: Option<u32>,
    pub weighted_daily_avg: Option<u32>,
    pub total_completed: Option<u32>,
    pub tasks_per_day: Option<u32>,
    pub hybrid: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentScorecard {
    pub agent_id: Uuid,
    pub display_name: String,
    pub email: String,
    pub is_senior: bool,
    pub qualified: bool,
    pub metrics: AgentMetrics,
    pub normalized: NormalizedMetrics,
    pub hybrid_score: Option<f64>,
    pub ranks: MetricRanks,
    pub percentile: Option<u32>,
    pub tier: Option<Tier>,
    pub is_champion: bool,
    pub is_top_three: bool,
}

impl AgentScorecard {
    pub fn new(agent: &Agent, metrics: AgentMetrics) -> Self {
        Self {
            agent_id: agent.id,
            display_name: agent.display_name.clone(),
            email: agent.email.clone(),
            is_senior: agent.is_senior,
            qualified: false,
            metrics,
            normalized: NormalizedMetrics::default(),
            hybrid_score: None,
            ranks: MetricRanks::default(),
            percentile: None,
            tier: None,
            is_champion: false,
            is_top_three: false,
        }
    }
}

/// Means over the competitive bucket; every mean is `None` when nobody ranked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct CohortAverages {
    pub agent_count: usize,
    pub total_completed: Option<f64>,
    pub weighted_points: Option<f64>,
    pub days_worked: Option<f64>,
    pub weighted_daily_avg: Option<f64>,
    pub tasks_per_day: Option<f64>,
    pub active_hours: Option<f64>,
    pub pts_per_active_hour: Option<f64>,
    pub hybrid_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedSprintRanking {
    pub sprint_number: u32,
    pub agent_id: Uuid,
    pub display_name: String,
    pub metrics: AgentMetrics,
    pub ranks: MetricRanks,
    pub hybrid_score: Option<f64>,
    pub percentile: Option<u32>,
    pub tier: Option<Tier>,
    #[serde(default)]
    pub qualified: bool,
    pub is_champion: bool,
    #[serde(default)]
    pub is_top_three: bool,
    pub archived_at: DateTime<Utc>,
}

impl ArchivedSprintRanking {
    pub fn from_scorecard(
        sprint_number: u32,
        card: &AgentScorecard,
        archived_at: DateTime<Utc>,
    ) -> Self {
        Self {
            sprint_number,
            agent_id: card.agent_id,
            display_name: card.display_name.clone(),
            metrics: card.metrics,
            ranks: card.ranks,
            hybrid_score: card.hybrid_score,
            percentile: card.percentile,
            tier: card.tier,
            qualified: card.qualified,
            is_champion: card.is_champion,
            is_top_three: card.is_top_three,
            archived_at,
        }
    }
}
