use std::path::Path;

use anyhow::{bail, Context};
use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Category;

/// 2025-01-06T00:00:00-05:00, the Monday sprint 1 starts on.
const DEFAULT_SPRINT_EPOCH_SECS: i64 = 1_736_139_600;
/// 2000-01-01T00:00:00Z
const DEFAULT_LIFETIME_ORIGIN_SECS: i64 = 946_684_800;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub sprint_epoch: DateTime<Utc>,
    pub sprint_length_days: i64,
    pub lifetime_origin: DateTime<Utc>,
    /// Fixed UTC offset used for day/hour bucketing and custom ranges.
    pub reference_offset_minutes: i32,
    pub bulk_categories: Vec<Category>,
    /// Minimum bulk-imported items on a day for it to count as worked.
    pub bulk_day_threshold: u32,
    pub qualification: QualificationThresholds,
    pub hybrid: HybridWeights,
    pub weight_floor: f64,
    /// When set, pair weights are first derived from historical handle time
    /// at one point per this many seconds; stored weights override them.
    pub seconds_per_point: Option<f64>,
    pub archive_on_read: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct QualificationThresholds {
    pub lifetime_min_completed: u32,
    pub sprint_min_days: u32,
    pub custom_min_completed: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridWeights {
    pub volume: f64,
    pub complexity: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            sprint_epoch: DateTime::UNIX_EPOCH + Duration::seconds(DEFAULT_SPRINT_EPOCH_SECS),
            sprint_length_days: 14,
            lifetime_origin: DateTime::UNIX_EPOCH
                + Duration::seconds(DEFAULT_LIFETIME_ORIGIN_SECS),
            reference_offset_minutes: -300,
            bulk_categories: vec![Category::new("SPAM")],
            bulk_day_threshold: 15,
            qualification: QualificationThresholds::default(),
            hybrid: HybridWeights::default(),
            weight_floor: 1.0,
            seconds_per_point: None,
            archive_on_read: true,
        }
    }
}

impl Default for QualificationThresholds {
    fn default() -> Self {
        Self {
            lifetime_min_completed: 20,
            sprint_min_days: 3,
            custom_min_completed: 1,
        }
    }
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            volume: 0.30,
            complexity: 0.70,
        }
    }
}

impl RankingConfig {
    /// Loads defaults, overlaid with the TOML file at `path` when given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                toml::from_str::<Self>(&raw)
                    .with_context(|| format!("failed to parse config {}", path.display()))?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.sprint_length_days <= 0 {
            bail!("sprint_length_days must be positive");
        }
        if FixedOffset::east_opt(self.reference_offset_minutes * 60).is_none() {
            bail!(
                "reference_offset_minutes {} is out of range",
                self.reference_offset_minutes
            );
        }
        let HybridWeights { volume, complexity } = self.hybrid;
        if !volume.is_finite() || !complexity.is_finite() || volume < 0.0 || complexity < 0.0 {
            bail!("hybrid weights must be finite and non-negative");
        }
        if volume + complexity <= 0.0 {
            bail!("hybrid weights must not both be zero");
        }
        if !self.weight_floor.is_finite() || self.weight_floor < 0.0 {
            bail!("weight_floor must be finite and non-negative");
        }
        if let Some(seconds) = self.seconds_per_point {
            if !(seconds.is_finite() && seconds > 0.0) {
                bail!("seconds_per_point must be positive");
            }
        }
        Ok(())
    }

    pub fn reference_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.reference_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    pub fn sprint_length(&self) -> Duration {
        Duration::days(self.sprint_length_days)
    }

    pub fn is_bulk(&self, category: &Category) -> bool {
        self.bulk_categories.contains(category)
    }
}
