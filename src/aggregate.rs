use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, Timelike, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::calendar::ResolvedWindow;
use crate::config::RankingConfig;
use crate::error::{RankingError, RankingResult};
use crate::models::{BulkDayCount, Category, CompletedWorkItem, WorkStatus};
use crate::store::WorkStore;
use crate::weights::WeightTable;

/// A directly-tracked completion with every field scoring needs.
#[derive(Debug, Clone)]
pub struct TrackedItem {
    pub category: Category,
    pub outcome_label: String,
    pub completed_at: DateTime<Utc>,
    pub local_date: NaiveDate,
    pub local_hour: u32,
    pub handle_seconds: f64,
    pub points: f64,
}

#[derive(Debug, Clone)]
pub struct BulkDay {
    pub category: Category,
    pub date: NaiveDate,
    pub count: u32,
    pub points: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryBreakdown {
    pub category: Category,
    pub count: u64,
    pub points: f64,
    pub avg_handle_seconds: Option<f64>,
    pub total_handle_seconds: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OutcomeBreakdown {
    pub outcome_label: String,
    pub count: u32,
    pub points: f64,
    pub avg_handle_seconds: f64,
    pub total_handle_seconds: f64,
}

/// One agent's usable work inside a window.
#[derive(Debug, Clone)]
pub struct AgentWorkLog {
    pub agent_id: Uuid,
    pub tracked: Vec<TrackedItem>,
    pub bulk: Vec<BulkDay>,
    pub skipped: usize,
    bulk_day_threshold: u32,
}

impl AgentWorkLog {
    /// Days that count toward days worked. Any tracked completion marks its
    /// day; bulk-imported work only marks a day once it reaches the threshold,
    /// which keeps misdated imports from inflating attendance.
    pub fn worked_dates(&self) -> BTreeSet<NaiveDate> {
        let mut dates: BTreeSet<NaiveDate> = self.tracked.iter().map(|i| i.local_date).collect();

        let mut bulk_per_day: HashMap<NaiveDate, u64> = HashMap::new();
        for day in &self.bulk {
            *bulk_per_day.entry(day.date).or_insert(0) += u64::from(day.count);
        }
        dates.extend(
            bulk_per_day
                .into_iter()
                .filter(|(_, count)| *count >= u64::from(self.bulk_day_threshold))
                .map(|(date, _)| date),
        );
        dates
    }

    pub fn group_by_category(&self) -> Vec<CategoryBreakdown> {
        let mut map: BTreeMap<Category, (u64, f64, f64, u32)> = BTreeMap::new();

        for item in &self.tracked {
            let entry = map.entry(item.category.clone()).or_insert((0, 0.0, 0.0, 0));
            entry.0 += 1;
            entry.1 += item.points;
            entry.2 += item.handle_seconds;
            entry.3 += 1;
        }
        for day in &self.bulk {
            let entry = map.entry(day.category.clone()).or_insert((0, 0.0, 0.0, 0));
            entry.0 += u64::from(day.count);
            entry.1 += day.points;
        }

        map.into_iter()
            .map(|(category, (count, points, total_seconds, timed))| CategoryBreakdown {
                category,
                count,
                points,
                avg_handle_seconds: if timed == 0 {
                    None
                } else {
                    Some(total_seconds / timed as f64)
                },
                total_handle_seconds: total_seconds,
            })
            .collect()
    }

    pub fn group_by_outcome(&self) -> BTreeMap<Category, Vec<OutcomeBreakdown>> {
        let mut map: BTreeMap<Category, HashMap<String, (u32, f64, f64)>> = BTreeMap::new();

        for item in &self.tracked {
            let entry = map
                .entry(item.category.clone())
                .or_default()
                .entry(item.outcome_label.clone())
                .or_insert((0, 0.0, 0.0));
            entry.0 += 1;
            entry.1 += item.points;
            entry.2 += item.handle_seconds;
        }

        map.into_iter()
            .map(|(category, labels)| {
                let mut outcomes: Vec<OutcomeBreakdown> = labels
                    .into_iter()
                    .map(|(outcome_label, (count, points, total))| OutcomeBreakdown {
                        outcome_label,
                        count,
                        points,
                        avg_handle_seconds: total / count as f64,
                        total_handle_seconds: total,
                    })
                    .collect();
                outcomes.sort_by(|a, b| {
                    b.count
                        .cmp(&a.count)
                        .then_with(|| a.outcome_label.cmp(&b.outcome_label))
                });
                (category, outcomes)
            })
            .collect()
    }
}

/// Filters raw store rows down to usable work and prices each item.
pub fn build_work_log(
    agent_id: Uuid,
    window: &ResolvedWindow,
    items: Vec<CompletedWorkItem>,
    bulk: Vec<BulkDayCount>,
    weights: &WeightTable,
    config: &RankingConfig,
) -> AgentWorkLog {
    let offset: FixedOffset = config.reference_offset();
    let mut skipped = 0;
    let mut tracked = Vec::with_capacity(items.len());

    for item in items {
        if item.status != WorkStatus::Completed {
            continue;
        }
        let Some(completed_at) = item.completed_at else {
            skipped += 1;
            continue;
        };
        if !window.contains(completed_at) {
            continue;
        }
        // Bulk categories are counted from the per-day import totals.
        if config.is_bulk(&item.category) {
            skipped += 1;
            continue;
        }
        let (Some(label), Some(seconds)) = (item.outcome_label, item.handle_seconds) else {
            debug!(%agent_id, item_id = %item.id, "skipping item without label or duration");
            skipped += 1;
            continue;
        };
        if label.trim().is_empty() || !seconds.is_finite() || seconds < 0.0 {
            skipped += 1;
            continue;
        }

        let local = completed_at.with_timezone(&offset);
        let points = weights.weight_of(&item.category, Some(&label));
        tracked.push(TrackedItem {
            category: item.category,
            outcome_label: label,
            completed_at,
            local_date: local.date_naive(),
            local_hour: local.hour(),
            handle_seconds: seconds,
            points,
        });
    }

    let bulk = bulk
        .into_iter()
        .filter(|day| day.count > 0 && window.contains_date(day.date, offset))
        .map(|day| {
            let points = weights.weight_of(&day.category, None) * day.count as f64;
            BulkDay {
                category: day.category,
                date: day.date,
                count: day.count,
                points,
            }
        })
        .collect();

    AgentWorkLog {
        agent_id,
        tracked,
        bulk,
        skipped,
        bulk_day_threshold: config.bulk_day_threshold,
    }
}

#[derive(Clone)]
pub struct WorkLogAggregator {
    store: Arc<dyn WorkStore>,
    weights: Arc<WeightTable>,
    config: Arc<RankingConfig>,
}

impl WorkLogAggregator {
    pub fn new(
        store: Arc<dyn WorkStore>,
        weights: Arc<WeightTable>,
        config: Arc<RankingConfig>,
    ) -> Self {
        Self {
            store,
            weights,
            config,
        }
    }

    /// Read-only. A store failure fails the whole agent; nothing partial is
    /// returned.
    pub async fn aggregate(
        &self,
        agent_id: Uuid,
        window: &ResolvedWindow,
    ) -> RankingResult<AgentWorkLog> {
        let items = self
            .store
            .fetch_completed(agent_id, window)
            .await
            .map_err(|source| RankingError::StoreUnavailable { agent_id, source })?;
        let bulk = self
            .store
            .fetch_bulk_imported(agent_id, window)
            .await
            .map_err(|source| RankingError::StoreUnavailable { agent_id, source })?;

        let log = build_work_log(agent_id, window, items, bulk, &self.weights, &self.config);
        debug!(
            %agent_id,
            tracked = log.tracked.len(),
            bulk_days = log.bulk.len(),
            skipped = log.skipped,
            "aggregated work log"
        );
        Ok(log)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::calendar::WindowKind;
    use crate::models::WeightRow;
    use chrono::{Duration, TimeZone};

    pub(crate) fn sprint_window() -> ResolvedWindow {
        let start = Utc.with_ymd_and_hms(2025, 1, 6, 5, 0, 0).unwrap();
        ResolvedWindow {
            kind: WindowKind::Sprint,
            start,
            end: start + Duration::days(14),
            sprint_number: Some(1),
            is_current: false,
        }
    }

    pub(crate) fn weights() -> WeightTable {
        WeightTable::from_rows(
            &[
                WeightRow {
                    category: Category::new("EMAIL"),
                    outcome_label: None,
                    weight: 6.0,
                },
                WeightRow {
                    category: Category::new("SPAM"),
                    outcome_label: None,
                    weight: 0.8,
                },
            ],
            1.0,
        )
    }

    pub(crate) fn email(agent_id: Uuid, at: DateTime<Utc>, label: &str, seconds: f64) -> CompletedWorkItem {
        CompletedWorkItem {
            id: Uuid::new_v4(),
            agent_id,
            category: Category::new("EMAIL"),
            outcome_label: Some(label.to_string()),
            status: WorkStatus::Completed,
            completed_at: Some(at),
            handle_seconds: Some(seconds),
        }
    }

    pub(crate) fn spam_day(agent_id: Uuid, date: NaiveDate, count: u32) -> BulkDayCount {
        BulkDayCount {
            agent_id,
            category: Category::new("SPAM"),
            date,
            count,
        }
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn incomplete_items_are_skipped_not_fatal() {
        let agent = Uuid::new_v4();
        let mut no_label = email(agent, at(7, 15), "Resolved", 120.0);
        no_label.outcome_label = None;
        let mut no_time = email(agent, at(7, 15), "Resolved", 120.0);
        no_time.completed_at = None;
        let mut cancelled = email(agent, at(7, 15), "Resolved", 120.0);
        cancelled.status = WorkStatus::Cancelled;
        let items = vec![email(agent, at(7, 15), "Resolved", 120.0), no_label, no_time, cancelled];

        let log = build_work_log(
            agent,
            &sprint_window(),
            items,
            vec![],
            &weights(),
            &RankingConfig::default(),
        );
        assert_eq!(log.tracked.len(), 1);
        assert_eq!(log.skipped, 2);
    }

    #[test]
    fn items_outside_window_are_dropped() {
        let agent = Uuid::new_v4();
        let items = vec![
            email(agent, at(6, 4), "Resolved", 60.0),
            email(agent, at(6, 5), "Resolved", 60.0),
            email(agent, at(20, 5), "Resolved", 60.0),
        ];
        let log = build_work_log(
            agent,
            &sprint_window(),
            items,
            vec![],
            &weights(),
            &RankingConfig::default(),
        );
        assert_eq!(log.tracked.len(), 1);
    }

    #[test]
    fn light_bulk_days_do_not_count_as_worked() {
        let agent = Uuid::new_v4();
        let items = vec![
            email(agent, at(7, 15), "Resolved", 60.0),
            email(agent, at(8, 15), "Resolved", 60.0),
        ];
        let bulk = vec![
            spam_day(agent, NaiveDate::from_ymd_opt(2025, 1, 9).unwrap(), 10),
            spam_day(agent, NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(), 15),
        ];
        let log = build_work_log(
            agent,
            &sprint_window(),
            items,
            bulk,
            &weights(),
            &RankingConfig::default(),
        );
        let dates: Vec<String> = log.worked_dates().iter().map(|d| d.to_string()).collect();
        assert_eq!(dates, vec!["2025-01-07", "2025-01-08", "2025-01-10"]);
    }

    #[test]
    fn huge_bulk_counts_sum_without_overflow() {
        let agent = Uuid::new_v4();
        let half = u32::MAX / 2 + 1;
        let date = NaiveDate::from_ymd_opt(2025, 1, 9).unwrap();
        let log = build_work_log(
            agent,
            &sprint_window(),
            vec![],
            vec![
                spam_day(agent, date, half),
                spam_day(agent, date, half),
                spam_day(agent, NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(), half),
            ],
            &weights(),
            &RankingConfig::default(),
        );

        assert_eq!(log.worked_dates().len(), 2);
        let categories = log.group_by_category();
        assert_eq!(categories[0].count, 3 * u64::from(half));
    }

    #[test]
    fn outcomes_sorted_by_count_descending() {
        let agent = Uuid::new_v4();
        let items = vec![
            email(agent, at(7, 15), "Escalated", 300.0),
            email(agent, at(7, 16), "Resolved", 100.0),
            email(agent, at(7, 17), "Resolved", 200.0),
        ];
        let log = build_work_log(
            agent,
            &sprint_window(),
            items,
            vec![spam_day(agent, NaiveDate::from_ymd_opt(2025, 1, 7).unwrap(), 20)],
            &weights(),
            &RankingConfig::default(),
        );

        let outcomes = log.group_by_outcome();
        let email_outcomes = &outcomes[&Category::new("EMAIL")];
        assert_eq!(email_outcomes[0].outcome_label, "Resolved");
        assert_eq!(email_outcomes[0].count, 2);
        assert_eq!(email_outcomes[0].avg_handle_seconds, 150.0);
        assert_eq!(email_outcomes[1].outcome_label, "Escalated");

        let categories = log.group_by_category();
        assert_eq!(categories.len(), 2);
        let email_stats = categories.iter().find(|c| c.category.as_str() == "EMAIL").unwrap();
        assert_eq!(email_stats.points, 18.0);
        assert_eq!(email_stats.total_handle_seconds, 600.0);
        let spam_stats = categories.iter().find(|c| c.category.as_str() == "SPAM").unwrap();
        assert_eq!(spam_stats.count, 20);
        assert!((spam_stats.points - 16.0).abs() < 1e-9);
        assert_eq!(spam_stats.avg_handle_seconds, None);
    }

    #[test]
    fn local_hour_uses_reference_offset() {
        let agent = Uuid::new_v4();
        let log = build_work_log(
            agent,
            &sprint_window(),
            vec![email(agent, at(8, 3), "Resolved", 60.0)],
            vec![],
            &weights(),
            &RankingConfig::default(),
        );
        assert_eq!(log.tracked[0].local_hour, 22);
        assert_eq!(log.tracked[0].local_date.to_string(), "2025-01-07");
    }
}
