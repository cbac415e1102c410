use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::aggregate::AgentWorkLog;
use crate::calendar::ResolvedWindow;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Default)]
pub struct HourBucket {
    pub hour: u32,
    pub count: u32,
    pub points: f64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Default)]
pub struct DayBucket {
    pub count: u64,
    pub points: f64,
    pub active_hours: f64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProfileView {
    Hourly,
    Daily,
}

/// Hour-of-day histogram at the reference offset. Bulk imports carry no
/// time of day and are left out.
pub fn hourly_buckets(log: &AgentWorkLog) -> [HourBucket; 24] {
    let mut buckets = [HourBucket::default(); 24];
    for (hour, bucket) in buckets.iter_mut().enumerate() {
        bucket.hour = hour as u32;
    }
    for item in &log.tracked {
        if let Some(bucket) = buckets.get_mut(item.local_hour as usize) {
            bucket.count += 1;
            bucket.points += item.points;
        }
    }
    buckets
}

pub fn daily_buckets(log: &AgentWorkLog) -> BTreeMap<NaiveDate, DayBucket> {
    let mut days: BTreeMap<NaiveDate, DayBucket> = BTreeMap::new();
    for item in &log.tracked {
        let day = days.entry(item.local_date).or_default();
        day.count += 1;
        day.points += item.points;
        day.active_hours += item.handle_seconds / 3600.0;
    }
    for bulk in &log.bulk {
        let day = days.entry(bulk.date).or_default();
        day.count += u64::from(bulk.count);
        day.points += bulk.points;
    }
    days
}

pub fn preferred_view(window: &ResolvedWindow) -> ProfileView {
    if window.is_single_day() {
        ProfileView::Hourly
    } else {
        ProfileView::Daily
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::build_work_log;
    use crate::aggregate::tests::{email, spam_day, sprint_window, weights};
    use crate::config::RankingConfig;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    #[test]
    fn empty_log_gives_empty_buckets() {
        let log = build_work_log(
            Uuid::new_v4(),
            &sprint_window(),
            vec![],
            vec![],
            &weights(),
            &RankingConfig::default(),
        );
        assert!(hourly_buckets(&log).iter().all(|b| b.count == 0));
        assert!(daily_buckets(&log).is_empty());
    }

    #[test]
    fn buckets_split_by_hour_and_day() {
        let agent = Uuid::new_v4();
        let items = vec![
            email(agent, Utc.with_ymd_and_hms(2025, 1, 7, 14, 10, 0).unwrap(), "Resolved", 1800.0),
            email(agent, Utc.with_ymd_and_hms(2025, 1, 7, 14, 50, 0).unwrap(), "Resolved", 1800.0),
            email(agent, Utc.with_ymd_and_hms(2025, 1, 8, 20, 0, 0).unwrap(), "Resolved", 900.0),
        ];
        let bulk = vec![spam_day(agent, NaiveDate::from_ymd_opt(2025, 1, 8).unwrap(), 5)];
        let log = build_work_log(
            agent,
            &sprint_window(),
            items,
            bulk,
            &weights(),
            &RankingConfig::default(),
        );

        let hours = hourly_buckets(&log);
        assert_eq!(hours[9].count, 2);
        assert_eq!(hours[9].points, 12.0);
        assert_eq!(hours[15].count, 1);

        let days = daily_buckets(&log);
        let first = days[&NaiveDate::from_ymd_opt(2025, 1, 7).unwrap()];
        assert_eq!(first.count, 2);
        assert_eq!(first.active_hours, 1.0);
        let second = days[&NaiveDate::from_ymd_opt(2025, 1, 8).unwrap()];
        assert_eq!(second.count, 6);
        assert_eq!(second.active_hours, 0.25);
    }

    #[test]
    fn sprint_window_prefers_daily_view() {
        assert_eq!(preferred_view(&sprint_window()), ProfileView::Daily);
    }
}
