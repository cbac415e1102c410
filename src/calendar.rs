use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::config::RankingConfig;
use crate::error::{RankingError, RankingResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowRequest {
    CurrentSprint,
    Sprint(u32),
    Lifetime,
    Custom {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    Sprint,
    Lifetime,
    Custom,
}

/// Absolute, half-open `[start, end)` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedWindow {
    pub kind: WindowKind,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub sprint_number: Option<u32>,
    pub is_current: bool,
}

impl ResolvedWindow {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    pub fn contains_date(&self, date: NaiveDate, offset: FixedOffset) -> bool {
        let start = self.start.with_timezone(&offset).date_naive();
        let last = (self.end - Duration::nanoseconds(1))
            .with_timezone(&offset)
            .date_naive();
        date >= start && date <= last
    }

    pub fn is_single_day(&self) -> bool {
        self.end - self.start <= Duration::days(1)
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.end <= now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SprintInfo {
    pub number: u32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub days_elapsed: i64,
    pub days_remaining: i64,
}

pub struct SprintCalendar {
    epoch: DateTime<Utc>,
    length: Duration,
    lifetime_origin: DateTime<Utc>,
    offset: FixedOffset,
    clock: Arc<dyn Clock>,
}

impl SprintCalendar {
    pub fn new(config: &RankingConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            epoch: config.sprint_epoch,
            length: config.sprint_length(),
            lifetime_origin: config.lifetime_origin,
            offset: config.reference_offset(),
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn sprint_bounds(&self, number: u32) -> RankingResult<(DateTime<Utc>, DateTime<Utc>)> {
        if number == 0 {
            return Err(RankingError::invalid_window("sprint numbers start at 1"));
        }
        let start = i32::try_from(number - 1)
            .ok()
            .and_then(|index| self.length.checked_mul(index))
            .and_then(|offset| self.epoch.checked_add_signed(offset));
        let bounds = start.and_then(|start| Some((start, start.checked_add_signed(self.length)?)));
        bounds.ok_or_else(|| RankingError::invalid_window(format!("sprint {number} is out of range")))
    }

    fn sprint_number_at(&self, instant: DateTime<Utc>) -> RankingResult<u32> {
        let elapsed = instant - self.epoch;
        if elapsed < Duration::zero() {
            return Err(RankingError::invalid_window(format!(
                "{} is before the first sprint ({})",
                instant, self.epoch
            )));
        }
        let index = elapsed.num_seconds() / self.length.num_seconds();
        u32::try_from(index + 1)
            .map_err(|_| RankingError::invalid_window("sprint number out of range"))
    }

    pub fn current_sprint_info(&self) -> RankingResult<SprintInfo> {
        let now = self.clock.now();
        let number = self.sprint_number_at(now)?;
        let (start, end) = self.sprint_bounds(number)?;
        let days_elapsed = (now - start).num_days() + 1;
        Ok(SprintInfo {
            number,
            start,
            end,
            days_elapsed,
            days_remaining: self.length.num_days() - days_elapsed,
        })
    }

    pub fn resolve_window(&self, request: WindowRequest) -> RankingResult<ResolvedWindow> {
        match request {
            WindowRequest::CurrentSprint => {
                let info = self.current_sprint_info()?;
                Ok(ResolvedWindow {
                    kind: WindowKind::Sprint,
                    start: info.start,
                    end: info.end,
                    sprint_number: Some(info.number),
                    is_current: true,
                })
            }
            WindowRequest::Sprint(number) => {
                let (start, end) = self.sprint_bounds(number)?;
                let now = self.clock.now();
                Ok(ResolvedWindow {
                    kind: WindowKind::Sprint,
                    start,
                    end,
                    sprint_number: Some(number),
                    is_current: start <= now && now < end,
                })
            }
            WindowRequest::Lifetime => Ok(ResolvedWindow {
                kind: WindowKind::Lifetime,
                start: self.lifetime_origin,
                end: self.clock.now(),
                sprint_number: None,
                is_current: false,
            }),
            WindowRequest::Custom { start, end } => {
                let (Some(start_date), Some(end_date)) = (start, end) else {
                    return Err(RankingError::invalid_window(
                        "custom range needs both a start and an end date",
                    ));
                };
                if end_date < start_date {
                    return Err(RankingError::invalid_window(format!(
                        "custom range ends ({end_date}) before it starts ({start_date})"
                    )));
                }
                let after_end = end_date
                    .succ_opt()
                    .ok_or_else(|| RankingError::invalid_window("end date out of range"))?;
                Ok(ResolvedWindow {
                    kind: WindowKind::Custom,
                    start: self.local_midnight(start_date)?,
                    end: self.local_midnight(after_end)?,
                    sprint_number: None,
                    is_current: false,
                })
            }
        }
    }

    /// Midnight of `date` at the reference offset. The same offset applies to
    /// every date, so DST shifts are not followed.
    fn local_midnight(&self, date: NaiveDate) -> RankingResult<DateTime<Utc>> {
        date.and_hms_opt(0, 0, 0)
            .and_then(|naive| naive.and_local_timezone(self.offset).single())
            .map(|local| local.with_timezone(&Utc))
            .ok_or_else(|| RankingError::invalid_window(format!("cannot place {date} in time")))
    }
}
