use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::RankingError;
use crate::models::{AgentScorecard, ArchivedSprintRanking};
use crate::store::ArchiveStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveOutcome {
    pub sprint_number: u32,
    pub written: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct SprintArchiver {
    store: Arc<dyn ArchiveStore>,
    clock: Arc<dyn Clock>,
}

impl SprintArchiver {
    pub fn new(store: Arc<dyn ArchiveStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// A failed lookup is logged and reported as not archived.
    pub async fn is_archived(&self, sprint_number: u32) -> bool {
        match self.store.is_archived(sprint_number).await {
            Ok(archived) => archived,
            Err(err) => {
                warn!(sprint_number, error = %err, "sprint archive lookup failed");
                false
            }
        }
    }

    /// Read-path archiving: writes the sprint's snapshots only while none are
    /// stored yet, so a closed sprint keeps the standings it was first
    /// archived with. Returns `None` when nothing was attempted.
    pub async fn archive_once(
        &self,
        sprint_number: u32,
        scorecards: &[AgentScorecard],
    ) -> Option<ArchiveOutcome> {
        if scorecards.is_empty() {
            debug!(sprint_number, "no ranked agents to archive");
            return None;
        }
        if self.is_archived(sprint_number).await {
            debug!(sprint_number, "sprint already archived");
            return None;
        }
        Some(self.on_sprint_close(sprint_number, scorecards).await)
    }

    /// Upserts one snapshot per agent under `(sprint_number, agent_id)`,
    /// replacing whatever is stored. Failed writes are logged and counted,
    /// never returned; callers on the read path keep their result.
    pub async fn on_sprint_close(
        &self,
        sprint_number: u32,
        scorecards: &[AgentScorecard],
    ) -> ArchiveOutcome {
        let archived_at = self.clock.now();
        let mut outcome = ArchiveOutcome {
            sprint_number,
            ..ArchiveOutcome::default()
        };

        for card in scorecards {
            let snapshot = ArchivedSprintRanking::from_scorecard(sprint_number, card, archived_at);
            match self.store.upsert(sprint_number, card.agent_id, &snapshot).await {
                Ok(()) => outcome.written += 1,
                Err(source) => {
                    let err = RankingError::ArchiveWriteFailed {
                        sprint_number,
                        agent_id: card.agent_id,
                        source,
                    };
                    warn!(error = %err, "sprint archive write failed");
                    outcome.failed += 1;
                }
            }
        }

        info!(
            sprint_number,
            written = outcome.written,
            failed = outcome.failed,
            "archived sprint standings"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::{Agent, AgentMetrics};
    use crate::store::MemoryStore;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn cards() -> Vec<AgentScorecard> {
        ["Avery Lee", "Jules Moreno"]
            .iter()
            .map(|name| {
                let agent = Agent {
                    id: Uuid::new_v4(),
                    display_name: name.to_string(),
                    email: "team@groupscholar.com".to_string(),
                    categories: vec![],
                    is_senior: false,
                };
                AgentScorecard::new(&agent, AgentMetrics::default())
            })
            .collect()
    }

    fn archiver(store: &MemoryStore) -> SprintArchiver {
        let clock = FixedClock(Utc.with_ymd_and_hms(2025, 2, 3, 12, 0, 0).unwrap());
        SprintArchiver::new(Arc::new(store.clone()), Arc::new(clock))
    }

    #[tokio::test]
    async fn archiving_twice_keeps_one_record_per_agent() {
        let store = MemoryStore::new();
        let archiver = archiver(&store);
        let cards = cards();

        let first = archiver.on_sprint_close(2, &cards).await;
        let second = archiver.on_sprint_close(2, &cards).await;

        assert_eq!(first.written, 2);
        assert_eq!(second.written, 2);
        assert_eq!(store.archived_count().await, 2);
        assert_eq!(store.fetch_sprint(2).await.unwrap().len(), 2);
        assert!(store.fetch_sprint(3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn write_failures_are_swallowed() {
        let store = MemoryStore::new();
        store.set_archive_unavailable(true).await;
        let outcome = archiver(&store).on_sprint_close(2, &cards()).await;
        assert_eq!(
            outcome,
            ArchiveOutcome {
                sprint_number: 2,
                written: 0,
                failed: 2
            }
        );
        assert_eq!(store.archived_count().await, 0);
    }

    #[tokio::test]
    async fn archive_once_leaves_stored_sprint_alone() {
        let store = MemoryStore::new();
        let archiver = archiver(&store);
        let mut cards = cards();

        let first = archiver.archive_once(2, &cards).await;
        assert_eq!(first.map(|o| o.written), Some(2));
        assert!(archiver.is_archived(2).await);

        cards[0].metrics.total_completed = 99;
        assert_eq!(archiver.archive_once(2, &cards).await, None);
        let stored = store.fetch_sprint(2).await.unwrap();
        assert!(stored.iter().all(|record| record.metrics.total_completed == 0));

        assert_eq!(archiver.archive_once(3, &[]).await, None);
        assert!(!archiver.is_archived(3).await);
    }
}
