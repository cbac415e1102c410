//! Collaborator boundaries: who the agents are, what they completed, and
//! where closed sprints are archived.
//!
//! `MemoryStore` backs tests and local runs; `db::PgStore` backs production.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::calendar::ResolvedWindow;
use crate::error::StoreError;
use crate::models::{Agent, ArchivedSprintRanking, BulkDayCount, CompletedWorkItem, WeightRow};

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Directory: Send + Sync {
    async fn list_active(&self) -> StoreResult<Vec<Agent>>;
}

#[async_trait]
pub trait WorkStore: Send + Sync {
    async fn fetch_completed(
        &self,
        agent_id: Uuid,
        window: &ResolvedWindow,
    ) -> StoreResult<Vec<CompletedWorkItem>>;

    async fn fetch_bulk_imported(
        &self,
        agent_id: Uuid,
        window: &ResolvedWindow,
    ) -> StoreResult<Vec<BulkDayCount>>;
}

#[async_trait]
pub trait ArchiveStore: Send + Sync {
    /// Insert or replace the snapshot stored under `(sprint_number, agent_id)`.
    async fn upsert(
        &self,
        sprint_number: u32,
        agent_id: Uuid,
        snapshot: &ArchivedSprintRanking,
    ) -> StoreResult<()>;

    async fn fetch_sprint(&self, sprint_number: u32) -> StoreResult<Vec<ArchivedSprintRanking>>;

    /// Whether any snapshot is stored for `sprint_number`.
    async fn is_archived(&self, sprint_number: u32) -> StoreResult<bool>;
}

#[async_trait]
pub trait WeightSource: Send + Sync {
    async fn load_weights(&self) -> StoreResult<Vec<WeightRow>>;
}

#[derive(Debug, Default)]
struct MemoryState {
    agents: Vec<Agent>,
    items: Vec<CompletedWorkItem>,
    bulk: Vec<BulkDayCount>,
    weights: Vec<WeightRow>,
    archive: HashMap<(u32, Uuid), ArchivedSprintRanking>,
    unavailable_agents: HashSet<Uuid>,
    archive_unavailable: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_agent(&self, agent: Agent) {
        self.state.write().await.agents.push(agent);
    }

    pub async fn add_items(&self, items: impl IntoIterator<Item = CompletedWorkItem>) {
        self.state.write().await.items.extend(items);
    }

    pub async fn add_bulk(&self, days: impl IntoIterator<Item = BulkDayCount>) {
        self.state.write().await.bulk.extend(days);
    }

    pub async fn add_weights(&self, rows: impl IntoIterator<Item = WeightRow>) {
        self.state.write().await.weights.extend(rows);
    }

    /// Makes work fetches for `agent_id` fail.
    pub async fn set_agent_unavailable(&self, agent_id: Uuid) {
        self.state.write().await.unavailable_agents.insert(agent_id);
    }

    /// Makes archive reads and writes fail.
    pub async fn set_archive_unavailable(&self, unavailable: bool) {
        self.state.write().await.archive_unavailable = unavailable;
    }

    pub async fn archived_count(&self) -> usize {
        self.state.read().await.archive.len()
    }
}

#[async_trait]
impl Directory for MemoryStore {
    async fn list_active(&self) -> StoreResult<Vec<Agent>> {
        Ok(self.state.read().await.agents.clone())
    }
}

#[async_trait]
impl WorkStore for MemoryStore {
    async fn fetch_completed(
        &self,
        agent_id: Uuid,
        window: &ResolvedWindow,
    ) -> StoreResult<Vec<CompletedWorkItem>> {
        let state = self.state.read().await;
        if state.unavailable_agents.contains(&agent_id) {
            return Err(StoreError::Unavailable(format!("work items for {agent_id}")));
        }
        Ok(state
            .items
            .iter()
            .filter(|item| item.agent_id == agent_id)
            .filter(|item| item.completed_at.map_or(true, |at| window.contains(at)))
            .cloned()
            .collect())
    }

    async fn fetch_bulk_imported(
        &self,
        agent_id: Uuid,
        _window: &ResolvedWindow,
    ) -> StoreResult<Vec<BulkDayCount>> {
        let state = self.state.read().await;
        if state.unavailable_agents.contains(&agent_id) {
            return Err(StoreError::Unavailable(format!("bulk counts for {agent_id}")));
        }
        Ok(state
            .bulk
            .iter()
            .filter(|day| day.agent_id == agent_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ArchiveStore for MemoryStore {
    async fn upsert(
        &self,
        sprint_number: u32,
        agent_id: Uuid,
        snapshot: &ArchivedSprintRanking,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.archive_unavailable {
            return Err(StoreError::Unavailable("archive".to_string()));
        }
        state
            .archive
            .insert((sprint_number, agent_id), snapshot.clone());
        Ok(())
    }

    async fn fetch_sprint(&self, sprint_number: u32) -> StoreResult<Vec<ArchivedSprintRanking>> {
        let state = self.state.read().await;
        let mut records: Vec<ArchivedSprintRanking> = state
            .archive
            .iter()
            .filter(|((sprint, _), _)| *sprint == sprint_number)
            .map(|(_, record)| record.clone())
            .collect();
        records.sort_by_key(|record| (record.ranks.weighted_daily_avg, record.agent_id));
        Ok(records)
    }

    async fn is_archived(&self, sprint_number: u32) -> StoreResult<bool> {
        let state = self.state.read().await;
        if state.archive_unavailable {
            return Err(StoreError::Unavailable("archive".to_string()));
        }
        Ok(state.archive.keys().any(|(sprint, _)| *sprint == sprint_number))
    }
}

#[async_trait]
impl WeightSource for MemoryStore {
    async fn load_weights(&self) -> StoreResult<Vec<WeightRow>> {
        Ok(self.state.read().await.weights.clone())
    }
}
