//! Request-scoped leaderboard computation.
//!
//! Each agent is aggregated and scored in its own task. Every task is joined
//! before the cross-cohort pass runs, because the normalization maxima and
//! the averages depend on the whole cohort.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, info};
use uuid::Uuid;

use crate::aggregate::{CategoryBreakdown, OutcomeBreakdown, WorkLogAggregator};
use crate::archive::{ArchiveOutcome, SprintArchiver};
use crate::calendar::{ResolvedWindow, SprintCalendar, SprintInfo, WindowRequest};
use crate::clock::Clock;
use crate::config::RankingConfig;
use crate::error::{RankingError, RankingResult};
use crate::models::{Agent, AgentMetrics, AgentScorecard, Category, CohortAverages};
use crate::normalize::{blend, CohortMaxima};
use crate::profile::{self, DayBucket, HourBucket, ProfileView};
use crate::qualify::partition;
use crate::rank::apply_rankings;
use crate::score;
use crate::store::{ArchiveStore, Directory, WorkStore};
use crate::weights::{WeightSummary, WeightTable};

pub struct Collaborators {
    pub directory: Arc<dyn Directory>,
    pub work: Arc<dyn WorkStore>,
    pub archive: Arc<dyn ArchiveStore>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Standings {
    pub window: ResolvedWindow,
    pub sprint_info: Option<SprintInfo>,
    pub competitive: Vec<AgentScorecard>,
    pub unqualified: Vec<AgentScorecard>,
    pub seniors: Vec<AgentScorecard>,
    pub averages: CohortAverages,
    pub weight_summary: WeightSummary,
    pub archive: Option<ArchiveOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentProfile {
    pub agent_id: Uuid,
    pub window: ResolvedWindow,
    pub view: ProfileView,
    pub metrics: Option<AgentMetrics>,
    pub categories: Vec<CategoryBreakdown>,
    pub outcomes: BTreeMap<Category, Vec<OutcomeBreakdown>>,
    pub hourly: Vec<HourBucket>,
    pub daily: BTreeMap<NaiveDate, DayBucket>,
    pub skipped: usize,
}

pub struct LeaderboardEngine {
    config: Arc<RankingConfig>,
    weights: Arc<WeightTable>,
    calendar: SprintCalendar,
    directory: Arc<dyn Directory>,
    aggregator: WorkLogAggregator,
    archiver: SprintArchiver,
}

impl LeaderboardEngine {
    pub fn new(config: RankingConfig, weights: WeightTable, collaborators: Collaborators) -> Self {
        let config = Arc::new(config);
        let weights = Arc::new(weights);
        let Collaborators {
            directory,
            work,
            archive,
            clock,
        } = collaborators;

        Self {
            calendar: SprintCalendar::new(&config, clock.clone()),
            aggregator: WorkLogAggregator::new(work, weights.clone(), config.clone()),
            archiver: SprintArchiver::new(archive, clock),
            directory,
            config,
            weights,
        }
    }

    pub fn current_sprint_info(&self) -> RankingResult<SprintInfo> {
        self.calendar.current_sprint_info()
    }

    /// Standings for every active agent in the directory.
    pub async fn standings(&self, request: WindowRequest) -> RankingResult<Standings> {
        let window = self.calendar.resolve_window(request)?;
        let cohort = self
            .directory
            .list_active()
            .await
            .map_err(RankingError::DirectoryUnavailable)?;
        self.standings_in(window, cohort).await
    }

    /// Standings for a caller-filtered cohort.
    pub async fn standings_for(
        &self,
        request: WindowRequest,
        cohort: Vec<Agent>,
    ) -> RankingResult<Standings> {
        let window = self.calendar.resolve_window(request)?;
        self.standings_in(window, cohort).await
    }

    async fn standings_in(
        &self,
        window: ResolvedWindow,
        cohort: Vec<Agent>,
    ) -> RankingResult<Standings> {
        let mut standings = self.rank_cohort(window, cohort.clone()).await?;
        if self.config.archive_on_read {
            standings.archive = self.archive_on_read(&window, &standings, cohort).await?;
        }
        Ok(standings)
    }

    /// The first read that sees a sprint has ended records its final
    /// standings: either the requested sprint itself, or the one before the
    /// current sprint. Sprints with stored snapshots are left untouched.
    async fn archive_on_read(
        &self,
        window: &ResolvedWindow,
        standings: &Standings,
        cohort: Vec<Agent>,
    ) -> RankingResult<Option<ArchiveOutcome>> {
        let Some(number) = window.sprint_number else {
            return Ok(None);
        };
        if window.has_ended(self.calendar.now()) {
            return Ok(self.archiver.archive_once(number, &standings.competitive).await);
        }
        if !window.is_current || number <= 1 {
            return Ok(None);
        }

        let previous = number - 1;
        if self.archiver.is_archived(previous).await {
            return Ok(None);
        }
        let closed_window = self.calendar.resolve_window(WindowRequest::Sprint(previous))?;
        let closed = self.rank_cohort(closed_window, cohort).await?;
        Ok(self.archiver.archive_once(previous, &closed.competitive).await)
    }

    /// Explicit sprint-closing job: computes the finished sprint's standings
    /// and archives them.
    pub async fn close_sprint(&self, sprint_number: u32) -> RankingResult<Standings> {
        let window = self.calendar.resolve_window(WindowRequest::Sprint(sprint_number))?;
        if !window.has_ended(self.calendar.now()) {
            return Err(RankingError::invalid_window(format!(
                "sprint {sprint_number} has not ended yet (ends {})",
                window.end
            )));
        }
        let cohort = self
            .directory
            .list_active()
            .await
            .map_err(RankingError::DirectoryUnavailable)?;

        let mut standings = self.rank_cohort(window, cohort).await?;
        let outcome = self
            .archiver
            .on_sprint_close(sprint_number, &standings.competitive)
            .await;
        standings.archive = Some(outcome);
        Ok(standings)
    }

    async fn score_cohort(
        &self,
        window: ResolvedWindow,
        cohort: Vec<Agent>,
    ) -> RankingResult<Vec<AgentScorecard>> {
        let mut tasks = JoinSet::new();
        for agent in cohort {
            let aggregator = self.aggregator.clone();
            tasks.spawn(async move {
                let log = aggregator.aggregate(agent.id, &window).await?;
                let card = score::score_log(&log).map(|metrics| AgentScorecard::new(&agent, metrics));
                if card.is_none() {
                    debug!(agent_id = %agent.id, "no worked days in window, leaving agent out");
                }
                Ok::<_, RankingError>(card)
            });
        }

        let mut cards = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            // Returning early drops the set, which aborts the remaining tasks.
            if let Some(card) = joined?? {
                cards.push(card);
            }
        }
        Ok(cards)
    }

    async fn rank_cohort(
        &self,
        window: ResolvedWindow,
        cohort: Vec<Agent>,
    ) -> RankingResult<Standings> {
        let requested = cohort.len();
        let cards = self.score_cohort(window, cohort).await?;

        let mut buckets = partition(cards, window.kind, &self.config.qualification);
        let maxima = CohortMaxima::from_cohort(&buckets.competitive);
        for card in buckets
            .competitive
            .iter_mut()
            .chain(buckets.unqualified.iter_mut())
            .chain(buckets.seniors.iter_mut())
        {
            blend(card, &maxima, self.config.hybrid);
        }

        apply_rankings(&mut buckets.competitive);
        sort_unranked(&mut buckets.unqualified);
        sort_unranked(&mut buckets.seniors);

        let averages = cohort_averages(&buckets.competitive);
        info!(
            kind = ?window.kind,
            sprint = ?window.sprint_number,
            requested,
            competitive = buckets.competitive.len(),
            unqualified = buckets.unqualified.len(),
            seniors = buckets.seniors.len(),
            "computed standings"
        );

        Ok(Standings {
            window,
            sprint_info: self.calendar.current_sprint_info().ok(),
            competitive: buckets.competitive,
            unqualified: buckets.unqualified,
            seniors: buckets.seniors,
            averages,
            weight_summary: self.weights.summary(),
            archive: None,
        })
    }

    pub async fn agent_profile(
        &self,
        agent_id: Uuid,
        request: WindowRequest,
    ) -> RankingResult<AgentProfile> {
        let window = self.calendar.resolve_window(request)?;
        let log = self.aggregator.aggregate(agent_id, &window).await?;

        Ok(AgentProfile {
            agent_id,
            window,
            view: profile::preferred_view(&window),
            metrics: score::score_log(&log),
            categories: log.group_by_category(),
            outcomes: log.group_by_outcome(),
            hourly: profile::hourly_buckets(&log).to_vec(),
            daily: profile::daily_buckets(&log),
            skipped: log.skipped,
        })
    }
}

fn sort_unranked(cards: &mut [AgentScorecard]) {
    cards.sort_by(|a, b| {
        b.metrics
            .weighted_daily_avg
            .total_cmp(&a.metrics.weighted_daily_avg)
            .then_with(|| a.agent_id.cmp(&b.agent_id))
    });
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

pub fn cohort_averages(competitive: &[AgentScorecard]) -> CohortAverages {
    let metric = |f: fn(&AgentMetrics) -> f64| mean(competitive.iter().map(|c| f(&c.metrics)));

    CohortAverages {
        agent_count: competitive.len(),
        total_completed: metric(|m| m.total_completed as f64),
        weighted_points: metric(|m| m.weighted_points),
        days_worked: metric(|m| m.days_worked as f64),
        weighted_daily_avg: metric(|m| m.weighted_daily_avg),
        tasks_per_day: metric(|m| m.tasks_per_day),
        active_hours: metric(|m| m.active_hours),
        pts_per_active_hour: mean(competitive.iter().filter_map(|c| c.metrics.pts_per_active_hour)),
        hybrid_score: mean(competitive.iter().filter_map(|c| c.hybrid_score)),
    }
}
