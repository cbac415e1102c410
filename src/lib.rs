//! Performance rankings for customer-service agents.
//!
//! Completed work is priced through a [`WeightTable`], rolled up per agent
//! for a resolved window, and ranked across the cohort into sprint, lifetime,
//! task-volume and hybrid leaderboards.

pub mod aggregate;
pub mod archive;
pub mod calendar;
pub mod clock;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod models;
pub mod normalize;
pub mod profile;
pub mod qualify;
pub mod rank;
pub mod report;
pub mod score;
pub mod store;
pub mod weights;

pub use calendar::{ResolvedWindow, SprintCalendar, SprintInfo, WindowKind, WindowRequest};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::RankingConfig;
pub use engine::{AgentProfile, Collaborators, LeaderboardEngine, Standings};
pub use error::{RankingError, RankingResult, StoreError};
pub use models::{Agent, AgentMetrics, AgentScorecard, Category, CohortAverages, Tier};
pub use store::{ArchiveStore, Directory, MemoryStore, WeightSource, WorkStore};
pub use weights::WeightTable;
