use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{NaiveDate, Utc};
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use task_leaderboard::db::{self, PgStore};
use task_leaderboard::report;
use task_leaderboard::{
    Collaborators, LeaderboardEngine, RankingConfig, SystemClock, WeightSource, WeightTable,
    WindowRequest,
};

#[derive(Parser)]
#[command(name = "task-leaderboard")]
#[command(about = "Sprint and lifetime performance rankings for support agents", long_about = None)]
struct Cli {
    /// TOML file overriding the ranking defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load sample agents, weights and recent work
    Seed,
    /// Import completed work items (or bulk day counts with --bulk) from CSV
    Import {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        bulk: bool,
    },
    /// Rank every active agent for a window
    #[command(group(
        ArgGroup::new("window")
            .args(["sprint", "lifetime", "start"])
            .multiple(false)
    ))]
    Standings {
        #[arg(long)]
        sprint: Option<u32>,
        #[arg(long)]
        lifetime: bool,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long)]
        json: bool,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show one agent's hourly or daily productivity breakdown
    #[command(group(
        ArgGroup::new("window")
            .args(["sprint", "lifetime", "start"])
            .multiple(false)
    ))]
    Profile {
        #[arg(long)]
        email: String,
        #[arg(long)]
        sprint: Option<u32>,
        #[arg(long)]
        lifetime: bool,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long)]
        json: bool,
    },
    /// Print the current sprint number and progress
    SprintInfo,
    /// Archive the final standings of a finished sprint (default: the previous one)
    CloseSprint {
        #[arg(long)]
        sprint: Option<u32>,
    },
}

fn window_request(
    sprint: Option<u32>,
    lifetime: bool,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> WindowRequest {
    if lifetime {
        WindowRequest::Lifetime
    } else if let Some(number) = sprint {
        WindowRequest::Sprint(number)
    } else if start.is_some() || end.is_some() {
        WindowRequest::Custom { start, end }
    } else {
        WindowRequest::CurrentSprint
    }
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "task_leaderboard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn build_engine(store: &PgStore, config: RankingConfig) -> anyhow::Result<LeaderboardEngine> {
    let rows = store
        .load_weights()
        .await
        .context("failed to load task weights")?;
    let mut weights = match config.seconds_per_point {
        Some(seconds) => {
            let history = store.fetch_handle_times().await?;
            WeightTable::from_handle_times(&history, seconds, config.weight_floor)
        }
        None => WeightTable::new(config.weight_floor),
    };
    weights.apply_rows(&rows);

    let store = Arc::new(store.clone());
    Ok(LeaderboardEngine::new(
        config,
        weights,
        Collaborators {
            directory: store.clone(),
            work: store.clone(),
            archive: store,
            clock: Arc::new(SystemClock),
        },
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = RankingConfig::load(cli.config.as_deref())?;
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;
    let store = PgStore::new(pool);

    match cli.command {
        Commands::InitDb => {
            db::init_db(store.pool()).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(store.pool(), Utc::now()).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv, bulk } => {
            if bulk {
                let imported = db::import_bulk_csv(store.pool(), &csv).await?;
                println!("Imported {imported} bulk day counts from {}.", csv.display());
            } else {
                let inserted = db::import_work_csv(store.pool(), &csv).await?;
                println!("Inserted {inserted} work items from {}.", csv.display());
            }
        }
        Commands::Standings {
            sprint,
            lifetime,
            start,
            end,
            json,
            out,
        } => {
            let engine = build_engine(&store, config).await?;
            let standings = engine
                .standings(window_request(sprint, lifetime, start, end))
                .await?;
            let rendered = if json {
                serde_json::to_string_pretty(&standings)?
            } else {
                report::build_report(&standings)
            };
            match out {
                Some(path) => {
                    std::fs::write(&path, rendered)?;
                    println!("Standings written to {}.", path.display());
                }
                None => println!("{rendered}"),
            }
        }
        Commands::Profile {
            email,
            sprint,
            lifetime,
            start,
            end,
            json,
        } => {
            let agent = store
                .find_agent_by_email(&email)
                .await?
                .with_context(|| format!("no agent with email {email}"))?;
            let engine = build_engine(&store, config).await?;
            let profile = engine
                .agent_profile(agent.id, window_request(sprint, lifetime, start, end))
                .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&profile)?);
            } else {
                println!("{}", report::build_profile_report(&agent.display_name, &profile));
            }
        }
        Commands::SprintInfo => {
            let engine = build_engine(&store, config).await?;
            let info = engine.current_sprint_info()?;
            println!(
                "Sprint {} ({} to {}): day {}, {} days remaining.",
                info.number,
                info.start.format("%Y-%m-%d"),
                info.end.format("%Y-%m-%d"),
                info.days_elapsed,
                info.days_remaining
            );
        }
        Commands::CloseSprint { sprint } => {
            let engine = build_engine(&store, config).await?;
            let number = match sprint {
                Some(number) => number,
                None => {
                    let current = engine.current_sprint_info()?.number;
                    if current <= 1 {
                        bail!("no sprint has finished yet");
                    }
                    current - 1
                }
            };
            let standings = engine.close_sprint(number).await?;
            let archive = standings.archive.unwrap_or_default();
            info!(sprint = number, written = archive.written, "sprint closed");
            println!(
                "Sprint {number} closed: {} standings archived, {} failed.",
                archive.written, archive.failed
            );
        }
    }

    Ok(())
}
