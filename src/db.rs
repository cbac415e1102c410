use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use crate::calendar::ResolvedWindow;
use crate::error::StoreError;
use crate::models::{
    Agent, ArchivedSprintRanking, BulkDayCount, Category, CompletedWorkItem, WeightRow, WorkStatus,
};
use crate::store::{ArchiveStore, Directory, StoreResult, WeightSource, WorkStore};
use crate::weights::HandleTimeRow;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed collaborators.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn find_agent_by_email(&self, email: &str) -> anyhow::Result<Option<Agent>> {
        let row = sqlx::query(
            "SELECT id, display_name, email, categories, is_senior \
             FROM task_leaderboard.agents WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(agent_from_row).transpose().map_err(Into::into)
    }

    /// Average handle time per (category, label) over completed history.
    pub async fn fetch_handle_times(&self) -> anyhow::Result<Vec<HandleTimeRow>> {
        let rows = sqlx::query(
            r#"
            SELECT category, outcome_label, AVG(handle_seconds) AS avg_seconds
            FROM task_leaderboard.work_items
            WHERE status = 'completed'
              AND outcome_label IS NOT NULL
              AND handle_seconds IS NOT NULL
            GROUP BY category, outcome_label
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to load handle-time history")?;

        let mut handle_times = Vec::with_capacity(rows.len());
        for row in rows {
            let category: String = row.try_get("category")?;
            handle_times.push(HandleTimeRow {
                category: Category::new(&category),
                outcome_label: row.try_get("outcome_label")?,
                avg_handle_seconds: row.try_get("avg_seconds")?,
            });
        }
        Ok(handle_times)
    }
}

fn agent_from_row(row: &PgRow) -> StoreResult<Agent> {
    let categories: Vec<String> = row.try_get("categories")?;
    Ok(Agent {
        id: row.try_get("id")?,
        display_name: row.try_get("display_name")?,
        email: row.try_get("email")?,
        categories: categories.iter().map(|c| Category::new(c)).collect(),
        is_senior: row.try_get("is_senior")?,
    })
}

fn sprint_key(sprint_number: u32) -> StoreResult<i32> {
    i32::try_from(sprint_number)
        .map_err(|_| StoreError::InvalidData(format!("sprint number {sprint_number} too large")))
}

#[async_trait]
impl Directory for PgStore {
    async fn list_active(&self) -> StoreResult<Vec<Agent>> {
        let rows = sqlx::query(
            "SELECT id, display_name, email, categories, is_senior \
             FROM task_leaderboard.agents WHERE active ORDER BY display_name",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(agent_from_row).collect()
    }
}

#[async_trait]
impl WorkStore for PgStore {
    async fn fetch_completed(
        &self,
        agent_id: Uuid,
        window: &ResolvedWindow,
    ) -> StoreResult<Vec<CompletedWorkItem>> {
        let rows = sqlx::query(
            r#"
            SELECT id, agent_id, category, outcome_label, status, completed_at, handle_seconds
            FROM task_leaderboard.work_items
            WHERE agent_id = $1
              AND status = 'completed'
              AND (completed_at IS NULL OR (completed_at >= $2 AND completed_at < $3))
            "#,
        )
        .bind(agent_id)
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&self.pool)
        .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let category: String = row.try_get("category")?;
            let status: String = row.try_get("status")?;
            items.push(CompletedWorkItem {
                id: row.try_get("id")?,
                agent_id: row.try_get("agent_id")?,
                category: Category::new(&category),
                outcome_label: row.try_get("outcome_label")?,
                status: WorkStatus::parse(&status)
                    .ok_or_else(|| StoreError::InvalidData(format!("unknown status {status}")))?,
                completed_at: row.try_get("completed_at")?,
                handle_seconds: row.try_get("handle_seconds")?,
            });
        }
        Ok(items)
    }

    async fn fetch_bulk_imported(
        &self,
        agent_id: Uuid,
        window: &ResolvedWindow,
    ) -> StoreResult<Vec<BulkDayCount>> {
        // Dates are local to the reference offset; widen by a day on each
        // side and let the aggregator apply the exact bounds.
        let from = window.start.date_naive() - Duration::days(1);
        let to = window.end.date_naive() + Duration::days(1);
        let rows = sqlx::query(
            r#"
            SELECT agent_id, category, work_date, item_count
            FROM task_leaderboard.bulk_counts
            WHERE agent_id = $1 AND work_date BETWEEN $2 AND $3
            "#,
        )
        .bind(agent_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        let mut days = Vec::with_capacity(rows.len());
        for row in rows {
            let category: String = row.try_get("category")?;
            let count: i32 = row.try_get("item_count")?;
            days.push(BulkDayCount {
                agent_id: row.try_get("agent_id")?,
                category: Category::new(&category),
                date: row.try_get("work_date")?,
                count: u32::try_from(count)
                    .map_err(|_| StoreError::InvalidData(format!("negative item count {count}")))?,
            });
        }
        Ok(days)
    }
}

#[async_trait]
impl ArchiveStore for PgStore {
    async fn upsert(
        &self,
        sprint_number: u32,
        agent_id: Uuid,
        snapshot: &ArchivedSprintRanking,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO task_leaderboard.sprint_rankings
            (sprint_number, agent_id, snapshot, archived_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (sprint_number, agent_id) DO UPDATE
            SET snapshot = EXCLUDED.snapshot, archived_at = EXCLUDED.archived_at
            "#,
        )
        .bind(sprint_key(sprint_number)?)
        .bind(agent_id)
        .bind(serde_json::to_value(snapshot)?)
        .bind(snapshot.archived_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch_sprint(&self, sprint_number: u32) -> StoreResult<Vec<ArchivedSprintRanking>> {
        let rows = sqlx::query(
            "SELECT snapshot FROM task_leaderboard.sprint_rankings \
             WHERE sprint_number = $1 ORDER BY agent_id",
        )
        .bind(sprint_key(sprint_number)?)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let snapshot: serde_json::Value = row.try_get("snapshot")?;
            records.push(serde_json::from_value(snapshot)?);
        }
        records.sort_by_key(|r: &ArchivedSprintRanking| (r.ranks.weighted_daily_avg, r.agent_id));
        Ok(records)
    }

    async fn is_archived(&self, sprint_number: u32) -> StoreResult<bool> {
        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM task_leaderboard.sprint_rankings \
             WHERE sprint_number = $1) AS archived",
        )
        .bind(sprint_key(sprint_number)?)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("archived")?)
    }
}

#[async_trait]
impl WeightSource for PgStore {
    async fn load_weights(&self) -> StoreResult<Vec<WeightRow>> {
        let rows = sqlx::query("SELECT category, outcome_label, weight FROM task_leaderboard.task_weights")
            .fetch_all(&self.pool)
            .await?;

        let mut weights = Vec::with_capacity(rows.len());
        for row in rows {
            let category: String = row.try_get("category")?;
            let label: String = row.try_get("outcome_label")?;
            weights.push(WeightRow {
                category: Category::new(&category),
                outcome_label: (!label.is_empty()).then_some(label),
                weight: row.try_get("weight")?,
            });
        }
        Ok(weights)
    }
}

/// Creates the agent or refreshes its name. Categories are merged; the
/// senior flag only changes when `is_senior` is given.
async fn upsert_agent(
    pool: &PgPool,
    name: &str,
    email: &str,
    categories: &[String],
    is_senior: Option<bool>,
) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO task_leaderboard.agents AS a (id, display_name, email, categories, is_senior)
        VALUES ($1, $2, $3, $4, COALESCE($5, FALSE))
        ON CONFLICT (email) DO UPDATE
        SET display_name = EXCLUDED.display_name,
            categories = ARRAY(SELECT DISTINCT unnest(a.categories || EXCLUDED.categories)),
            is_senior = COALESCE($5, a.is_senior)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(email)
    .bind(categories)
    .bind(is_senior)
    .fetch_one(pool)
    .await?
    .try_get("id")?;
    Ok(id)
}

pub async fn seed(pool: &PgPool, now: DateTime<Utc>) -> anyhow::Result<()> {
    let weights = [
        ("EMAIL", "", 6.0),
        ("EMAIL", "Refund Issued", 9.0),
        ("EMAIL", "Escalated", 7.5),
        ("CHAT", "", 3.0),
        ("CHAT", "Resolved", 3.5),
        ("SPAM", "", 0.8),
    ];
    for (category, label, weight) in weights {
        sqlx::query(
            r#"
            INSERT INTO task_leaderboard.task_weights (category, outcome_label, weight)
            VALUES ($1, $2, $3)
            ON CONFLICT (category, outcome_label) DO UPDATE SET weight = EXCLUDED.weight
            "#,
        )
        .bind(category)
        .bind(label)
        .bind(weight)
        .execute(pool)
        .await?;
    }

    // (name, email, senior, days worked, emails per day, spam per day)
    let agents = [
        ("Avery Lee", "avery.lee@groupscholar.com", false, 6, 7, 20),
        ("Jules Moreno", "jules.moreno@groupscholar.com", false, 4, 9, 0),
        ("Kiara Patel", "kiara.patel@groupscholar.com", true, 5, 5, 30),
        ("Rowan Hale", "rowan.hale@groupscholar.com", false, 2, 12, 10),
    ];
    let labels = ["Resolved", "Refund Issued", "Escalated"];

    for (name, email, is_senior, days, per_day, spam) in agents {
        let categories = vec!["EMAIL".to_string(), "SPAM".to_string()];
        let agent_id = upsert_agent(pool, name, email, &categories, Some(is_senior)).await?;

        for day in 0..days {
            let day_start = now - Duration::days(day + 1);
            for n in 0..per_day {
                let completed_at = day_start + Duration::minutes(17 * n);
                let label = labels[(n as usize) % labels.len()];
                sqlx::query(
                    r#"
                    INSERT INTO task_leaderboard.work_items
                    (id, agent_id, category, outcome_label, status, completed_at, handle_seconds, source_key)
                    VALUES ($1, $2, 'EMAIL', $3, 'completed', $4, $5, $6)
                    ON CONFLICT (source_key) DO NOTHING
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(agent_id)
                .bind(label)
                .bind(completed_at)
                .bind(240.0 + 30.0 * n as f64)
                .bind(format!("seed-{email}-{}-{n}", completed_at.date_naive()))
                .execute(pool)
                .await?;
            }

            if spam > 0 {
                upsert_bulk(pool, agent_id, "SPAM", (now - Duration::days(day + 1)).date_naive(), spam)
                    .await?;
            }
        }
    }

    Ok(())
}

async fn upsert_bulk(
    pool: &PgPool,
    agent_id: Uuid,
    category: &str,
    work_date: NaiveDate,
    item_count: i32,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO task_leaderboard.bulk_counts (agent_id, category, work_date, item_count)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (agent_id, category, work_date) DO UPDATE SET item_count = EXCLUDED.item_count
        "#,
    )
    .bind(agent_id)
    .bind(Category::new(category).as_str())
    .bind(work_date)
    .bind(item_count)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn import_work_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        agent_name: String,
        agent_email: String,
        category: String,
        outcome_label: Option<String>,
        status: String,
        completed_at: Option<DateTime<Utc>>,
        handle_seconds: Option<f64>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let status = WorkStatus::parse(&row.status)
            .with_context(|| format!("unknown status {:?}", row.status))?;
        let category = Category::new(&row.category);
        let agent_id = upsert_agent(
            pool,
            &row.agent_name,
            &row.agent_email,
            &[category.to_string()],
            None,
        )
        .await?;

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO task_leaderboard.work_items
            (id, agent_id, category, outcome_label, status, completed_at, handle_seconds, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(agent_id)
        .bind(category.as_str())
        .bind(row.outcome_label.filter(|label| !label.trim().is_empty()))
        .bind(status.as_str())
        .bind(row.completed_at)
        .bind(row.handle_seconds)
        .bind(source_key)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}

/// Imports per-day counts for bulk categories. Re-importing a day replaces
/// its count.
pub async fn import_bulk_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        agent_name: String,
        agent_email: String,
        category: String,
        work_date: NaiveDate,
        item_count: i32,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut imported = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        if row.item_count < 0 {
            anyhow::bail!("negative item_count for {} on {}", row.agent_email, row.work_date);
        }
        let category = Category::new(&row.category);
        let agent_id = upsert_agent(
            pool,
            &row.agent_name,
            &row.agent_email,
            &[category.to_string()],
            None,
        )
        .await?;
        upsert_bulk(pool, agent_id, category.as_str(), row.work_date, row.item_count).await?;
        imported += 1;
    }

    Ok(imported)
}
