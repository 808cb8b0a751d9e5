use async_trait::async_trait;
use chrono::NaiveDate;
use limelight_common::{DailySnapshot, PersonaScope, Result};
use sqlx::PgPool;

/// Append-mostly daily analytics series, one row per persona per day.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Insert or overwrite the row for the snapshot's `(scope, date)` key.
    /// Re-running the same day is safe; the tick and an interactive
    /// "snapshot now" may both land on today's row.
    async fn upsert(&self, snapshot: &DailySnapshot) -> Result<()>;

    /// Rows for a scope from `since` onward, ordered by date ascending.
    async fn range(&self, scope: &PersonaScope, since: NaiveDate) -> Result<Vec<DailySnapshot>>;
}

pub struct PgSnapshotStore {
    pool: PgPool,
}

impl PgSnapshotStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn upsert(&self, snapshot: &DailySnapshot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO daily_snapshots
                (user_id, persona_num, account_id, date,
                 followers_count, total_likes, profile_views, reach, impressions)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (user_id, persona_num, date) DO UPDATE SET
                account_id = EXCLUDED.account_id,
                followers_count = EXCLUDED.followers_count,
                total_likes = EXCLUDED.total_likes,
                profile_views = EXCLUDED.profile_views,
                reach = EXCLUDED.reach,
                impressions = EXCLUDED.impressions,
                updated_at = now()
            "#,
        )
        .bind(snapshot.scope.user_id)
        .bind(snapshot.scope.persona_num)
        .bind(&snapshot.account_id)
        .bind(snapshot.date)
        .bind(snapshot.followers_count)
        .bind(snapshot.total_likes)
        .bind(snapshot.profile_views)
        .bind(snapshot.reach)
        .bind(snapshot.impressions)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn range(&self, scope: &PersonaScope, since: NaiveDate) -> Result<Vec<DailySnapshot>> {
        let rows = sqlx::query_as::<
            _,
            (String, NaiveDate, i64, i64, i64, i64, i64),
        >(
            r#"
            SELECT account_id, date, followers_count, total_likes,
                   profile_views, reach, impressions
            FROM daily_snapshots
            WHERE user_id = $1 AND persona_num = $2 AND date >= $3
            ORDER BY date ASC
            "#,
        )
        .bind(scope.user_id)
        .bind(scope.persona_num)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(account_id, date, followers_count, total_likes, profile_views, reach, impressions)| {
                    DailySnapshot {
                        scope: *scope,
                        account_id,
                        date,
                        followers_count,
                        total_likes,
                        profile_views,
                        reach,
                        impressions,
                    }
                },
            )
            .collect())
    }
}
