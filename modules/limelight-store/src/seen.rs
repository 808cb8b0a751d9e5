use std::collections::HashSet;

use async_trait::async_trait;
use limelight_common::Result;
use sqlx::PgPool;

/// Externally-sourced event ids that have been shown or handled.
/// Existence means "do not resurface"; rows are never pruned.
#[async_trait]
pub trait SeenEventStore: Send + Sync {
    /// Record ids as handled. Insert-or-touch per id; duplicate ACKs are
    /// not errors. Returns the number of ids acknowledged.
    async fn ack(
        &self,
        ids: &[String],
        user_id: i64,
        persona_num: Option<i32>,
    ) -> Result<u64>;

    /// Which of the given ids are already recorded.
    async fn seen_set(&self, ids: &[String]) -> Result<HashSet<String>>;
}

pub struct PgSeenEventStore {
    pool: PgPool,
}

impl PgSeenEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SeenEventStore for PgSeenEventStore {
    async fn ack(
        &self,
        ids: &[String],
        user_id: i64,
        persona_num: Option<i32>,
    ) -> Result<u64> {
        let mut acknowledged = 0u64;
        for id in ids.iter().filter(|id| !id.is_empty()) {
            sqlx::query(
                r#"
                INSERT INTO seen_events (external_id, user_id, persona_num)
                VALUES ($1, $2, $3)
                ON CONFLICT (external_id) DO UPDATE SET updated_at = now()
                "#,
            )
            .bind(id)
            .bind(user_id)
            .bind(persona_num)
            .execute(&self.pool)
            .await?;
            acknowledged += 1;
        }
        Ok(acknowledged)
    }

    async fn seen_set(&self, ids: &[String]) -> Result<HashSet<String>> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT external_id FROM seen_events WHERE external_id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
