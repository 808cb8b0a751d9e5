use async_trait::async_trait;
use limelight_common::{PersonaSummary, Result};
use serde_json::Value;
use sqlx::PgPool;

/// Read-only view of the persona service's data. Persona CRUD belongs to
/// another subsystem; this resolves references and lists personas for the
/// comment feed.
#[async_trait]
pub trait PersonaDirectory: Send + Sync {
    /// Resolve a caller-supplied persona reference (the persona number as
    /// a string) to its number, if the persona exists for this user.
    async fn resolve_ref(&self, user_id: i64, persona_ref: &str) -> Result<Option<i32>>;

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<PersonaSummary>>;
}

pub struct PgPersonaDirectory {
    pool: PgPool,
}

impl PgPersonaDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PersonaDirectory for PgPersonaDirectory {
    async fn resolve_ref(&self, user_id: i64, persona_ref: &str) -> Result<Option<i32>> {
        let Ok(persona_num) = persona_ref.trim().parse::<i32>() else {
            return Ok(None);
        };
        let row = sqlx::query_as::<_, (i32,)>(
            "SELECT persona_num FROM personas WHERE user_id = $1 AND persona_num = $2",
        )
        .bind(user_id)
        .bind(persona_num)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(num,)| num))
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<PersonaSummary>> {
        let rows = sqlx::query_as::<_, (i32, Option<String>, Option<Value>)>(
            r#"
            SELECT persona_num, display_name, parameters
            FROM personas
            WHERE user_id = $1
            ORDER BY persona_num
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(persona_num, display_name, parameters)| PersonaSummary {
                persona_num,
                display_name,
                personality: parameters
                    .as_ref()
                    .and_then(|p| p.get("personality"))
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string()),
            })
            .collect())
    }
}
