use async_trait::async_trait;
use limelight_common::{AccountMapping, PersonaScope, Result};
use serde_json::Value;
use sqlx::PgPool;

use crate::legacy::{parse_legacy_mapping, LEGACY_ACCOUNT_KEY};

/// Binds a persona to exactly one external account identity.
#[async_trait]
pub trait MappingStore: Send + Sync {
    /// Upsert the binding for a persona scope.
    async fn link(&self, scope: &PersonaScope, mapping: &AccountMapping) -> Result<()>;

    /// The binding for a scope, if any. Authoritative columns first, then
    /// the legacy embedded document for pre-migration rows.
    async fn resolve(&self, scope: &PersonaScope) -> Result<Option<AccountMapping>>;

    /// Clear both representations of the binding.
    async fn unlink(&self, scope: &PersonaScope) -> Result<()>;

    /// Every scope with a current binding, for the snapshot tick.
    async fn linked_scopes(&self) -> Result<Vec<PersonaScope>>;
}

pub struct PgMappingStore {
    pool: PgPool,
}

impl PgMappingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MappingStore for PgMappingStore {
    async fn link(&self, scope: &PersonaScope, mapping: &AccountMapping) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO persona_accounts (user_id, persona_num, account_id, account_username, page_id)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, persona_num) DO UPDATE SET
                account_id = EXCLUDED.account_id,
                account_username = EXCLUDED.account_username,
                page_id = EXCLUDED.page_id,
                updated_at = now()
            "#,
        )
        .bind(scope.user_id)
        .bind(scope.persona_num)
        .bind(&mapping.account_id)
        .bind(&mapping.username)
        .bind(&mapping.page_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn resolve(&self, scope: &PersonaScope) -> Result<Option<AccountMapping>> {
        let row = sqlx::query_as::<_, (String, Option<String>, String)>(
            r#"
            SELECT account_id, account_username, page_id
            FROM persona_accounts
            WHERE user_id = $1 AND persona_num = $2
            "#,
        )
        .bind(scope.user_id)
        .bind(scope.persona_num)
        .fetch_optional(&self.pool)
        .await?;

        if let Some((account_id, username, page_id)) = row {
            return Ok(Some(AccountMapping {
                account_id,
                username,
                page_id,
            }));
        }

        // Pre-migration rows kept the binding inside the persona document.
        let doc = sqlx::query_as::<_, (Option<Value>,)>(
            "SELECT parameters FROM personas WHERE user_id = $1 AND persona_num = $2",
        )
        .bind(scope.user_id)
        .bind(scope.persona_num)
        .fetch_optional(&self.pool)
        .await?;

        Ok(doc
            .and_then(|(parameters,)| parameters)
            .as_ref()
            .and_then(parse_legacy_mapping))
    }

    async fn unlink(&self, scope: &PersonaScope) -> Result<()> {
        sqlx::query("DELETE FROM persona_accounts WHERE user_id = $1 AND persona_num = $2")
            .bind(scope.user_id)
            .bind(scope.persona_num)
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            UPDATE personas
            SET parameters = parameters - $3
            WHERE user_id = $1 AND persona_num = $2 AND parameters ? $3
            "#,
        )
        .bind(scope.user_id)
        .bind(scope.persona_num)
        .bind(LEGACY_ACCOUNT_KEY)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn linked_scopes(&self) -> Result<Vec<PersonaScope>> {
        let rows = sqlx::query_as::<_, (i64, i32)>(
            "SELECT user_id, persona_num FROM persona_accounts ORDER BY user_id, persona_num",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(user_id, persona_num)| PersonaScope::new(user_id, persona_num))
            .collect())
    }
}
