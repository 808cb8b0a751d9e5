use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use limelight_common::{AuthToken, OwnerScope, PersonaScope, Result};
use sqlx::PgPool;

/// Outcome of a scope-exact token lookup. `Revoked` is a tombstone left by
/// unlink; the resolver chain must stop on it rather than fall through to
/// a broader scope.
#[derive(Debug, Clone)]
pub enum TokenLookup {
    Found(AuthToken),
    Revoked,
    Missing,
}

/// Long-lived credentials, one row per owner scope. Written only by the
/// OAuth flow on (re)link; read by every component acting on a persona's
/// behalf.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Upsert the token for a scope, computing absolute expiry from
    /// `now + expires_in` when given. A fresh write clears any tombstone.
    async fn store(
        &self,
        scope: &OwnerScope,
        token: &str,
        expires_in: Option<i64>,
    ) -> Result<()>;

    /// Scope-exact lookup. Callers wanting the effective token for a
    /// persona go through [`crate::TokenChain`] instead.
    async fn lookup(&self, scope: &OwnerScope) -> Result<TokenLookup>;

    /// Tombstone a persona scope on unlink so the stale credential cannot
    /// be reused and resolution does not fall through.
    async fn revoke_persona(&self, scope: &PersonaScope) -> Result<()>;
}

pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn expiry_from(expires_in: Option<i64>) -> Option<DateTime<Utc>> {
    match expires_in {
        Some(secs) if secs > 0 => Some(Utc::now() + Duration::seconds(secs)),
        _ => None,
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn store(
        &self,
        scope: &OwnerScope,
        token: &str,
        expires_in: Option<i64>,
    ) -> Result<()> {
        let expires_at = expiry_from(expires_in);
        match scope {
            OwnerScope::User(user_id) => {
                sqlx::query(
                    r#"
                    INSERT INTO user_tokens (user_id, access_token, expires_at)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (user_id) DO UPDATE SET
                        access_token = EXCLUDED.access_token,
                        expires_at = EXCLUDED.expires_at,
                        updated_at = now()
                    "#,
                )
                .bind(user_id)
                .bind(token)
                .bind(expires_at)
                .execute(&self.pool)
                .await?;
            }
            OwnerScope::Persona(scope) => {
                sqlx::query(
                    r#"
                    INSERT INTO persona_tokens (user_id, persona_num, access_token, expires_at)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (user_id, persona_num) DO UPDATE SET
                        access_token = EXCLUDED.access_token,
                        expires_at = EXCLUDED.expires_at,
                        revoked_at = NULL,
                        updated_at = now()
                    "#,
                )
                .bind(scope.user_id)
                .bind(scope.persona_num)
                .bind(token)
                .bind(expires_at)
                .execute(&self.pool)
                .await?;
            }
        }
        Ok(())
    }

    async fn lookup(&self, scope: &OwnerScope) -> Result<TokenLookup> {
        match scope {
            OwnerScope::User(user_id) => {
                let row = sqlx::query_as::<_, (String, Option<DateTime<Utc>>)>(
                    "SELECT access_token, expires_at FROM user_tokens WHERE user_id = $1",
                )
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
                Ok(match row {
                    Some((token, expires_at)) => TokenLookup::Found(AuthToken {
                        token,
                        expires_at,
                    }),
                    None => TokenLookup::Missing,
                })
            }
            OwnerScope::Persona(scope) => {
                let row = sqlx::query_as::<
                    _,
                    (Option<String>, Option<DateTime<Utc>>, Option<DateTime<Utc>>),
                >(
                    r#"
                    SELECT access_token, expires_at, revoked_at
                    FROM persona_tokens
                    WHERE user_id = $1 AND persona_num = $2
                    "#,
                )
                .bind(scope.user_id)
                .bind(scope.persona_num)
                .fetch_optional(&self.pool)
                .await?;
                Ok(match row {
                    Some((Some(token), expires_at, None)) => TokenLookup::Found(AuthToken {
                        token,
                        expires_at,
                    }),
                    Some(_) => TokenLookup::Revoked,
                    None => TokenLookup::Missing,
                })
            }
        }
    }

    async fn revoke_persona(&self, scope: &PersonaScope) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO persona_tokens (user_id, persona_num, access_token, expires_at, revoked_at)
            VALUES ($1, $2, NULL, NULL, now())
            ON CONFLICT (user_id, persona_num) DO UPDATE SET
                access_token = NULL,
                expires_at = NULL,
                revoked_at = now(),
                updated_at = now()
            "#,
        )
        .bind(scope.user_id)
        .bind(scope.persona_num)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
