//! Postgres persistence for tokens, account mappings, daily snapshots,
//! and seen engagement events, plus the ordered token-resolution chain.
//!
//! Every store is a trait with a Postgres implementation and an in-memory
//! implementation (`memory`) for tests. Same-scope writes are atomic
//! upserts on the table's uniqueness constraint, never read-then-write: a
//! background tick and an interactive caller may race on the same key.

pub mod accounts;
pub mod legacy;
pub mod memory;
pub mod personas;
pub mod resolve;
pub mod seen;
pub mod snapshots;
pub mod tokens;

pub use accounts::{MappingStore, PgMappingStore};
pub use personas::{PersonaDirectory, PgPersonaDirectory};
pub use resolve::{
    PersonaTokenResolver, StaticTokenResolver, TokenChain, TokenResolver, UserTokenResolver,
};
pub use seen::{PgSeenEventStore, SeenEventStore};
pub use snapshots::{PgSnapshotStore, SnapshotStore};
pub use tokens::{PgTokenStore, TokenLookup, TokenStore};

use limelight_common::{LimelightError, Result};
use sqlx::PgPool;

/// Run the embedded SQL migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| LimelightError::Database(e.to_string()))?;
    Ok(())
}
