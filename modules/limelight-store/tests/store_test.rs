//! Integration tests for the Postgres stores.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use limelight_common::{AccountMapping, DailySnapshot, OwnerScope, PersonaScope};
use limelight_store::{
    MappingStore, PgMappingStore, PgSeenEventStore, PgSnapshotStore, PgTokenStore,
    SeenEventStore, SnapshotStore, TokenChain, TokenStore,
};
use sqlx::PgPool;

/// Get a migrated test pool, or skip if no test DB is available.
async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let pool = PgPool::connect(&url).await.ok()?;
    limelight_store::migrate(&pool).await.ok()?;
    sqlx::query(
        "TRUNCATE personas, user_tokens, persona_tokens, persona_accounts, daily_snapshots, seen_events",
    )
    .execute(&pool)
    .await
    .ok()?;
    Some(pool)
}

fn scope() -> PersonaScope {
    PersonaScope::new(7, 2)
}

#[tokio::test]
async fn token_priority_and_tombstone() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store: Arc<dyn TokenStore> = Arc::new(PgTokenStore::new(pool));

    store
        .store(&OwnerScope::User(7), "user-token", None)
        .await
        .unwrap();
    store
        .store(&OwnerScope::Persona(scope()), "persona-token", Some(3600))
        .await
        .unwrap();

    let chain = TokenChain::standard(store.clone(), None);
    let token = chain.resolve(7, Some(2)).await.unwrap().unwrap();
    assert_eq!(token.token, "persona-token");
    assert!(token.expires_at.unwrap() > Utc::now());

    // Unlink isolation: the tombstone stops the chain even though a
    // user-scoped token still exists.
    store.revoke_persona(&scope()).await.unwrap();
    assert!(chain.resolve(7, Some(2)).await.unwrap().is_none());
    assert_eq!(
        chain.resolve(7, None).await.unwrap().unwrap().token,
        "user-token"
    );
}

#[tokio::test]
async fn snapshot_upsert_is_idempotent() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgSnapshotStore::new(pool);
    let date = NaiveDate::from_ymd_opt(2026, 8, 5).unwrap();
    let row = DailySnapshot {
        scope: scope(),
        account_id: "1784".into(),
        date,
        followers_count: 100,
        total_likes: 40,
        profile_views: 9,
        reach: 120,
        impressions: 300,
    };

    store.upsert(&row).await.unwrap();
    store.upsert(&row).await.unwrap();

    let rows = store.range(&scope(), date).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0], row);
}

#[tokio::test]
async fn double_ack_keeps_one_row() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgSeenEventStore::new(pool.clone());
    let ids = vec!["17900".to_string()];

    assert_eq!(store.ack(&ids, 7, Some(2)).await.unwrap(), 1);
    assert_eq!(store.ack(&ids, 7, Some(2)).await.unwrap(), 1);

    let (count,): (i64,) = sqlx::query_as("SELECT count(*) FROM seen_events")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
    assert!(store.seen_set(&ids).await.unwrap().contains("17900"));
}

#[tokio::test]
async fn mapping_reads_legacy_document_until_unlink() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgMappingStore::new(pool.clone());

    // Pre-migration persona row with the binding embedded in JSON.
    sqlx::query(
        "INSERT INTO personas (user_id, persona_num, display_name, parameters) VALUES ($1, $2, $3, $4)",
    )
    .bind(7i64)
    .bind(2i32)
    .bind("Bakery")
    .bind(serde_json::json!({
        "personality": "ISTJ",
        "external_account": {"ig_user_id": "1784", "ig_username": "bakery", "fb_page_id": "99"}
    }))
    .execute(&pool)
    .await
    .unwrap();

    let legacy = store.resolve(&scope()).await.unwrap().unwrap();
    assert_eq!(legacy.account_id, "1784");

    // Authoritative columns take priority once written.
    let mapping = AccountMapping {
        account_id: "2001".into(),
        username: Some("bakery_two".into()),
        page_id: "99".into(),
    };
    store.link(&scope(), &mapping).await.unwrap();
    assert_eq!(store.resolve(&scope()).await.unwrap().unwrap(), mapping);
    assert_eq!(store.linked_scopes().await.unwrap(), vec![scope()]);

    // Unlink clears both representations.
    store.unlink(&scope()).await.unwrap();
    assert!(store.resolve(&scope()).await.unwrap().is_none());
    assert!(store.linked_scopes().await.unwrap().is_empty());
}
