//! Snapshot engine, delta, and scheduler tests driven through an
//! in-memory Graph API fake and the memory stores.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Days, NaiveDate, Utc};
use graph_client::{
    AccountFields, CommentItem, GraphApi, GraphError, InsightMetric, MediaItem, MediaPage,
    PageAccount, ReplyId, TokenResponse,
};
use limelight_common::{AccountMapping, DailySnapshot, LimelightError, OwnerScope, PersonaScope};
use limelight_insights::{DeltaCalculator, SnapshotEngine, SnapshotScheduler};
use limelight_store::memory::{MemoryMappingStore, MemorySnapshotStore, MemoryTokenStore};
use limelight_store::{MappingStore, SnapshotStore, TokenChain, TokenStore};
use serde_json::json;

// ---------------------------------------------------------------------------
// Graph API fake
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeGraph {
    followers: i64,
    insight_metrics: Vec<InsightMetric>,
    /// Like counts of the account's media, oldest pages last. Paged by
    /// `limit` with a numeric offset as the continuation cursor.
    media_likes: Vec<i64>,
    /// Account id whose field reads fail with a 500.
    broken_account: Option<String>,
    /// Stamped onto every media item when set.
    media_timestamp: Option<String>,
    media_page_calls: AtomicUsize,
}

fn metric(name: &str, points: &[(&str, i64)]) -> InsightMetric {
    serde_json::from_value(json!({
        "name": name,
        "period": "day",
        "values": points
            .iter()
            .map(|(end_time, value)| json!({"value": value, "end_time": end_time}))
            .collect::<Vec<_>>(),
    }))
    .expect("fake metric json is well-formed")
}

#[async_trait]
impl GraphApi for FakeGraph {
    fn authorize_url(&self, scopes: &str, state: &str) -> String {
        format!("https://auth.test/dialog/oauth?scope={scopes}&state={state}")
    }

    async fn exchange_code(&self, _code: &str) -> graph_client::Result<TokenResponse> {
        Ok(TokenResponse {
            access_token: "short-token".into(),
            token_type: None,
            expires_in: Some(3600),
        })
    }

    async fn exchange_long_lived(
        &self,
        _short_token: &str,
    ) -> graph_client::Result<TokenResponse> {
        Ok(TokenResponse {
            access_token: "long-token".into(),
            token_type: None,
            expires_in: Some(60 * 24 * 3600),
        })
    }

    async fn list_accounts(&self, _token: &str) -> graph_client::Result<Vec<PageAccount>> {
        Ok(Vec::new())
    }

    async fn account_fields(
        &self,
        account_id: &str,
        _fields: &str,
        _token: &str,
    ) -> graph_client::Result<AccountFields> {
        if self.broken_account.as_deref() == Some(account_id) {
            return Err(GraphError::Api {
                status: 500,
                code: None,
                message: "internal error".into(),
            });
        }
        Ok(AccountFields {
            id: Some(account_id.to_string()),
            username: Some("bakery".into()),
            followers_count: Some(self.followers),
        })
    }

    async fn account_insights(
        &self,
        _account_id: &str,
        _metrics: &str,
        _since: NaiveDate,
        _until: Option<NaiveDate>,
        _token: &str,
    ) -> graph_client::Result<Vec<InsightMetric>> {
        Ok(self.insight_metrics.clone())
    }

    async fn media_page(
        &self,
        _account_id: &str,
        _fields: &str,
        limit: u32,
        _since: Option<NaiveDate>,
        after: Option<&str>,
        _token: &str,
    ) -> graph_client::Result<MediaPage> {
        self.media_page_calls.fetch_add(1, Ordering::SeqCst);
        let offset: usize = after.map(|a| a.parse().unwrap_or(0)).unwrap_or(0);
        let end = (offset + limit as usize).min(self.media_likes.len());
        let items = self.media_likes[offset.min(end)..end]
            .iter()
            .enumerate()
            .map(|(i, likes)| MediaItem {
                id: format!("m{}", offset + i),
                like_count: Some(*likes),
                timestamp: self.media_timestamp.clone(),
                ..MediaItem::default()
            })
            .collect();
        Ok(MediaPage {
            items,
            after: (end < self.media_likes.len()).then(|| end.to_string()),
        })
    }

    async fn media_fields(
        &self,
        media_id: &str,
        _fields: &str,
        _token: &str,
    ) -> graph_client::Result<MediaItem> {
        Ok(MediaItem {
            id: media_id.to_string(),
            ..MediaItem::default()
        })
    }

    async fn media_insights(
        &self,
        _media_id: &str,
        _metrics: &str,
        _token: &str,
    ) -> graph_client::Result<Vec<InsightMetric>> {
        Ok(Vec::new())
    }

    async fn comments(
        &self,
        _media_id: &str,
        _limit: u32,
        _token: &str,
    ) -> graph_client::Result<Vec<CommentItem>> {
        Ok(Vec::new())
    }

    async fn reply_to_comment(
        &self,
        _comment_id: &str,
        _message: &str,
        _token: &str,
    ) -> graph_client::Result<ReplyId> {
        Ok(ReplyId { id: "r1".into() })
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    graph: Arc<FakeGraph>,
    tokens: Arc<MemoryTokenStore>,
    mappings: Arc<MemoryMappingStore>,
    snapshots: Arc<MemorySnapshotStore>,
    chain: Arc<TokenChain>,
    engine: Arc<SnapshotEngine>,
}

fn scope() -> PersonaScope {
    PersonaScope::new(7, 2)
}

fn mapping(account_id: &str) -> AccountMapping {
    AccountMapping {
        account_id: account_id.into(),
        username: Some("bakery".into()),
        page_id: "99".into(),
    }
}

fn harness(fake: FakeGraph) -> Harness {
    let graph = Arc::new(fake);
    let tokens = Arc::new(MemoryTokenStore::new());
    let mappings = Arc::new(MemoryMappingStore::new());
    let snapshots = Arc::new(MemorySnapshotStore::new());
    let chain = Arc::new(TokenChain::standard(tokens.clone(), None));
    let engine = Arc::new(SnapshotEngine::new(
        graph.clone() as Arc<dyn GraphApi>,
        chain.clone(),
        mappings.clone() as Arc<dyn MappingStore>,
        snapshots.clone() as Arc<dyn SnapshotStore>,
    ));
    Harness {
        graph,
        tokens,
        mappings,
        snapshots,
        chain,
        engine,
    }
}

async fn link_persona(h: &Harness, scope: &PersonaScope, account_id: &str) {
    h.mappings.link(scope, &mapping(account_id)).await.unwrap();
    h.tokens
        .store(&OwnerScope::Persona(*scope), "persona-token", Some(3600))
        .await
        .unwrap();
}

// ---------------------------------------------------------------------------
// Snapshot engine
// ---------------------------------------------------------------------------

#[tokio::test]
async fn snapshot_now_stores_todays_row() {
    let h = harness(FakeGraph {
        followers: 120,
        insight_metrics: vec![
            metric("profile_views", &[("2026-08-05T07:00:00+0000", 9)]),
            metric("reach", &[("2026-08-05T07:00:00+0000", 80)]),
            metric("views", &[("2026-08-05T07:00:00+0000", 300)]),
        ],
        media_likes: vec![10, 15, 5],
        ..FakeGraph::default()
    });
    link_persona(&h, &scope(), "1784").await;

    let row = h.engine.snapshot_now(&scope()).await.unwrap();
    assert_eq!(row.date, Utc::now().date_naive());
    assert_eq!(row.followers_count, 120);
    assert_eq!(row.total_likes, 30);
    assert_eq!(row.profile_views, 9);
    assert_eq!(row.reach, 80);
    // The retired metric arrives under its new name and is mapped back.
    assert_eq!(row.impressions, 300);

    assert_eq!(h.snapshots.get(&scope(), row.date).unwrap(), row);
}

#[tokio::test]
async fn same_day_snapshots_are_idempotent() {
    let h = harness(FakeGraph {
        followers: 120,
        media_likes: vec![10],
        ..FakeGraph::default()
    });
    link_persona(&h, &scope(), "1784").await;

    let first = h.engine.snapshot_now(&scope()).await.unwrap();
    let second = h.engine.snapshot_now(&scope()).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(h.snapshots.row_count(), 1);
}

#[tokio::test]
async fn empty_metrics_normalize_to_zero() {
    let h = harness(FakeGraph {
        followers: 120,
        ..FakeGraph::default()
    });
    link_persona(&h, &scope(), "1784").await;

    let row = h.engine.snapshot_now(&scope()).await.unwrap();
    assert_eq!(row.profile_views, 0);
    assert_eq!(row.reach, 0);
    assert_eq!(row.impressions, 0);
    assert_eq!(row.total_likes, 0);
}

#[tokio::test]
async fn media_pagination_stops_at_the_scan_cap() {
    // 320 items of 1 like each; the cap is 200 at 50 per page.
    let h = harness(FakeGraph {
        followers: 1,
        media_likes: vec![1; 320],
        ..FakeGraph::default()
    });
    link_persona(&h, &scope(), "1784").await;

    let row = h.engine.snapshot_now(&scope()).await.unwrap();
    assert_eq!(row.total_likes, 200);
    assert_eq!(h.graph.media_page_calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn missing_linkage_and_missing_token_are_distinct() {
    let h = harness(FakeGraph::default());
    assert!(matches!(
        h.engine.snapshot_now(&scope()).await,
        Err(LimelightError::LinkageMissing)
    ));

    h.mappings.link(&scope(), &mapping("1784")).await.unwrap();
    assert!(matches!(
        h.engine.snapshot_now(&scope()).await,
        Err(LimelightError::AuthRequired)
    ));
}

#[tokio::test]
async fn tick_isolates_per_persona_failures() {
    let h = harness(FakeGraph {
        followers: 50,
        broken_account: Some("broken".into()),
        ..FakeGraph::default()
    });
    let good = PersonaScope::new(7, 1);
    let bad = PersonaScope::new(7, 2);
    let unauthorized = PersonaScope::new(8, 1);
    link_persona(&h, &good, "1784").await;
    link_persona(&h, &bad, "broken").await;
    h.mappings
        .link(&unauthorized, &mapping("2000"))
        .await
        .unwrap();

    let stats = h.engine.run_tick().await;
    assert_eq!(stats.linked, 3);
    assert_eq!(stats.snapshotted, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.skipped_unauthorized, 1);
    assert!(h
        .snapshots
        .get(&good, Utc::now().date_naive())
        .is_some());
    assert!(h.snapshots.get(&bad, Utc::now().date_naive()).is_none());
}

// ---------------------------------------------------------------------------
// Delta calculator
// ---------------------------------------------------------------------------

fn snapshot_row(scope: &PersonaScope, date: NaiveDate, followers: i64, likes: i64) -> DailySnapshot {
    DailySnapshot {
        scope: *scope,
        account_id: "1784".into(),
        date,
        followers_count: followers,
        total_likes: likes,
        profile_views: 0,
        reach: 0,
        impressions: 0,
    }
}

#[tokio::test]
async fn deltas_from_stored_rows() {
    let h = harness(FakeGraph::default());
    let today = Utc::now().date_naive();
    for (i, (followers, likes)) in [(100, 40), (107, 45), (103, 52)].iter().enumerate() {
        let date = today - Days::new((2 - i) as u64);
        h.snapshots
            .upsert(&snapshot_row(&scope(), date, *followers, *likes))
            .await
            .unwrap();
    }

    let calc = DeltaCalculator::new(
        h.graph.clone() as Arc<dyn GraphApi>,
        h.chain.clone(),
        h.mappings.clone() as Arc<dyn MappingStore>,
        h.snapshots.clone() as Arc<dyn SnapshotStore>,
    );
    let deltas = calc.daily_deltas(&scope(), 30).await.unwrap();
    assert_eq!(
        deltas.followers.iter().map(|p| p.value).collect::<Vec<_>>(),
        vec![7, -4]
    );
    assert_eq!(
        deltas.likes.iter().map(|p| p.value).collect::<Vec<_>>(),
        vec![5, 7]
    );
}

#[tokio::test]
async fn fresh_linkage_falls_back_to_the_remote_series() {
    let h = harness(FakeGraph {
        insight_metrics: vec![metric(
            "follower_count",
            &[
                ("2026-08-03T07:00:00+0000", 100),
                ("2026-08-04T07:00:00+0000", 107),
                ("2026-08-05T07:00:00+0000", 103),
            ],
        )],
        ..FakeGraph::default()
    });
    link_persona(&h, &scope(), "1784").await;

    let calc = DeltaCalculator::new(
        h.graph.clone() as Arc<dyn GraphApi>,
        h.chain.clone(),
        h.mappings.clone() as Arc<dyn MappingStore>,
        h.snapshots.clone() as Arc<dyn SnapshotStore>,
    );
    let deltas = calc.daily_deltas(&scope(), 30).await.unwrap();
    assert_eq!(
        deltas.followers.iter().map(|p| p.value).collect::<Vec<_>>(),
        vec![7, -4]
    );
    assert!(deltas.likes.is_empty());

    // Without a mapping the fallback degrades to empty, not an error.
    let bare = harness(FakeGraph::default());
    let calc = DeltaCalculator::new(
        bare.graph.clone() as Arc<dyn GraphApi>,
        bare.chain.clone(),
        bare.mappings.clone() as Arc<dyn MappingStore>,
        bare.snapshots.clone() as Arc<dyn SnapshotStore>,
    );
    let deltas = calc.daily_deltas(&scope(), 30).await.unwrap();
    assert!(deltas.followers.is_empty());
    assert!(deltas.likes.is_empty());
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scheduler_ticks_until_stopped() {
    let h = harness(FakeGraph {
        followers: 10,
        media_likes: vec![1],
        ..FakeGraph::default()
    });
    link_persona(&h, &scope(), "1784").await;

    let handle = SnapshotScheduler::start(h.engine.clone(), Duration::from_millis(20));
    tokio::time::sleep(Duration::from_millis(90)).await;
    handle.stop().await;

    assert_eq!(h.snapshots.row_count(), 1);
    let calls_at_stop = h.graph.media_page_calls.load(Ordering::SeqCst);
    assert!(calls_at_stop >= 2, "expected multiple ticks, saw {calls_at_stop}");

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(
        h.graph.media_page_calls.load(Ordering::SeqCst),
        calls_at_stop,
        "scheduler kept ticking after stop"
    );
}

// ---------------------------------------------------------------------------
// Overview
// ---------------------------------------------------------------------------

#[tokio::test]
async fn overview_normalizes_series_and_reports_todays_delta() {
    use limelight_insights::OverviewService;

    let h = harness(FakeGraph {
        followers: 120,
        insight_metrics: vec![
            metric(
                "follower_count",
                &[
                    ("2026-08-03T07:00:00+0000", 100),
                    ("2026-08-04T07:00:00+0000", 107),
                    ("2026-08-05T07:00:00+0000", 103),
                ],
            ),
            metric("views", &[("2026-08-05T07:00:00+0000", 300)]),
        ],
        media_likes: vec![10, 5],
        media_timestamp: Some("2026-07-30T18:21:00+0000".into()),
        ..FakeGraph::default()
    });
    link_persona(&h, &scope(), "1784").await;

    let service = OverviewService::new(
        h.graph.clone() as Arc<dyn GraphApi>,
        h.chain.clone(),
        h.mappings.clone() as Arc<dyn MappingStore>,
    );
    let overview = service.overview(&scope(), 30).await.unwrap();

    assert_eq!(overview.username.as_deref(), Some("bakery"));
    assert_eq!(overview.followers_count, Some(120));
    assert_eq!(overview.today_followers_delta, Some(-4));
    // The retired impressions metric arrives as `views`.
    assert_eq!(overview.series.impressions.len(), 1);
    assert_eq!(overview.series.impressions[0].value, 300);
    // Both media items posted the same day fold into one point.
    assert_eq!(overview.series.approx_likes_by_post_day.len(), 1);
    assert_eq!(overview.series.approx_likes_by_post_day[0].value, 15);
    assert_eq!(overview.recent_media.len(), 2);
}

// ---------------------------------------------------------------------------
// End to end: link then snapshot
// ---------------------------------------------------------------------------

#[tokio::test]
async fn linked_persona_snapshots_end_to_end() {
    use limelight_common::PersonaSummary;
    use limelight_link::{Callback, LinkService, StateCodec};
    use limelight_store::memory::MemoryPersonaDirectory;

    let h = harness(FakeGraph {
        followers: 120,
        media_likes: vec![10, 5],
        ..FakeGraph::default()
    });
    h.mappings.link(&scope(), &mapping("1784")).await.unwrap();

    let personas = Arc::new(MemoryPersonaDirectory::new());
    personas.add(
        7,
        PersonaSummary {
            persona_num: 2,
            display_name: None,
            personality: None,
        },
    );
    let link = LinkService::new(
        h.graph.clone() as Arc<dyn GraphApi>,
        h.tokens.clone() as Arc<dyn TokenStore>,
        personas,
        StateCodec::new("test-secret"),
        "instagram_basic".into(),
        "https://app.test/done".into(),
    );

    // No token yet: the snapshot demands re-authorization.
    assert!(matches!(
        h.engine.snapshot_now(&scope()).await,
        Err(LimelightError::AuthRequired)
    ));

    let redirect = link.start_link(7, "2").await.unwrap();
    let state = redirect.split("state=").nth(1).unwrap().to_string();
    link.handle_callback(Callback {
        code: Some("auth-code".into()),
        state: Some(state),
        error: None,
    })
    .await
    .unwrap();

    let token = h.chain.resolve(7, Some(2)).await.unwrap().unwrap();
    assert_eq!(token.token, "long-token");
    assert!(token.expires_at.unwrap() > Utc::now());

    let row = h.engine.snapshot_now(&scope()).await.unwrap();
    assert_eq!(row.date, Utc::now().date_naive());
    assert!(row.followers_count >= 0);
    assert!(row.total_likes >= 0);
    assert!(row.profile_views >= 0);
    assert!(row.reach >= 0);
    assert!(row.impressions >= 0);
}
