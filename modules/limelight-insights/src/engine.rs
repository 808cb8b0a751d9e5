//! The snapshot engine: per linked persona, read the current follower
//! count, the trailing-day account metrics, and the like totals over
//! recent media, then upsert one row per persona per day.

use std::sync::Arc;

use chrono::{Days, Utc};
use graph_client::{GraphApi, GraphError};
use limelight_common::{DailySnapshot, LimelightError, PersonaScope, Result};
use limelight_store::{MappingStore, SnapshotStore, TokenChain};
use tracing::{error, info, warn};

/// Both the retired name and its replacement are requested; the response
/// normalization maps `views` back onto `impressions`.
const ACCOUNT_METRICS: &str = "profile_views,reach,impressions,views";

const MEDIA_SUM_FIELDS: &str = "id,timestamp,like_count";
const MEDIA_PAGE_SIZE: u32 = 50;

/// Pagination cap per persona, bounding worst-case tick latency even for
/// very active accounts.
const MEDIA_SCAN_CAP: usize = 200;

#[derive(Debug, Default)]
pub struct TickStats {
    pub linked: usize,
    pub snapshotted: usize,
    pub skipped_unauthorized: usize,
    pub failed: usize,
}

impl std::fmt::Display for TickStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} linked, {} snapshotted, {} skipped (no token), {} failed",
            self.linked, self.snapshotted, self.skipped_unauthorized, self.failed
        )
    }
}

#[derive(Debug, Default)]
struct DayMetrics {
    profile_views: i64,
    reach: i64,
    impressions: i64,
}

pub struct SnapshotEngine {
    graph: Arc<dyn GraphApi>,
    chain: Arc<TokenChain>,
    mappings: Arc<dyn MappingStore>,
    snapshots: Arc<dyn SnapshotStore>,
}

impl SnapshotEngine {
    pub fn new(
        graph: Arc<dyn GraphApi>,
        chain: Arc<TokenChain>,
        mappings: Arc<dyn MappingStore>,
        snapshots: Arc<dyn SnapshotStore>,
    ) -> Self {
        Self {
            graph,
            chain,
            mappings,
            snapshots,
        }
    }

    /// Harvest and store today's row for one persona. Idempotent: the
    /// upsert overwrites same-day values, so a background tick racing an
    /// interactive call is harmless.
    pub async fn snapshot_now(&self, scope: &PersonaScope) -> Result<DailySnapshot> {
        let mapping = self
            .mappings
            .resolve(scope)
            .await?
            .ok_or(LimelightError::LinkageMissing)?;
        let token = self
            .chain
            .require(scope.user_id, Some(scope.persona_num))
            .await?;

        let today = Utc::now().date_naive();
        let followers_count = self
            .fetch_followers(&mapping.account_id, &token.token)
            .await?;
        let metrics = self
            .fetch_day_metrics(&mapping.account_id, &token.token)
            .await?;
        let total_likes = self
            .sum_recent_likes(&mapping.account_id, &token.token)
            .await?;

        let snapshot = DailySnapshot {
            scope: *scope,
            account_id: mapping.account_id,
            date: today,
            followers_count,
            total_likes,
            profile_views: metrics.profile_views,
            reach: metrics.reach,
            impressions: metrics.impressions,
        };
        self.snapshots.upsert(&snapshot).await?;
        info!(
            %scope,
            date = %today,
            followers = followers_count,
            likes = total_likes,
            "Snapshot stored"
        );
        Ok(snapshot)
    }

    async fn fetch_followers(&self, account_id: &str, token: &str) -> Result<i64> {
        let fields = self
            .graph
            .account_fields(account_id, "followers_count", token)
            .await?;
        Ok(fields.followers_count.unwrap_or(0).max(0))
    }

    /// Trailing-day account metrics. An empty or partially-missing result
    /// means "no activity", not "unknown": absent metrics become zero.
    async fn fetch_day_metrics(&self, account_id: &str, token: &str) -> Result<DayMetrics> {
        let since = Utc::now().date_naive() - Days::new(1);
        let data = match self
            .graph
            .account_insights(account_id, ACCOUNT_METRICS, since, None, token)
            .await
        {
            Ok(data) => data,
            Err(GraphError::AuthExpired) => return Err(LimelightError::AuthRequired),
            Err(err) => {
                // Metric names come and go across API versions; a rejected
                // metric list degrades to zeros rather than losing the row.
                warn!(account_id, error = %err, "Account insights unavailable; storing zeros");
                return Ok(DayMetrics::default());
            }
        };

        let mut metrics = DayMetrics::default();
        for metric in &data {
            let Some(value) = metric.latest_value() else {
                continue;
            };
            match metric.canonical_name() {
                "profile_views" => metrics.profile_views = value,
                "reach" => metrics.reach = value,
                "impressions" => metrics.impressions = value,
                _ => {}
            }
        }
        Ok(metrics)
    }

    /// Sum per-item like counts over recent media, following continuation
    /// cursors until the provider runs out or the scan cap is hit.
    async fn sum_recent_likes(&self, account_id: &str, token: &str) -> Result<i64> {
        let mut after: Option<String> = None;
        let mut scanned = 0usize;
        let mut likes = 0i64;
        loop {
            let page = self
                .graph
                .media_page(
                    account_id,
                    MEDIA_SUM_FIELDS,
                    MEDIA_PAGE_SIZE,
                    None,
                    after.as_deref(),
                    token,
                )
                .await?;
            if page.items.is_empty() {
                break;
            }
            for item in &page.items {
                likes += item.like_count.unwrap_or(0).max(0);
                scanned += 1;
                if scanned >= MEDIA_SCAN_CAP {
                    return Ok(likes);
                }
            }
            match page.after {
                Some(cursor) => after = Some(cursor),
                None => break,
            }
        }
        Ok(likes)
    }

    /// One scheduler tick: snapshot every persona that has both a mapping
    /// and a resolvable token. Per-persona failures are logged and skipped;
    /// they never abort the tick for the others.
    pub async fn run_tick(&self) -> TickStats {
        let mut stats = TickStats::default();
        let scopes = match self.mappings.linked_scopes().await {
            Ok(scopes) => scopes,
            Err(err) => {
                error!(error = %err, "Tick aborted: could not enumerate linked personas");
                return stats;
            }
        };
        stats.linked = scopes.len();

        for scope in scopes {
            match self.chain.resolve(scope.user_id, Some(scope.persona_num)).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    stats.skipped_unauthorized += 1;
                    warn!(%scope, "Skipping snapshot: no resolvable token");
                    continue;
                }
                Err(err) => {
                    stats.failed += 1;
                    error!(%scope, error = %err, "Token resolution failed");
                    continue;
                }
            }
            match self.snapshot_now(&scope).await {
                Ok(_) => stats.snapshotted += 1,
                Err(err) => {
                    stats.failed += 1;
                    error!(%scope, error = %err, "Snapshot failed");
                }
            }
        }
        stats
    }
}
