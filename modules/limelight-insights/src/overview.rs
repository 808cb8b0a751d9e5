//! On-demand account overview: current followers, the day-series the
//! platform reports, recent media with engagement counts, and an
//! approximate likes-by-posting-day series.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use graph_client::{GraphApi, GraphError, MediaItem};
use limelight_common::{LimelightError, PersonaScope, Result};
use limelight_store::{MappingStore, TokenChain};
use serde::Serialize;
use tracing::warn;

const OVERVIEW_METRICS: &str =
    "follower_count,follows,unfollows,reach,impressions,profile_views,views";
const OVERVIEW_MEDIA_FIELDS: &str =
    "id,timestamp,caption,permalink,media_type,media_url,thumbnail_url,like_count,comments_count";
const OVERVIEW_MEDIA_LIMIT: u32 = 50;
const DEFAULT_WINDOW_DAYS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: i64,
}

#[derive(Debug, Default, Serialize)]
pub struct OverviewSeries {
    pub follower_count: Vec<SeriesPoint>,
    pub follows: Vec<SeriesPoint>,
    pub unfollows: Vec<SeriesPoint>,
    pub reach: Vec<SeriesPoint>,
    pub impressions: Vec<SeriesPoint>,
    pub profile_views: Vec<SeriesPoint>,
    /// Likes attributed to each posting day — a rough shape, not an exact
    /// per-day increase.
    pub approx_likes_by_post_day: Vec<SeriesPoint>,
}

#[derive(Debug, Serialize)]
pub struct AccountOverview {
    pub username: Option<String>,
    pub followers_count: Option<i64>,
    pub series: OverviewSeries,
    pub today_followers_delta: Option<i64>,
    pub today_followers_date: Option<NaiveDate>,
    pub today_followers_baseline_date: Option<NaiveDate>,
    pub recent_media: Vec<MediaItem>,
}

pub struct OverviewService {
    graph: Arc<dyn GraphApi>,
    chain: Arc<TokenChain>,
    mappings: Arc<dyn MappingStore>,
}

impl OverviewService {
    pub fn new(
        graph: Arc<dyn GraphApi>,
        chain: Arc<TokenChain>,
        mappings: Arc<dyn MappingStore>,
    ) -> Self {
        Self {
            graph,
            chain,
            mappings,
        }
    }

    /// Linkage and a token are required; beyond that each remote read is
    /// best-effort, so one unavailable endpoint degrades its section
    /// instead of blanking the whole overview. An expired credential still
    /// aborts — every later call would fail the same way.
    pub async fn overview(&self, scope: &PersonaScope, days: u32) -> Result<AccountOverview> {
        let days = if days == 0 || days > DEFAULT_WINDOW_DAYS {
            DEFAULT_WINDOW_DAYS
        } else {
            days
        };
        let mapping = self
            .mappings
            .resolve(scope)
            .await?
            .ok_or(LimelightError::LinkageMissing)?;
        let token = self
            .chain
            .require(scope.user_id, Some(scope.persona_num))
            .await?;

        let until = Utc::now().date_naive();
        let since = until - Days::new(u64::from(days));

        let mut username = mapping.username.clone();
        let mut followers_count = None;
        match self
            .graph
            .account_fields(&mapping.account_id, "username,followers_count", &token.token)
            .await
        {
            Ok(fields) => {
                if fields.username.is_some() {
                    username = fields.username;
                }
                followers_count = fields.followers_count;
            }
            Err(GraphError::AuthExpired) => return Err(LimelightError::AuthRequired),
            Err(err) => warn!(%scope, error = %err, "Account fields unavailable"),
        }

        let mut series = OverviewSeries::default();
        match self
            .graph
            .account_insights(
                &mapping.account_id,
                OVERVIEW_METRICS,
                since,
                Some(until),
                &token.token,
            )
            .await
        {
            Ok(metrics) => {
                for metric in &metrics {
                    let points: Vec<SeriesPoint> = metric
                        .day_series()
                        .into_iter()
                        .map(|(date, value)| SeriesPoint { date, value })
                        .collect();
                    match metric.canonical_name() {
                        "follower_count" => series.follower_count = points,
                        "follows" => series.follows = points,
                        "unfollows" => series.unfollows = points,
                        "reach" => series.reach = points,
                        "impressions" => series.impressions = points,
                        "profile_views" => series.profile_views = points,
                        _ => {}
                    }
                }
            }
            Err(GraphError::AuthExpired) => return Err(LimelightError::AuthRequired),
            Err(err) => warn!(%scope, error = %err, "Account insight series unavailable"),
        }
        series.follower_count.sort_by_key(|p| p.date);

        let mut recent_media = Vec::new();
        match self
            .graph
            .media_page(
                &mapping.account_id,
                OVERVIEW_MEDIA_FIELDS,
                OVERVIEW_MEDIA_LIMIT,
                Some(since),
                None,
                &token.token,
            )
            .await
        {
            Ok(page) => recent_media = page.items,
            Err(GraphError::AuthExpired) => return Err(LimelightError::AuthRequired),
            Err(err) => warn!(%scope, error = %err, "Recent media unavailable"),
        }

        let mut likes_by_day: BTreeMap<NaiveDate, i64> = BTreeMap::new();
        for item in &recent_media {
            if let Some(day) = item.posted_on() {
                *likes_by_day.entry(day).or_default() +=
                    item.like_count.unwrap_or(0).max(0);
            }
        }
        series.approx_likes_by_post_day = likes_by_day
            .into_iter()
            .map(|(date, value)| SeriesPoint { date, value })
            .collect();

        // Today's net follower movement, from the last two series points.
        let (mut delta, mut latest, mut baseline) = (None, None, None);
        if let [.., prev, last] = series.follower_count.as_slice() {
            delta = Some(last.value - prev.value);
            latest = Some(last.date);
            baseline = Some(prev.date);
        }

        Ok(AccountOverview {
            username,
            followers_count,
            series,
            today_followers_delta: delta,
            today_followers_date: latest,
            today_followers_baseline_date: baseline,
            recent_media,
        })
    }
}
