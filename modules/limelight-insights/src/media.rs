//! Per-item media insights. Reels and feed posts expose different metric
//! sets; the request picks the set by product type and the response is
//! normalized to a flat name → count map.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Days, Utc};
use graph_client::{GraphApi, MediaItem};
use limelight_common::{LimelightError, PersonaScope, Result};
use limelight_store::{MappingStore, TokenChain};
use serde::Serialize;
use tracing::warn;

pub const REEL_METRICS: &str = "plays,reach,likes,comments,shares,saves,total_interactions";
pub const FEED_METRICS: &str = "impressions,reach,saved,engagement,video_views";

const ITEM_FIELDS: &str = "id,timestamp,caption,permalink,media_type,media_product_type,\
media_url,thumbnail_url,like_count,comments_count";
const DEFAULT_ITEM_LIMIT: u32 = 12;
const MAX_ITEM_LIMIT: u32 = 30;
const DEFAULT_WINDOW_DAYS: u32 = 30;

#[derive(Debug, Serialize)]
pub struct MediaSummary {
    pub media: MediaItem,
    pub insights: BTreeMap<String, i64>,
}

pub struct MediaInsightsService {
    graph: Arc<dyn GraphApi>,
    chain: Arc<TokenChain>,
    mappings: Arc<dyn MappingStore>,
}

impl MediaInsightsService {
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

    /// Recent items with their per-item metrics.
    pub async fn media_overview(
        &self,
        scope: &PersonaScope,
        limit: u32,
        days: u32,
    ) -> Result<Vec<MediaSummary>> {
        let limit = if limit == 0 || limit > MAX_ITEM_LIMIT {
            DEFAULT_ITEM_LIMIT
        } else {
            limit
        };
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

        let since = Utc::now().date_naive() - Days::new(u64::from(days));
        let page = self
            .graph
            .media_page(
                &mapping.account_id,
                ITEM_FIELDS,
                limit,
                Some(since),
                None,
                &token.token,
            )
            .await?;

        let mut summaries = Vec::with_capacity(page.items.len());
        for media in page.items {
            let insights = self.item_insights(&media, &token.token).await;
            summaries.push(MediaSummary { media, insights });
        }
        Ok(summaries)
    }

    /// A single item with its metrics.
    pub async fn media_detail(&self, scope: &PersonaScope, media_id: &str) -> Result<MediaSummary> {
        self.mappings
            .resolve(scope)
            .await?
            .ok_or(LimelightError::LinkageMissing)?;
        let token = self
            .chain
            .require(scope.user_id, Some(scope.persona_num))
            .await?;

        let media = self
            .graph
            .media_fields(media_id, ITEM_FIELDS, &token.token)
            .await?;
        let insights = self.item_insights(&media, &token.token).await;
        Ok(MediaSummary { media, insights })
    }

    /// Per-item metrics, best-effort. Individual items with unavailable
    /// insights keep an empty map rather than failing the listing.
    async fn item_insights(&self, media: &MediaItem, token: &str) -> BTreeMap<String, i64> {
        let product = media
            .media_product_type
            .as_deref()
            .or(media.media_type.as_deref());
        match self
            .graph
            .media_insights(&media.id, metric_set(product), token)
            .await
        {
            Ok(metrics) => metrics
                .iter()
                .filter_map(|m| Some((m.canonical_name().to_string(), m.latest_value()?)))
                .collect(),
            Err(err) => {
                warn!(media_id = %media.id, error = %err, "Media insights unavailable");
                BTreeMap::new()
            }
        }
    }
}

fn metric_set(product_type: Option<&str>) -> &'static str {
    match product_type.map(|p| p.to_ascii_uppercase()).as_deref() {
        Some("REEL") | Some("REELS") => REEL_METRICS,
        _ => FEED_METRICS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reels_get_the_reel_metric_set() {
        assert_eq!(metric_set(Some("REELS")), REEL_METRICS);
        assert_eq!(metric_set(Some("reel")), REEL_METRICS);
        assert_eq!(metric_set(Some("FEED")), FEED_METRICS);
        assert_eq!(metric_set(Some("IMAGE")), FEED_METRICS);
        assert_eq!(metric_set(None), FEED_METRICS);
    }
}
