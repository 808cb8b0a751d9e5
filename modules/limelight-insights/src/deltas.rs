//! Day-over-day deltas from stored snapshot rows, with a degraded
//! fallback to the platform's own follower series while the local history
//! is still too short to difference.

use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use graph_client::GraphApi;
use limelight_common::{DailyDeltas, DeltaPoint, PersonaScope, Result};
use limelight_store::{MappingStore, SnapshotStore, TokenChain};
use tracing::warn;

const DEFAULT_WINDOW_DAYS: u32 = 30;
const MAX_WINDOW_DAYS: u32 = 60;

pub struct DeltaCalculator {
    graph: Arc<dyn GraphApi>,
    chain: Arc<TokenChain>,
    mappings: Arc<dyn MappingStore>,
    snapshots: Arc<dyn SnapshotStore>,
}

impl DeltaCalculator {
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

    /// Deltas for followers and total likes over a day-count window. With
    /// fewer than two stored rows (fresh linkage), the follower series is
    /// derived from the remote API instead — degraded but non-empty on
    /// day one.
    pub async fn daily_deltas(&self, scope: &PersonaScope, days: u32) -> Result<DailyDeltas> {
        let days = if days <= 1 || days > MAX_WINDOW_DAYS {
            DEFAULT_WINDOW_DAYS
        } else {
            days
        };
        let today = Utc::now().date_naive();
        let since = today - Days::new(u64::from(days - 1));

        let rows = self.snapshots.range(scope, since).await?;
        if rows.len() >= 2 {
            return Ok(DailyDeltas {
                followers: diff_series(rows.iter().map(|r| (r.date, r.followers_count))),
                likes: diff_series(rows.iter().map(|r| (r.date, r.total_likes))),
            });
        }

        Ok(DailyDeltas {
            followers: self.follower_series_fallback(scope, since, today).await,
            likes: Vec::new(),
        })
    }

    /// Best-effort: any missing linkage, missing token, or remote failure
    /// degrades to an empty series rather than failing the read.
    async fn follower_series_fallback(
        &self,
        scope: &PersonaScope,
        since: NaiveDate,
        until: NaiveDate,
    ) -> Vec<DeltaPoint> {
        let mapping = match self.mappings.resolve(scope).await {
            Ok(Some(mapping)) => mapping,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!(%scope, error = %err, "Delta fallback: mapping lookup failed");
                return Vec::new();
            }
        };
        let token = match self.chain.resolve(scope.user_id, Some(scope.persona_num)).await {
            Ok(Some(token)) => token,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!(%scope, error = %err, "Delta fallback: token resolution failed");
                return Vec::new();
            }
        };

        match self
            .graph
            .account_insights(
                &mapping.account_id,
                "follower_count",
                since,
                Some(until),
                &token.token,
            )
            .await
        {
            Ok(metrics) => metrics
                .iter()
                .find(|m| m.name == "follower_count")
                .map(|m| diff_series(m.day_series()))
                .unwrap_or_default(),
            Err(err) => {
                warn!(%scope, error = %err, "Delta fallback: remote series unavailable");
                Vec::new()
            }
        }
    }
}

/// Difference consecutive points, labeling each delta with the later day.
fn diff_series(points: impl IntoIterator<Item = (NaiveDate, i64)>) -> Vec<DeltaPoint> {
    let mut prev: Option<i64> = None;
    let mut out = Vec::new();
    for (date, value) in points {
        if let Some(prev) = prev {
            out.push(DeltaPoint {
                date,
                value: value - prev,
            });
        }
        prev = Some(value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, d).unwrap()
    }

    #[test]
    fn consecutive_diffs_with_later_day_labels() {
        let deltas = diff_series(vec![(day(1), 100), (day(2), 107), (day(3), 103)]);
        assert_eq!(
            deltas,
            vec![
                DeltaPoint {
                    date: day(2),
                    value: 7
                },
                DeltaPoint {
                    date: day(3),
                    value: -4
                },
            ]
        );
    }

    #[test]
    fn short_series_yield_nothing() {
        assert!(diff_series(vec![]).is_empty());
        assert!(diff_series(vec![(day(1), 100)]).is_empty());
    }
}
