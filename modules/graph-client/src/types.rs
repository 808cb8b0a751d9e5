use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error body envelope: `{"error": {...}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub code: Option<i64>,
    pub error_subcode: Option<i64>,
}

/// List envelope for read endpoints: `{"data": [...], "paging": {...}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct DataEnvelope<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    pub paging: Option<Paging>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Paging {
    pub cursors: Option<Cursors>,
    pub next: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Cursors {
    pub before: Option<String>,
    pub after: Option<String>,
}

/// Response from both legs of the token exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: Option<String>,
    /// Seconds until expiry. Long-lived exchanges usually report ~60 days;
    /// some responses omit it entirely.
    pub expires_in: Option<i64>,
}

/// A page from `/me/accounts`, with its attached business account if any.
#[derive(Debug, Clone, Deserialize)]
pub struct PageAccount {
    pub id: String,
    pub name: Option<String>,
    pub instagram_business_account: Option<BusinessAccount>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BusinessAccount {
    pub id: String,
    pub username: Option<String>,
}

/// Account-level fields read from `/{account-id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountFields {
    pub id: Option<String>,
    pub username: Option<String>,
    pub followers_count: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    pub timestamp: Option<String>,
    pub caption: Option<String>,
    pub permalink: Option<String>,
    pub media_type: Option<String>,
    pub media_product_type: Option<String>,
    pub media_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub like_count: Option<i64>,
    pub comments_count: Option<i64>,
}

impl MediaItem {
    /// Posting day, when the timestamp is present and ISO-shaped.
    pub fn posted_on(&self) -> Option<NaiveDate> {
        parse_day(self.timestamp.as_deref()?)
    }
}

/// One page of a media listing plus the continuation cursor, if the
/// provider reported more pages.
#[derive(Debug, Clone, Default)]
pub struct MediaPage {
    pub items: Vec<MediaItem>,
    pub after: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentItem {
    pub id: String,
    pub text: Option<String>,
    pub username: Option<String>,
    pub timestamp: Option<String>,
    pub like_count: Option<i64>,
}

/// Write response from `/{comment-id}/replies`: `{"id": "<new comment id>"}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplyId {
    pub id: String,
}

/// One metric from an insights response.
#[derive(Debug, Clone, Deserialize)]
pub struct InsightMetric {
    pub name: String,
    pub period: Option<String>,
    #[serde(default)]
    pub values: Vec<InsightValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InsightValue {
    #[serde(default)]
    pub value: Value,
    pub end_time: Option<String>,
}

impl InsightMetric {
    /// `impressions` was retired in favor of `views` in later API versions.
    /// Report the old name so consumers keep a single key for the series.
    pub fn canonical_name(&self) -> &str {
        if self.name == "views" {
            "impressions"
        } else {
            &self.name
        }
    }

    /// Most recent value of the metric, normalized to a count.
    pub fn latest_value(&self) -> Option<i64> {
        self.values.last().and_then(|v| count_of(&v.value))
    }

    /// The full day series as `(date, count)` pairs, dropping points
    /// without a usable date or value.
    pub fn day_series(&self) -> Vec<(NaiveDate, i64)> {
        self.values
            .iter()
            .filter_map(|v| Some((v.day()?, count_of(&v.value)?)))
            .collect()
    }
}

impl InsightValue {
    /// The day this point covers, from the `end_time` ISO timestamp.
    pub fn day(&self) -> Option<NaiveDate> {
        parse_day(self.end_time.as_deref()?)
    }
}

/// Metric values are usually plain numbers but occasionally arrive as
/// `{"value": n}` or `{"count": n}` objects.
pub fn count_of(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::Object(map) => map
            .get("value")
            .or_else(|| map.get("count"))
            .and_then(count_of),
        _ => None,
    }
}

fn parse_day(ts: &str) -> Option<NaiveDate> {
    if ts.len() < 10 {
        return None;
    }
    NaiveDate::parse_from_str(&ts[..10], "%Y-%m-%d").ok()
}
