//! Typed client for the Meta Graph API surface this system consumes:
//! OAuth token exchange, account fields and insights, media/comment
//! listing, and comment replies.
//!
//! One client is constructed explicitly and injected into each component;
//! there is no process-global instance. Calls carry the caller's access
//! token as a credential parameter, run with a bounded timeout, and are
//! never retried here — retry policy belongs to the caller.

pub mod error;
pub mod types;

pub use error::{GraphError, Result, AUTH_ERROR_CODE};
pub use types::{
    AccountFields, BusinessAccount, CommentItem, InsightMetric, InsightValue, MediaItem,
    MediaPage, PageAccount, ReplyId, TokenResponse,
};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;

use types::DataEnvelope;

pub const DEFAULT_API_URL: &str = "https://graph.facebook.com/v21.0";
pub const DEFAULT_DIALOG_URL: &str = "https://www.facebook.com/v21.0";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything needed to talk to the Graph API for one registered app.
#[derive(Debug, Clone)]
pub struct GraphSettings {
    pub api_url: String,
    pub dialog_url: String,
    pub app_id: String,
    pub app_secret: String,
    pub redirect_uri: String,
}

/// The remote surface, as a seam. Implemented by [`GraphClient`] over HTTP
/// and by in-memory fakes in tests.
#[async_trait]
pub trait GraphApi: Send + Sync {
    /// Authorization dialog URL the user is redirected to at the start of
    /// the OAuth exchange.
    fn authorize_url(&self, scopes: &str, state: &str) -> String;

    /// Exchange the callback code for a short-lived user token. Codes are
    /// single-use; a failed exchange is terminal.
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse>;

    /// Exchange a short-lived token for a long-lived one
    /// (`grant_type=fb_exchange_token`).
    async fn exchange_long_lived(&self, short_token: &str) -> Result<TokenResponse>;

    /// Pages the user manages, each with its business account if one is
    /// attached.
    async fn list_accounts(&self, token: &str) -> Result<Vec<PageAccount>>;

    /// Read account-level fields from `/{account-id}`.
    async fn account_fields(
        &self,
        account_id: &str,
        fields: &str,
        token: &str,
    ) -> Result<AccountFields>;

    /// Day-period account insights for a metric list.
    async fn account_insights(
        &self,
        account_id: &str,
        metrics: &str,
        since: NaiveDate,
        until: Option<NaiveDate>,
        token: &str,
    ) -> Result<Vec<InsightMetric>>;

    /// One page of the account's media, following `after` when given.
    async fn media_page(
        &self,
        account_id: &str,
        fields: &str,
        limit: u32,
        since: Option<NaiveDate>,
        after: Option<&str>,
        token: &str,
    ) -> Result<MediaPage>;

    /// Fields for a single media item.
    async fn media_fields(&self, media_id: &str, fields: &str, token: &str) -> Result<MediaItem>;

    /// Per-item insights for a single media item.
    async fn media_insights(
        &self,
        media_id: &str,
        metrics: &str,
        token: &str,
    ) -> Result<Vec<InsightMetric>>;

    /// Recent comments on a media item.
    async fn comments(&self, media_id: &str, limit: u32, token: &str)
        -> Result<Vec<CommentItem>>;

    /// Post a reply under a comment. Returns the new comment's id.
    async fn reply_to_comment(
        &self,
        comment_id: &str,
        message: &str,
        token: &str,
    ) -> Result<ReplyId>;
}

pub struct GraphClient {
    http: reqwest::Client,
    settings: GraphSettings,
}

impl GraphClient {
    pub fn new(settings: GraphSettings) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client construction cannot fail with static options");
        Self { http, settings }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}/{}", self.settings.api_url, path);
        let resp = self.http.get(&url).query(params).send().await?;
        Self::decode(resp).await
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GraphError::from_response(status.as_u16(), body));
        }
        resp.json::<T>()
            .await
            .map_err(|e| GraphError::Parse(e.to_string()))
    }
}

#[async_trait]
impl GraphApi for GraphClient {
    fn authorize_url(&self, scopes: &str, state: &str) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("client_id", &self.settings.app_id)
            .append_pair("redirect_uri", &self.settings.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", scopes)
            .append_pair("state", state)
            .finish();
        format!("{}/dialog/oauth?{}", self.settings.dialog_url, query)
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenResponse> {
        tracing::debug!("Exchanging authorization code for short-lived token");
        self.get_json(
            "oauth/access_token",
            &[
                ("client_id", self.settings.app_id.as_str()),
                ("client_secret", self.settings.app_secret.as_str()),
                ("redirect_uri", self.settings.redirect_uri.as_str()),
                ("code", code),
            ],
        )
        .await
    }

    async fn exchange_long_lived(&self, short_token: &str) -> Result<TokenResponse> {
        tracing::debug!("Exchanging short-lived token for long-lived token");
        self.get_json(
            "oauth/access_token",
            &[
                ("grant_type", "fb_exchange_token"),
                ("client_id", self.settings.app_id.as_str()),
                ("client_secret", self.settings.app_secret.as_str()),
                ("fb_exchange_token", short_token),
            ],
        )
        .await
    }

    async fn list_accounts(&self, token: &str) -> Result<Vec<PageAccount>> {
        let envelope: DataEnvelope<PageAccount> = self
            .get_json(
                "me/accounts",
                &[
                    ("access_token", token),
                    ("fields", "id,name,instagram_business_account{id,username}"),
                ],
            )
            .await?;
        Ok(envelope.data)
    }

    async fn account_fields(
        &self,
        account_id: &str,
        fields: &str,
        token: &str,
    ) -> Result<AccountFields> {
        self.get_json(account_id, &[("access_token", token), ("fields", fields)])
            .await
    }

    async fn account_insights(
        &self,
        account_id: &str,
        metrics: &str,
        since: NaiveDate,
        until: Option<NaiveDate>,
        token: &str,
    ) -> Result<Vec<InsightMetric>> {
        let since = since.format("%Y-%m-%d").to_string();
        let mut params = vec![
            ("metric", metrics.to_string()),
            ("period", "day".to_string()),
            ("since", since),
            ("access_token", token.to_string()),
        ];
        if let Some(until) = until {
            params.push(("until", until.format("%Y-%m-%d").to_string()));
        }
        let borrowed: Vec<(&str, &str)> =
            params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let envelope: DataEnvelope<InsightMetric> = self
            .get_json(&format!("{account_id}/insights"), &borrowed)
            .await?;
        Ok(envelope.data)
    }

    async fn media_page(
        &self,
        account_id: &str,
        fields: &str,
        limit: u32,
        since: Option<NaiveDate>,
        after: Option<&str>,
        token: &str,
    ) -> Result<MediaPage> {
        let limit = limit.to_string();
        let mut params = vec![
            ("access_token", token.to_string()),
            ("fields", fields.to_string()),
            ("limit", limit),
        ];
        if let Some(since) = since {
            params.push(("since", since.format("%Y-%m-%d").to_string()));
        }
        if let Some(after) = after {
            params.push(("after", after.to_string()));
        }
        let borrowed: Vec<(&str, &str)> =
            params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let envelope: DataEnvelope<MediaItem> = self
            .get_json(&format!("{account_id}/media"), &borrowed)
            .await?;

        // Only carry a continuation cursor while the provider reports a
        // further page; `cursors.after` alone is also set on the last page.
        let after = envelope
            .paging
            .as_ref()
            .filter(|p| p.next.is_some())
            .and_then(|p| p.cursors.as_ref())
            .and_then(|c| c.after.clone());
        Ok(MediaPage {
            items: envelope.data,
            after,
        })
    }

    async fn media_fields(&self, media_id: &str, fields: &str, token: &str) -> Result<MediaItem> {
        self.get_json(media_id, &[("access_token", token), ("fields", fields)])
            .await
    }

    async fn media_insights(
        &self,
        media_id: &str,
        metrics: &str,
        token: &str,
    ) -> Result<Vec<InsightMetric>> {
        let envelope: DataEnvelope<InsightMetric> = self
            .get_json(
                &format!("{media_id}/insights"),
                &[("metric", metrics), ("access_token", token)],
            )
            .await?;
        Ok(envelope.data)
    }

    async fn comments(
        &self,
        media_id: &str,
        limit: u32,
        token: &str,
    ) -> Result<Vec<CommentItem>> {
        let limit = limit.max(1).to_string();
        let envelope: DataEnvelope<CommentItem> = self
            .get_json(
                &format!("{media_id}/comments"),
                &[
                    ("access_token", token),
                    ("fields", "id,text,username,timestamp,like_count"),
                    ("limit", limit.as_str()),
                ],
            )
            .await?;
        Ok(envelope.data)
    }

    async fn reply_to_comment(
        &self,
        comment_id: &str,
        message: &str,
        token: &str,
    ) -> Result<ReplyId> {
        tracing::debug!(comment_id, "Posting comment reply");
        let url = format!("{}/{}/replies", self.settings.api_url, comment_id);
        let resp = self
            .http
            .post(&url)
            .form(&[("message", message), ("access_token", token)])
            .send()
            .await?;
        Self::decode(resp).await
    }
}

// Lets components share one client behind Arc without caring which.
#[async_trait]
impl<G: GraphApi + ?Sized> GraphApi for Arc<G> {
    fn authorize_url(&self, scopes: &str, state: &str) -> String {
        (**self).authorize_url(scopes, state)
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenResponse> {
        (**self).exchange_code(code).await
    }

    async fn exchange_long_lived(&self, short_token: &str) -> Result<TokenResponse> {
        (**self).exchange_long_lived(short_token).await
    }

    async fn list_accounts(&self, token: &str) -> Result<Vec<PageAccount>> {
        (**self).list_accounts(token).await
    }

    async fn account_fields(
        &self,
        account_id: &str,
        fields: &str,
        token: &str,
    ) -> Result<AccountFields> {
        (**self).account_fields(account_id, fields, token).await
    }

    async fn account_insights(
        &self,
        account_id: &str,
        metrics: &str,
        since: NaiveDate,
        until: Option<NaiveDate>,
        token: &str,
    ) -> Result<Vec<InsightMetric>> {
        (**self)
            .account_insights(account_id, metrics, since, until, token)
            .await
    }

    async fn media_page(
        &self,
        account_id: &str,
        fields: &str,
        limit: u32,
        since: Option<NaiveDate>,
        after: Option<&str>,
        token: &str,
    ) -> Result<MediaPage> {
        (**self)
            .media_page(account_id, fields, limit, since, after, token)
            .await
    }

    async fn media_fields(&self, media_id: &str, fields: &str, token: &str) -> Result<MediaItem> {
        (**self).media_fields(media_id, fields, token).await
    }

    async fn media_insights(
        &self,
        media_id: &str,
        metrics: &str,
        token: &str,
    ) -> Result<Vec<InsightMetric>> {
        (**self).media_insights(media_id, metrics, token).await
    }

    async fn comments(
        &self,
        media_id: &str,
        limit: u32,
        token: &str,
    ) -> Result<Vec<CommentItem>> {
        (**self).comments(media_id, limit, token).await
    }

    async fn reply_to_comment(
        &self,
        comment_id: &str,
        message: &str,
        token: &str,
    ) -> Result<ReplyId> {
        (**self).reply_to_comment(comment_id, message, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GraphClient {
        GraphClient::new(GraphSettings {
            api_url: DEFAULT_API_URL.to_string(),
            dialog_url: DEFAULT_DIALOG_URL.to_string(),
            app_id: "1234".to_string(),
            app_secret: "shh".to_string(),
            redirect_uri: "https://example.test/oauth/callback".to_string(),
        })
    }

    #[test]
    fn authorize_url_carries_encoded_params() {
        let url = client().authorize_url("pages_show_list,instagram_basic", "st+ate");
        assert!(url.starts_with(DEFAULT_DIALOG_URL));
        assert!(url.contains("client_id=1234"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fexample.test%2Foauth%2Fcallback"));
        assert!(url.contains("state=st%2Bate"));
        // The secret never appears in a user-facing URL.
        assert!(!url.contains("shh"));
    }
}
