use std::time::Duration;

use async_trait::async_trait;
use limelight_common::{LimelightError, Result};
use serde::{Deserialize, Serialize};

/// What the drafting collaborator gets to work with.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplyContext {
    pub comment_text: String,
    pub comment_username: Option<String>,
    pub media_caption: Option<String>,
    /// The persona's voice, e.g. an MBTI type, when the directory has one.
    pub personality: Option<String>,
}

/// Text-generation collaborator for auto-replies. Model invocation lives
/// in another subsystem; this only carries the drafted string back.
#[async_trait]
pub trait ReplyDrafter: Send + Sync {
    async fn draft(&self, context: &ReplyContext) -> Result<String>;
}

/// Delegates drafting to a configured HTTP service.
pub struct HttpDrafter {
    http: reqwest::Client,
    endpoint: String,
}

const DRAFT_TIMEOUT: Duration = Duration::from_secs(20);

impl HttpDrafter {
    pub fn new(endpoint: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(DRAFT_TIMEOUT)
            .build()
            .expect("reqwest client construction cannot fail with static options");
        Self { http, endpoint }
    }
}

#[derive(Debug, Deserialize)]
struct DraftResponse {
    reply: String,
}

#[async_trait]
impl ReplyDrafter for HttpDrafter {
    async fn draft(&self, context: &ReplyContext) -> Result<String> {
        let resp = self
            .http
            .post(&self.endpoint)
            .json(context)
            .send()
            .await
            .map_err(|e| LimelightError::RemoteTransient(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LimelightError::RemoteRejected {
                status: status.as_u16(),
                body,
            });
        }

        let body: DraftResponse = resp
            .json()
            .await
            .map_err(|e| LimelightError::RemoteTransient(e.to_string()))?;
        let reply = body.reply.trim();
        if reply.is_empty() {
            return Err(LimelightError::RemoteRejected {
                status: status.as_u16(),
                body: "empty draft".into(),
            });
        }
        Ok(reply.to_string())
    }
}
