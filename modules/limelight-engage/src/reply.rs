use std::sync::Arc;

use graph_client::GraphApi;
use limelight_common::{LimelightError, PersonaScope, Result};
use limelight_store::{MappingStore, SeenEventStore, TokenChain};
use tracing::{info, warn};

use crate::drafter::{ReplyContext, ReplyDrafter};

/// Posts replies through the remote write endpoint and acknowledges the
/// source comment strictly after confirmed success, preserving
/// at-least-once visibility of unanswered comments.
pub struct ReplyOrchestrator {
    graph: Arc<dyn GraphApi>,
    chain: Arc<TokenChain>,
    mappings: Arc<dyn MappingStore>,
    seen: Arc<dyn SeenEventStore>,
    drafter: Option<Arc<dyn ReplyDrafter>>,
}

impl ReplyOrchestrator {
    pub fn new(
        graph: Arc<dyn GraphApi>,
        chain: Arc<TokenChain>,
        mappings: Arc<dyn MappingStore>,
        seen: Arc<dyn SeenEventStore>,
        drafter: Option<Arc<dyn ReplyDrafter>>,
    ) -> Self {
        Self {
            graph,
            chain,
            mappings,
            seen,
            drafter,
        }
    }

    /// Reply with the supplied text, or draft one from the context when
    /// none is given. Returns the text that was posted.
    pub async fn reply(
        &self,
        scope: &PersonaScope,
        comment_id: &str,
        text: Option<String>,
        context: &ReplyContext,
    ) -> Result<String> {
        self.mappings
            .resolve(scope)
            .await?
            .ok_or(LimelightError::LinkageMissing)?;
        let token = self
            .chain
            .require(scope.user_id, Some(scope.persona_num))
            .await?;

        let message = match text {
            Some(text) if !text.trim().is_empty() => text,
            _ => {
                let drafter = self.drafter.as_ref().ok_or_else(|| {
                    LimelightError::Config(
                        "no reply text supplied and no drafter configured".into(),
                    )
                })?;
                drafter.draft(context).await?
            }
        };

        // A failed post must leave the comment visible for another try;
        // the ACK happens only after the write is confirmed.
        let posted = self
            .graph
            .reply_to_comment(comment_id, &message, &token.token)
            .await?;

        if let Err(err) = self
            .seen
            .ack(
                &[comment_id.to_string()],
                scope.user_id,
                Some(scope.persona_num),
            )
            .await
        {
            warn!(
                comment_id,
                error = %err,
                "Reply posted but ACK failed; the comment may resurface"
            );
        }

        info!(comment_id, reply_id = %posted.id, "Reply posted");
        Ok(message)
    }
}
