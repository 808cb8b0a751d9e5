use std::sync::Arc;

use graph_client::{CommentItem, GraphApi, MediaItem};
use limelight_common::{PersonaScope, Result};
use limelight_store::{MappingStore, PersonaDirectory, SeenEventStore, TokenChain};
use serde::Serialize;
use tracing::warn;

const FEED_MEDIA_FIELDS: &str =
    "id,caption,permalink,media_type,media_url,thumbnail_url,timestamp";

#[derive(Debug, Serialize)]
pub struct MediaComments {
    pub media: MediaItem,
    pub comments: Vec<CommentItem>,
}

#[derive(Debug, Serialize)]
pub struct PersonaComments {
    pub persona_num: i32,
    pub persona_name: Option<String>,
    pub account_id: String,
    pub username: Option<String>,
    pub items: Vec<MediaComments>,
}

/// Recent comments across a user's linked personas, with already-handled
/// comment ids filtered out so nothing is presented twice.
pub struct CommentFeed {
    graph: Arc<dyn GraphApi>,
    chain: Arc<TokenChain>,
    mappings: Arc<dyn MappingStore>,
    personas: Arc<dyn PersonaDirectory>,
    seen: Arc<dyn SeenEventStore>,
}

impl CommentFeed {
    pub fn new(
        graph: Arc<dyn GraphApi>,
        chain: Arc<TokenChain>,
        mappings: Arc<dyn MappingStore>,
        personas: Arc<dyn PersonaDirectory>,
        seen: Arc<dyn SeenEventStore>,
    ) -> Self {
        Self {
            graph,
            chain,
            mappings,
            personas,
            seen,
        }
    }

    /// Personas without a mapping or token are skipped, not errors — the
    /// feed shows what is reachable.
    pub async fn overview(
        &self,
        user_id: i64,
        media_limit: u32,
        comments_limit: u32,
    ) -> Result<Vec<PersonaComments>> {
        let personas = self.personas.list_for_user(user_id).await?;
        let mut results = Vec::new();

        for persona in personas {
            let scope = PersonaScope::new(user_id, persona.persona_num);
            let Some(mapping) = self.mappings.resolve(&scope).await? else {
                continue;
            };
            let Some(token) = self
                .chain
                .resolve(user_id, Some(persona.persona_num))
                .await?
            else {
                continue;
            };

            let media = match self
                .graph
                .media_page(
                    &mapping.account_id,
                    FEED_MEDIA_FIELDS,
                    media_limit.max(1),
                    None,
                    None,
                    &token.token,
                )
                .await
            {
                Ok(page) => page.items,
                Err(err) => {
                    warn!(%scope, error = %err, "Comment feed: media unavailable");
                    continue;
                }
            };

            let mut items = Vec::with_capacity(media.len());
            for item in media {
                let comments = match self
                    .graph
                    .comments(&item.id, comments_limit.max(1), &token.token)
                    .await
                {
                    Ok(comments) => comments,
                    Err(err) => {
                        warn!(media_id = %item.id, error = %err, "Comment feed: comments unavailable");
                        Vec::new()
                    }
                };
                items.push(MediaComments {
                    media: item,
                    comments,
                });
            }

            // Drop anything already shown or handled.
            let ids: Vec<String> = items
                .iter()
                .flat_map(|item| item.comments.iter().map(|c| c.id.clone()))
                .collect();
            let seen = self.seen.seen_set(&ids).await?;
            for item in &mut items {
                item.comments.retain(|c| !seen.contains(&c.id));
            }

            results.push(PersonaComments {
                persona_num: persona.persona_num,
                persona_name: persona.display_name,
                account_id: mapping.account_id,
                username: mapping.username,
                items,
            });
        }
        Ok(results)
    }

    /// Record handled event ids. Idempotent; duplicate ACKs touch the
    /// existing row.
    pub async fn ack(
        &self,
        user_id: i64,
        persona_num: Option<i32>,
        ids: &[String],
    ) -> Result<u64> {
        self.seen.ack(ids, user_id, persona_num).await
    }
}
