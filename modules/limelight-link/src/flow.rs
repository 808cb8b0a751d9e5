//! The three-leg OAuth exchange:
//! `START → REDIRECTED → CODE_RECEIVED → SHORT_TOKEN → LONG_TOKEN → LINKED`.
//!
//! The flow never leaves an ambiguous "maybe linked" state: either a token
//! row exists for the persona scope afterwards or it does not.

use std::sync::Arc;

use graph_client::GraphApi;
use limelight_common::{LimelightError, OwnerScope, PersonaScope, Result};
use limelight_store::{PersonaDirectory, TokenStore};
use tracing::{info, warn};

use crate::state::{LinkState, StateCodec};

/// Query parameters echoed back by the authorization redirect.
#[derive(Debug, Default, Clone)]
pub struct Callback {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

pub struct LinkService {
    graph: Arc<dyn GraphApi>,
    tokens: Arc<dyn TokenStore>,
    personas: Arc<dyn PersonaDirectory>,
    codec: StateCodec,
    scopes: String,
    success_url: String,
}

impl LinkService {
    pub fn new(
        graph: Arc<dyn GraphApi>,
        tokens: Arc<dyn TokenStore>,
        personas: Arc<dyn PersonaDirectory>,
        codec: StateCodec,
        scopes: String,
        success_url: String,
    ) -> Self {
        Self {
            graph,
            tokens,
            personas,
            codec,
            scopes,
            success_url,
        }
    }

    /// START: resolve the persona reference, sign the link state, and hand
    /// back the authorization dialog URL to redirect the user to. Tokens
    /// are always persona-scoped, so a persona reference is mandatory.
    pub async fn start_link(&self, user_id: i64, persona_ref: &str) -> Result<String> {
        let persona_num = self
            .personas
            .resolve_ref(user_id, persona_ref)
            .await?
            .ok_or(LimelightError::PersonaRequired)?;

        let state = LinkState::new(user_id, Some(persona_num));
        let token = self.codec.encode(&state);
        info!(user_id, persona_num, "Starting account link");
        Ok(self.graph.authorize_url(&self.scopes, &token))
    }

    /// CODE_RECEIVED onward. Returns the success destination URL once the
    /// resulting token is persisted under the persona scope.
    pub async fn handle_callback(&self, callback: Callback) -> Result<String> {
        if let Some(error) = callback.error {
            return Err(LimelightError::RemoteRejected {
                status: 400,
                body: format!("oauth_error:{error}"),
            });
        }

        // The echoed state is the only thing tying this stateless request
        // to a user; nothing is trusted until it verifies.
        let state_token = callback
            .state
            .as_deref()
            .ok_or_else(|| LimelightError::StateInvalid("state missing".into()))?;
        let state = self.codec.verify(state_token)?;
        let persona_num = state.persona_num.ok_or(LimelightError::PersonaRequired)?;
        let scope = OwnerScope::Persona(PersonaScope::new(state.user_id, persona_num));

        let code = callback.code.as_deref().ok_or(LimelightError::RemoteRejected {
            status: 400,
            body: "code_missing".into(),
        })?;

        // SHORT_TOKEN: one-shot exchange. Codes are single-use; a failure
        // here is terminal and persists nothing.
        let short = self.graph.exchange_code(code).await?;

        // LONG_TOKEN: on failure the short-lived token is still persisted
        // as a degraded fallback, but the step is reported failed.
        match self.graph.exchange_long_lived(&short.access_token).await {
            Ok(long) => {
                let expires_in = long.expires_in.or(short.expires_in);
                self.tokens
                    .store(&scope, &long.access_token, expires_in)
                    .await?;
                info!(
                    user_id = state.user_id,
                    persona_num, "Persona linked with long-lived token"
                );
                Ok(self.success_url.clone())
            }
            Err(err) => {
                warn!(
                    user_id = state.user_id,
                    persona_num,
                    error = %err,
                    "Long-lived exchange failed; keeping short-lived token"
                );
                self.tokens
                    .store(&scope, &short.access_token, short.expires_in)
                    .await?;
                Err(err.into())
            }
        }
    }
}
