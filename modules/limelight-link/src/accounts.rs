use std::sync::Arc;

use graph_client::GraphApi;
use limelight_common::{
    AccountMapping, LimelightError, LinkedAccount, OwnerScope, PersonaScope, Result,
};
use limelight_store::{MappingStore, TokenChain, TokenLookup, TokenStore};
use tracing::info;

/// Listing linkable accounts and maintaining the persona → account binding.
pub struct AccountService {
    graph: Arc<dyn GraphApi>,
    tokens: Arc<dyn TokenStore>,
    chain: Arc<TokenChain>,
    mappings: Arc<dyn MappingStore>,
}

impl AccountService {
    pub fn new(
        graph: Arc<dyn GraphApi>,
        tokens: Arc<dyn TokenStore>,
        chain: Arc<TokenChain>,
        mappings: Arc<dyn MappingStore>,
    ) -> Self {
        Self {
            graph,
            tokens,
            chain,
            mappings,
        }
    }

    /// Pages the user manages that carry a business account, as candidates
    /// for linking.
    pub async fn list_accounts(
        &self,
        user_id: i64,
        persona_num: i32,
    ) -> Result<Vec<LinkedAccount>> {
        let token = self.chain.require(user_id, Some(persona_num)).await?;
        let pages = self.graph.list_accounts(&token.token).await?;
        Ok(pages
            .into_iter()
            .filter_map(|page| {
                let business = page.instagram_business_account?;
                Some(LinkedAccount {
                    page_id: page.id,
                    page_name: page.name,
                    account_id: business.id,
                    username: business.username,
                })
            })
            .collect())
    }

    /// Bind a persona to an account. Creation requires a persona-scoped
    /// credential to already exist — an inherited user or fallback token
    /// is not enough to claim an account for a persona.
    pub async fn link(
        &self,
        scope: &PersonaScope,
        account_id: &str,
        username: Option<&str>,
        page_id: &str,
    ) -> Result<()> {
        match self.tokens.lookup(&OwnerScope::Persona(*scope)).await? {
            TokenLookup::Found(_) => {}
            _ => return Err(LimelightError::AuthRequired),
        }
        self.mappings
            .link(
                scope,
                &AccountMapping {
                    account_id: account_id.to_string(),
                    username: username.map(|u| u.to_string()),
                    page_id: page_id.to_string(),
                },
            )
            .await?;
        info!(%scope, account_id, "Persona account linked");
        Ok(())
    }

    pub async fn mapping(&self, scope: &PersonaScope) -> Result<Option<AccountMapping>> {
        self.mappings.resolve(scope).await
    }

    /// Clear the binding and tombstone the persona token together, so a
    /// stale credential cannot be reused after the unlink.
    pub async fn unlink(&self, scope: &PersonaScope) -> Result<()> {
        self.mappings.unlink(scope).await?;
        self.tokens.revoke_persona(scope).await?;
        info!(%scope, "Persona account unlinked");
        Ok(())
    }
}
