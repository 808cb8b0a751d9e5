//! Effective-token resolution: an explicit ordered list of resolvers tried
//! in sequence. Persona scope wins over the legacy user scope, which wins
//! over a static development token. A revoked persona scope stops the
//! chain cold so an unlinked persona cannot inherit a broader credential.

use std::sync::Arc;

use async_trait::async_trait;
use limelight_common::{AuthToken, LimelightError, OwnerScope, PersonaScope, Result};
use tracing::debug;

use crate::tokens::{TokenLookup, TokenStore};

#[async_trait]
pub trait TokenResolver: Send + Sync {
    fn name(&self) -> &'static str;

    async fn resolve(&self, user_id: i64, persona_num: Option<i32>) -> Result<TokenLookup>;
}

pub struct PersonaTokenResolver {
    store: Arc<dyn TokenStore>,
}

impl PersonaTokenResolver {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TokenResolver for PersonaTokenResolver {
    fn name(&self) -> &'static str {
        "persona"
    }

    async fn resolve(&self, user_id: i64, persona_num: Option<i32>) -> Result<TokenLookup> {
        let Some(persona_num) = persona_num else {
            return Ok(TokenLookup::Missing);
        };
        self.store
            .lookup(&OwnerScope::Persona(PersonaScope::new(user_id, persona_num)))
            .await
    }
}

pub struct UserTokenResolver {
    store: Arc<dyn TokenStore>,
}

impl UserTokenResolver {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TokenResolver for UserTokenResolver {
    fn name(&self) -> &'static str {
        "user"
    }

    async fn resolve(&self, user_id: i64, _persona_num: Option<i32>) -> Result<TokenLookup> {
        self.store.lookup(&OwnerScope::User(user_id)).await
    }
}

/// Development fallback from configuration. Carries no expiry metadata.
pub struct StaticTokenResolver {
    token: Option<String>,
}

impl StaticTokenResolver {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenResolver for StaticTokenResolver {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn resolve(&self, _user_id: i64, _persona_num: Option<i32>) -> Result<TokenLookup> {
        Ok(match &self.token {
            Some(token) => TokenLookup::Found(AuthToken {
                token: token.clone(),
                expires_at: None,
            }),
            None => TokenLookup::Missing,
        })
    }
}

pub struct TokenChain {
    resolvers: Vec<Box<dyn TokenResolver>>,
}

impl TokenChain {
    pub fn new(resolvers: Vec<Box<dyn TokenResolver>>) -> Self {
        Self { resolvers }
    }

    /// The standard persona → user → static order.
    pub fn standard(store: Arc<dyn TokenStore>, fallback_token: Option<String>) -> Self {
        Self::new(vec![
            Box::new(PersonaTokenResolver::new(store.clone())),
            Box::new(UserTokenResolver::new(store)),
            Box::new(StaticTokenResolver::new(fallback_token)),
        ])
    }

    /// First hit wins. "No token" is a caller condition (`AuthRequired`),
    /// not a transport error; only store failures surface as `Err`.
    pub async fn resolve(
        &self,
        user_id: i64,
        persona_num: Option<i32>,
    ) -> Result<Option<AuthToken>> {
        for resolver in &self.resolvers {
            match resolver.resolve(user_id, persona_num).await? {
                TokenLookup::Found(token) => {
                    debug!(resolver = resolver.name(), user_id, "Token resolved");
                    return Ok(Some(token));
                }
                TokenLookup::Revoked => {
                    debug!(
                        resolver = resolver.name(),
                        user_id, "Scope revoked; not falling through"
                    );
                    return Ok(None);
                }
                TokenLookup::Missing => continue,
            }
        }
        Ok(None)
    }

    /// Resolve or report that the caller must redo OAuth.
    pub async fn require(&self, user_id: i64, persona_num: Option<i32>) -> Result<AuthToken> {
        self.resolve(user_id, persona_num)
            .await?
            .ok_or(LimelightError::AuthRequired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTokenStore;

    fn scope() -> PersonaScope {
        PersonaScope::new(7, 2)
    }

    #[tokio::test]
    async fn persona_scope_beats_user_scope() {
        let store = Arc::new(MemoryTokenStore::new());
        store
            .store(&OwnerScope::Persona(scope()), "persona-token", Some(3600))
            .await
            .unwrap();
        store
            .store(&OwnerScope::User(7), "user-token", None)
            .await
            .unwrap();

        let chain = TokenChain::standard(store, Some("static-token".into()));
        let token = chain.resolve(7, Some(2)).await.unwrap().unwrap();
        assert_eq!(token.token, "persona-token");
    }

    #[tokio::test]
    async fn falls_back_to_user_then_static() {
        let store = Arc::new(MemoryTokenStore::new());
        store
            .store(&OwnerScope::User(7), "user-token", None)
            .await
            .unwrap();

        let chain = TokenChain::standard(store.clone(), Some("static-token".into()));
        assert_eq!(
            chain.resolve(7, Some(2)).await.unwrap().unwrap().token,
            "user-token"
        );

        let empty_store = Arc::new(MemoryTokenStore::new());
        let chain = TokenChain::standard(empty_store, Some("static-token".into()));
        assert_eq!(
            chain.resolve(7, Some(2)).await.unwrap().unwrap().token,
            "static-token"
        );
    }

    #[tokio::test]
    async fn revoked_persona_scope_stops_the_chain() {
        let store = Arc::new(MemoryTokenStore::new());
        store
            .store(&OwnerScope::User(7), "user-token", None)
            .await
            .unwrap();
        store.revoke_persona(&scope()).await.unwrap();

        let chain = TokenChain::standard(store, Some("static-token".into()));
        assert!(chain.resolve(7, Some(2)).await.unwrap().is_none());
        assert!(matches!(
            chain.require(7, Some(2)).await,
            Err(LimelightError::AuthRequired)
        ));

        // The user-wide scope itself is untouched.
        let store = Arc::new(MemoryTokenStore::new());
        store
            .store(&OwnerScope::User(7), "user-token", None)
            .await
            .unwrap();
        store.revoke_persona(&scope()).await.unwrap();
        let chain = TokenChain::standard(store, None);
        assert_eq!(
            chain.resolve(7, None).await.unwrap().unwrap().token,
            "user-token"
        );
    }

    #[tokio::test]
    async fn relink_clears_the_tombstone() {
        let store = Arc::new(MemoryTokenStore::new());
        store.revoke_persona(&scope()).await.unwrap();
        store
            .store(&OwnerScope::Persona(scope()), "fresh-token", Some(3600))
            .await
            .unwrap();

        let chain = TokenChain::standard(store, None);
        assert_eq!(
            chain.resolve(7, Some(2)).await.unwrap().unwrap().token,
            "fresh-token"
        );
    }

    #[tokio::test]
    async fn no_resolver_hit_is_none_not_error() {
        let chain = TokenChain::standard(Arc::new(MemoryTokenStore::new()), None);
        assert!(chain.resolve(7, Some(2)).await.unwrap().is_none());
    }
}
