use crate::error::{AuthError, Result};
use crate::token_provider::TokenProvider;
use crate::types::{Credential, ProviderKind};
use async_trait::async_trait;
use tracing::warn;

/// Returns a pre-issued bearer token as-is.
///
/// Degraded mode: the token is never refreshed, so listings start failing
/// once it expires.
pub struct StaticTokenProvider {
    provider: ProviderKind,
    access_token: String,
}

impl StaticTokenProvider {
    pub fn new(provider: ProviderKind, access_token: impl Into<String>) -> Self {
        warn!(
            provider = %provider,
            "Using a static access token; it will not be refreshed"
        );
        Self {
            provider,
            access_token: access_token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    fn provider(&self) -> ProviderKind {
        self.provider
    }

    async fn get_access_token(&self) -> Result<Credential> {
        if self.access_token.trim().is_empty() {
            return Err(AuthError::config(self.provider, "static access token is empty"));
        }
        Ok(Credential::new(self.provider, self.access_token.clone()))
    }
}
