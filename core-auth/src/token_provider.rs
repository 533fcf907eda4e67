use crate::error::Result;
use crate::types::{Credential, ProviderKind};
use async_trait::async_trait;

/// Produces a bearer credential for one provider.
///
/// Implementations either fail with [`AuthError::Config`](crate::AuthError::Config)
/// before touching the network, or make the exchange and report failures as
/// [`AuthError::Transport`](crate::AuthError::Transport).
#[async_trait]
pub trait TokenProvider: Send + Sync {
    fn provider(&self) -> ProviderKind;

    async fn get_access_token(&self) -> Result<Credential>;
}
