//! Secure Token Storage
//!
//! Persists the interactive OAuth token set of a provider through the host's
//! [`SecureStore`]. Tokens are kept as JSON under one key per provider.
//!
//! ## Example
//!
//! ```no_run
//! use core_auth::{OAuthTokens, ProviderKind, TokenStore};
//! use std::sync::Arc;
//! # use bridge_traits::storage::SecureStore;
//! # async fn example(secure_store: Arc<dyn SecureStore>) -> core_auth::Result<()> {
//! let token_store = TokenStore::new(secure_store);
//!
//! let tokens = OAuthTokens::new(
//!     "access_token_value".to_string(),
//!     Some("refresh_token_value".to_string()),
//!     Some(3600),
//! );
//!
//! token_store.store_tokens(ProviderKind::GoogleDrive, &tokens).await?;
//! let retrieved = token_store.retrieve_tokens(ProviderKind::GoogleDrive).await?;
//! assert!(retrieved.is_some());
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::{OAuthTokens, ProviderKind};
use bridge_traits::storage::SecureStore;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Secure storage for OAuth tokens, keyed by provider.
///
/// Token values are never logged.
#[derive(Clone)]
pub struct TokenStore {
    secure_store: Arc<dyn SecureStore>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredTokens {
    access_token: String,
    refresh_token: Option<String>,
    /// Unix seconds
    expires_at: Option<i64>,
}

impl StoredTokens {
    fn from_tokens(tokens: &OAuthTokens) -> Self {
        Self {
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            expires_at: tokens.expires_at.map(|at| at.timestamp()),
        }
    }

    fn into_tokens(self) -> OAuthTokens {
        let expires_at: Option<DateTime<Utc>> = self
            .expires_at
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());
        OAuthTokens::from_parts(self.access_token, self.refresh_token, expires_at)
    }
}

impl TokenStore {
    pub fn new(secure_store: Arc<dyn SecureStore>) -> Self {
        Self { secure_store }
    }

    /// Storage key for a provider's token set, e.g. `google_drive.oauth_tokens`.
    pub fn storage_key(provider: ProviderKind) -> String {
        format!("{}.oauth_tokens", provider.as_str())
    }

    /// Store tokens for a provider, overwriting any previous set.
    pub async fn store_tokens(&self, provider: ProviderKind, tokens: &OAuthTokens) -> Result<()> {
        let key = Self::storage_key(provider);
        let stored = StoredTokens::from_tokens(tokens);

        let json = serde_json::to_vec(&stored)
            .map_err(|e| AuthError::Other(format!("Failed to serialize tokens: {}", e)))?;

        self.secure_store
            .set_secret(&key, &json)
            .await
            .map_err(|e| {
                warn!(provider = %provider, error = %e, "Failed to store tokens in secure storage");
                AuthError::SecureStorageUnavailable(e.to_string())
            })?;

        info!(
            provider = %provider,
            has_refresh_token = stored.refresh_token.is_some(),
            "Tokens stored securely"
        );

        Ok(())
    }

    /// Retrieve tokens for a provider.
    ///
    /// Returns `Ok(None)` when nothing is stored. An entry that cannot be
    /// decoded is deleted and reported as [`AuthError::TokenCorrupted`].
    pub async fn retrieve_tokens(&self, provider: ProviderKind) -> Result<Option<OAuthTokens>> {
        let key = Self::storage_key(provider);

        let data = self.secure_store.get_secret(&key).await.map_err(|e| {
            warn!(provider = %provider, error = %e, "Failed to read tokens from secure storage");
            AuthError::SecureStorageUnavailable(e.to_string())
        })?;

        let Some(data) = data else {
            debug!(provider = %provider, "No tokens found in storage");
            return Ok(None);
        };

        let stored: StoredTokens = match serde_json::from_slice(&data) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(provider = %provider, error = %e, "Stored tokens are corrupted, deleting");

                if let Err(delete_err) = self.secure_store.delete_secret(&key).await {
                    warn!(provider = %provider, error = %delete_err, "Failed to delete corrupted token data");
                }

                return Err(AuthError::TokenCorrupted {
                    provider,
                    reason: e.to_string(),
                });
            }
        };

        Ok(Some(stored.into_tokens()))
    }

    /// Idempotent.
    pub async fn delete_tokens(&self, provider: ProviderKind) -> Result<()> {
        self.secure_store
            .delete_secret(&Self::storage_key(provider))
            .await
            .map_err(|e| AuthError::SecureStorageUnavailable(e.to_string()))?;

        info!(provider = %provider, "Tokens deleted");
        Ok(())
    }

    pub async fn has_tokens(&self, provider: ProviderKind) -> Result<bool> {
        self.secure_store
            .has_secret(&Self::storage_key(provider))
            .await
            .map_err(|e| AuthError::SecureStorageUnavailable(e.to_string()))
    }
}
