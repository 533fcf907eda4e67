use bridge_traits::storage::ProviderKind;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Credentials are missing or malformed; no network call was made.
    #[error("{provider} credentials are not configured: {message}")]
    Config {
        provider: ProviderKind,
        message: String,
    },

    /// The credential exchange itself failed.
    #[error("{provider} token exchange failed: {message}")]
    Transport {
        provider: ProviderKind,
        message: String,
        body: Option<String>,
    },

    #[error("OAuth state does not match any pending authorization")]
    StateMismatch,

    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("Secure storage unavailable: {0}")]
    SecureStorageUnavailable(String),

    #[error("Stored {provider} token is corrupted: {reason}")]
    TokenCorrupted {
        provider: ProviderKind,
        reason: String,
    },

    #[error("{0}")]
    Other(String),
}

impl AuthError {
    pub fn config(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self::Config {
            provider,
            message: message.into(),
        }
    }

    pub fn transport(
        provider: ProviderKind,
        message: impl Into<String>,
        body: Option<String>,
    ) -> Self {
        Self::Transport {
            provider,
            message: message.into(),
            body,
        }
    }

    /// True for failures detected before any network call.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
