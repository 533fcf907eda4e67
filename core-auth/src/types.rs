use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use bridge_traits::storage::{Credential, ProviderKind};

/// Seconds before expiry at which a stored token is refreshed.
const REFRESH_BUFFER_SECS: i64 = 60;

/// OAuth 2.0 token set.
///
/// Produced by the authorization-code and refresh grants. Providers are not
/// required to return a refresh token or an expiry, so both are optional.
///
/// The `Debug` implementation redacts both tokens.
///
/// # Examples
///
/// ```
/// use core_auth::OAuthTokens;
///
/// let tokens = OAuthTokens::new("ya29.a0...".to_string(), None, Some(3600));
/// assert!(!tokens.is_expired());
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl OAuthTokens {
    /// Create a token set expiring `expires_in` seconds from now.
    pub fn new(access_token: String, refresh_token: Option<String>, expires_in: Option<i64>) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
        }
    }

    pub fn from_parts(
        access_token: String,
        refresh_token: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at,
        }
    }

    /// Expired or within a minute of expiring. Tokens without an expiry
    /// never count as expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .map(|expires_at| now + Duration::seconds(REFRESH_BUFFER_SECS) >= expires_at)
            .unwrap_or(false)
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }

    pub fn to_credential(&self, provider: ProviderKind) -> Credential {
        Credential {
            access_token: self.access_token.clone(),
            expires_at: self.expires_at,
            provider,
        }
    }
}

impl fmt::Debug for OAuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthTokens")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Successful body of an OAuth 2.0 token endpoint.
#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

/// Error body of an OAuth 2.0 token endpoint (RFC 6749 section 5.2).
#[derive(Debug, Deserialize)]
pub(crate) struct TokenErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl TokenErrorResponse {
    pub fn summary(&self) -> String {
        match &self.error_description {
            Some(description) => format!("{}: {}", self.error, description),
            None => self.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_debug_redacts_values() {
        let tokens = OAuthTokens::new(
            "access-value".to_string(),
            Some("refresh-value".to_string()),
            Some(3600),
        );
        let debug = format!("{:?}", tokens);

        assert!(!debug.contains("access-value"));
        assert!(!debug.contains("refresh-value"));
    }

    #[test]
    fn test_tokens_expiry() {
        let now = Utc::now();
        let expired = OAuthTokens::from_parts("a".into(), None, Some(now - Duration::seconds(1)));
        let near = OAuthTokens::from_parts("a".into(), None, Some(now + Duration::seconds(30)));
        let fresh = OAuthTokens::from_parts("a".into(), None, Some(now + Duration::hours(1)));
        let unbounded = OAuthTokens::from_parts("a".into(), None, None);

        assert!(expired.is_expired_at(now));
        assert!(near.is_expired_at(now));
        assert!(!fresh.is_expired_at(now));
        assert!(!unbounded.is_expired_at(now));
    }

    #[test]
    fn test_to_credential_keeps_expiry() {
        let tokens = OAuthTokens::new("token".to_string(), None, Some(60));
        let credential = tokens.to_credential(ProviderKind::GoogleDrive);

        assert_eq!(credential.access_token, "token");
        assert_eq!(credential.expires_at, tokens.expires_at);
        assert_eq!(credential.provider, ProviderKind::GoogleDrive);
    }

    #[test]
    fn test_token_response_minimal() {
        let response: TokenResponse = serde_json::from_str(r#"{"access_token":"t"}"#).unwrap();
        assert_eq!(response.access_token, "t");
        assert_eq!(response.refresh_token, None);
        assert_eq!(response.expires_in, None);
    }

    #[test]
    fn test_token_error_summary() {
        let error: TokenErrorResponse = serde_json::from_str(
            r#"{"error":"invalid_grant","error_description":"Bad Request"}"#,
        )
        .unwrap();
        assert_eq!(error.summary(), "invalid_grant: Bad Request");
    }
}
