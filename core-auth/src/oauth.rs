//! OAuth 2.0 Authorization Flow Manager with PKCE Support
//!
//! This module implements RFC 6749 (OAuth 2.0) and RFC 7636 (PKCE) for the
//! interactive consent flow, plus the token-endpoint plumbing every grant in
//! this crate shares.
//!
//! # Overview
//!
//! The OAuth flow manager handles:
//! - Building authorization URLs with PKCE challenge and state
//! - Exchanging authorization codes for tokens (one call, never retried)
//! - Refreshing access tokens (bounded retry)
//!
//! # Security
//!
//! - Generates cryptographically secure random state and code verifier
//! - Never logs sensitive values (tokens, codes, verifiers)
//!
//! # Example
//!
//! ```no_run
//! use core_auth::oauth::{OAuthConfig, OAuthFlowManager};
//! use std::sync::Arc;
//!
//! # fn example(http_client: Arc<dyn bridge_traits::HttpClient>) -> core_auth::Result<()> {
//! let config = OAuthConfig::google(
//!     "your-client-id",
//!     Some("your-client-secret".to_string()),
//!     "http://localhost:3000/api/auth",
//! );
//!
//! let flow_manager = OAuthFlowManager::new(config, http_client);
//! let (auth_url, pkce_verifier) = flow_manager.build_auth_url()?;
//! // Redirect the user to auth_url and keep pkce_verifier for the callback
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::{OAuthTokens, ProviderKind, TokenErrorResponse, TokenResponse};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, RetryPolicy};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// OAuth 2.0 provider configuration.
#[derive(Clone)]
pub struct OAuthConfig {
    pub provider: ProviderKind,
    pub client_id: String,
    /// OAuth client secret (optional for public clients)
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// Authorization endpoint URL
    pub auth_url: String,
    /// Token endpoint URL
    pub token_url: String,
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("provider", &self.provider)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .finish()
    }
}

/// PKCE (Proof Key for Code Exchange) verifier.
///
/// Holds the code verifier and the `state` value for one authorization
/// attempt. Only the S256 challenge derived from the verifier is sent to the
/// authorization server.
#[derive(Clone)]
pub struct PkceVerifier {
    verifier: String,
    state: String,
}

impl PkceVerifier {
    /// Generates a 32-byte verifier and a 16-byte state, both base64url
    /// without padding.
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();

        let mut verifier_bytes = [0u8; 32];
        rng.fill(&mut verifier_bytes);
        let verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);

        let mut state_bytes = [0u8; 16];
        rng.fill(&mut state_bytes);
        let state = URL_SAFE_NO_PAD.encode(state_bytes);

        Self { verifier, state }
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    /// BASE64URL(SHA256(code_verifier))
    pub fn challenge(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }
}

impl Default for PkceVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PkceVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceVerifier")
            .field("verifier", &"[REDACTED]")
            .field("state", &self.state)
            .finish()
    }
}

/// Posts a form to a token endpoint and parses the standard token response.
///
/// Transport failures, non-2xx statuses and unparseable bodies all surface as
/// [`AuthError::Transport`]; the provider's error body is kept when present.
pub(crate) async fn request_token(
    http_client: &dyn HttpClient,
    provider: ProviderKind,
    token_url: &str,
    params: &[(&str, &str)],
    retry: Option<RetryPolicy>,
) -> Result<TokenResponse> {
    let encoded_body = serde_urlencoded::to_string(params)
        .map_err(|e| AuthError::Other(format!("Failed to encode token request: {}", e)))?;

    let request = HttpRequest::new(HttpMethod::Post, token_url)
        .header("Accept", "application/json")
        .form_body(encoded_body);

    let response = match retry {
        Some(policy) => http_client.execute_with_retry(request, policy).await,
        None => http_client.execute(request).await,
    }
    .map_err(|e| AuthError::transport(provider, e.to_string(), None))?;

    if !response.is_success() {
        let status = response.status;
        let body = response.error_body();
        let detail = body
            .as_deref()
            .and_then(|b| serde_json::from_str::<TokenErrorResponse>(b).ok())
            .map(|err| format!(" ({})", err.summary()))
            .unwrap_or_default();

        warn!(provider = %provider, status, "Token endpoint rejected the request");

        return Err(AuthError::transport(
            provider,
            format!("token endpoint returned HTTP {}{}", status, detail),
            body,
        ));
    }

    response.json::<TokenResponse>().map_err(|e| {
        AuthError::transport(
            provider,
            format!("unparseable token response: {}", e),
            response.error_body(),
        )
    })
}

/// OAuth 2.0 flow manager.
///
/// Handles the authorization code flow with PKCE and refresh grants for one
/// provider configuration.
pub struct OAuthFlowManager {
    config: OAuthConfig,
    http_client: Arc<dyn HttpClient>,
    refresh_policy: RetryPolicy,
}

impl OAuthFlowManager {
    pub fn new(config: OAuthConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            config,
            http_client,
            refresh_policy: RetryPolicy::default(),
        }
    }

    pub fn with_refresh_policy(mut self, policy: RetryPolicy) -> Self {
        self.refresh_policy = policy;
        self
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Build the authorization URL with PKCE challenge.
    ///
    /// Returns the URL and the verifier, which must be kept until the callback
    /// arrives. The URL requests offline access so a refresh token is issued.
    #[instrument(skip(self), fields(provider = %self.config.provider))]
    pub fn build_auth_url(&self) -> Result<(String, PkceVerifier)> {
        let verifier = PkceVerifier::new();
        let challenge = verifier.challenge();

        let mut url = Url::parse(&self.config.auth_url)
            .map_err(|e| AuthError::Other(format!("Invalid auth URL: {}", e)))?;

        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("access_type", "offline")
            .append_pair("state", verifier.state())
            .append_pair("code_challenge", &challenge)
            .append_pair("code_challenge_method", "S256");

        debug!("Built authorization URL");

        Ok((url.to_string(), verifier))
    }

    /// Exchange an authorization code for OAuth tokens.
    ///
    /// Makes exactly one call to the token endpoint. The PKCE verifier is sent
    /// when the flow was started with one.
    #[instrument(skip(self, code, verifier), fields(provider = %self.config.provider, pkce = verifier.is_some()))]
    pub async fn exchange_code(
        &self,
        code: &str,
        verifier: Option<&PkceVerifier>,
    ) -> Result<OAuthTokens> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
        ];

        if let Some(verifier) = verifier {
            params.push(("code_verifier", verifier.verifier()));
        }

        if let Some(ref client_secret) = self.config.client_secret {
            params.push(("client_secret", client_secret.as_str()));
        }

        debug!("Exchanging authorization code for tokens");

        let token_response = request_token(
            self.http_client.as_ref(),
            self.config.provider,
            &self.config.token_url,
            &params,
            None,
        )
        .await?;

        info!(
            has_refresh_token = token_response.refresh_token.is_some(),
            expires_in = ?token_response.expires_in,
            "Exchanged authorization code for tokens"
        );

        Ok(OAuthTokens::new(
            token_response.access_token,
            token_response.refresh_token,
            token_response.expires_in,
        ))
    }

    /// Refresh an access token using a refresh token.
    ///
    /// Providers may omit the refresh token from the response, in which case
    /// the one passed in is kept.
    #[instrument(skip(self, refresh_token), fields(provider = %self.config.provider))]
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<OAuthTokens> {
        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
        ];

        if let Some(ref client_secret) = self.config.client_secret {
            params.push(("client_secret", client_secret.as_str()));
        }

        let token_response = request_token(
            self.http_client.as_ref(),
            self.config.provider,
            &self.config.token_url,
            &params,
            Some(self.refresh_policy.clone()),
        )
        .await?;

        info!(expires_in = ?token_response.expires_in, "Refreshed access token");

        Ok(OAuthTokens::new(
            token_response.access_token,
            token_response
                .refresh_token
                .or_else(|| Some(refresh_token.to_string())),
            token_response.expires_in,
        ))
    }
}
