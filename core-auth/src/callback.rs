//! Completion of the interactive Google consent flow.
//!
//! The same entry point serves both legs of the flow: a request without a
//! `code` starts a new authorization, a request carrying one finishes it.

use crate::error::{AuthError, Result};
use crate::oauth::{OAuthFlowManager, PkceVerifier};
use crate::token_store::TokenStore;
use crate::types::ProviderKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// How long a started authorization waits for its callback.
pub const PENDING_AUTHORIZATION_TTL: Duration = Duration::from_secs(600);

/// Query parameters of the redirect endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl CallbackParams {
    /// Parse a raw query string such as `code=4/0A...&state=xyz`.
    pub fn from_query(query: &str) -> Result<Self> {
        serde_urlencoded::from_str(query.trim_start_matches('?'))
            .map_err(|e| AuthError::Other(format!("Invalid callback query: {}", e)))
    }

    pub fn with_code(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..Self::default()
        }
    }
}

/// What the caller should do after the callback was handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum CallbackOutcome {
    /// Send the user to the consent screen.
    Authorize { url: String },
    /// Tokens are stored; send the user back into the application.
    #[serde(rename_all = "camelCase")]
    Connected { redirect_to: String },
}

struct PendingAuthorization {
    verifier: PkceVerifier,
    started_at: Instant,
}

pub struct OAuthCallbackHandler {
    flow: OAuthFlowManager,
    token_store: TokenStore,
    post_auth_redirect: String,
    pending_ttl: Duration,
    require_state: bool,
    pending: Mutex<HashMap<String, PendingAuthorization>>,
}

impl OAuthCallbackHandler {
    pub fn new(
        flow: OAuthFlowManager,
        token_store: TokenStore,
        post_auth_redirect: impl Into<String>,
    ) -> Self {
        Self {
            flow,
            token_store,
            post_auth_redirect: post_auth_redirect.into(),
            pending_ttl: PENDING_AUTHORIZATION_TTL,
            require_state: false,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_pending_ttl(mut self, ttl: Duration) -> Self {
        self.pending_ttl = ttl;
        self
    }

    /// Reject callbacks that carry a `code` but no `state`.
    ///
    /// Every authorization URL this handler builds carries a `state`, so a
    /// stateless code did not come from a flow it started.
    pub fn with_state_required(mut self, required: bool) -> Self {
        self.require_state = required;
        self
    }

    fn provider(&self) -> ProviderKind {
        self.flow.config().provider
    }

    #[instrument(skip(self, params), fields(provider = %self.provider(), has_code = params.code.is_some()))]
    pub async fn handle(&self, params: CallbackParams) -> Result<CallbackOutcome> {
        if let Some(error) = params.error {
            if let Some(state) = params.state.as_deref() {
                self.pending.lock().await.remove(state);
            }
            warn!(error = %error, "Authorization was not granted");
            return Err(AuthError::AuthorizationDenied(error));
        }

        let Some(code) = params.code.filter(|c| !c.is_empty()) else {
            return self.start_authorization().await;
        };

        let verifier = match params.state.as_deref() {
            Some(state) => Some(self.take_pending(state).await?),
            None if self.require_state => {
                warn!("Callback without state rejected");
                return Err(AuthError::StateMismatch);
            }
            None => {
                debug!("Callback without state, exchanging without PKCE");
                None
            }
        };

        let tokens = self.flow.exchange_code(&code, verifier.as_ref()).await?;
        self.token_store.store_tokens(self.provider(), &tokens).await?;

        info!("Authorization completed");

        Ok(CallbackOutcome::Connected {
            redirect_to: self.post_auth_redirect.clone(),
        })
    }

    async fn start_authorization(&self) -> Result<CallbackOutcome> {
        let (url, verifier) = self.flow.build_auth_url()?;

        let mut pending = self.pending.lock().await;
        let ttl = self.pending_ttl;
        pending.retain(|_, entry| entry.started_at.elapsed() < ttl);
        pending.insert(
            verifier.state().to_string(),
            PendingAuthorization {
                verifier,
                started_at: Instant::now(),
            },
        );

        debug!(pending = pending.len(), "Started authorization");
        Ok(CallbackOutcome::Authorize { url })
    }

    async fn take_pending(&self, state: &str) -> Result<PkceVerifier> {
        let entry = self.pending.lock().await.remove(state);
        match entry {
            Some(entry) if entry.started_at.elapsed() < self.pending_ttl => Ok(entry.verifier),
            Some(_) => {
                warn!("Authorization state expired");
                Err(AuthError::StateMismatch)
            }
            None => {
                warn!("Unknown authorization state");
                Err(AuthError::StateMismatch)
            }
        }
    }

    /// Forget the stored token.
    pub async fn disconnect(&self) -> Result<()> {
        self.token_store.delete_tokens(self.provider()).await
    }

    pub async fn is_connected(&self) -> Result<bool> {
        self.token_store.has_tokens(self.provider()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::google::DRIVE_READONLY_SCOPE;
    use crate::oauth::OAuthConfig;
    use async_trait::async_trait;
    use bridge_desktop::InMemorySecureStore;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
    use bytes::Bytes;
    use mockall::mock;
    use std::sync::Arc;
    use url::Url;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    fn token_response() -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: HashMap::new(),
            body: Bytes::from_static(
                br#"{"access_token":"ya29.user","refresh_token":"1//r","expires_in":3599}"#,
            ),
        }
    }

    fn handler(http: MockHttpClient) -> (OAuthCallbackHandler, TokenStore) {
        let store = TokenStore::new(Arc::new(InMemorySecureStore::new()));
        let flow = OAuthFlowManager::new(
            OAuthConfig::google(
                "client-id",
                Some("client-secret".to_string()),
                "http://localhost:3000/api/auth",
            ),
            Arc::new(http),
        );
        (OAuthCallbackHandler::new(flow, store.clone(), "/drive"), store)
    }

    fn state_of(url: &str) -> String {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap()
    }

    #[test]
    fn test_params_from_query() {
        let params = CallbackParams::from_query("?code=4%2F0Ab&state=xyz").unwrap();
        assert_eq!(params.code.as_deref(), Some("4/0Ab"));
        assert_eq!(params.state.as_deref(), Some("xyz"));
        assert_eq!(params.error, None);

        assert_eq!(CallbackParams::from_query("").unwrap(), CallbackParams::default());
    }

    #[tokio::test]
    async fn test_no_code_returns_consent_url() {
        let mut http = MockHttpClient::new();
        http.expect_execute().never();
        let (handler, _) = handler(http);

        let outcome = handler.handle(CallbackParams::default()).await.unwrap();
        let CallbackOutcome::Authorize { url } = outcome else {
            panic!("expected authorize outcome");
        };

        let parsed = Url::parse(&url).unwrap();
        let query: HashMap<_, _> = parsed.query_pairs().into_owned().collect();
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth"));
        assert_eq!(query.get("scope").map(String::as_str), Some(DRIVE_READONLY_SCOPE));
        assert_eq!(query.get("access_type").map(String::as_str), Some("offline"));
        assert_eq!(query.get("response_type").map(String::as_str), Some("code"));
    }

    #[tokio::test]
    async fn test_code_with_known_state_exchanges_once_and_stores() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .withf(|request| {
                let body = request.body.clone().unwrap_or_default();
                let form: HashMap<String, String> = serde_urlencoded::from_bytes(&body).unwrap();
                form.get("code").map(String::as_str) == Some("4/0Ab")
                    && form.contains_key("code_verifier")
            })
            .returning(|_| Ok(token_response()));
        let (handler, store) = handler(http);

        let CallbackOutcome::Authorize { url } =
            handler.handle(CallbackParams::default()).await.unwrap()
        else {
            panic!("expected authorize outcome");
        };

        let outcome = handler
            .handle(CallbackParams {
                code: Some("4/0Ab".to_string()),
                state: Some(state_of(&url)),
                error: None,
            })
            .await
            .unwrap();

        assert_eq!(
            outcome,
            CallbackOutcome::Connected {
                redirect_to: "/drive".to_string()
            }
        );
        let stored = store
            .retrieve_tokens(ProviderKind::GoogleDrive)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.access_token, "ya29.user");
        assert!(handler.is_connected().await.unwrap());
    }

    #[tokio::test]
    async fn test_code_without_state_exchanges_once() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .withf(|request| {
                let body = request.body.clone().unwrap_or_default();
                let form: HashMap<String, String> = serde_urlencoded::from_bytes(&body).unwrap();
                !form.contains_key("code_verifier")
            })
            .returning(|_| Ok(token_response()));
        let (handler, _) = handler(http);

        let outcome = handler.handle(CallbackParams::with_code("abc")).await.unwrap();
        assert!(matches!(outcome, CallbackOutcome::Connected { .. }));
    }

    #[tokio::test]
    async fn test_stateless_code_rejected_when_state_required() {
        let mut http = MockHttpClient::new();
        http.expect_execute().never();
        let (handler, store) = handler(http);
        let handler = handler.with_state_required(true);

        let err = handler
            .handle(CallbackParams::with_code("attacker-code"))
            .await
            .unwrap_err();

        assert_eq!(err, AuthError::StateMismatch);
        assert!(store
            .retrieve_tokens(ProviderKind::GoogleDrive)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_unknown_state_is_rejected_without_exchange() {
        let mut http = MockHttpClient::new();
        http.expect_execute().never();
        let (handler, _) = handler(http);

        let err = handler
            .handle(CallbackParams {
                code: Some("abc".to_string()),
                state: Some("forged".to_string()),
                error: None,
            })
            .await
            .unwrap_err();

        assert_eq!(err, AuthError::StateMismatch);
    }

    #[tokio::test]
    async fn test_state_is_single_use() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(token_response()));
        let (handler, _) = handler(http);

        let CallbackOutcome::Authorize { url } =
            handler.handle(CallbackParams::default()).await.unwrap()
        else {
            panic!("expected authorize outcome");
        };
        let params = CallbackParams {
            code: Some("abc".to_string()),
            state: Some(state_of(&url)),
            error: None,
        };

        handler.handle(params.clone()).await.unwrap();
        assert_eq!(handler.handle(params).await.unwrap_err(), AuthError::StateMismatch);
    }

    #[tokio::test]
    async fn test_expired_state_is_rejected() {
        let mut http = MockHttpClient::new();
        http.expect_execute().never();
        let (handler, _) = handler(http);
        let handler = handler.with_pending_ttl(Duration::ZERO);

        let CallbackOutcome::Authorize { url } =
            handler.handle(CallbackParams::default()).await.unwrap()
        else {
            panic!("expected authorize outcome");
        };

        let err = handler
            .handle(CallbackParams {
                code: Some("abc".to_string()),
                state: Some(state_of(&url)),
                error: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::StateMismatch);
    }

    #[tokio::test]
    async fn test_denied_consent() {
        let mut http = MockHttpClient::new();
        http.expect_execute().never();
        let (handler, _) = handler(http);

        let params = CallbackParams::from_query("error=access_denied").unwrap();
        assert_eq!(
            handler.handle(params).await.unwrap_err(),
            AuthError::AuthorizationDenied("access_denied".to_string())
        );
    }

    #[tokio::test]
    async fn test_disconnect_removes_token() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(token_response()));
        let (handler, _) = handler(http);

        handler.handle(CallbackParams::with_code("abc")).await.unwrap();
        assert!(handler.is_connected().await.unwrap());

        handler.disconnect().await.unwrap();
        assert!(!handler.is_connected().await.unwrap());
    }
}
