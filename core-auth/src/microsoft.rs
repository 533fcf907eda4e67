//! Microsoft identity platform client-credentials grant.

use crate::error::{AuthError, Result};
use crate::oauth::request_token;
use crate::token_provider::TokenProvider;
use crate::types::{Credential, ProviderKind};
use async_trait::async_trait;
use bridge_traits::http::HttpClient;
use bridge_traits::time::{Clock, SystemClock};
use chrono::Duration;
use core_runtime::config::OneDriveSettings;
use std::sync::Arc;
use tracing::{debug, instrument};

pub const MICROSOFT_LOGIN_BASE_URL: &str = "https://login.microsoftonline.com";
pub const GRAPH_DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Mints an app-only Graph token per call. Nothing is cached.
pub struct ClientCredentialsTokenProvider {
    client_id: Option<String>,
    tenant_id: Option<String>,
    client_secret: Option<String>,
    login_base_url: String,
    http_client: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
}

impl ClientCredentialsTokenProvider {
    pub fn new(
        client_id: Option<String>,
        tenant_id: Option<String>,
        client_secret: Option<String>,
        http_client: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            client_id,
            tenant_id,
            client_secret,
            login_base_url: MICROSOFT_LOGIN_BASE_URL.to_string(),
            http_client,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn from_settings(settings: &OneDriveSettings, http_client: Arc<dyn HttpClient>) -> Self {
        Self::new(
            settings.client_id.clone(),
            settings.tenant_id.clone(),
            settings.client_secret.clone(),
            http_client,
        )
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_login_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.login_base_url = base_url.into();
        self
    }

    fn token_url(&self, tenant_id: &str) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.login_base_url.trim_end_matches('/'),
            tenant_id
        )
    }

    /// Returns (client_id, tenant_id, client_secret) or a config error naming
    /// every missing variable.
    fn require_credentials(&self) -> Result<(&str, &str, &str)> {
        fn present(value: &Option<String>) -> Option<&str> {
            value.as_deref().map(str::trim).filter(|v| !v.is_empty())
        }

        let client_id = present(&self.client_id);
        let tenant_id = present(&self.tenant_id);
        let client_secret = present(&self.client_secret);

        match (client_id, tenant_id, client_secret) {
            (Some(id), Some(tenant), Some(secret)) => Ok((id, tenant, secret)),
            _ => {
                let missing: Vec<&str> = [
                    ("ONEDRIVE_CLIENT_ID", client_id.is_none()),
                    ("ONEDRIVE_TENANT_ID", tenant_id.is_none()),
                    ("ONEDRIVE_CLIENT_SECRET", client_secret.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();

                Err(AuthError::config(
                    ProviderKind::OneDrive,
                    format!("missing {}", missing.join(", ")),
                ))
            }
        }
    }
}

#[async_trait]
impl TokenProvider for ClientCredentialsTokenProvider {
    fn provider(&self) -> ProviderKind {
        ProviderKind::OneDrive
    }

    #[instrument(skip(self), fields(provider = "OneDrive"))]
    async fn get_access_token(&self) -> Result<Credential> {
        let (client_id, tenant_id, client_secret) = self.require_credentials()?;
        let token_url = self.token_url(tenant_id);

        let params = [
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("scope", GRAPH_DEFAULT_SCOPE),
            ("grant_type", "client_credentials"),
        ];

        let response = request_token(
            self.http_client.as_ref(),
            ProviderKind::OneDrive,
            &token_url,
            &params,
            None,
        )
        .await?;

        debug!(expires_in = ?response.expires_in, "Acquired Graph access token");

        let mut credential = Credential::new(ProviderKind::OneDrive, response.access_token);
        if let Some(expires_in) = response.expires_in {
            credential = credential.with_expiry(self.clock.now() + Duration::seconds(expires_in));
        }
        Ok(credential)
    }
}
