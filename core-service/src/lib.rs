//! Core service façade and bootstrap helpers.
//!
//! This crate wires a [`GatewayConfig`] into one [`ProviderPipeline`] per
//! provider and exposes the inbound operations of the gateway:
//!
//! - [`GatewayService::list_all`] lists caller-chosen folders
//! - [`GatewayService::list_configured`] lists the configured default folders
//! - [`GatewayService::handle_oauth_callback`] drives the Google consent flow
//!
//! Desktop hosts enable the `desktop-shims` feature so the configuration can
//! fall back to the reqwest HTTP client; `secure-store` adds the OS keychain.
//!
//! ```no_run
//! # async fn example() -> core_service::Result<()> {
//! use core_service::GatewayService;
//!
//! let service = GatewayService::from_env()?;
//! let listing = service.list_configured().await;
//! for error in listing.errors() {
//!     eprintln!("{}", error);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod gateway;

pub use error::{CoreError, Result};
pub use gateway::{
    AggregatedListing, AggregationGateway, ProviderError, ProviderErrorKind, ProviderOutcome,
    ProviderPipeline,
};

pub use bridge_traits::storage::{FileEntry, FolderRef, ProviderKind};
pub use core_auth::{CallbackOutcome, CallbackParams};
pub use core_runtime::config::GatewayConfig;

use core_auth::{
    AuthError, ClientCredentialsTokenProvider, OAuthCallbackHandler, OAuthConfig,
    OAuthFlowManager, ServiceAccountTokenProvider, StaticTokenProvider, StoredTokenProvider,
    TokenProvider, TokenStore,
};
use core_runtime::config::GoogleAuthMode;
use provider_google_drive::GoogleDriveConnector;
use provider_onedrive::OneDriveConnector;
use std::sync::Arc;
use tracing::{info, warn};

/// Primary façade exposed to host applications.
pub struct GatewayService {
    config: GatewayConfig,
    gateway: AggregationGateway,
    callback: Option<OAuthCallbackHandler>,
}

impl GatewayService {
    /// Builds the service from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_config(GatewayConfig::from_env()?)
    }

    /// Builds both provider pipelines from `config`.
    ///
    /// Incomplete credentials do not fail construction; the affected provider
    /// reports an `AuthConfig` error when it is listed.
    pub fn from_config(config: GatewayConfig) -> Result<Self> {
        config.validate()?;

        let gateway = AggregationGateway::new(config.provider_timeout)
            .with_pipeline(Self::onedrive_pipeline(&config))
            .with_pipeline(Self::google_pipeline(&config)?);

        let callback = if config.google_drive.has_oauth_client() {
            Some(OAuthCallbackHandler::new(
                Self::google_flow(&config)?,
                TokenStore::new(config.secure_store.clone()),
                config.google_drive.post_auth_redirect.clone(),
            )
            .with_state_required(config.google_drive.require_state))
        } else {
            None
        };

        info!(
            google_auth = ?config.google_drive.auth_mode(),
            onedrive_static_token = config.onedrive.uses_static_token(),
            oauth_callback = callback.is_some(),
            "Gateway service initialized"
        );

        Ok(Self {
            config,
            gateway,
            callback,
        })
    }

    /// Use a hand-assembled gateway, e.g. with custom pipelines.
    pub fn with_gateway(mut self, gateway: AggregationGateway) -> Self {
        self.gateway = gateway;
        self
    }

    fn onedrive_pipeline(config: &GatewayConfig) -> ProviderPipeline {
        let http = config.http_client.clone();
        let settings = &config.onedrive;

        let token_provider: Arc<dyn TokenProvider> = match settings.static_access_token.as_ref() {
            Some(token) if settings.uses_static_token() => Arc::new(StaticTokenProvider::new(
                ProviderKind::OneDrive,
                token.clone(),
            )),
            _ => Arc::new(ClientCredentialsTokenProvider::from_settings(
                settings,
                http.clone(),
            )),
        };

        let connector = OneDriveConnector::new(http)
            .with_retry_policy(config.retry_policy())
            .with_request_timeout(config.http_timeout);

        ProviderPipeline::new(token_provider, Arc::new(connector))
    }

    fn google_pipeline(config: &GatewayConfig) -> Result<ProviderPipeline> {
        let http = config.http_client.clone();
        let settings = &config.google_drive;

        let token_provider: Arc<dyn TokenProvider> = match settings.auth_mode() {
            GoogleAuthMode::ServiceAccount => Arc::new(ServiceAccountTokenProvider::from_settings(
                settings,
                http.clone(),
            )),
            GoogleAuthMode::InteractiveOAuth => Arc::new(StoredTokenProvider::new(
                TokenStore::new(config.secure_store.clone()),
                Some(Self::google_flow(config)?),
            )),
        };

        let connector = GoogleDriveConnector::new(http)
            .with_retry_policy(config.retry_policy())
            .with_request_timeout(config.http_timeout);

        Ok(ProviderPipeline::new(token_provider, Arc::new(connector)))
    }

    fn google_flow(config: &GatewayConfig) -> Result<OAuthFlowManager> {
        let oauth_config = OAuthConfig::google_from_settings(&config.google_drive)?;
        Ok(OAuthFlowManager::new(oauth_config, config.http_client.clone())
            .with_refresh_policy(config.retry_policy()))
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn gateway(&self) -> &AggregationGateway {
        &self.gateway
    }

    /// Lists `refs`; see [`AggregationGateway::list_all`].
    pub async fn list_all(&self, refs: &[FolderRef]) -> AggregatedListing {
        self.gateway.list_all(refs).await
    }

    /// Folders listed when the caller does not choose any.
    pub fn configured_folders(&self) -> Vec<FolderRef> {
        vec![
            FolderRef::new(ProviderKind::OneDrive, self.config.onedrive.folder_id.clone()),
            FolderRef::new(
                ProviderKind::GoogleDrive,
                self.config.google_drive.folder_id.clone(),
            ),
        ]
    }

    pub async fn list_configured(&self) -> AggregatedListing {
        self.gateway.list_all(&self.configured_folders()).await
    }

    fn callback_handler(&self) -> Result<&OAuthCallbackHandler> {
        self.callback.as_ref().ok_or_else(|| {
            CoreError::Auth(AuthError::config(
                ProviderKind::GoogleDrive,
                "missing GOOGLE_CLIENT_ID, GOOGLE_CLIENT_SECRET",
            ))
        })
    }

    /// Starts (no `code`) or completes (with `code`) the Google consent flow.
    pub async fn handle_oauth_callback(&self, params: CallbackParams) -> Result<CallbackOutcome> {
        let handler = self.callback_handler()?;
        handler.handle(params).await.map_err(|e| {
            warn!(error = %e, "OAuth callback failed");
            CoreError::Auth(e)
        })
    }

    /// Forgets the stored Google token.
    pub async fn disconnect_google(&self) -> Result<()> {
        Ok(self.callback_handler()?.disconnect().await?)
    }

    pub async fn google_connected(&self) -> Result<bool> {
        Ok(self.callback_handler()?.is_connected().await?)
    }
}
