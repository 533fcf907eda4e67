//! # Gateway Configuration Module
//!
//! Provides configuration management for the drive gateway.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! `GatewayConfig` holding provider settings, timeouts, and the host bridges
//! the pipelines run on. Settings are usually read from the environment with
//! [`GatewayConfig::from_env`]; tests use [`GatewayConfig::from_lookup`] with a
//! map instead of touching process state.
//!
//! Missing provider credentials are **not** configuration errors. They are
//! reported per provider at listing time, so one unconfigured provider never
//! prevents the other from listing.
//!
//! ## Host Bridges (with platform defaults)
//!
//! - `HttpClient` - HTTP operations (desktop default: reqwest)
//! - `SecureStore` - Persisted OAuth tokens (desktop default: process memory,
//!   or the OS keychain with the `secure-store` feature)
//!
//! Without the `desktop-shims` feature both bridges must be injected, and
//! `build()` fails with [`Error::CapabilityMissing`] otherwise.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::GatewayConfig;
//! use std::time::Duration;
//!
//! let config = GatewayConfig::builder()
//!     .onedrive_client_credentials("client", "tenant", "secret")
//!     .provider_timeout(Duration::from_secs(10))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{HttpClient, RetryPolicy, SecureStore};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_FOLDER_ID: &str = "root";
pub const DEFAULT_GOOGLE_REDIRECT_URI: &str = "http://localhost:3000/api/auth";
pub const DEFAULT_POST_AUTH_REDIRECT: &str = "/drive";
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Environment variable names read by [`GatewayConfig::from_env`].
pub mod env {
    pub const ONEDRIVE_CLIENT_ID: &str = "ONEDRIVE_CLIENT_ID";
    pub const ONEDRIVE_TENANT_ID: &str = "ONEDRIVE_TENANT_ID";
    pub const ONEDRIVE_CLIENT_SECRET: &str = "ONEDRIVE_CLIENT_SECRET";
    pub const ONEDRIVE_ACCESS_TOKEN: &str = "ONEDRIVE_ACCESS_TOKEN";
    pub const ONEDRIVE_FOLDER_ID: &str = "ONEDRIVE_FOLDER_ID";
    pub const GOOGLE_SERVICE_ACCOUNT_EMAIL: &str = "GOOGLE_SERVICE_ACCOUNT_EMAIL";
    pub const GOOGLE_PRIVATE_KEY: &str = "GOOGLE_PRIVATE_KEY";
    pub const GOOGLE_DRIVE_FOLDER_ID: &str = "GOOGLE_DRIVE_FOLDER_ID";
    pub const GOOGLE_CLIENT_ID: &str = "GOOGLE_CLIENT_ID";
    pub const GOOGLE_CLIENT_SECRET: &str = "GOOGLE_CLIENT_SECRET";
    pub const GOOGLE_REDIRECT_URI: &str = "GOOGLE_REDIRECT_URI";
    pub const GOOGLE_POST_AUTH_REDIRECT: &str = "GOOGLE_POST_AUTH_REDIRECT";
    pub const GOOGLE_OAUTH_REQUIRE_STATE: &str = "GOOGLE_OAUTH_REQUIRE_STATE";
    pub const GATEWAY_PROVIDER_TIMEOUT_SECS: &str = "GATEWAY_PROVIDER_TIMEOUT_SECS";
    pub const GATEWAY_HTTP_TIMEOUT_SECS: &str = "GATEWAY_HTTP_TIMEOUT_SECS";
    pub const GATEWAY_MAX_RETRIES: &str = "GATEWAY_MAX_RETRIES";
}

fn presence(value: &Option<String>) -> &'static str {
    if value.is_some() {
        "<set>"
    } else {
        "<unset>"
    }
}

/// Treats blank values the same as unset ones.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Microsoft Graph (OneDrive) settings.
#[derive(Clone, PartialEq, Eq)]
pub struct OneDriveSettings {
    pub client_id: Option<String>,
    pub tenant_id: Option<String>,
    pub client_secret: Option<String>,
    /// Pre-issued bearer token, used only when no client credential is set.
    pub static_access_token: Option<String>,
    pub folder_id: String,
}

impl OneDriveSettings {
    /// True when none of client id, tenant id or client secret is set.
    pub fn client_credentials_absent(&self) -> bool {
        self.client_id.is_none() && self.tenant_id.is_none() && self.client_secret.is_none()
    }

    /// True when the static token fallback should be used instead of the
    /// client-credentials exchange.
    pub fn uses_static_token(&self) -> bool {
        self.client_credentials_absent() && self.static_access_token.is_some()
    }
}

impl fmt::Debug for OneDriveSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneDriveSettings")
            .field("client_id", &self.client_id)
            .field("tenant_id", &self.tenant_id)
            .field("client_secret", &presence(&self.client_secret))
            .field("static_access_token", &presence(&self.static_access_token))
            .field("folder_id", &self.folder_id)
            .finish()
    }
}

/// How the Google pipeline obtains its credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoogleAuthMode {
    /// Mint a signed service-account assertion per request.
    ServiceAccount,
    /// Use the token persisted by the interactive consent flow.
    InteractiveOAuth,
}

/// Google Drive settings.
#[derive(Clone, PartialEq, Eq)]
pub struct GoogleDriveSettings {
    pub service_account_email: Option<String>,
    pub private_key: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub post_auth_redirect: String,
    pub folder_id: String,
    /// Only accept OAuth callbacks whose `state` matches a started flow.
    pub require_state: bool,
}

impl Default for GoogleDriveSettings {
    fn default() -> Self {
        Self {
            service_account_email: None,
            private_key: None,
            client_id: None,
            client_secret: None,
            redirect_uri: DEFAULT_GOOGLE_REDIRECT_URI.to_string(),
            post_auth_redirect: DEFAULT_POST_AUTH_REDIRECT.to_string(),
            folder_id: DEFAULT_FOLDER_ID.to_string(),
            require_state: true,
        }
    }
}

impl GoogleDriveSettings {
    /// Any service-account field selects the service account. Otherwise a full
    /// OAuth client selects the interactive flow. With neither, the service
    /// account is selected and reports its missing fields when used.
    pub fn auth_mode(&self) -> GoogleAuthMode {
        let has_service_account =
            self.service_account_email.is_some() || self.private_key.is_some();
        let has_oauth_client = self.client_id.is_some() && self.client_secret.is_some();

        if !has_service_account && has_oauth_client {
            GoogleAuthMode::InteractiveOAuth
        } else {
            GoogleAuthMode::ServiceAccount
        }
    }

    pub fn has_oauth_client(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }
}

impl fmt::Debug for GoogleDriveSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleDriveSettings")
            .field("service_account_email", &self.service_account_email)
            .field("private_key", &presence(&self.private_key))
            .field("client_id", &self.client_id)
            .field("client_secret", &presence(&self.client_secret))
            .field("redirect_uri", &self.redirect_uri)
            .field("post_auth_redirect", &self.post_auth_redirect)
            .field("folder_id", &self.folder_id)
            .field("require_state", &self.require_state)
            .finish()
    }
}

/// Gateway configuration.
///
/// Use [`GatewayConfigBuilder`] (or [`GatewayConfig::from_env`]) to construct
/// instances; both run [`validate`](GatewayConfig::validate).
#[derive(Clone)]
pub struct GatewayConfig {
    pub onedrive: OneDriveSettings,
    pub google_drive: GoogleDriveSettings,

    /// Upper bound on one provider pipeline, token exchange included
    pub provider_timeout: Duration,

    /// Timeout applied to each outbound HTTP request
    pub http_timeout: Duration,

    /// Attempts per outbound request, the first one included
    pub max_attempts: u32,

    pub http_client: Arc<dyn HttpClient>,
    pub secure_store: Arc<dyn SecureStore>,
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("onedrive", &self.onedrive)
            .field("google_drive", &self.google_drive)
            .field("provider_timeout", &self.provider_timeout)
            .field("http_timeout", &self.http_timeout)
            .field("max_attempts", &self.max_attempts)
            .field("http_client", &"HttpClient { ... }")
            .field("secure_store", &"SecureStore { ... }")
            .finish()
    }
}

impl GatewayConfig {
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder::default()
    }

    /// Reads every setting from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup` instead of the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        GatewayConfigBuilder::from_lookup(lookup)?.build()
    }

    /// Retry policy for outbound requests.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default().with_max_attempts(self.max_attempts)
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Timeouts are non-zero
    /// - At least one attempt is made per request
    /// - Redirect targets are present
    pub fn validate(&self) -> Result<()> {
        if self.provider_timeout.is_zero() {
            return Err(Error::config(
                env::GATEWAY_PROVIDER_TIMEOUT_SECS,
                "provider timeout must be greater than 0 seconds",
            ));
        }

        if self.http_timeout.is_zero() {
            return Err(Error::config(
                env::GATEWAY_HTTP_TIMEOUT_SECS,
                "HTTP timeout must be greater than 0 seconds",
            ));
        }

        if self.max_attempts == 0 {
            return Err(Error::config(
                env::GATEWAY_MAX_RETRIES,
                "at least one attempt per request is required",
            ));
        }

        if self.max_attempts > 10 {
            return Err(Error::config(
                env::GATEWAY_MAX_RETRIES,
                "exceeds the maximum of 10 attempts",
            ));
        }

        if !self.google_drive.redirect_uri.starts_with("http://")
            && !self.google_drive.redirect_uri.starts_with("https://")
        {
            return Err(Error::config(
                env::GOOGLE_REDIRECT_URI,
                format!(
                    "must be an absolute http(s) URL, got '{}'",
                    self.google_drive.redirect_uri
                ),
            ));
        }

        if self.google_drive.post_auth_redirect.trim().is_empty() {
            return Err(Error::config(env::GOOGLE_POST_AUTH_REDIRECT, "cannot be empty"));
        }

        Ok(())
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::with_timeout(timeout).map_err(|e| {
        Error::Internal(format!("Failed to initialize default HttpClient: {}", e))
    })?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient",
        message: "HttpClient implementation is required for provider calls. \
                 Enable the 'desktop-shims' feature to use the default ReqwestHttpClient \
                 or inject one with .http_client()."
            .to_string(),
    })
}

#[cfg(feature = "secure-store")]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    Ok(Arc::new(bridge_desktop::KeyringSecureStore::new()))
}

#[cfg(all(feature = "desktop-shims", not(feature = "secure-store")))]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    Ok(Arc::new(bridge_desktop::InMemorySecureStore::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    Err(Error::CapabilityMissing {
        capability: "SecureStore",
        message: "SecureStore implementation is required to persist OAuth tokens. \
                 Enable the 'desktop-shims' feature (in-memory) or 'secure-store' (OS keychain), \
                 or inject one with .secure_store()."
            .to_string(),
    })
}

/// Builder for constructing [`GatewayConfig`] instances.
#[derive(Default)]
pub struct GatewayConfigBuilder {
    onedrive: OneDriveSettings,
    google_drive: GoogleDriveSettings,
    provider_timeout: Option<Duration>,
    http_timeout: Option<Duration>,
    max_attempts: Option<u32>,
    http_client: Option<Arc<dyn HttpClient>>,
    secure_store: Option<Arc<dyn SecureStore>>,
}

impl GatewayConfigBuilder {
    /// Populates provider settings and tuning knobs through `lookup`.
    ///
    /// Blank values count as unset. Numeric knobs that fail to parse are
    /// reported as [`Error::Config`] naming the variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| non_empty(lookup(key)).map(|v| v.trim().to_string());
        // Private keys keep their inner whitespace.
        let get_raw = |key: &str| non_empty(lookup(key));

        let onedrive = OneDriveSettings {
            client_id: get(env::ONEDRIVE_CLIENT_ID),
            tenant_id: get(env::ONEDRIVE_TENANT_ID),
            client_secret: get(env::ONEDRIVE_CLIENT_SECRET),
            static_access_token: get(env::ONEDRIVE_ACCESS_TOKEN),
            folder_id: get(env::ONEDRIVE_FOLDER_ID).unwrap_or_else(|| DEFAULT_FOLDER_ID.into()),
        };

        let require_state = match get(env::GOOGLE_OAUTH_REQUIRE_STATE) {
            None => true,
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(Error::config(
                        env::GOOGLE_OAUTH_REQUIRE_STATE,
                        format!("must be true or false, got '{}'", raw),
                    ))
                }
            },
        };

        let google_drive = GoogleDriveSettings {
            service_account_email: get(env::GOOGLE_SERVICE_ACCOUNT_EMAIL),
            private_key: get_raw(env::GOOGLE_PRIVATE_KEY),
            client_id: get(env::GOOGLE_CLIENT_ID),
            client_secret: get(env::GOOGLE_CLIENT_SECRET),
            redirect_uri: get(env::GOOGLE_REDIRECT_URI)
                .unwrap_or_else(|| DEFAULT_GOOGLE_REDIRECT_URI.into()),
            post_auth_redirect: get(env::GOOGLE_POST_AUTH_REDIRECT)
                .unwrap_or_else(|| DEFAULT_POST_AUTH_REDIRECT.into()),
            folder_id: get(env::GOOGLE_DRIVE_FOLDER_ID)
                .unwrap_or_else(|| DEFAULT_FOLDER_ID.into()),
            require_state,
        };

        let parse_u64 = |key: &'static str| -> Result<Option<u64>> {
            get(key)
                .map(|raw| {
                    raw.parse::<u64>().map_err(|_| {
                        Error::config(key, format!("must be a whole number, got '{}'", raw))
                    })
                })
                .transpose()
        };

        let provider_timeout =
            parse_u64(env::GATEWAY_PROVIDER_TIMEOUT_SECS)?.map(Duration::from_secs);
        let http_timeout = parse_u64(env::GATEWAY_HTTP_TIMEOUT_SECS)?.map(Duration::from_secs);
        let max_attempts = parse_u64(env::GATEWAY_MAX_RETRIES)?
            .map(|v| u32::try_from(v).unwrap_or(u32::MAX));

        Ok(Self {
            onedrive,
            google_drive,
            provider_timeout,
            http_timeout,
            max_attempts,
            http_client: None,
            secure_store: None,
        })
    }

    pub fn onedrive(mut self, settings: OneDriveSettings) -> Self {
        self.onedrive = settings;
        self
    }

    pub fn google_drive(mut self, settings: GoogleDriveSettings) -> Self {
        self.google_drive = settings;
        self
    }

    /// Sets the Microsoft client-credentials triple.
    pub fn onedrive_client_credentials(
        mut self,
        client_id: impl Into<String>,
        tenant_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.onedrive.client_id = Some(client_id.into());
        self.onedrive.tenant_id = Some(tenant_id.into());
        self.onedrive.client_secret = Some(client_secret.into());
        self
    }

    pub fn onedrive_folder_id(mut self, folder_id: impl Into<String>) -> Self {
        self.onedrive.folder_id = folder_id.into();
        self
    }

    pub fn google_service_account(
        mut self,
        email: impl Into<String>,
        private_key: impl Into<String>,
    ) -> Self {
        self.google_drive.service_account_email = Some(email.into());
        self.google_drive.private_key = Some(private_key.into());
        self
    }

    pub fn google_oauth_client(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.google_drive.client_id = Some(client_id.into());
        self.google_drive.client_secret = Some(client_secret.into());
        self
    }

    pub fn google_folder_id(mut self, folder_id: impl Into<String>) -> Self {
        self.google_drive.folder_id = folder_id.into();
        self
    }

    pub fn google_require_state(mut self, required: bool) -> Self {
        self.google_drive.require_state = required;
        self
    }

    /// Default: 30 seconds
    pub fn provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = Some(timeout);
        self
    }

    /// Default: 30 seconds
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    /// Default: 3
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not provided, the reqwest-based default is used when the
    /// `desktop-shims` feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the secure store that persists interactive OAuth tokens.
    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    /// Builds and validates the final `GatewayConfig`.
    ///
    /// Fails when a host bridge is missing and no default is available, or
    /// when a value is out of range.
    pub fn build(self) -> Result<GatewayConfig> {
        let http_timeout = self
            .http_timeout
            .unwrap_or(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS));

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(http_timeout)?,
        };

        let secure_store = match self.secure_store {
            Some(store) => store,
            None => provide_default_secure_store()?,
        };

        let config = GatewayConfig {
            onedrive: self.onedrive,
            google_drive: self.google_drive,
            provider_timeout: self
                .provider_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS)),
            http_timeout,
            max_attempts: self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            http_client,
            secure_store,
        };

        config.validate()?;

        Ok(config)
    }
}

impl Default for OneDriveSettings {
    fn default() -> Self {
        Self {
            client_id: None,
            tenant_id: None,
            client_secret: None,
            static_access_token: None,
            folder_id: DEFAULT_FOLDER_ID.to_string(),
        }
    }
}
