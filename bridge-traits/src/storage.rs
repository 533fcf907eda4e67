//! Cloud Storage Abstractions
//!
//! Shared data model for provider listings plus the traits every storage
//! connector and credential store implements.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::error::Result;

/// Sentinel folder id both providers understand as "top of the drive".
pub const ROOT_FOLDER_ID: &str = "root";

/// Seconds before `expires_at` at which a credential is treated as expired.
const EXPIRY_BUFFER_SECS: i64 = 60;

/// Cloud storage providers the gateway knows how to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProviderKind {
    GoogleDrive,
    OneDrive,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::GoogleDrive, ProviderKind::OneDrive];

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::GoogleDrive => "Google Drive",
            ProviderKind::OneDrive => "OneDrive",
        }
    }

    /// Stable identifier used in storage keys and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::GoogleDrive => "google_drive",
            ProviderKind::OneDrive => "onedrive",
        }
    }

    /// Accepts the identifier, the serialized variant name, or the display name.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "google_drive" | "googledrive" | "google drive" | "google" => {
                Some(ProviderKind::GoogleDrive)
            }
            "onedrive" | "one_drive" | "microsoft" => Some(ProviderKind::OneDrive),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A folder to list on one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderRef {
    pub provider: ProviderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
}

impl FolderRef {
    pub fn new(provider: ProviderKind, folder_id: impl Into<String>) -> Self {
        Self {
            provider,
            folder_id: Some(folder_id.into()),
        }
    }

    pub fn root(provider: ProviderKind) -> Self {
        Self {
            provider,
            folder_id: None,
        }
    }

    /// Folder id to send to the provider; unset or blank means `root`.
    pub fn resolved_id(&self) -> &str {
        match self.folder_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id,
            _ => ROOT_FOLDER_ID,
        }
    }
}

/// Normalized, provider-agnostic file record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub id: String,
    pub name: String,
    pub view_url: String,
    pub created_at: String,
    pub provider: ProviderKind,
    /// Empty when the provider does not report one.
    pub mime_type: String,
}

impl FileEntry {
    pub fn mime_type(&self) -> Option<&str> {
        (!self.mime_type.is_empty()).then_some(self.mime_type.as_str())
    }

    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.created_at)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// `(provider, id)` identifies an entry across the aggregated listing.
    pub fn key(&self) -> (ProviderKind, &str) {
        (self.provider, self.id.as_str())
    }
}

/// Bearer credential for one provider.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub provider: ProviderKind,
}

impl Credential {
    pub fn new(provider: ProviderKind, access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at: None,
            provider,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Expired, or within a minute of expiring. No expiry never expires.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now + Duration::seconds(EXPIRY_BUFFER_SECS) >= expires_at,
            None => false,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("provider", &self.provider)
            .finish()
    }
}

/// A listing call failed or returned something unparseable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{provider} listing failed: {message}")]
pub struct ListingError {
    pub provider: ProviderKind,
    pub message: String,
    pub cause: Option<String>,
}

impl ListingError {
    pub fn new(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self {
            provider,
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}

/// Storage provider trait
///
/// Lists one directory level of a provider and normalizes the raw records
/// into [`FileEntry`] values. Implementations never return partial entries:
/// a malformed record fails the whole call.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::{FolderRef, ProviderKind, StorageProvider};
///
/// async fn names(provider: &dyn StorageProvider, credential: &Credential) -> Vec<String> {
///     let folder = FolderRef::root(provider.kind());
///     let files = provider.list_files(&folder, credential).await.unwrap_or_default();
///     files.into_iter().map(|f| f.name).collect()
/// }
/// ```
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Provider this connector talks to
    fn kind(&self) -> ProviderKind;

    /// List the direct children of `folder`
    ///
    /// Entries keep the provider's order; pages are concatenated in order.
    async fn list_files(
        &self,
        folder: &FolderRef,
        credential: &Credential,
    ) -> std::result::Result<Vec<FileEntry>, ListingError>;
}

/// Secure credential storage trait
///
/// Abstracts secure storage mechanisms:
/// - macOS: Keychain
/// - Windows: Credential Manager
/// - Linux: Secret Service / libsecret
/// - Tests and servers: process memory
///
/// Implementations must never log or expose stored values.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SecureStore;
///
/// async fn store_token(store: &dyn SecureStore, token: &str) -> Result<()> {
///     store.set_secret("google_drive.oauth_tokens", token.as_bytes()).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SecureStore: Send + Sync {
    /// Store a secret value, replacing any previous one
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Retrieve a secret value
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Delete a secret; deleting a missing key is not an error
    async fn delete_secret(&self, key: &str) -> Result<()>;

    /// Check if a secret exists without retrieving it
    async fn has_secret(&self, key: &str) -> Result<bool> {
        Ok(self.get_secret(key).await?.is_some())
    }
}
