//! Provider fan-out and result aggregation.
//!
//! Each provider runs its own [`ProviderPipeline`] (credential, then listing).
//! Pipelines run concurrently and a failure in one is recorded as that
//! provider's [`ProviderError`] without touching the others.

use bridge_traits::storage::{FileEntry, FolderRef, ListingError, ProviderKind, StorageProvider};
use core_auth::{AuthError, TokenProvider};
use futures::future::join_all;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{debug, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

/// Which step of a pipeline failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ProviderErrorKind {
    /// Credentials missing or malformed; nothing was sent.
    AuthConfig,
    /// The credential exchange failed.
    AuthTransport,
    /// The listing call failed or returned an unusable body.
    Listing,
    /// The pipeline did not finish within the provider timeout.
    Timeout,
    /// The pipeline task panicked or was cancelled.
    Internal,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProviderErrorKind::AuthConfig => "authentication is not configured",
            ProviderErrorKind::AuthTransport => "authentication failed",
            ProviderErrorKind::Listing => "listing failed",
            ProviderErrorKind::Timeout => "timed out",
            ProviderErrorKind::Internal => "pipeline aborted",
        };
        f.write_str(label)
    }
}

/// Failure of one provider pipeline, reported as data.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("{provider} {kind}: {message}")]
pub struct ProviderError {
    pub provider: ProviderKind,
    pub kind: ProviderErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl ProviderError {
    pub fn new(provider: ProviderKind, kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            provider,
            kind,
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Classifies a credential failure. Transport failures keep the
    /// provider's error body as the cause.
    pub fn from_auth(provider: ProviderKind, error: AuthError) -> Self {
        match error {
            AuthError::Config { message, .. } => {
                Self::new(provider, ProviderErrorKind::AuthConfig, message)
            }
            AuthError::Transport { message, body, .. } => {
                let error = Self::new(provider, ProviderErrorKind::AuthTransport, message);
                match body {
                    Some(body) => error.with_cause(body),
                    None => error,
                }
            }
            AuthError::TokenCorrupted { reason, .. } => {
                Self::new(provider, ProviderErrorKind::AuthConfig, "stored token is corrupted")
                    .with_cause(reason)
            }
            AuthError::SecureStorageUnavailable(reason) => Self::new(
                provider,
                ProviderErrorKind::AuthConfig,
                "secure storage is unavailable",
            )
            .with_cause(reason),
            other => Self::new(provider, ProviderErrorKind::AuthTransport, other.to_string()),
        }
    }

    pub fn from_listing(error: ListingError) -> Self {
        Self {
            provider: error.provider,
            kind: ProviderErrorKind::Listing,
            message: error.message,
            cause: error.cause,
        }
    }

    pub fn not_configured(provider: ProviderKind) -> Self {
        Self::new(
            provider,
            ProviderErrorKind::AuthConfig,
            "no pipeline is configured for this provider",
        )
    }

    pub fn timeout(provider: ProviderKind, after: Duration) -> Self {
        Self::new(
            provider,
            ProviderErrorKind::Timeout,
            format!("no result within {} ms", after.as_millis()),
        )
    }

    pub fn aborted(provider: ProviderKind, error: &JoinError) -> Self {
        let message = if error.is_panic() {
            "pipeline panicked"
        } else {
            "pipeline was cancelled"
        };
        Self::new(provider, ProviderErrorKind::Internal, message)
    }
}

/// Result of one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ProviderOutcome {
    #[serde(rename = "files")]
    Files(Vec<FileEntry>),
    #[serde(rename = "error")]
    Failed(ProviderError),
}

impl ProviderOutcome {
    pub fn entries(&self) -> Option<&[FileEntry]> {
        match self {
            ProviderOutcome::Files(entries) => Some(entries.as_slice()),
            ProviderOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ProviderError> {
        match self {
            ProviderOutcome::Files(_) => None,
            ProviderOutcome::Failed(error) => Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProviderOutcome::Files(_))
    }
}

impl From<Result<Vec<FileEntry>, ProviderError>> for ProviderOutcome {
    fn from(result: Result<Vec<FileEntry>, ProviderError>) -> Self {
        match result {
            Ok(entries) => ProviderOutcome::Files(entries),
            Err(error) => ProviderOutcome::Failed(error),
        }
    }
}

/// Combined listing, keyed by provider.
///
/// Only requested providers appear. Serializes as
/// `{"byProvider": {"OneDrive": {"files": [...]}, "GoogleDrive": {"error": {...}}}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedListing {
    by_provider: BTreeMap<ProviderKind, ProviderOutcome>,
}

impl AggregatedListing {
    pub fn get(&self, provider: ProviderKind) -> Option<&ProviderOutcome> {
        self.by_provider.get(&provider)
    }

    pub fn entries(&self, provider: ProviderKind) -> Option<&[FileEntry]> {
        self.get(provider).and_then(ProviderOutcome::entries)
    }

    pub fn errors(&self) -> Vec<&ProviderError> {
        self.by_provider
            .values()
            .filter_map(ProviderOutcome::error)
            .collect()
    }

    pub fn providers(&self) -> Vec<ProviderKind> {
        self.by_provider.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.by_provider.is_empty()
    }

    /// Every listed entry, providers in key order.
    pub fn all_entries(&self) -> impl Iterator<Item = &FileEntry> {
        self.by_provider
            .values()
            .filter_map(ProviderOutcome::entries)
            .flatten()
    }

    fn insert(&mut self, provider: ProviderKind, outcome: ProviderOutcome) {
        self.by_provider.insert(provider, outcome);
    }
}

/// Credential acquisition followed by listing, for one provider.
#[derive(Clone)]
pub struct ProviderPipeline {
    token_provider: Arc<dyn TokenProvider>,
    client: Arc<dyn StorageProvider>,
}

impl ProviderPipeline {
    pub fn new(token_provider: Arc<dyn TokenProvider>, client: Arc<dyn StorageProvider>) -> Self {
        Self {
            token_provider,
            client,
        }
    }

    pub fn provider(&self) -> ProviderKind {
        self.client.kind()
    }

    /// Acquires one credential, then lists `folders` in order and
    /// concatenates them. The first failure fails the pipeline.
    pub async fn run(&self, folders: &[FolderRef]) -> Result<Vec<FileEntry>, ProviderError> {
        let provider = self.provider();

        let credential = self
            .token_provider
            .get_access_token()
            .await
            .map_err(|e| ProviderError::from_auth(provider, e))?;

        let mut entries = Vec::new();
        for folder in folders {
            let listed = self
                .client
                .list_files(folder, &credential)
                .await
                .map_err(ProviderError::from_listing)?;
            debug!(provider = %provider, folder_id = %folder.resolved_id(), count = listed.len(), "Folder listed");
            entries.extend(listed);
        }

        Ok(entries)
    }
}

/// Runs provider pipelines concurrently and merges their outcomes.
pub struct AggregationGateway {
    pipelines: HashMap<ProviderKind, ProviderPipeline>,
    provider_timeout: Duration,
}

impl AggregationGateway {
    pub fn new(provider_timeout: Duration) -> Self {
        Self {
            pipelines: HashMap::new(),
            provider_timeout,
        }
    }

    /// Registers `pipeline` under its provider, replacing any previous one.
    pub fn with_pipeline(mut self, pipeline: ProviderPipeline) -> Self {
        self.register(pipeline);
        self
    }

    pub fn register(&mut self, pipeline: ProviderPipeline) {
        if pipeline.token_provider.provider() != pipeline.provider() {
            warn!(
                client = %pipeline.provider(),
                token_provider = %pipeline.token_provider.provider(),
                "Pipeline mixes providers"
            );
        }
        self.pipelines.insert(pipeline.provider(), pipeline);
    }

    pub fn has_pipeline(&self, provider: ProviderKind) -> bool {
        self.pipelines.contains_key(&provider)
    }

    pub fn provider_timeout(&self) -> Duration {
        self.provider_timeout
    }

    /// Lists every folder in `refs`, one pipeline per distinct provider.
    ///
    /// Never fails: each provider ends up with either its entries or its
    /// error. Providers not named in `refs` are absent from the result.
    /// Pipelines run on their own tasks, so a panic in one is reported as
    /// that provider's `Internal` error. Must be called inside a tokio runtime.
    pub async fn list_all(&self, refs: &[FolderRef]) -> AggregatedListing {
        let request_id = Uuid::new_v4();
        let span = info_span!("list_all", request_id = %request_id);

        async move {
            let mut grouped: BTreeMap<ProviderKind, Vec<FolderRef>> = BTreeMap::new();
            for folder in refs {
                grouped.entry(folder.provider).or_default().push(folder.clone());
            }

            let timeout = self.provider_timeout;
            let runs = grouped.into_iter().map(|(provider, folders)| {
                let pipeline = self.pipelines.get(&provider).cloned();
                let task = tokio::spawn(
                    async move {
                        let Some(pipeline) = pipeline else {
                            return Err(ProviderError::not_configured(provider));
                        };
                        tokio::time::timeout(timeout, pipeline.run(&folders))
                            .await
                            .unwrap_or_else(|_| Err(ProviderError::timeout(provider, timeout)))
                    }
                    .instrument(Span::current()),
                );
                async move { (provider, task.await) }
            });

            let mut listing = AggregatedListing::default();
            for (provider, joined) in join_all(runs).await {
                let outcome = joined.unwrap_or_else(|e| Err(ProviderError::aborted(provider, &e)));

                match &outcome {
                    Ok(entries) => {
                        info!(provider = %provider, count = entries.len(), "Provider listed")
                    }
                    Err(error) => warn!(
                        provider = %provider,
                        kind = ?error.kind,
                        message = %error.message,
                        "Provider failed"
                    ),
                }

                listing.insert(provider, ProviderOutcome::from(outcome));
            }
            listing
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::storage::Credential;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeTokens {
        provider: ProviderKind,
        result: Result<String, AuthError>,
        calls: AtomicUsize,
    }

    impl FakeTokens {
        fn ok(provider: ProviderKind) -> Arc<Self> {
            Arc::new(Self {
                provider,
                result: Ok("token".to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(provider: ProviderKind, error: AuthError) -> Arc<Self> {
            Arc::new(Self {
                provider,
                result: Err(error),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TokenProvider for FakeTokens {
        fn provider(&self) -> ProviderKind {
            self.provider
        }

        async fn get_access_token(&self) -> core_auth::Result<Credential> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result
                .clone()
                .map(|token| Credential::new(self.provider, token))
        }
    }

    struct FakeListing {
        provider: ProviderKind,
        delay: Duration,
        fail: bool,
        panic: bool,
        seen: Mutex<Vec<String>>,
    }

    impl FakeListing {
        fn new(provider: ProviderKind) -> Self {
            Self {
                provider,
                delay: Duration::ZERO,
                fail: false,
                panic: false,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl StorageProvider for FakeListing {
        fn kind(&self) -> ProviderKind {
            self.provider
        }

        async fn list_files(
            &self,
            folder: &FolderRef,
            _credential: &Credential,
        ) -> Result<Vec<FileEntry>, ListingError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(ListingError::new(self.provider, "HTTP 500").with_cause("boom"));
            }
            if self.panic {
                panic!("connector bug");
            }
            let folder_id = folder.resolved_id().to_string();
            self.seen.lock().unwrap().push(folder_id.clone());
            Ok(vec![FileEntry {
                id: format!("{}-file", folder_id),
                name: "file".to_string(),
                view_url: "https://example.test/file".to_string(),
                created_at: "2024-01-01T00:00:00Z".to_string(),
                provider: self.provider,
                mime_type: String::new(),
            }])
        }
    }

    fn pipeline(tokens: Arc<FakeTokens>, listing: FakeListing) -> ProviderPipeline {
        ProviderPipeline::new(tokens, Arc::new(listing))
    }

    #[tokio::test]
    async fn test_one_failure_does_not_affect_other_provider() {
        let failing = FakeListing {
            fail: true,
            ..FakeListing::new(ProviderKind::OneDrive)
        };
        let gateway = AggregationGateway::new(Duration::from_secs(5))
            .with_pipeline(pipeline(FakeTokens::ok(ProviderKind::OneDrive), failing))
            .with_pipeline(pipeline(
                FakeTokens::ok(ProviderKind::GoogleDrive),
                FakeListing::new(ProviderKind::GoogleDrive),
            ));

        let listing = gateway
            .list_all(&[
                FolderRef::root(ProviderKind::OneDrive),
                FolderRef::root(ProviderKind::GoogleDrive),
            ])
            .await;

        assert_eq!(listing.entries(ProviderKind::GoogleDrive).unwrap().len(), 1);
        let errors = listing.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].provider, ProviderKind::OneDrive);
        assert_eq!(errors[0].kind, ProviderErrorKind::Listing);
        assert_eq!(errors[0].cause.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_panicking_provider_is_reported_alone() {
        let panicking = FakeListing {
            panic: true,
            ..FakeListing::new(ProviderKind::OneDrive)
        };
        let gateway = AggregationGateway::new(Duration::from_secs(5))
            .with_pipeline(pipeline(FakeTokens::ok(ProviderKind::OneDrive), panicking))
            .with_pipeline(pipeline(
                FakeTokens::ok(ProviderKind::GoogleDrive),
                FakeListing::new(ProviderKind::GoogleDrive),
            ));

        let listing = gateway
            .list_all(&[
                FolderRef::root(ProviderKind::OneDrive),
                FolderRef::root(ProviderKind::GoogleDrive),
            ])
            .await;

        assert_eq!(listing.entries(ProviderKind::GoogleDrive).unwrap().len(), 1);
        let error = listing.get(ProviderKind::OneDrive).unwrap().error().unwrap();
        assert_eq!(error.kind, ProviderErrorKind::Internal);
        assert_eq!(error.message, "pipeline panicked");
    }

    #[tokio::test]
    async fn test_auth_config_failure_skips_listing() {
        let listing_client = Arc::new(FakeListing::new(ProviderKind::OneDrive));
        let gateway = AggregationGateway::new(Duration::from_secs(5)).with_pipeline(
            ProviderPipeline::new(
                FakeTokens::failing(
                    ProviderKind::OneDrive,
                    AuthError::config(ProviderKind::OneDrive, "missing ONEDRIVE_CLIENT_ID"),
                ),
                listing_client.clone(),
            ),
        );

        let listing = gateway
            .list_all(&[FolderRef::root(ProviderKind::OneDrive)])
            .await;

        let error = listing.get(ProviderKind::OneDrive).unwrap().error().unwrap();
        assert_eq!(error.kind, ProviderErrorKind::AuthConfig);
        assert!(error.message.contains("ONEDRIVE_CLIENT_ID"));
        assert!(listing_client.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_body() {
        let gateway = AggregationGateway::new(Duration::from_secs(5)).with_pipeline(pipeline(
            FakeTokens::failing(
                ProviderKind::GoogleDrive,
                AuthError::transport(
                    ProviderKind::GoogleDrive,
                    "token endpoint returned HTTP 400",
                    Some(r#"{"error":"invalid_grant"}"#.to_string()),
                ),
            ),
            FakeListing::new(ProviderKind::GoogleDrive),
        ));

        let listing = gateway
            .list_all(&[FolderRef::root(ProviderKind::GoogleDrive)])
            .await;

        let error = &listing.errors()[0];
        assert_eq!(error.kind, ProviderErrorKind::AuthTransport);
        assert!(error.cause.as_deref().unwrap().contains("invalid_grant"));
    }

    #[tokio::test]
    async fn test_unrequested_provider_is_absent() {
        let gateway = AggregationGateway::new(Duration::from_secs(5))
            .with_pipeline(pipeline(
                FakeTokens::ok(ProviderKind::OneDrive),
                FakeListing::new(ProviderKind::OneDrive),
            ))
            .with_pipeline(pipeline(
                FakeTokens::ok(ProviderKind::GoogleDrive),
                FakeListing::new(ProviderKind::GoogleDrive),
            ));

        let listing = gateway
            .list_all(&[FolderRef::root(ProviderKind::OneDrive)])
            .await;

        assert_eq!(listing.providers(), vec![ProviderKind::OneDrive]);
        assert!(listing.get(ProviderKind::GoogleDrive).is_none());
        assert!(gateway.list_all(&[]).await.is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_provider_reports_auth_config() {
        let gateway = AggregationGateway::new(Duration::from_secs(5));

        let listing = gateway
            .list_all(&[FolderRef::root(ProviderKind::GoogleDrive)])
            .await;

        let error = listing.get(ProviderKind::GoogleDrive).unwrap().error().unwrap();
        assert_eq!(error.kind, ProviderErrorKind::AuthConfig);
    }

    #[tokio::test]
    async fn test_several_folders_share_one_credential() {
        let tokens = FakeTokens::ok(ProviderKind::OneDrive);
        let gateway = AggregationGateway::new(Duration::from_secs(5)).with_pipeline(pipeline(
            tokens.clone(),
            FakeListing::new(ProviderKind::OneDrive),
        ));

        let listing = gateway
            .list_all(&[
                FolderRef::new(ProviderKind::OneDrive, "b"),
                FolderRef::new(ProviderKind::OneDrive, "a"),
            ])
            .await;

        let ids: Vec<_> = listing
            .entries(ProviderKind::OneDrive)
            .unwrap()
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(ids, vec!["b-file", "a-file"]);
        assert_eq!(tokens.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_provider_times_out_alone() {
        let slow = FakeListing {
            delay: Duration::from_secs(5),
            ..FakeListing::new(ProviderKind::GoogleDrive)
        };
        let gateway = AggregationGateway::new(Duration::from_millis(50))
            .with_pipeline(pipeline(FakeTokens::ok(ProviderKind::GoogleDrive), slow))
            .with_pipeline(pipeline(
                FakeTokens::ok(ProviderKind::OneDrive),
                FakeListing::new(ProviderKind::OneDrive),
            ));

        let listing = gateway
            .list_all(&[
                FolderRef::root(ProviderKind::GoogleDrive),
                FolderRef::root(ProviderKind::OneDrive),
            ])
            .await;

        assert!(listing.get(ProviderKind::OneDrive).unwrap().is_success());
        let error = listing.get(ProviderKind::GoogleDrive).unwrap().error().unwrap();
        assert_eq!(error.kind, ProviderErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_serialized_shape() {
        let failing = FakeListing {
            fail: true,
            ..FakeListing::new(ProviderKind::GoogleDrive)
        };
        let gateway = AggregationGateway::new(Duration::from_secs(5))
            .with_pipeline(pipeline(
                FakeTokens::ok(ProviderKind::OneDrive),
                FakeListing::new(ProviderKind::OneDrive),
            ))
            .with_pipeline(pipeline(FakeTokens::ok(ProviderKind::GoogleDrive), failing));

        let listing = gateway
            .list_all(&[
                FolderRef::root(ProviderKind::OneDrive),
                FolderRef::root(ProviderKind::GoogleDrive),
            ])
            .await;

        let value = serde_json::to_value(&listing).unwrap();
        assert_eq!(
            value["byProvider"]["OneDrive"]["files"][0]["id"],
            "root-file"
        );
        assert_eq!(
            value["byProvider"]["GoogleDrive"]["error"],
            serde_json::json!({
                "provider": "GoogleDrive",
                "kind": "listing",
                "message": "HTTP 500",
                "cause": "boom"
            })
        );
    }
}
