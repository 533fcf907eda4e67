//! Google Drive API connector implementation
//!
//! Implements the `StorageProvider` trait for Google Drive API v3.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::storage::{Credential, FileEntry, FolderRef, ListingError, ProviderKind, StorageProvider};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{GoogleDriveError, Result};
use crate::types::{ApiErrorResponse, FilesListResponse};

/// Google Drive API base URL
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Maximum results per page (Google Drive API limit)
const MAX_PAGE_SIZE: u32 = 1000;

/// Fields to request for the listing
const LIST_FIELDS: &str = "nextPageToken,files(id,name,mimeType,webViewLink,createdTime)";

const DEFAULT_MAX_PAGES: usize = 50;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Google Drive API connector
///
/// Lists the direct children of one folder through `files.list`, following
/// `nextPageToken`, and normalizes every record into a [`FileEntry`].
///
/// # Example
///
/// ```ignore
/// use provider_google_drive::GoogleDriveConnector;
/// use bridge_traits::storage::{FolderRef, ProviderKind, StorageProvider};
///
/// let connector = GoogleDriveConnector::new(http_client);
/// let files = connector
///     .list_files(&FolderRef::root(ProviderKind::GoogleDrive), &credential)
///     .await?;
/// ```
pub struct GoogleDriveConnector {
    http_client: Arc<dyn HttpClient>,
    api_base: String,
    retry_policy: RetryPolicy,
    request_timeout: Duration,
    max_pages: usize,
}

impl GoogleDriveConnector {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            api_base: DRIVE_API_BASE.to_string(),
            retry_policy: RetryPolicy::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// `'{folder_id}' in parents`, with quotes and backslashes in the id escaped.
    pub fn parents_query(folder_id: &str) -> String {
        let escaped = folder_id.replace('\\', "\\\\").replace('\'', "\\'");
        format!("'{}' in parents", escaped)
    }

    fn list_url(&self, folder_id: &str, page_token: Option<&str>) -> String {
        let mut url = format!(
            "{}/files?q={}&fields={}&pageSize={}",
            self.api_base.trim_end_matches('/'),
            urlencoding::encode(&Self::parents_query(folder_id)),
            urlencoding::encode(LIST_FIELDS),
            MAX_PAGE_SIZE
        );

        if let Some(page_token) = page_token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(page_token)));
        }

        url
    }

    /// Pulls a readable message out of a Google error body, falling back to
    /// the raw text.
    fn api_error(response: &HttpResponse) -> GoogleDriveError {
        let message = serde_json::from_slice::<ApiErrorResponse>(&response.body)
            .map(|envelope| envelope.error.message)
            .ok()
            .filter(|message| !message.is_empty())
            .or_else(|| response.error_body())
            .unwrap_or_default();

        GoogleDriveError::ApiError {
            status_code: response.status,
            message,
        }
    }

    /// Execute API request with retry logic
    ///
    /// Retries 429, 5xx and transport failures with exponential backoff,
    /// honoring `Retry-After` when Drive sends one.
    #[instrument(skip(self, credential, url))]
    async fn get_with_retry(&self, url: &str, credential: &Credential) -> Result<HttpResponse> {
        let max_attempts = self.retry_policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let request = HttpRequest::new(HttpMethod::Get, url)
                .bearer_token(&credential.access_token)
                .header("Accept", "application/json")
                .timeout(self.request_timeout);

            let delay = match self.http_client.execute(request).await {
                Ok(response) if response.is_success() => {
                    debug!(status = response.status, attempt, "Drive request succeeded");
                    return Ok(response);
                }
                Ok(response) if response.is_retryable() => {
                    if attempt >= max_attempts {
                        warn!(status = response.status, attempts = attempt, "Drive request failed after retries");
                        return Err(if response.status == 429 {
                            GoogleDriveError::RateLimitExceeded {
                                retry_after_seconds: response.retry_after_seconds().unwrap_or(0),
                            }
                        } else {
                            Self::api_error(&response)
                        });
                    }

                    let backoff = response
                        .retry_after_seconds()
                        .map(Duration::from_secs)
                        .map(|d| d.min(self.retry_policy.max_delay))
                        .unwrap_or_else(|| self.retry_policy.delay_for(attempt));
                    warn!(
                        status = response.status,
                        attempt,
                        max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        "Drive request failed, retrying"
                    );
                    backoff
                }
                Ok(response) => {
                    warn!(status = response.status, "Drive request rejected");
                    return Err(Self::api_error(&response));
                }
                Err(e) => {
                    if attempt >= max_attempts {
                        warn!(error = %e, attempts = attempt, "Drive request failed after retries");
                        return Err(GoogleDriveError::NetworkError(e.to_string()));
                    }

                    let backoff = self.retry_policy.delay_for(attempt);
                    warn!(
                        error = %e,
                        attempt,
                        max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        "Drive request failed, retrying"
                    );
                    backoff
                }
            };

            tokio::time::sleep(delay).await;
        }
    }

    async fn list_folder(&self, folder_id: &str, credential: &Credential) -> Result<Vec<FileEntry>> {
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;

        for page in 0..self.max_pages {
            let url = self.list_url(folder_id, page_token.as_deref());
            let response = self.get_with_retry(&url, credential).await?;

            let list: FilesListResponse = serde_json::from_slice(&response.body).map_err(|e| {
                GoogleDriveError::ParseError(format!("Failed to parse files list response: {}", e))
            })?;

            debug!(page, files = list.files.len(), "Fetched Drive page");
            entries.extend(list.files.into_iter().map(|file| file.into_file_entry()));

            match list.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => return Ok(entries),
            }
        }

        Err(GoogleDriveError::PageLimitExceeded(self.max_pages))
    }
}

#[async_trait]
impl StorageProvider for GoogleDriveConnector {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GoogleDrive
    }

    #[instrument(skip(self, credential), fields(folder_id = %folder.resolved_id()))]
    async fn list_files(
        &self,
        folder: &FolderRef,
        credential: &Credential,
    ) -> std::result::Result<Vec<FileEntry>, ListingError> {
        let entries = self
            .list_folder(folder.resolved_id(), credential)
            .await
            .map_err(ListingError::from)?;

        info!(count = entries.len(), "Listed files from Google Drive");
        Ok(entries)
    }
}
