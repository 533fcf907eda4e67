//! Microsoft Graph (OneDrive) connector.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::storage::{Credential, FileEntry, FolderRef, ListingError, ProviderKind, StorageProvider};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{OneDriveError, Result};
use crate::types::{ChildrenResponse, GraphErrorResponse};

/// Microsoft Graph base URL
pub const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";

const SELECT_FIELDS: &str = "id,name,webUrl,createdDateTime";
const DEFAULT_MAX_PAGES: usize = 50;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Lists the children of one OneDrive folder.
///
/// Pages are fetched by following `@odata.nextLink` until Graph stops
/// returning one or `max_pages` is reached.
pub struct OneDriveConnector {
    http_client: Arc<dyn HttpClient>,
    api_base: String,
    retry_policy: RetryPolicy,
    request_timeout: Duration,
    max_pages: usize,
}

impl OneDriveConnector {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            api_base: GRAPH_API_BASE.to_string(),
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

    pub fn children_url(&self, folder_id: &str) -> String {
        format!(
            "{}/me/drive/items/{}/children?$select={}",
            self.api_base.trim_end_matches('/'),
            urlencoding::encode(folder_id),
            SELECT_FIELDS
        )
    }

    /// The bearer token is only ever sent below `api_base`.
    fn is_graph_link(&self, link: &str) -> bool {
        let base = self.api_base.trim_end_matches('/');
        link.strip_prefix(base)
            .is_some_and(|rest| rest.starts_with('/') || rest.starts_with('?'))
    }

    fn api_error(response: &HttpResponse) -> OneDriveError {
        let message = serde_json::from_slice::<GraphErrorResponse>(&response.body)
            .map(|envelope| envelope.error.summary())
            .ok()
            .filter(|summary| !summary.is_empty())
            .or_else(|| response.error_body())
            .unwrap_or_default();

        if response.status == 401 {
            OneDriveError::AuthRequired(message)
        } else {
            OneDriveError::ApiError {
                status_code: response.status,
                message,
            }
        }
    }

    /// GET with bounded retries on throttling, 5xx and transport failures.
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

            let outcome = self.http_client.execute(request).await;
            let retry_after = match &outcome {
                Ok(response) if response.is_success() => None,
                Ok(response) if response.is_retryable() => response.retry_after_seconds(),
                _ => None,
            };

            match outcome {
                Ok(response) if response.is_success() => {
                    debug!(status = response.status, attempt, "Graph request succeeded");
                    return Ok(response);
                }
                Ok(response) if response.is_retryable() && attempt < max_attempts => {
                    warn!(status = response.status, attempt, max_attempts, "Graph request failed, retrying");
                }
                Ok(response) if response.status == 429 => {
                    warn!(attempts = attempt, "Graph kept throttling");
                    return Err(OneDriveError::Throttled(retry_after.unwrap_or(0)));
                }
                Ok(response) => {
                    warn!(status = response.status, attempts = attempt, "Graph request failed");
                    return Err(Self::api_error(&response));
                }
                Err(e) if attempt < max_attempts => {
                    warn!(error = %e, attempt, max_attempts, "Graph request failed, retrying");
                }
                Err(e) => {
                    warn!(error = %e, attempts = attempt, "Graph request failed after retries");
                    return Err(OneDriveError::NetworkError(e.to_string()));
                }
            }

            let delay = retry_after
                .map(|secs| Duration::from_secs(secs).min(self.retry_policy.max_delay))
                .unwrap_or_else(|| self.retry_policy.delay_for(attempt));
            tokio::time::sleep(delay).await;
        }
    }

    async fn list_folder(&self, folder_id: &str, credential: &Credential) -> Result<Vec<FileEntry>> {
        let mut entries = Vec::new();
        let mut url = self.children_url(folder_id);

        for page in 0..self.max_pages {
            let response = self.get_with_retry(&url, credential).await?;
            let children: ChildrenResponse = serde_json::from_slice(&response.body)
                .map_err(|e| OneDriveError::ParseError(e.to_string()))?;

            debug!(page, items = children.value.len(), "Fetched Graph page");
            entries.extend(children.value.into_iter().map(|item| item.into_file_entry()));

            match children.next_link.filter(|link| !link.is_empty()) {
                Some(next) if self.is_graph_link(&next) => url = next,
                Some(next) => {
                    warn!(next_link = %next, "Next page link leaves Graph");
                    return Err(OneDriveError::ForeignNextLink(next));
                }
                None => return Ok(entries),
            }
        }

        Err(OneDriveError::PageLimitExceeded(self.max_pages))
    }
}

#[async_trait]
impl StorageProvider for OneDriveConnector {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OneDrive
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

        info!(count = entries.len(), "Listed files from OneDrive");
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bytes::Bytes;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn credential() -> Credential {
        Credential::new(ProviderKind::OneDrive, "eyJ0.graph")
    }

    fn connector(http: MockHttpClient) -> OneDriveConnector {
        OneDriveConnector::new(Arc::new(http))
            .with_retry_policy(RetryPolicy::default().with_base_delay(Duration::from_millis(1)))
    }

    #[tokio::test]
    async fn test_canned_response_is_normalized_exactly() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .withf(|request| {
                request.url
                    == "https://graph.microsoft.com/v1.0/me/drive/items/root/children?$select=id,name,webUrl,createdDateTime"
                    && request.headers.get("Authorization").map(String::as_str)
                        == Some("Bearer eyJ0.graph")
            })
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"value":[{"id":"1","name":"a.txt","webUrl":"https://x/a","createdDateTime":"2024-01-01T00:00:00Z"}]}"#,
                ))
            });

        let files = connector(http)
            .list_files(&FolderRef::root(ProviderKind::OneDrive), &credential())
            .await
            .unwrap();

        assert_eq!(
            serde_json::to_value(&files).unwrap(),
            serde_json::json!([{
                "id": "1",
                "name": "a.txt",
                "viewUrl": "https://x/a",
                "createdAt": "2024-01-01T00:00:00Z",
                "provider": "OneDrive",
                "mimeType": ""
            }])
        );
    }

    #[tokio::test]
    async fn test_empty_folder_id_uses_root() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .withf(|request| request.url.contains("/items/root/children"))
            .returning(|_| Ok(response(200, r#"{"value":[]}"#)));

        let files = connector(http)
            .list_files(&FolderRef::new(ProviderKind::OneDrive, ""), &credential())
            .await
            .unwrap();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_follows_next_link() {
        let mut http = MockHttpClient::new();
        let mut seq = mockall::Sequence::new();
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"value":[{"id":"1","name":"a","webUrl":"https://x/1","createdDateTime":"2024-01-01T00:00:00Z"}],
                        "@odata.nextLink":"https://graph.microsoft.com/v1.0/me/drive/items/root/children?$skiptoken=n2"}"#,
                ))
            });
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|request| request.url.ends_with("$skiptoken=n2"))
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"value":[{"id":"2","name":"b","webUrl":"https://x/2","createdDateTime":"2024-01-02T00:00:00Z"}]}"#,
                ))
            });

        let files = connector(http)
            .list_files(&FolderRef::root(ProviderKind::OneDrive), &credential())
            .await
            .unwrap();

        let ids: Vec<_> = files.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_foreign_next_link_is_not_followed() {
        let mut http = MockHttpClient::new();
        http.expect_execute().times(1).returning(|_| {
            Ok(response(
                200,
                r#"{"value":[],"@odata.nextLink":"https://graph.microsoft.com.evil.example/v1.0/steal"}"#,
            ))
        });

        let err = connector(http)
            .list_files(&FolderRef::root(ProviderKind::OneDrive), &credential())
            .await
            .unwrap_err();

        assert_eq!(err.provider, ProviderKind::OneDrive);
        assert!(err.message.contains("evil.example"));
    }

    #[test]
    fn test_graph_link_must_sit_below_api_base() {
        let connector = OneDriveConnector::new(Arc::new(MockHttpClient::new()));

        assert!(connector.is_graph_link("https://graph.microsoft.com/v1.0/me/drive/items/root/children?$skiptoken=n2"));
        assert!(!connector.is_graph_link("https://graph.microsoft.com/v1.0evil/x"));
        assert!(!connector.is_graph_link("https://attacker.example/v1.0/me"));
    }

    #[tokio::test]
    async fn test_missing_field_fails_whole_listing() {
        let mut http = MockHttpClient::new();
        http.expect_execute().times(1).returning(|_| {
            Ok(response(
                200,
                r#"{"value":[
                    {"id":"1","name":"a","webUrl":"https://x/1","createdDateTime":"2024-01-01T00:00:00Z"},
                    {"id":"2","name":"b","createdDateTime":"2024-01-01T00:00:00Z"}
                ]}"#,
            ))
        });

        let err = connector(http)
            .list_files(&FolderRef::root(ProviderKind::OneDrive), &credential())
            .await
            .unwrap_err();

        assert_eq!(err.provider, ProviderKind::OneDrive);
        assert_eq!(err.message, "malformed response body");
        assert!(err.cause.unwrap().contains("webUrl"));
    }

    #[tokio::test]
    async fn test_server_error_exhausts_retries() {
        let mut http = MockHttpClient::new();
        http.expect_execute().times(3).returning(|_| {
            Ok(response(
                500,
                r#"{"error":{"code":"generalException","message":"An unspecified error occurred."}}"#,
            ))
        });

        let err = connector(http)
            .list_files(&FolderRef::root(ProviderKind::OneDrive), &credential())
            .await
            .unwrap_err();

        assert_eq!(err.message, "HTTP 500");
        assert_eq!(
            err.cause.as_deref(),
            Some("generalException: An unspecified error occurred.")
        );
    }

    #[tokio::test]
    async fn test_throttling_recovers() {
        let mut http = MockHttpClient::new();
        let mut seq = mockall::Sequence::new();
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                let mut throttled = response(429, "");
                throttled
                    .headers
                    .insert("Retry-After".to_string(), "0".to_string());
                Ok(throttled)
            });
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(response(200, r#"{"value":[]}"#)));

        assert!(connector(http)
            .list_files(&FolderRef::root(ProviderKind::OneDrive), &credential())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_persistent_throttling() {
        let mut http = MockHttpClient::new();
        http.expect_execute().times(2).returning(|_| Ok(response(429, "")));

        let err = connector(http)
            .with_retry_policy(
                RetryPolicy::default()
                    .with_max_attempts(2)
                    .with_base_delay(Duration::from_millis(1)),
            )
            .list_files(&FolderRef::root(ProviderKind::OneDrive), &credential())
            .await
            .unwrap_err();

        assert!(err.message.starts_with("Throttled"));
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_retried() {
        let mut http = MockHttpClient::new();
        http.expect_execute().times(1).returning(|_| {
            Ok(response(
                401,
                r#"{"error":{"code":"InvalidAuthenticationToken","message":"Access token has expired."}}"#,
            ))
        });

        let err = connector(http)
            .list_files(&FolderRef::root(ProviderKind::OneDrive), &credential())
            .await
            .unwrap_err();

        assert_eq!(err.message, "HTTP 401");
        assert!(err.cause.unwrap().contains("InvalidAuthenticationToken"));
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Err(BridgeError::Timeout("graph.microsoft.com".to_string())));

        let err = connector(http)
            .with_retry_policy(RetryPolicy::none())
            .list_files(&FolderRef::root(ProviderKind::OneDrive), &credential())
            .await
            .unwrap_err();

        assert_eq!(err.message, "request failed");
    }
}
