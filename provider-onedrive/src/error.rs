use bridge_traits::storage::{ListingError, ProviderKind};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OneDriveError {
    #[error("Graph API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    #[error("Throttled, retry after {0} seconds")]
    Throttled(u64),

    /// Graph rejected the bearer token (401).
    #[error("Authentication required: {0}")]
    AuthRequired(String),

    #[error("Failed to parse Graph response: {0}")]
    ParseError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Listing exceeded {0} pages")]
    PageLimitExceeded(usize),

    /// `@odata.nextLink` pointed outside the Graph base URL.
    #[error("Refusing to follow next page link to {0}")]
    ForeignNextLink(String),
}

pub type Result<T> = std::result::Result<T, OneDriveError>;

impl From<OneDriveError> for ListingError {
    fn from(error: OneDriveError) -> Self {
        let provider = ProviderKind::OneDrive;
        match error {
            OneDriveError::ApiError {
                status_code,
                message,
            } => ListingError::new(provider, format!("HTTP {}", status_code)).with_cause(message),
            OneDriveError::AuthRequired(message) => {
                ListingError::new(provider, "HTTP 401").with_cause(message)
            }
            OneDriveError::ParseError(cause) => {
                ListingError::new(provider, "malformed response body").with_cause(cause)
            }
            OneDriveError::NetworkError(cause) => {
                ListingError::new(provider, "request failed").with_cause(cause)
            }
            other => ListingError::new(provider, other.to_string()),
        }
    }
}
