//! Error types for Google Drive provider

use bridge_traits::storage::{ListingError, ProviderKind};
use thiserror::Error;

/// Google Drive provider errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GoogleDriveError {
    /// API request returned a non-success status
    #[error("Google Drive API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Still throttled after the last attempt
    #[error("Rate limit exceeded, retry after {retry_after_seconds} seconds")]
    RateLimitExceeded { retry_after_seconds: u64 },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    /// The folder did not fit in the allowed number of pages
    #[error("Listing exceeded {0} pages")]
    PageLimitExceeded(usize),
}

/// Result type for Google Drive operations
pub type Result<T> = std::result::Result<T, GoogleDriveError>;

impl From<GoogleDriveError> for ListingError {
    fn from(error: GoogleDriveError) -> Self {
        let provider = ProviderKind::GoogleDrive;
        match error {
            GoogleDriveError::ApiError {
                status_code,
                message,
            } => ListingError::new(provider, format!("HTTP {}", status_code)).with_cause(message),
            GoogleDriveError::ParseError(cause) => {
                ListingError::new(provider, "malformed response body").with_cause(cause)
            }
            GoogleDriveError::NetworkError(cause) => {
                ListingError::new(provider, "request failed").with_cause(cause)
            }
            other => ListingError::new(provider, other.to_string()),
        }
    }
}
