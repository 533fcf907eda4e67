//! # Google Drive Provider
//!
//! Implements `StorageProvider` trait for Google Drive API v3.
//!
//! ## Overview
//!
//! This module provides:
//! - One-level folder listing through `files.list` with `'{id}' in parents`
//! - Pagination over `nextPageToken`
//! - Normalization of Drive file resources into `FileEntry`
//! - Retry with exponential backoff for rate limiting and server errors

pub mod connector;
pub mod error;
pub mod types;

pub use connector::{GoogleDriveConnector, DRIVE_API_BASE};
pub use error::{GoogleDriveError, Result};
pub use types::{DriveFile, FilesListResponse};
