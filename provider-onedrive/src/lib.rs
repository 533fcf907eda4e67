//! # OneDrive Provider
//!
//! Implements `StorageProvider` trait for Microsoft Graph API (OneDrive).
//!
//! ## Overview
//!
//! This module provides:
//! - One-level folder listing through `/me/drive/items/{id}/children`
//! - Pagination over `@odata.nextLink`
//! - Strict normalization of `driveItem` records into `FileEntry`
//! - Throttling and server-error retries per Graph API guidelines

pub mod connector;
pub mod error;
pub mod types;

pub use connector::{OneDriveConnector, GRAPH_API_BASE};
pub use error::{OneDriveError, Result};
pub use types::{ChildrenResponse, DriveItem};
