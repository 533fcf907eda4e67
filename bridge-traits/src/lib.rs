//! # Host Bridge Traits
//!
//! Platform abstraction traits and the shared data model of the drive gateway.
//!
//! ## Overview
//!
//! This crate defines the contract between the gateway core and the
//! host-specific implementations. Each trait represents a capability the core
//! requires but that the host may implement differently (desktop, server,
//! tests).
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with timeout and retry
//!
//! ### Cloud storage
//! - [`StorageProvider`](storage::StorageProvider) - Lists one folder level of a
//!   provider and normalizes the records into [`FileEntry`](storage::FileEntry)
//! - [`SecureStore`](storage::SecureStore) - Credential persistence (Keychain, memory)
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! Host adapters report failures through [`BridgeError`](error::BridgeError).
//! Listing failures are reported through
//! [`ListingError`](storage::ListingError), which always names the provider
//! that failed so the gateway can keep per-provider error channels apart.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so pipelines can run concurrently.
//!
//! ## Examples
//!
//! ### Implementing HttpClient
//!
//! ```ignore
//! use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//!
//! pub struct MyHttpClient {
//!     client: reqwest::Client,
//! }
//!
//! #[async_trait]
//! impl HttpClient for MyHttpClient {
//!     async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
//!         // Implementation
//!         todo!()
//!     }
//! }
//! ```

pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use storage::{
    Credential, FileEntry, FolderRef, ListingError, ProviderKind, SecureStore, StorageProvider,
};
pub use time::{Clock, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
