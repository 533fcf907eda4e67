//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop and server hosts
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//! - `SecureStore` using the `keyring` crate (OS keychain)
//! - `SecureStore` held in process memory, for hosts without a keychain
//!
//! ## Feature Flags
//!
//! - `secure-store`: Enable OS keychain integration (default)
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{InMemorySecureStore, ReqwestHttpClient};
//! use std::sync::Arc;
//!
//! let http_client = Arc::new(ReqwestHttpClient::new()?);
//! let secure_store = Arc::new(InMemorySecureStore::new());
//! ```

mod http;
mod memory_store;

#[cfg(feature = "secure-store")]
mod secure_store;

pub use http::ReqwestHttpClient;
pub use memory_store::InMemorySecureStore;

#[cfg(feature = "secure-store")]
pub use secure_store::{KeyringSecureStore, DEFAULT_SERVICE_NAME};
