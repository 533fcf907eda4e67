//! Drive gateway façade crate.
//!
//! Depend on `drive-gateway-workspace` to get the aggregation gateway with
//! the desktop bridges selected by feature flags:
//!
//! - `desktop-shims` (default): reqwest HTTP client, in-memory token storage
//! - `secure-store`: persist OAuth tokens in the OS keychain

#[cfg(feature = "desktop-shims")]
pub use core_service::*;
