//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the drive gateway:
//! - Logging and tracing infrastructure
//! - Configuration management (environment, builder, validation)
//! - The runtime error type shared by both
//!
//! Everything else in the workspace depends on this crate for its ambient
//! concerns; it depends only on `bridge-traits` (and `bridge-desktop` for the
//! default host bridges).

pub mod config;
pub mod error;
pub mod logging;

pub use config::{GatewayConfig, GatewayConfigBuilder, GoogleAuthMode, GoogleDriveSettings, OneDriveSettings};
pub use error::{Error, Result};
