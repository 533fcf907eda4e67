//! Lists the configured folders of both providers and prints the combined
//! result as JSON.
//!
//! Run with:
//! ```bash
//! ONEDRIVE_CLIENT_ID=... ONEDRIVE_TENANT_ID=... ONEDRIVE_CLIENT_SECRET=... \
//! GOOGLE_SERVICE_ACCOUNT_EMAIL=... GOOGLE_PRIVATE_KEY="$(cat key.pem)" \
//! cargo run -p core-service --example list_drives
//!
//! # JSON logs
//! LOG_FORMAT=json cargo run -p core-service --example list_drives
//! ```

use anyhow::Context;
use bridge_traits::time::LogLevel;
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_service::GatewayService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let format = std::env::var("LOG_FORMAT")
        .ok()
        .and_then(|value| LogFormat::parse(&value))
        .unwrap_or_default();

    let mut logging = LoggingConfig::default()
        .with_format(format)
        .with_level(LogLevel::Info);
    if let Ok(filter) = std::env::var("RUST_LOG") {
        logging = logging.with_filter(filter);
    }
    init_logging(logging).context("failed to initialize logging")?;

    let service = GatewayService::from_env().context("invalid gateway configuration")?;
    let listing = service.list_configured().await;

    for error in listing.errors() {
        tracing::warn!(provider = %error.provider, kind = ?error.kind, "{}", error.message);
    }

    println!("{}", serde_json::to_string_pretty(&listing)?);
    Ok(())
}
