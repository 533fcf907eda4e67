//! Clock and log forwarding seams
//!
//! Credential expiry and signed assertions read time through [`Clock`];
//! hosts that collect logs themselves receive gateway events through
//! [`LoggerSink`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;

/// Source of "now" for token expiry and JWT `iat`/`exp` claims.
///
/// ```ignore
/// use bridge_traits::time::Clock;
///
/// fn assertion_window(clock: &dyn Clock) -> (i64, i64) {
///     let iat = clock.unix_timestamp();
///     (iat, iat + 3600)
/// }
/// ```
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Seconds since the Unix epoch
    fn unix_timestamp(&self) -> i64 {
        self.now().timestamp()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Pins the clock to an RFC 3339 timestamp, `None` if it does not parse.
    pub fn at(rfc3339: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(rfc3339)
            .ok()
            .map(|instant| Self(instant.with_timezone(&Utc)))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// One gateway event as handed to a [`LoggerSink`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    /// Emitting crate or module, e.g. `provider_onedrive::connector`
    pub target: String,
    pub message: String,
    /// Structured fields such as `provider` or `request_id`
    pub fields: HashMap<String, String>,
    /// Name of the innermost span, e.g. `list_all`
    pub span: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            target: target.into(),
            message: message.into(),
            fields: HashMap::new(),
            span: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_span(mut self, span: impl Into<String>) -> Self {
        self.span = Some(span.into());
        self
    }
}

/// Receives gateway log events for a host-side collector.
///
/// Entries arrive after field redaction, so access tokens and client secrets
/// never reach a sink.
#[async_trait::async_trait]
pub trait LoggerSink: Send + Sync {
    async fn log(&self, entry: LogEntry) -> Result<()>;

    /// Events below this level are dropped before an entry is built.
    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}
