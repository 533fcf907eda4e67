use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A gateway setting has a value that cannot be used.
    #[error("invalid {key}: {message}")]
    Config { key: &'static str, message: String },

    #[error("logging setup failed: {0}")]
    Logging(String),

    /// A host bridge was neither injected nor provided by a desktop shim.
    #[error("{capability} unavailable: {message}")]
    CapabilityMissing {
        capability: &'static str,
        message: String,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn config(key: &'static str, message: impl Into<String>) -> Self {
        Self::Config {
            key,
            message: message.into(),
        }
    }

    /// Environment variable or builder setting at fault, if any.
    pub fn setting(&self) -> Option<&'static str> {
        match self {
            Self::Config { key, .. } => Some(key),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_names_setting() {
        let err = Error::config("GATEWAY_MAX_RETRIES", "must be 1 or more");

        assert_eq!(err.setting(), Some("GATEWAY_MAX_RETRIES"));
        assert_eq!(err.to_string(), "invalid GATEWAY_MAX_RETRIES: must be 1 or more");
    }

    #[test]
    fn test_other_errors_have_no_setting() {
        assert_eq!(Error::Logging("already set".into()).setting(), None);
    }
}
