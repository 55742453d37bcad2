//! # Workshop Error Types
//!
//! Top-level error for the library and the `message-client` binary. Dispatch
//! failures arrive as [`MessagingError`]; everything that goes wrong before a
//! dispatch starts is a configuration error.

use thiserror::Error;

use crate::messaging::{ErrorKind, MessagingError};

/// Workshop operation result type
pub type WorkshopResult<T> = Result<T, WorkshopError>;

/// Process exit code for any dispatch failure
pub const EXIT_DISPATCH_FAILURE: u8 = 1;

/// Process exit code for configuration and usage errors
pub const EXIT_CONFIGURATION_ERROR: u8 = 2;

#[derive(Debug, Error)]
pub enum WorkshopError {
    #[error(transparent)]
    Messaging(#[from] MessagingError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("JSON serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WorkshopError {
    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Messaging failure category, if this is a dispatch failure
    pub fn messaging_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Messaging(e) => Some(e.kind()),
            Self::Configuration(_) | Self::Serialization(_) => None,
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Messaging(_) | Self::Serialization(_) => EXIT_DISPATCH_FAILURE,
            Self::Configuration(_) => EXIT_CONFIGURATION_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let not_found: WorkshopError =
            MessagingError::resource_not_found("orders.xml", "missing").into();
        assert_eq!(not_found.exit_code(), 1);
        assert_eq!(not_found.messaging_kind(), Some(ErrorKind::ResourceNotFound));

        let connection: WorkshopError = MessagingError::connection_failed("refused").into();
        assert_eq!(connection.exit_code(), 1);

        let config = WorkshopError::config_error("bad toml");
        assert_eq!(config.exit_code(), 2);
        assert_eq!(config.messaging_kind(), None);
    }

    #[test]
    fn test_messaging_display_is_transparent() {
        let err: WorkshopError = MessagingError::EmptyPayload.into();
        assert_eq!(err.to_string(), "Message body is empty");
    }
}
