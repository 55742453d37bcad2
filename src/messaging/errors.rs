//! # Messaging Error Types
//!
//! Structured error handling for payload resolution, message construction and
//! publishing. Every variant is fatal to the current dispatch: nothing in this
//! crate retries or swallows them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category of a messaging failure, stable for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ResourceNotFound,
    ResourceUnreadable,
    EmptyPayload,
    ConnectionFailed,
    DestinationInvalid,
    TransmitFailed,
}

impl ErrorKind {
    /// Stable snake_case name used in structured log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResourceNotFound => "resource_not_found",
            Self::ResourceUnreadable => "resource_unreadable",
            Self::EmptyPayload => "empty_payload",
            Self::ConnectionFailed => "connection_failed",
            Self::DestinationInvalid => "destination_invalid",
            Self::TransmitFailed => "transmit_failed",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Messaging error types
#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("Resource not found: {name}: {reason}")]
    ResourceNotFound { name: String, reason: String },

    #[error("Resource unreadable: {name}: {message}")]
    ResourceUnreadable { name: String, message: String },

    #[error("Message body is empty")]
    EmptyPayload,

    #[error("Broker connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Invalid destination: {destination}: {reason}")]
    DestinationInvalid { destination: String, reason: String },

    #[error("Transmit failed: {destination}: {message}")]
    TransmitFailed { destination: String, message: String },
}

impl MessagingError {
    /// Create a resource not found error
    pub fn resource_not_found(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ResourceNotFound {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a resource unreadable error
    pub fn resource_unreadable(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ResourceUnreadable {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a connection failed error
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
        }
    }

    /// Create an invalid destination error
    pub fn destination_invalid(destination: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DestinationInvalid {
            destination: destination.into(),
            reason: reason.into(),
        }
    }

    /// Create a transmit failed error
    pub fn transmit_failed(destination: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransmitFailed {
            destination: destination.into(),
            message: message.into(),
        }
    }

    /// The taxonomy category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ResourceNotFound { .. } => ErrorKind::ResourceNotFound,
            Self::ResourceUnreadable { .. } => ErrorKind::ResourceUnreadable,
            Self::EmptyPayload => ErrorKind::EmptyPayload,
            Self::ConnectionFailed { .. } => ErrorKind::ConnectionFailed,
            Self::DestinationInvalid { .. } => ErrorKind::DestinationInvalid,
            Self::TransmitFailed { .. } => ErrorKind::TransmitFailed,
        }
    }
}

/// Result type alias for messaging operations
pub type MessagingResult<T> = Result<T, MessagingError>;
