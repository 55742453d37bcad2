//! # Publish Service Types
//!
//! Values exchanged across the publish interface: the receipt a provider
//! returns for a transmitted message, the operator-facing outcome recorded
//! by the dispatcher, and destination-name validation shared by providers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::messaging::errors::{ErrorKind, MessagingError, MessagingResult};
use crate::messaging::routing::DestinationKind;

/// Longest destination name accepted by the broker, in bytes
pub const MAX_DESTINATION_NAME_BYTES: usize = 255;

/// Prefix reserved by the broker for its own queues and exchanges
pub const RESERVED_PREFIX: &str = "amq.";

/// Confirmation that a provider transmitted one message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReceipt {
    /// Transport message id assigned at publish time
    pub message_id: Uuid,
    pub kind: DestinationKind,
    pub destination: String,
    pub published_at: DateTime<Utc>,
}

impl PublishReceipt {
    pub fn new(kind: DestinationKind, destination: impl Into<String>) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            kind,
            destination: destination.into(),
            published_at: Utc::now(),
        }
    }
}

/// Result of one send, as reported to the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishOutcome {
    pub success: bool,
    pub destination_description: String,
    pub error: Option<ErrorKind>,
}

impl PublishOutcome {
    pub fn delivered(destination_description: impl Into<String>) -> Self {
        Self {
            success: true,
            destination_description: destination_description.into(),
            error: None,
        }
    }

    pub fn failed(destination_description: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            success: false,
            destination_description: destination_description.into(),
            error: Some(kind),
        }
    }
}

impl fmt::Display for PublishOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.error {
            None => write!(f, "sent to {}", self.destination_description),
            Some(kind) => write!(f, "failed ({kind}) for {}", self.destination_description),
        }
    }
}

/// Human-readable destination label, optionally pointing at the operator console
pub fn describe_destination(kind: DestinationKind, name: &str, console_url: Option<&str>) -> String {
    match console_url {
        Some(url) if !url.is_empty() => format!("{kind} '{name}' (check: {url})"),
        _ => format!("{kind} '{name}'"),
    }
}

/// Reject names the broker would refuse before anything is transmitted
pub fn validate_destination(kind: DestinationKind, name: &str) -> MessagingResult<()> {
    if name.is_empty() {
        return Err(MessagingError::destination_invalid(
            name,
            format!("{kind} name must not be empty"),
        ));
    }
    if name.len() > MAX_DESTINATION_NAME_BYTES {
        return Err(MessagingError::destination_invalid(
            name,
            format!(
                "{kind} name is {} bytes, limit is {MAX_DESTINATION_NAME_BYTES}",
                name.len()
            ),
        ));
    }
    if kind == DestinationKind::Queue && name.starts_with(RESERVED_PREFIX) {
        return Err(MessagingError::destination_invalid(
            name,
            format!("queue names starting with '{RESERVED_PREFIX}' are reserved"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_destination() {
        assert_eq!(
            describe_destination(DestinationKind::Queue, "magic.order", None),
            "queue 'magic.order'"
        );
        assert_eq!(
            describe_destination(
                DestinationKind::Topic,
                "magic.alerts",
                Some("http://localhost:15672")
            ),
            "topic 'magic.alerts' (check: http://localhost:15672)"
        );
        assert_eq!(
            describe_destination(DestinationKind::Queue, "q", Some("")),
            "queue 'q'"
        );
    }

    #[test]
    fn test_validate_destination() {
        assert!(validate_destination(DestinationKind::Queue, "magic.order").is_ok());
        assert!(validate_destination(DestinationKind::Topic, "amq.whatever").is_ok());

        let reserved = validate_destination(DestinationKind::Queue, "amq.gen-1").unwrap_err();
        assert_eq!(reserved.kind(), ErrorKind::DestinationInvalid);

        let empty = validate_destination(DestinationKind::Topic, "").unwrap_err();
        assert_eq!(empty.kind(), ErrorKind::DestinationInvalid);

        let long = "q".repeat(MAX_DESTINATION_NAME_BYTES + 1);
        let too_long = validate_destination(DestinationKind::Queue, &long).unwrap_err();
        assert_eq!(too_long.kind(), ErrorKind::DestinationInvalid);
    }

    #[test]
    fn test_outcome_constructors() {
        let ok = PublishOutcome::delivered("queue 'magic.order'");
        assert!(ok.success);
        assert_eq!(ok.error, None);
        assert_eq!(ok.to_string(), "sent to queue 'magic.order'");

        let failed = PublishOutcome::failed("queue 'amq.x'", ErrorKind::DestinationInvalid);
        assert!(!failed.success);
        assert_eq!(failed.error, Some(ErrorKind::DestinationInvalid));
        assert_eq!(
            failed.to_string(),
            "failed (destination_invalid) for queue 'amq.x'"
        );
    }

    #[test]
    fn test_receipt_ids_are_unique() {
        let a = PublishReceipt::new(DestinationKind::Queue, "unique.order");
        let b = PublishReceipt::new(DestinationKind::Queue, "unique.order");
        assert_ne!(a.message_id, b.message_id);
        assert_eq!(a.destination, "unique.order");
    }
}
