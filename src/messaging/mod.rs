//! # Messaging Module
//!
//! Everything between a command selector and a broker: payload resolution,
//! message construction, destination routing and the publish interface.
//!
//! Messages are plain [`MessageDescriptor`] values built without any live
//! connection, then handed to a [`PublishSession`](service::PublishSession).

pub mod errors;
pub mod message;
pub mod payload;
pub mod routing;
pub mod service;

pub use errors::{ErrorKind, MessagingError, MessagingResult};
pub use message::{
    MessageBuilder, MessageDescriptor, MimeType, MIME_TYPE_PROPERTY, SNATCHER_PROPERTY,
    UNIQUE_ID_PROPERTY,
};
pub use payload::{PayloadSource, PayloadSpec, ResourceDirectory, MAX_RESOURCE_BYTES};
pub use routing::{
    DestinationKind, DestinationRoute, DestinationRouter, PublishPattern, FALLBACK_SELECTOR,
    QUEUE_ALERT_TEXT, TOPIC_ALERT_TEXT,
};
