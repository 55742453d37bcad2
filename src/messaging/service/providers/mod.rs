//! # Publish Session Providers
//!
//! Concrete implementations of the `PublishSession` trait.
//!
//! ## Providers
//!
//! - [`RabbitMqSession`] - RabbitMQ via the lapin crate
//! - [`InMemoryBroker`] - records sends in memory, for tests and broker-less runs

mod in_memory;
mod rabbitmq;

pub use in_memory::{InMemoryBroker, RecordedSend};
pub use rabbitmq::{dead_letter_queue_name, redact_url, RabbitMqSession, DEAD_LETTER_QUEUE_PREFIX};
