//! # Publish Service
//!
//! The narrow publish interface between the dispatcher and a broker.
//!
//! ```text
//! BrokerProvider (enum)         <- selected by configuration
//!   ├── RabbitMq(RabbitMqSession)
//!   └── InMemory(InMemoryBroker)
//!
//! PublishSession (trait)        <- what the dispatcher consumes
//! ```
//!
//! Providers validate destination names the same way, so a name the broker
//! would refuse fails with `DestinationInvalid` before anything is sent.

mod provider;
pub mod providers;
mod traits;
mod types;

pub use provider::BrokerProvider;
pub use providers::{InMemoryBroker, RabbitMqSession, RecordedSend};
pub use traits::PublishSession;
pub use types::{
    describe_destination, validate_destination, PublishOutcome, PublishReceipt,
    MAX_DESTINATION_NAME_BYTES, RESERVED_PREFIX,
};
