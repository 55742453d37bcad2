//! # In-Memory Broker
//!
//! Records every send instead of transmitting it. Used by tests and by the
//! `memory` backend for running the demonstration without a broker.
//!
//! Clones share state, so a test can hand one clone to the dispatcher and
//! inspect the recorded sends through another.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::messaging::errors::{MessagingError, MessagingResult};
use crate::messaging::message::MessageDescriptor;
use crate::messaging::routing::DestinationKind;
use crate::messaging::service::traits::PublishSession;
use crate::messaging::service::types::{validate_destination, PublishReceipt};

/// One message accepted by the in-memory broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSend {
    pub kind: DestinationKind,
    pub destination: String,
    pub descriptor: MessageDescriptor,
    pub receipt: PublishReceipt,
}

#[derive(Debug, Default)]
struct BrokerState {
    sends: Vec<RecordedSend>,
    unreachable: bool,
    rejected: HashSet<String>,
    failing: HashSet<String>,
    fail_after: Option<usize>,
    attempts: usize,
    closed: bool,
    close_calls: usize,
}

/// In-memory publish session
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send fail as if the broker could not be reached
    pub fn unreachable(self) -> Self {
        self.state.lock().unreachable = true;
        self
    }

    /// Make sends to `destination` fail as an invalid destination
    pub fn reject_destination(self, destination: impl Into<String>) -> Self {
        self.state.lock().rejected.insert(destination.into());
        self
    }

    /// Make sends to `destination` fail as if the broker nacked them
    pub fn fail_transmit(self, destination: impl Into<String>) -> Self {
        self.state.lock().failing.insert(destination.into());
        self
    }

    /// Accept the first `accepted` sends, then nack every later one
    pub fn fail_after_sends(self, accepted: usize) -> Self {
        self.state.lock().fail_after = Some(accepted);
        self
    }

    /// Every accepted send, in order
    pub fn sends(&self) -> Vec<RecordedSend> {
        self.state.lock().sends.clone()
    }

    pub fn send_count(&self) -> usize {
        self.state.lock().sends.len()
    }

    /// Number of sends attempted, accepted or not
    pub fn send_attempts(&self) -> usize {
        self.state.lock().attempts
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Number of times `close` was called
    pub fn close_calls(&self) -> usize {
        self.state.lock().close_calls
    }
}

#[async_trait]
impl PublishSession for InMemoryBroker {
    async fn send(
        &self,
        kind: DestinationKind,
        destination: &str,
        descriptor: &MessageDescriptor,
    ) -> MessagingResult<PublishReceipt> {
        let mut state = self.state.lock();
        state.attempts += 1;

        if state.unreachable {
            return Err(MessagingError::connection_failed(
                "in-memory broker configured as unreachable",
            ));
        }
        if state.closed {
            return Err(MessagingError::connection_failed("session already closed"));
        }

        validate_destination(kind, destination)?;
        if state.rejected.contains(destination) {
            return Err(MessagingError::destination_invalid(
                destination,
                format!("{kind} rejected by broker"),
            ));
        }
        let over_limit = state
            .fail_after
            .is_some_and(|accepted| state.sends.len() >= accepted);
        if over_limit || state.failing.contains(destination) {
            return Err(MessagingError::transmit_failed(
                destination,
                "broker did not acknowledge the message",
            ));
        }

        let receipt = PublishReceipt::new(kind, destination);
        debug!(
            kind = %kind,
            destination = %destination,
            message_id = %receipt.message_id,
            "Recorded in-memory send"
        );
        state.sends.push(RecordedSend {
            kind,
            destination: destination.to_string(),
            descriptor: descriptor.clone(),
            receipt: receipt.clone(),
        });

        Ok(receipt)
    }

    async fn close(&self) -> MessagingResult<()> {
        let mut state = self.state.lock();
        state.closed = true;
        state.close_calls += 1;
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "in_memory"
    }
}
