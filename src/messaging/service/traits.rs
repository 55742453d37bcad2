//! # Publish Session Trait
//!
//! The narrow interface the dispatcher consumes to reach a broker.

use async_trait::async_trait;

use super::types::PublishReceipt;
use crate::messaging::errors::MessagingResult;
use crate::messaging::message::MessageDescriptor;
use crate::messaging::routing::DestinationKind;

/// A scoped handle to a broker connection
///
/// A session is opened once per run, used for one or more sequential sends,
/// and closed before the process exits. Implementations never retry: a failed
/// send is reported as [`ConnectionFailed`], [`DestinationInvalid`] or
/// [`TransmitFailed`] and the caller decides what happens next.
///
/// Callers must not issue concurrent sends on the same session. The receiver
/// is `&self` so that sessions can be shared behind references, not to permit
/// parallel publishing.
///
/// [`ConnectionFailed`]: crate::messaging::MessagingError::ConnectionFailed
/// [`DestinationInvalid`]: crate::messaging::MessagingError::DestinationInvalid
/// [`TransmitFailed`]: crate::messaging::MessagingError::TransmitFailed
#[async_trait]
pub trait PublishSession: Send + Sync {
    /// Transmit one message to the named queue or topic
    async fn send(
        &self,
        kind: DestinationKind,
        destination: &str,
        descriptor: &MessageDescriptor,
    ) -> MessagingResult<PublishReceipt>;

    /// Release the broker connection
    ///
    /// Closing an already-closed session is not an error.
    async fn close(&self) -> MessagingResult<()>;

    /// Provider name for logging
    fn provider_name(&self) -> &'static str;
}
