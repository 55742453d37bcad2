//! # Broker Provider Enum
//!
//! Enum dispatch over the configured backend, so the binary can hold one
//! concrete session type regardless of which broker was selected.

use async_trait::async_trait;
use tracing::info;

use super::providers::{InMemoryBroker, RabbitMqSession};
use super::traits::PublishSession;
use super::types::PublishReceipt;
use crate::config::{BrokerBackend, BrokerConfig};
use crate::messaging::errors::MessagingResult;
use crate::messaging::message::MessageDescriptor;
use crate::messaging::routing::DestinationKind;

/// Publish session selected by configuration
#[derive(Debug)]
pub enum BrokerProvider {
    /// RabbitMQ over AMQP 0.9.1
    RabbitMq(RabbitMqSession),

    /// In-memory recorder; nothing leaves the process
    InMemory(InMemoryBroker),
}

impl BrokerProvider {
    /// Open a session against the configured backend
    pub async fn connect(config: &BrokerConfig) -> MessagingResult<Self> {
        let provider = match config.backend {
            BrokerBackend::Rabbitmq => Self::RabbitMq(RabbitMqSession::connect(config).await?),
            BrokerBackend::Memory => Self::InMemory(InMemoryBroker::new()),
        };
        info!(provider = provider.provider_name(), "Publish session opened");
        Ok(provider)
    }
}

#[async_trait]
impl PublishSession for BrokerProvider {
    async fn send(
        &self,
        kind: DestinationKind,
        destination: &str,
        descriptor: &MessageDescriptor,
    ) -> MessagingResult<PublishReceipt> {
        match self {
            Self::RabbitMq(s) => s.send(kind, destination, descriptor).await,
            Self::InMemory(s) => s.send(kind, destination, descriptor).await,
        }
    }

    async fn close(&self) -> MessagingResult<()> {
        match self {
            Self::RabbitMq(s) => s.close().await,
            Self::InMemory(s) => s.close().await,
        }
    }

    fn provider_name(&self) -> &'static str {
        match self {
            Self::RabbitMq(s) => s.provider_name(),
            Self::InMemory(s) => s.provider_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::message::{MessageBuilder, MimeType};

    #[tokio::test]
    async fn test_memory_backend_connects_without_broker() {
        let config = BrokerConfig {
            backend: BrokerBackend::Memory,
            url: String::new(),
            ..BrokerConfig::default()
        };

        let provider = BrokerProvider::connect(&config).await.unwrap();
        assert_eq!(provider.provider_name(), "in_memory");

        let descriptor = MessageBuilder::new(MimeType::TextHtml).build("hi").unwrap();
        provider
            .send(DestinationKind::Queue, "test.alchemy", &descriptor)
            .await
            .unwrap();
        provider.close().await.unwrap();

        match provider {
            BrokerProvider::InMemory(broker) => {
                assert_eq!(broker.send_count(), 1);
                assert!(broker.is_closed());
            }
            other => panic!("expected in-memory provider, got {}", other.provider_name()),
        }
    }
}
