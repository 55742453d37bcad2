//! # RabbitMQ Publish Session
//!
//! AMQP 0.9.1 implementation of [`PublishSession`] using the `lapin` crate.
//!
//! ## Destinations
//!
//! | Kind | Exchange | Routing key |
//! |------|----------|-------------|
//! | Queue | default (`""`) | queue name |
//! | Topic | `topic_exchange` (default `amq.topic`) | topic name |
//!
//! Queue publishes are `mandatory`, so a message the broker cannot route is
//! returned and reported as [`MessagingError::DestinationInvalid`]. Topic
//! publishes are not: a topic with no subscribers silently drops the message.
//!
//! Publisher confirms are enabled on the channel and every send waits for its
//! confirmation before returning, so sends complete in the order issued.
//!
//! ## Dead letters
//!
//! With `dead_letter` enabled, each queue is declared with
//! `x-dead-letter-exchange` pointing at a shared direct exchange, and a
//! `DLQ.<queue>` holding queue is bound to it. Messages a consumer rejects
//! (the `emagic.bad` batch, for instance) end up there.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use lapin::options::{
    BasicPublishOptions, ConfirmSelectOptions, ExchangeDeclareOptions, QueueBindOptions,
    QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::BrokerConfig;
use crate::messaging::errors::{MessagingError, MessagingResult};
use crate::messaging::message::MessageDescriptor;
use crate::messaging::routing::DestinationKind;
use crate::messaging::service::traits::PublishSession;
use crate::messaging::service::types::{validate_destination, PublishReceipt, RESERVED_PREFIX};

/// Persistent delivery mode
const DELIVERY_MODE_PERSISTENT: u8 = 2;

/// Prefix of the holding queue paired with each work queue
pub const DEAD_LETTER_QUEUE_PREFIX: &str = "DLQ.";

/// Name of the dead-letter queue for `queue_name`
pub fn dead_letter_queue_name(queue_name: &str) -> String {
    format!("{DEAD_LETTER_QUEUE_PREFIX}{queue_name}")
}

/// Strip credentials from an AMQP URL before it reaches a log line
pub fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}***{}", &url[..scheme_end + 3], &url[at..])
        }
        _ => url.to_string(),
    }
}

/// Open a channel with publisher confirms enabled
async fn open_confirming_channel(connection: &Connection) -> MessagingResult<Channel> {
    let channel = connection.create_channel().await.map_err(|e| {
        MessagingError::connection_failed(format!("RabbitMQ channel creation failed: {e}"))
    })?;

    channel
        .confirm_select(ConfirmSelectOptions::default())
        .await
        .map_err(|e| {
            MessagingError::connection_failed(format!("failed to enable publisher confirms: {e}"))
        })?;

    Ok(channel)
}

/// Queue declaration arguments routing rejected messages to `dead_letter_exchange`
fn dead_letter_arguments(queue_name: &str, dead_letter_exchange: &str) -> FieldTable {
    let mut args = FieldTable::default();
    args.insert(
        "x-dead-letter-exchange".into(),
        AMQPValue::LongString(dead_letter_exchange.into()),
    );
    args.insert(
        "x-dead-letter-routing-key".into(),
        AMQPValue::LongString(queue_name.into()),
    );
    args
}

/// Descriptor properties as AMQP headers
fn message_headers(descriptor: &MessageDescriptor) -> FieldTable {
    let mut headers = FieldTable::default();
    for (key, value) in descriptor.properties() {
        headers.insert(
            key.as_str().into(),
            AMQPValue::LongString(value.as_str().into()),
        );
    }
    headers
}

#[derive(Debug, Default)]
struct Topology {
    queues: HashSet<String>,
    exchanges: HashSet<String>,
}

/// RabbitMQ-backed publish session
#[derive(Debug)]
pub struct RabbitMqSession {
    connection: Connection,
    channel: Channel,
    config: BrokerConfig,
    /// Queues and exchanges already declared on this session
    declared: Mutex<Topology>,
}

impl RabbitMqSession {
    /// Open a connection and a confirming channel
    ///
    /// Every failure here, including the connect timeout, is
    /// [`MessagingError::ConnectionFailed`].
    pub async fn connect(config: &BrokerConfig) -> MessagingResult<Self> {
        let timeout = Duration::from_secs(config.connection_timeout_seconds);
        debug!(
            url = %redact_url(&config.url),
            timeout_seconds = config.connection_timeout_seconds,
            "Connecting to RabbitMQ"
        );

        let connect = Connection::connect(
            &config.url,
            ConnectionProperties::default().with_connection_name(config.connection_name.clone().into()),
        );
        let connection = tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| {
                MessagingError::connection_failed(format!(
                    "timed out after {}s connecting to {}",
                    config.connection_timeout_seconds,
                    redact_url(&config.url)
                ))
            })?
            .map_err(|e| {
                MessagingError::connection_failed(format!("RabbitMQ connection failed: {e}"))
            })?;

        let channel = match open_confirming_channel(&connection).await {
            Ok(channel) => channel,
            Err(e) => {
                if let Err(close_err) = connection.close(200, "channel setup failed").await {
                    debug!(error = %close_err, "Connection close after channel failure failed");
                }
                return Err(e);
            }
        };

        info!(url = %redact_url(&config.url), "Connected to RabbitMQ");

        Ok(Self {
            connection,
            channel,
            config: config.clone(),
            declared: Mutex::new(Topology::default()),
        })
    }

    /// Declare the durable queue, with its dead-letter pair, once per session
    async fn ensure_queue(&self, queue_name: &str) -> MessagingResult<()> {
        let already_declared = self.declared.lock().queues.contains(queue_name);
        if !self.config.declare_queues || already_declared {
            return Ok(());
        }

        let args = if self.config.dead_letter {
            self.ensure_dead_letter_queue(queue_name).await?;
            dead_letter_arguments(queue_name, &self.config.dead_letter_exchange)
        } else {
            FieldTable::default()
        };

        self.channel
            .queue_declare(
                queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                args,
            )
            .await
            .map_err(|e| {
                MessagingError::destination_invalid(
                    queue_name,
                    format!("queue declaration refused: {e}"),
                )
            })?;

        debug!(queue = %queue_name, dead_letter = self.config.dead_letter, "Declared queue");
        self.declared.lock().queues.insert(queue_name.to_string());
        Ok(())
    }

    async fn ensure_dead_letter_queue(&self, queue_name: &str) -> MessagingResult<()> {
        let exchange = self.config.dead_letter_exchange.as_str();
        self.ensure_exchange(exchange, ExchangeKind::Direct).await?;

        let dlq_name = dead_letter_queue_name(queue_name);
        self.channel
            .queue_declare(
                &dlq_name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                MessagingError::destination_invalid(
                    &dlq_name,
                    format!("dead-letter queue declaration refused: {e}"),
                )
            })?;

        self.channel
            .queue_bind(
                &dlq_name,
                exchange,
                queue_name,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                MessagingError::destination_invalid(
                    &dlq_name,
                    format!("dead-letter binding refused: {e}"),
                )
            })?;

        Ok(())
    }

    /// Declare a durable exchange unless it is predefined by the broker
    async fn ensure_exchange(&self, exchange: &str, kind: ExchangeKind) -> MessagingResult<()> {
        let already_declared = self.declared.lock().exchanges.contains(exchange);
        if exchange.is_empty() || exchange.starts_with(RESERVED_PREFIX) || already_declared {
            return Ok(());
        }

        self.channel
            .exchange_declare(
                exchange,
                kind,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                MessagingError::destination_invalid(
                    exchange,
                    format!("exchange declaration refused: {e}"),
                )
            })?;

        self.declared.lock().exchanges.insert(exchange.to_string());
        Ok(())
    }
}

#[async_trait]
impl PublishSession for RabbitMqSession {
    #[instrument(skip(self, descriptor), fields(provider = "rabbitmq"))]
    async fn send(
        &self,
        kind: DestinationKind,
        destination: &str,
        descriptor: &MessageDescriptor,
    ) -> MessagingResult<PublishReceipt> {
        validate_destination(kind, destination)?;

        let (exchange, mandatory) = match kind {
            DestinationKind::Queue => {
                self.ensure_queue(destination).await?;
                ("", true)
            }
            DestinationKind::Topic => {
                let exchange = self.config.topic_exchange.as_str();
                self.ensure_exchange(exchange, ExchangeKind::Topic).await?;
                (exchange, false)
            }
        };

        let receipt = PublishReceipt::new(kind, destination);
        let timestamp = u64::try_from(receipt.published_at.timestamp()).unwrap_or_default();
        let properties = BasicProperties::default()
            .with_content_type(descriptor.mime_type().as_str().into())
            .with_message_id(receipt.message_id.to_string().into())
            .with_timestamp(timestamp)
            .with_delivery_mode(DELIVERY_MODE_PERSISTENT)
            .with_headers(message_headers(descriptor));

        let confirm = self
            .channel
            .basic_publish(
                exchange,
                destination,
                BasicPublishOptions {
                    mandatory,
                    ..Default::default()
                },
                descriptor.body().as_bytes(),
                properties,
            )
            .await
            .map_err(|e| MessagingError::transmit_failed(destination, format!("publish failed: {e}")))?;

        let confirmation = confirm.await.map_err(|e| {
            MessagingError::transmit_failed(destination, format!("publish confirmation failed: {e}"))
        })?;

        if confirmation.is_nack() {
            return Err(MessagingError::transmit_failed(
                destination,
                "broker negatively acknowledged the message",
            ));
        }

        if let Some(returned) = confirmation.take_message() {
            return Err(MessagingError::destination_invalid(
                destination,
                format!(
                    "message returned as unroutable ({} {})",
                    returned.reply_code,
                    returned.reply_text.as_str()
                ),
            ));
        }

        debug!(message_id = %receipt.message_id, "Publish confirmed");
        Ok(receipt)
    }

    async fn close(&self) -> MessagingResult<()> {
        if !self.connection.status().connected() {
            debug!("RabbitMQ session already closed");
            return Ok(());
        }
        if let Err(e) = self.channel.close(200, "OK").await {
            warn!(error = %e, "Channel close failed; closing connection anyway");
        }
        self.connection
            .close(200, "OK")
            .await
            .map_err(|e| MessagingError::connection_failed(format!("connection close failed: {e}")))?;
        debug!("RabbitMQ session closed");
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "rabbitmq"
    }
}
