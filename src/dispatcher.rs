//! # Dispatcher
//!
//! Entry point for one client run. A run walks
//! `Start -> RouteResolved -> PayloadResolved -> Sent(1..k) -> Closed`:
//!
//! 1. The selector is resolved to a [`DestinationRoute`]; this never fails.
//! 2. The route's payload is resolved once, in full.
//! 3. One message is built and sent, or for the idempotent-publish sequence
//!    three: key K1, the same key K1 again, then a fresh key K2.
//!
//! The first failure ends the run. Nothing is retried and nothing is
//! deduplicated client-side; the duplicate in the idempotent sequence is
//! sent on purpose so the broker or consumer can be observed suppressing it.
//!
//! Sends are awaited one at a time, so the broker sees them in issue order.
//! [`Dispatcher::run`] closes the session on every exit path.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::messaging::service::{describe_destination, PublishOutcome, PublishReceipt, PublishSession};
use crate::messaging::{
    DestinationRoute, DestinationRouter, MessageBuilder, MessageDescriptor, MessagingError,
    MessagingResult, PayloadSource, PublishPattern, UNIQUE_ID_PROPERTY,
};

/// Receives progress and failure notifications from a dispatch
///
/// One sink is wired at startup and owned by the [`Dispatcher`].
pub trait DiagnosticSink: Send + Sync {
    fn route_resolved(&self, route: &DestinationRoute);

    fn payload_resolved(&self, route: &DestinationRoute, body: &str);

    fn message_sent(&self, sent: &SentMessage);

    /// Called once with the error that ended the run
    fn dispatch_failed(&self, route: &DestinationRoute, error: &MessagingError);
}

/// Sink forwarding to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn route_resolved(&self, route: &DestinationRoute) {
        debug!(
            selector = %route.selector,
            kind = %route.kind,
            destination = %route.destination_name,
            pattern = %route.pattern,
            "Route resolved"
        );
    }

    fn payload_resolved(&self, route: &DestinationRoute, body: &str) {
        debug!(
            payload = %route.payload,
            bytes = body.len(),
            mime_type = %route.mime_type,
            "Payload resolved"
        );
    }

    fn message_sent(&self, sent: &SentMessage) {
        info!(
            destination = %sent.outcome.destination_description,
            message_id = %sent.receipt.message_id,
            unique_id = sent.unique_id.as_deref().unwrap_or("-"),
            "Message sent"
        );
    }

    fn dispatch_failed(&self, route: &DestinationRoute, error: &MessagingError) {
        error!(
            selector = %route.selector,
            destination = %route.destination_name,
            error_kind = %error.kind(),
            error = %error,
            "Dispatch failed"
        );
    }
}

/// One successfully transmitted message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentMessage {
    pub outcome: PublishOutcome,
    pub receipt: PublishReceipt,
    /// Idempotency key, for messages that carry one
    pub unique_id: Option<String>,
}

/// Everything a completed run sent, in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub selector: String,
    pub pattern: PublishPattern,
    pub sends: Vec<SentMessage>,
}

impl DispatchReport {
    pub fn outcomes(&self) -> impl Iterator<Item = &PublishOutcome> {
        self.sends.iter().map(|sent| &sent.outcome)
    }

    pub fn send_count(&self) -> usize {
        self.sends.len()
    }

    /// The report as a single JSON document
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Routes a selector, builds its messages and publishes them
pub struct Dispatcher {
    router: DestinationRouter,
    payloads: Box<dyn PayloadSource>,
    sink: Box<dyn DiagnosticSink>,
    extra_properties: BTreeMap<String, String>,
    console_url: Option<String>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("router", &self.router)
            .field("extra_properties", &self.extra_properties)
            .field("console_url", &self.console_url)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(
        router: DestinationRouter,
        payloads: impl PayloadSource + 'static,
        sink: impl DiagnosticSink + 'static,
    ) -> Self {
        Self {
            router,
            payloads: Box::new(payloads),
            sink: Box::new(sink),
            extra_properties: BTreeMap::new(),
            console_url: None,
        }
    }

    /// Properties added to every message of the run
    ///
    /// Route properties, the idempotency key and the MIME-type property take
    /// precedence over these.
    pub fn with_extra_properties<I, K, V>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.extra_properties
            .extend(properties.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Operator console link appended to destination descriptions
    pub fn with_console_url(mut self, console_url: Option<String>) -> Self {
        self.console_url = console_url.filter(|url| !url.is_empty());
        self
    }

    pub fn router(&self) -> &DestinationRouter {
        &self.router
    }

    /// Dispatch `selector` on an open session, then close the session
    ///
    /// The session is closed whether or not the dispatch succeeded. A failure
    /// to close is logged and does not change the result.
    pub async fn run<S>(&self, session: &S, selector: Option<&str>) -> MessagingResult<DispatchReport>
    where
        S: PublishSession + ?Sized,
    {
        let result = self.dispatch(session, selector).await;

        match session.close().await {
            Ok(()) => debug!(provider = session.provider_name(), "Publish session closed"),
            Err(e) => warn!(
                provider = session.provider_name(),
                error = %e,
                "Failed to close publish session"
            ),
        }

        result
    }

    /// Dispatch `selector` on an open session, leaving it open
    pub async fn dispatch<S>(
        &self,
        session: &S,
        selector: Option<&str>,
    ) -> MessagingResult<DispatchReport>
    where
        S: PublishSession + ?Sized,
    {
        let route = self.router.route_optional(selector);
        self.sink.route_resolved(route);

        let mut report = DispatchReport {
            selector: route.selector.clone(),
            pattern: route.pattern,
            sends: Vec::new(),
        };

        match self.publish_route(session, route, &mut report).await {
            Ok(()) => Ok(report),
            Err(e) => {
                self.sink.dispatch_failed(route, &e);
                Err(e)
            }
        }
    }

    async fn publish_route<S>(
        &self,
        session: &S,
        route: &DestinationRoute,
        report: &mut DispatchReport,
    ) -> MessagingResult<()>
    where
        S: PublishSession + ?Sized,
    {
        let body = route.payload.resolve(self.payloads.as_ref())?;
        self.sink.payload_resolved(route, &body);

        let builder = MessageBuilder::new(route.mime_type)
            .with_properties(self.extra_properties.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .with_properties(route.properties.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        match route.pattern {
            PublishPattern::Single => {
                let descriptor = builder.build(body)?;
                self.send(session, route, &descriptor, report).await?;
            }
            PublishPattern::IdempotentSequence => {
                let first_key = Uuid::new_v4().to_string();
                let second_key = Uuid::new_v4().to_string();
                let keyed = |key: &str| builder.clone().with_property(UNIQUE_ID_PROPERTY, key);

                let original = keyed(&first_key).build(body.as_str())?;
                self.send(session, route, &original, report).await?;

                let duplicate = keyed(&first_key).build(body.as_str())?;
                self.send(session, route, &duplicate, report).await?;

                let fresh = keyed(&second_key).build(body)?;
                self.send(session, route, &fresh, report).await?;
            }
        }

        Ok(())
    }

    async fn send<S>(
        &self,
        session: &S,
        route: &DestinationRoute,
        descriptor: &MessageDescriptor,
        report: &mut DispatchReport,
    ) -> MessagingResult<()>
    where
        S: PublishSession + ?Sized,
    {
        let receipt = session
            .send(route.kind, &route.destination_name, descriptor)
            .await?;

        let description =
            describe_destination(route.kind, &route.destination_name, self.console_url.as_deref());
        let sent = SentMessage {
            outcome: PublishOutcome::delivered(description),
            receipt,
            unique_id: descriptor.unique_id().map(str::to_string),
        };
        self.sink.message_sent(&sent);
        report.sends.push(sent);
        Ok(())
    }

    /// Outcome describing a failed run, for operator output
    pub fn failure_outcome(&self, selector: Option<&str>, error: &MessagingError) -> PublishOutcome {
        let route = self.router.route_optional(selector);
        PublishOutcome::failed(
            describe_destination(route.kind, &route.destination_name, self.console_url.as_deref()),
            error.kind(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::service::InMemoryBroker;
    use crate::messaging::{DestinationKind, ErrorKind, MimeType, MIME_TYPE_PROPERTY};
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Default, Clone)]
    struct MapSource {
        resources: HashMap<String, String>,
        reads: Arc<Mutex<Vec<String>>>,
    }

    impl MapSource {
        fn with(mut self, name: &str, body: &str) -> Self {
            self.resources.insert(name.to_string(), body.to_string());
            self
        }
    }

    impl PayloadSource for MapSource {
        fn read_resource(&self, name: &str) -> MessagingResult<String> {
            self.reads.lock().push(name.to_string());
            self.resources
                .get(name)
                .cloned()
                .ok_or_else(|| MessagingError::resource_not_found(name, "not in map"))
        }
    }

    #[derive(Default, Clone)]
    struct EventSink {
        events: Arc<Mutex<Vec<String>>>,
    }

    impl DiagnosticSink for EventSink {
        fn route_resolved(&self, route: &DestinationRoute) {
            self.events.lock().push(format!("route:{}", route.selector));
        }

        fn payload_resolved(&self, _route: &DestinationRoute, body: &str) {
            self.events.lock().push(format!("payload:{}", body.len()));
        }

        fn message_sent(&self, sent: &SentMessage) {
            self.events
                .lock()
                .push(format!("sent:{}", sent.receipt.destination));
        }

        fn dispatch_failed(&self, _route: &DestinationRoute, error: &MessagingError) {
            self.events.lock().push(format!("failed:{}", error.kind()));
        }
    }

    fn dispatcher(source: MapSource, sink: EventSink) -> Dispatcher {
        Dispatcher::new(
            DestinationRouter::new("test.alchemy", "magic.alerts"),
            source,
            sink,
        )
    }

    #[tokio::test]
    async fn test_single_send_builds_descriptor_from_route() {
        let source = MapSource::default().with("order.xml", "<order/>");
        let broker = InMemoryBroker::new();

        let report = dispatcher(source, EventSink::default())
            .dispatch(&broker, Some("magic.order"))
            .await
            .unwrap();

        assert_eq!(report.send_count(), 1);
        let sends = broker.sends();
        assert_eq!(sends[0].kind, DestinationKind::Queue);
        assert_eq!(sends[0].destination, "magic.order");
        assert_eq!(sends[0].descriptor.body(), "<order/>");
        assert_eq!(sends[0].descriptor.mime_type(), MimeType::ApplicationXml);
        assert!(!broker.is_closed(), "dispatch leaves the session open");
    }

    #[tokio::test]
    async fn test_idempotent_sequence_keys() {
        let source = MapSource::default().with("orders.xml", "<orders/>");
        let broker = InMemoryBroker::new();

        let report = dispatcher(source.clone(), EventSink::default())
            .dispatch(&broker, Some("unique.orders"))
            .await
            .unwrap();

        let keys: Vec<_> = report
            .sends
            .iter()
            .map(|s| s.unique_id.clone().unwrap())
            .collect();
        assert_eq!(keys.len(), 3);
        assert_eq!(keys[0], keys[1]);
        assert_ne!(keys[0], keys[2]);
        for key in &keys {
            assert!(Uuid::parse_str(key).is_ok(), "{key} is not a UUID");
        }
        assert_eq!(*source.reads.lock(), vec!["orders.xml".to_string()]);
    }

    #[tokio::test]
    async fn test_property_precedence() {
        let broker = InMemoryBroker::new();
        let source = MapSource::default().with("orders.xml", "<orders/>");

        dispatcher(source, EventSink::default())
            .with_extra_properties([
                ("company", "Aladin's Magic Shop"),
                (UNIQUE_ID_PROPERTY, "operator-key"),
                (MIME_TYPE_PROPERTY, "text/plain"),
            ])
            .dispatch(&broker, Some("unique.orders"))
            .await
            .unwrap();

        let first = &broker.sends()[0].descriptor;
        assert_eq!(first.property("company"), Some("Aladin's Magic Shop"));
        assert_ne!(first.unique_id(), Some("operator-key"));
        assert_eq!(first.property(MIME_TYPE_PROPERTY), Some("application/xml"));
    }

    #[tokio::test]
    async fn test_missing_resource_sends_nothing_and_reports() {
        let sink = EventSink::default();
        let broker = InMemoryBroker::new();

        let err = dispatcher(MapSource::default(), sink.clone())
            .run(&broker, Some("magic.orders"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ResourceNotFound);
        assert_eq!(broker.send_count(), 0);
        assert!(broker.is_closed());
        assert_eq!(
            *sink.events.lock(),
            vec!["route:magic.orders", "failed:resource_not_found"]
        );
    }

    #[tokio::test]
    async fn test_empty_resource_is_empty_payload() {
        let source = MapSource::default().with("order.xml", "");
        let broker = InMemoryBroker::new();

        let err = dispatcher(source, EventSink::default())
            .run(&broker, Some("magic.order"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::EmptyPayload);
        assert_eq!(broker.send_count(), 0);
    }

    #[tokio::test]
    async fn test_failing_first_send_stops_the_sequence() {
        let source = MapSource::default().with("orders.xml", "<orders/>");
        let broker = InMemoryBroker::new().fail_transmit("unique.order");

        let err = dispatcher(source, EventSink::default())
            .run(&broker, Some("unique.orders"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::TransmitFailed);
        assert_eq!(broker.send_count(), 0);
        assert_eq!(broker.send_attempts(), 1);
        assert_eq!(broker.close_calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_midway_stops_the_sequence() {
        let source = MapSource::default().with("orders.xml", "<orders/>");
        let broker = InMemoryBroker::new().fail_after_sends(1);

        let err = dispatcher(source, EventSink::default())
            .run(&broker, Some("unique.orders"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::TransmitFailed);
        assert_eq!(broker.send_count(), 1);
        assert_eq!(broker.send_attempts(), 2, "third send must not be attempted");
        assert_eq!(broker.close_calls(), 1);
    }

    #[tokio::test]
    async fn test_run_works_through_trait_object() {
        let broker = InMemoryBroker::new();
        let session: &dyn PublishSession = &broker;

        let report = dispatcher(MapSource::default(), EventSink::default())
            .run(session, None)
            .await
            .unwrap();

        assert_eq!(report.selector, crate::messaging::FALLBACK_SELECTOR);
        assert!(broker.is_closed());
    }

    #[tokio::test]
    async fn test_report_serializes_to_json() {
        let source = MapSource::default().with("orders.xml", "<orders/>");
        let broker = InMemoryBroker::new();

        let report = dispatcher(source, EventSink::default())
            .dispatch(&broker, Some("unique.orders"))
            .await
            .unwrap();

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["selector"], "unique.orders");
        assert_eq!(json["pattern"], "idempotent-sequence");
        assert_eq!(json["sends"].as_array().unwrap().len(), 3);
        assert_eq!(json["sends"][0]["outcome"]["success"], true);
        assert_eq!(json["sends"][0]["receipt"]["kind"], "queue");
        assert_eq!(json["sends"][0]["unique_id"], json["sends"][1]["unique_id"]);
    }

    #[test]
    fn test_failure_outcome_describes_route() {
        let dispatcher = dispatcher(MapSource::default(), EventSink::default())
            .with_console_url(Some("http://localhost:15672".to_string()));

        let outcome = dispatcher.failure_outcome(
            Some("emagic.bad"),
            &MessagingError::connection_failed("refused"),
        );
        assert!(!outcome.success);
        assert_eq!(outcome.error, Some(ErrorKind::ConnectionFailed));
        assert_eq!(
            outcome.destination_description,
            "queue 'emagic.orders' (check: http://localhost:15672)"
        );
    }
}
