//! Shared helpers for integration tests
#![allow(dead_code)]

use std::fs;
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::TempDir;

use message_workshop::dispatcher::{DiagnosticSink, Dispatcher, SentMessage};
use message_workshop::messaging::{
    DestinationRoute, DestinationRouter, MessagingError, MessagingResult, PayloadSource,
    ResourceDirectory,
};

pub const ORDER_XML: &str =
    "<order id=\"X1355\" customer=\"Palmer\" item=\"Rainbow Scarf\" amount=\"6\"/>\n";

pub const ORDERS_XML: &str = "<orders>\n  <order id=\"X1355\"/>\n  <order id=\"X1356\"/>\n</orders>\n";

pub const BAD_BATCH_XML: &str = "<orders>\n  <order id=\"X1358\">\n</order\n";

/// Diagnostic events recorded by [`RecordingSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    RouteResolved(String),
    PayloadResolved(usize),
    MessageSent(String),
    DispatchFailed(String),
}

#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<SinkEvent>>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().clone()
    }
}

impl DiagnosticSink for RecordingSink {
    fn route_resolved(&self, route: &DestinationRoute) {
        self.events
            .lock()
            .push(SinkEvent::RouteResolved(route.selector.clone()));
    }

    fn payload_resolved(&self, _route: &DestinationRoute, body: &str) {
        self.events.lock().push(SinkEvent::PayloadResolved(body.len()));
    }

    fn message_sent(&self, sent: &SentMessage) {
        self.events
            .lock()
            .push(SinkEvent::MessageSent(sent.receipt.destination.clone()));
    }

    fn dispatch_failed(&self, _route: &DestinationRoute, error: &MessagingError) {
        self.events
            .lock()
            .push(SinkEvent::DispatchFailed(error.kind().to_string()));
    }
}

/// Payload source counting reads per resource name
#[derive(Debug, Clone)]
pub struct CountingSource {
    inner: ResourceDirectory,
    reads: Arc<Mutex<Vec<String>>>,
}

impl CountingSource {
    pub fn new(inner: ResourceDirectory) -> Self {
        Self {
            inner,
            reads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn reads_of(&self, name: &str) -> usize {
        self.reads.lock().iter().filter(|n| n.as_str() == name).count()
    }

    pub fn total_reads(&self) -> usize {
        self.reads.lock().len()
    }
}

impl PayloadSource for CountingSource {
    fn read_resource(&self, name: &str) -> MessagingResult<String> {
        self.reads.lock().push(name.to_string());
        self.inner.read_resource(name)
    }
}

/// Temporary resource directory holding the demonstration payloads
pub fn demo_resources() -> TempDir {
    resources_with(&[
        ("order.xml", ORDER_XML),
        ("orders.xml", ORDERS_XML),
        ("bad-batch.xml", BAD_BATCH_XML),
    ])
}

pub fn resources_with(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().expect("create temp resource dir");
    for (name, contents) in files {
        fs::write(dir.path().join(name), contents).expect("write resource");
    }
    dir
}

pub fn default_router() -> DestinationRouter {
    DestinationRouter::new("test.alchemy", "magic.alerts")
}

/// Dispatcher over `dir` with a shared counting source and recording sink
pub fn test_dispatcher(dir: &TempDir) -> (Dispatcher, CountingSource, RecordingSink) {
    let source = CountingSource::new(ResourceDirectory::new(dir.path()));
    let sink = RecordingSink::default();
    let dispatcher = Dispatcher::new(default_router(), source.clone(), sink.clone());
    (dispatcher, source, sink)
}
