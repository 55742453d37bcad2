//! # Destination Routing
//!
//! Maps a command selector to the destination, payload and message properties
//! it publishes. The table is declarative: [`KNOWN_ROUTES`] lists every
//! selector, and [`DestinationRouter`] materialises it against the configured
//! default queue and topic.
//!
//! Routing is total. Selectors outside the table, including the empty string,
//! resolve to the fallback alert route so that every invocation publishes
//! something the operator can inspect.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::message::{MimeType, SNATCHER_PROPERTY};
use super::payload::PayloadSpec;

/// Body of the alert sent to the default queue
pub const QUEUE_ALERT_TEXT: &str = "Alchemy is forbidden; Magic is encouraged";

/// Body of the alert published to the default topic
pub const TOPIC_ALERT_TEXT: &str = "Unauthorized use of magic supplies - Dice";

/// Selector recorded on the fallback route
pub const FALLBACK_SELECTOR: &str = "<default>";

/// Broker destination flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationKind {
    /// Point-to-point: each message goes to one consumer
    Queue,
    /// Publish/subscribe: each message goes to every active subscriber
    Topic,
}

impl DestinationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queue => "queue",
            Self::Topic => "topic",
        }
    }
}

impl fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How many messages a route publishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PublishPattern {
    /// One message
    Single,
    /// Original, duplicate with the same idempotency key, then a fresh key
    IdempotentSequence,
}

impl fmt::Display for PublishPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => f.write_str("single"),
            Self::IdempotentSequence => f.write_str("idempotent-sequence"),
        }
    }
}

/// Destination named by a route table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationSpec {
    Named(&'static str),
    DefaultQueue,
    DefaultTopic,
}

/// Payload named by a route table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadRef {
    Literal(&'static str),
    Resource(&'static str),
}

/// One row of the static route table
#[derive(Debug, Clone, Copy)]
pub struct RouteSpec {
    pub selector: &'static str,
    pub kind: DestinationKind,
    pub destination: DestinationSpec,
    pub payload: PayloadRef,
    pub mime_type: MimeType,
    pub properties: &'static [(&'static str, &'static str)],
    pub pattern: PublishPattern,
}

/// Every selector the client understands, in listing order
pub const KNOWN_ROUTES: &[RouteSpec] = &[
    RouteSpec {
        selector: "magic.alerts",
        kind: DestinationKind::Topic,
        destination: DestinationSpec::DefaultTopic,
        payload: PayloadRef::Literal(TOPIC_ALERT_TEXT),
        mime_type: MimeType::TextHtml,
        properties: &[(SNATCHER_PROPERTY, "Fenrir Greyback")],
        pattern: PublishPattern::Single,
    },
    RouteSpec {
        selector: "magic.order",
        kind: DestinationKind::Queue,
        destination: DestinationSpec::Named("magic.order"),
        payload: PayloadRef::Resource("order.xml"),
        mime_type: MimeType::ApplicationXml,
        properties: &[],
        pattern: PublishPattern::Single,
    },
    RouteSpec {
        selector: "magic.orders",
        kind: DestinationKind::Queue,
        destination: DestinationSpec::Named("magic.orders"),
        payload: PayloadRef::Resource("orders.xml"),
        mime_type: MimeType::ApplicationXml,
        properties: &[],
        pattern: PublishPattern::Single,
    },
    RouteSpec {
        selector: "emagic.orders",
        kind: DestinationKind::Queue,
        destination: DestinationSpec::Named("emagic.orders"),
        payload: PayloadRef::Resource("orders.xml"),
        mime_type: MimeType::ApplicationXml,
        properties: &[],
        pattern: PublishPattern::Single,
    },
    // Deliberately malformed batch; consumers reject it into the dead-letter queue
    RouteSpec {
        selector: "emagic.bad",
        kind: DestinationKind::Queue,
        destination: DestinationSpec::Named("emagic.orders"),
        payload: PayloadRef::Resource("bad-batch.xml"),
        mime_type: MimeType::TextHtml,
        properties: &[],
        pattern: PublishPattern::Single,
    },
    RouteSpec {
        selector: "unique.orders",
        kind: DestinationKind::Queue,
        destination: DestinationSpec::Named("unique.order"),
        payload: PayloadRef::Resource("orders.xml"),
        mime_type: MimeType::ApplicationXml,
        properties: &[],
        pattern: PublishPattern::IdempotentSequence,
    },
];

/// Route taken for absent or unrecognised selectors
pub const FALLBACK_ROUTE: RouteSpec = RouteSpec {
    selector: FALLBACK_SELECTOR,
    kind: DestinationKind::Queue,
    destination: DestinationSpec::DefaultQueue,
    payload: PayloadRef::Literal(QUEUE_ALERT_TEXT),
    mime_type: MimeType::TextHtml,
    properties: &[],
    pattern: PublishPattern::Single,
};

/// A resolved route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationRoute {
    pub selector: String,
    pub kind: DestinationKind,
    pub destination_name: String,
    pub payload: PayloadSpec,
    pub mime_type: MimeType,
    pub properties: BTreeMap<String, String>,
    pub pattern: PublishPattern,
}

impl DestinationRoute {
    /// Resource name, absent for literal payloads
    pub fn payload_name(&self) -> Option<&str> {
        self.payload.payload_name()
    }

    pub fn is_fallback(&self) -> bool {
        self.selector == FALLBACK_SELECTOR
    }
}

/// Selector lookup over the materialised route table
#[derive(Debug, Clone)]
pub struct DestinationRouter {
    routes: Vec<DestinationRoute>,
    fallback: DestinationRoute,
}

impl DestinationRouter {
    /// Build the router, filling default destinations from configuration
    pub fn new(default_queue: impl Into<String>, default_topic: impl Into<String>) -> Self {
        let default_queue = default_queue.into();
        let default_topic = default_topic.into();
        let materialize = |spec: &RouteSpec| {
            let destination_name = match spec.destination {
                DestinationSpec::Named(name) => name.to_string(),
                DestinationSpec::DefaultQueue => default_queue.clone(),
                DestinationSpec::DefaultTopic => default_topic.clone(),
            };
            let payload = match spec.payload {
                PayloadRef::Literal(text) => PayloadSpec::literal(text),
                PayloadRef::Resource(name) => PayloadSpec::resource(name),
            };
            DestinationRoute {
                selector: spec.selector.to_string(),
                kind: spec.kind,
                destination_name,
                payload,
                mime_type: spec.mime_type,
                properties: spec
                    .properties
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                pattern: spec.pattern,
            }
        };

        Self {
            routes: KNOWN_ROUTES.iter().map(&materialize).collect(),
            fallback: materialize(&FALLBACK_ROUTE),
        }
    }

    /// Resolve a selector by exact match, falling back to the alert route
    pub fn route(&self, selector: &str) -> &DestinationRoute {
        self.routes
            .iter()
            .find(|route| route.selector == selector)
            .unwrap_or(&self.fallback)
    }

    /// Resolve an optional selector; absence takes the fallback route
    pub fn route_optional(&self, selector: Option<&str>) -> &DestinationRoute {
        match selector {
            Some(selector) => self.route(selector),
            None => &self.fallback,
        }
    }

    /// Known routes in table order
    pub fn routes(&self) -> impl Iterator<Item = &DestinationRoute> {
        self.routes.iter()
    }

    pub fn fallback(&self) -> &DestinationRoute {
        &self.fallback
    }
}
