//! # Message Descriptors
//!
//! A [`MessageDescriptor`] is a fully resolved, transport-independent message:
//! body text, MIME type and string properties. Descriptors are built before
//! any broker session is involved and handed to the publish interface as plain
//! values.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::{MessagingError, MessagingResult};

/// Property carrying the advisory content type
pub const MIME_TYPE_PROPERTY: &str = "Mime Type";

/// Property carrying the idempotency key used for duplicate detection
pub const UNIQUE_ID_PROPERTY: &str = "uniqueId";

/// Property attached to topic alerts naming the offender
pub const SNATCHER_PROPERTY: &str = "Snatcher";

/// Advisory content type attached to every message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MimeType {
    #[default]
    #[serde(rename = "text/html")]
    TextHtml,
    #[serde(rename = "application/xml")]
    ApplicationXml,
}

impl MimeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextHtml => "text/html",
            Self::ApplicationXml => "application/xml",
        }
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MimeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text/html" => Ok(Self::TextHtml),
            "application/xml" => Ok(Self::ApplicationXml),
            other => Err(format!(
                "unsupported MIME type '{other}' (expected text/html or application/xml)"
            )),
        }
    }
}

/// A message ready to publish
///
/// Fields are private so that every descriptor in existence has passed through
/// [`MessageBuilder::build`]: the body is non-empty and the MIME-type property
/// matches [`MessageDescriptor::mime_type`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDescriptor {
    body: String,
    mime_type: MimeType,
    properties: BTreeMap<String, String>,
}

impl MessageDescriptor {
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn mime_type(&self) -> MimeType {
        self.mime_type
    }

    /// All properties, including the MIME-type property
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Look up a single property value
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// The idempotency key, when one is attached
    pub fn unique_id(&self) -> Option<&str> {
        self.property(UNIQUE_ID_PROPERTY)
    }
}

/// Assembles [`MessageDescriptor`] values
///
/// Extra properties are applied in insertion order, later keys overriding
/// earlier ones. The MIME-type property is applied last at build time and
/// cannot be overridden.
///
/// # Examples
///
/// ```rust
/// use message_workshop::messaging::{MessageBuilder, MimeType, MIME_TYPE_PROPERTY};
///
/// let descriptor = MessageBuilder::new(MimeType::ApplicationXml)
///     .with_property("company", "Aladin's Magic Shop")
///     .with_property(MIME_TYPE_PROPERTY, "text/plain")
///     .build("<order id=\"X1355\"/>")
///     .unwrap();
///
/// assert_eq!(descriptor.property(MIME_TYPE_PROPERTY), Some("application/xml"));
/// assert_eq!(descriptor.property("company"), Some("Aladin's Magic Shop"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    mime_type: MimeType,
    properties: BTreeMap<String, String>,
}

impl MessageBuilder {
    pub fn new(mime_type: MimeType) -> Self {
        Self {
            mime_type,
            properties: BTreeMap::new(),
        }
    }

    /// Add or replace one extra property
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Add or replace several extra properties
    pub fn with_properties<I, K, V>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.properties
            .extend(properties.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Build a descriptor around `body`
    ///
    /// Fails with [`MessagingError::EmptyPayload`] when `body` is empty; no
    /// placeholder body is ever substituted.
    pub fn build(&self, body: impl Into<String>) -> MessagingResult<MessageDescriptor> {
        let body = body.into();
        if body.is_empty() {
            return Err(MessagingError::EmptyPayload);
        }

        let mut properties = self.properties.clone();
        properties.insert(
            MIME_TYPE_PROPERTY.to_string(),
            self.mime_type.as_str().to_string(),
        );

        Ok(MessageDescriptor {
            body,
            mime_type: self.mime_type,
            properties,
        })
    }
}
