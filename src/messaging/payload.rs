//! # Payload Resolution
//!
//! Turns a route's payload reference into message body text. Literal
//! payloads are embedded in the route table; resource payloads are read in full
//! from a [`PayloadSource`] before any message is built.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::errors::{MessagingError, MessagingResult};

/// Upper bound on a resource body, in bytes
pub const MAX_RESOURCE_BYTES: u64 = 1024 * 1024;

/// Where a route's message body comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadSpec {
    /// Body text embedded in the route table
    Literal(String),
    /// Body read from a named resource
    Resource(String),
}

impl PayloadSpec {
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    pub fn resource(name: impl Into<String>) -> Self {
        Self::Resource(name.into())
    }

    /// Resource name, absent for literal payloads
    pub fn payload_name(&self) -> Option<&str> {
        match self {
            Self::Literal(_) => None,
            Self::Resource(name) => Some(name),
        }
    }

    /// Resolve the body text, reading from `source` for resource payloads
    pub fn resolve(&self, source: &dyn PayloadSource) -> MessagingResult<String> {
        match self {
            Self::Literal(text) => Ok(text.clone()),
            Self::Resource(name) => source.read_resource(name),
        }
    }
}

impl std::fmt::Display for PayloadSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal(_) => f.write_str("literal"),
            Self::Resource(name) => write!(f, "resource {name}"),
        }
    }
}

/// Locates named demonstration payloads
pub trait PayloadSource: Send + Sync {
    /// Read the full contents of the named resource
    ///
    /// Fails with [`MessagingError::ResourceNotFound`] when the resource
    /// cannot be located and [`MessagingError::ResourceUnreadable`] when it
    /// cannot be read as text.
    fn read_resource(&self, name: &str) -> MessagingResult<String>;
}

/// Payload source backed by a directory of resource files
#[derive(Debug, Clone)]
pub struct ResourceDirectory {
    root: PathBuf,
}

impl ResourceDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resource names are bare file names; the directory is the only lookup root
    fn locate(&self, name: &str) -> MessagingResult<PathBuf> {
        let is_plain = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\'])
            && Path::new(name).is_relative();
        if !is_plain {
            return Err(MessagingError::resource_not_found(
                name,
                "resource names must be plain file names",
            ));
        }
        Ok(self.root.join(name))
    }
}

impl PayloadSource for ResourceDirectory {
    fn read_resource(&self, name: &str) -> MessagingResult<String> {
        let path = self.locate(name)?;
        debug!(resource = %name, path = %path.display(), "Reading payload resource");

        let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                MessagingError::resource_not_found(name, format!("{} does not exist", path.display()))
            }
            _ => MessagingError::resource_not_found(name, e.to_string()),
        })?;

        if !metadata.is_file() {
            return Err(MessagingError::resource_not_found(
                name,
                format!("{} is not a regular file", path.display()),
            ));
        }

        if metadata.len() > MAX_RESOURCE_BYTES {
            return Err(MessagingError::resource_unreadable(
                name,
                format!(
                    "{} bytes exceeds the {} byte limit",
                    metadata.len(),
                    MAX_RESOURCE_BYTES
                ),
            ));
        }

        let bytes = fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => MessagingError::resource_not_found(name, e.to_string()),
            _ => MessagingError::resource_unreadable(name, e.to_string()),
        })?;

        String::from_utf8(bytes)
            .map_err(|e| MessagingError::resource_unreadable(name, format!("not valid UTF-8: {e}")))
    }
}
