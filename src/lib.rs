#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Message Workshop
//!
//! A demonstration message-publishing client. Given a selector it builds one
//! of several canned messages and publishes it to a queue or topic, exercising
//! normal delivery, dead-lettering of a malformed batch, and broker-side
//! duplicate detection through an idempotency key.
//!
//! ## Module Organization
//!
//! - [`messaging`] - Payloads, message descriptors, routing and the publish interface
//! - [`dispatcher`] - Runs one selector against an open publish session
//! - [`config`] - TOML configuration with environment overrides
//! - [`logging`] - Console logging setup
//! - [`error`] - Top-level error type and exit codes
//!
//! ## Quick Start
//!
//! ```rust
//! use message_workshop::dispatcher::{Dispatcher, TracingSink};
//! use message_workshop::messaging::service::InMemoryBroker;
//! use message_workshop::messaging::{DestinationRouter, ResourceDirectory};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dispatcher = Dispatcher::new(
//!     DestinationRouter::new("test.alchemy", "magic.alerts"),
//!     ResourceDirectory::new("resources"),
//!     TracingSink,
//! );
//!
//! let broker = InMemoryBroker::new();
//! let report = dispatcher.run(&broker, Some("magic.alerts")).await?;
//!
//! assert_eq!(report.send_count(), 1);
//! assert!(broker.is_closed());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod messaging;

pub use config::WorkshopConfig;
pub use dispatcher::{DiagnosticSink, DispatchReport, Dispatcher, TracingSink};
pub use error::{WorkshopError, WorkshopResult};
