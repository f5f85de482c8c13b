//! A buffered client for [Google Cloud Logging](https://cloud.google.com/logging).
//!
//! # Usage
//!
//! Warning: Currently, this library only works in the context of [workload identity](https://cloud.google.com/iam/docs/workload-identity-federation).
//! Access tokens are fetched from the metadata server and cached until shortly before they expire.
//!
//! Create a [`Client`](client::Client) for a resource parent, check that it can reach the API
//! with [`ping()`](client::Client::ping), and ask it for a [`Logger`](logger::Logger) per log.
//! Loggers buffer [`Entry`](entry::Entry) values and send them in batches from a background task
//! on a runtime owned by the client; [`flush()`](logger::Logger::flush) blocks the calling thread
//! until everything logged so far was delivered.
//!
//! ```no_run
//! use googlelog::{Client, Entry, LoggerOptions, Severity};
//!
//! # async fn run() -> Result<(), googlelog::Error> {
//! let client = Client::new("projects/my-gcp-project")?;
//! client.ping().await?;
//!
//! let logger = client.logger("my-log-id", LoggerOptions::default().with_resource("k8s_container"));
//! logger.log(Entry::new(Severity::Info, r#"{"message":"started"}"#));
//!
//! client.close()?;
//! # Ok(())
//! # }
//! ```

/// The Cloud Logging client and its configuration
pub mod client;

/// A log entry before it is handed to the shipper
pub mod entry;

/// Googlelog Error types
pub mod error;

/// Per-log handles and their options
pub mod logger;

/// Cloud Logging severities
pub mod severity;

mod runtime;

mod shipper;

pub use client::{Client, ClientConfig};
pub use entry::Entry;
pub use error::Error;
pub use logger::{Logger, LoggerOptions};
pub use severity::Severity;
