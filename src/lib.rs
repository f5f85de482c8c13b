//! A level-aware writer routing [slog](https://crates.io/crates/slog) records and other
//! pre-serialized log lines to [Google Cloud Logging](https://cloud.google.com/logging).
//!
//! The [`LogWriter`] looks up the Cloud Logging [`Severity`] for the [`Level`] of each record,
//! hands the record to a buffered [`googlelog`] client and returns without waiting for
//! delivery. Only [`Level::Fatal`] records are flushed before the write returns, since the
//! process is expected to exit right after them.
//!
//! A writer can be used through:
//!
//! 1. [`LevelWrite::write_level`]: for records serialized elsewhere that carry a level.
//! 2. [`std::io::Write`]: for plain log lines, e.g. from the standard library or a terminal
//!    formatter. These are written with [`Level::NoLevel`].
//! 3. [`slog::Drain`]: records are serialized into JSON, see the [`drain`] module.
//!
//! Clients created through [`LogWriter::new`] are kept by a [`ClientRegistry`]. Close it when
//! the application shuts down so buffered entries make it to Cloud Logging:
//!
//! ```no_run
//! use slog_gcl::{ClientRegistry, Level, LevelWrite, LogWriter};
//!
//! # async fn run() -> Result<(), slog_gcl::Error> {
//! let registry = ClientRegistry::new();
//! let writer = LogWriter::from_env(&registry).await?;
//! writer.write_level(Level::Info, br#"{"message":"started"}"#)?;
//!
//! registry.close();
//! # Ok(())
//! # }
//! ```

/// Traits the writer uses to talk to the logging service client
pub mod backend;

/// Environment configuration
pub mod config;

/// The [`slog::Drain`](https://slog-rs.github.io/slog/slog/trait.Drain.html) implementation
pub mod drain;

pub mod error;

/// Application levels and their mapping to Cloud Logging severities
pub mod level;

/// Closing the clients created by managed writers
pub mod registry;

pub mod writer;

pub use drain::FallbackToStderr;
pub use error::Error;
pub use googlelog::Severity;
pub use level::{default_level_mapping, Level, LevelMapping};
pub use registry::ClientRegistry;
pub use writer::{LevelWrite, LogWriter};
