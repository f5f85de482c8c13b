use crate::entry::Entry;
use crate::error::Error;
use crate::runtime::ShipperRuntime;

use google_logging2::api::{LogEntry, MonitoredResource};

use slog::warn;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, SyncSender};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;

/// Entries buffered before the shipper sends a batch.
pub const DEFAULT_ENTRY_COUNT_THRESHOLD: usize = 1000;

/// Maximum time an entry is buffered before the shipper sends it.
pub const DEFAULT_DELAY_THRESHOLD: Duration = Duration::from_secs(1);

/// Entries a [`Logger`] holds before new ones are dropped.
pub const DEFAULT_BUFFERED_ENTRY_LIMIT: usize = 10_000;

/// Options applied to a [`Logger`] when it is created by [`Client::logger`](crate::client::Client::logger).
#[derive(Debug, Clone)]
pub struct LoggerOptions {
    pub(crate) common_labels: HashMap<String, String>,
    pub(crate) resource: MonitoredResource,
    pub(crate) severity_label: Option<String>,
    pub(crate) entry_count_threshold: usize,
    pub(crate) delay_threshold: Duration,
    pub(crate) buffered_entry_limit: usize,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            common_labels: HashMap::new(),
            resource: MonitoredResource {
                type_: Some("global".to_string()),
                labels: None,
            },
            severity_label: None,
            entry_count_threshold: DEFAULT_ENTRY_COUNT_THRESHOLD,
            delay_threshold: DEFAULT_DELAY_THRESHOLD,
            buffered_entry_limit: DEFAULT_BUFFERED_ENTRY_LIMIT,
        }
    }
}

impl LoggerOptions {
    /// Sets labels applied to every entry written by the logger.
    ///
    /// These populate the `labels` field of the [WriteLogEntries](https://cloud.google.com/logging/docs/reference/v2/rest/v2/entries/write) request.
    ///
    /// # Example
    ///
    /// ```
    /// use googlelog::logger::LoggerOptions;
    /// use serde_json::json;
    ///
    /// let options = LoggerOptions::default()
    ///     .with_common_labels(json!({
    ///         "application": "my-application",
    ///         "environment": "production",
    ///     }))
    ///     .unwrap();
    /// ```
    ///
    /// # Errors
    ///
    /// Will return `Err` if `labels` is not a JSON object of strings.
    #[must_use = "The options must be used"]
    pub fn with_common_labels(self, labels: serde_json::Value) -> Result<Self, Error> {
        Ok(Self {
            common_labels: serde_json::from_value(labels).map_err(Error::CommonLabelsError)?,
            ..self
        })
    }

    /// Sets the `type` of the [MonitoredResource](https://cloud.google.com/logging/docs/reference/v2/rest/v2/MonitoredResource)
    /// the entries are attributed to, for example `k8s_container`. Defaults to `global`.
    #[must_use = "The options must be used"]
    pub fn with_resource(self, resource_type: &str) -> Self {
        Self {
            resource: MonitoredResource {
                type_: Some(resource_type.to_string()),
                ..self.resource
            },
            ..self
        }
    }

    /// Sets the labels of the monitored resource.
    ///
    /// # Errors
    ///
    /// Will return `Err` if `labels` is not a JSON object of strings.
    #[must_use = "The options must be used"]
    pub fn with_resource_labels(self, labels: serde_json::Value) -> Result<Self, Error> {
        let labels = serde_json::from_value(labels).map_err(Error::ResourceLabelsError)?;
        Ok(Self {
            resource: MonitoredResource {
                labels: Some(labels),
                ..self.resource
            },
            ..self
        })
    }

    /// Adds the severity of each entry under this label name.
    ///
    /// If not set, the severity is still available in the entry's `severity` field.
    #[must_use = "The options must be used"]
    pub fn with_severity_label(self, label: &str) -> Self {
        Self {
            severity_label: Some(label.into()),
            ..self
        }
    }

    #[must_use = "The options must be used"]
    pub fn with_entry_count_threshold(self, threshold: usize) -> Self {
        Self {
            entry_count_threshold: threshold.max(1),
            ..self
        }
    }

    #[must_use = "The options must be used"]
    pub fn with_delay_threshold(self, threshold: Duration) -> Self {
        Self {
            delay_threshold: threshold.max(Duration::from_millis(1)),
            ..self
        }
    }

    #[must_use = "The options must be used"]
    pub fn with_buffered_entry_limit(self, limit: usize) -> Self {
        Self {
            buffered_entry_limit: limit.max(1),
            ..self
        }
    }
}

/// Messages from a [`Logger`] handle to its shipper.
pub(crate) enum Command {
    Entry(LogEntry),
    Flush(SyncSender<Result<(), Error>>),
}

/// A handle writing entries to one log of a [`Client`](crate::client::Client).
///
/// Entries are buffered and sent in batches in the background. Use [`Logger::flush`] to wait
/// for everything logged so far to be delivered.
pub struct Logger {
    log_name: String,
    severity_label: Option<String>,
    tx: Sender<Command>,
    runtime: Arc<ShipperRuntime>,
    closed: Arc<AtomicBool>,
    log: slog::Logger,
}

impl Logger {
    pub(crate) fn new(
        log_name: String,
        severity_label: Option<String>,
        tx: Sender<Command>,
        runtime: Arc<ShipperRuntime>,
        closed: Arc<AtomicBool>,
        log: slog::Logger,
    ) -> Self {
        Self {
            log_name,
            severity_label,
            tx,
            runtime,
            closed,
            log,
        }
    }

    /// The full resource name of the log, e.g. `projects/my-project/logs/syslog`.
    pub fn log_name(&self) -> &str {
        &self.log_name
    }

    /// Buffers the entry for sending. Never blocks; the entry is dropped when the buffer is full
    /// or the client has been closed.
    pub fn log(&self, entry: Entry) {
        if self.closed.load(Ordering::Acquire) {
            warn!(self.log, "Dropping log entry, the client is closed");
            return;
        }
        let log_entry = entry.into_log_entry(self.severity_label.as_deref());
        match self.tx.try_send(Command::Entry(log_entry)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!(self.log, "Log buffer is full, dropping entry"),
            Err(TrySendError::Closed(_)) => {
                warn!(self.log, "Log shipper has stopped, dropping entry")
            }
        }
    }

    /// Blocks the calling thread until all entries logged before this call have been sent or
    /// failed to send.
    ///
    /// Returns the first error the shipper ran into since the previous flush. The shipper runs on
    /// the client's own runtime, so this may be called from any thread, including the worker of a
    /// current-thread Tokio runtime. That worker is stalled until the flush completes.
    pub fn flush(&self) -> Result<(), Error> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }
        flush_shipper(&self.runtime, &self.tx)
    }
}

pub(crate) fn flush_shipper(runtime: &ShipperRuntime, tx: &Sender<Command>) -> Result<(), Error> {
    let (ack_tx, ack_rx) = sync_channel(1);
    let tx = tx.clone();
    // Queued behind the entries already sent. A stopped shipper drops the ack sender.
    runtime.spawn(async move {
        let _ = tx.send(Command::Flush(ack_tx)).await;
    });
    ack_rx.recv().map_err(|_| Error::Closed)?
}
