use crate::error::Error;
use crate::logger::{flush_shipper, Command, Logger, LoggerOptions};
use crate::runtime::ShipperRuntime;
use crate::shipper::{Shipper, Transport};

use chrono::Utc;
use google_logging2::api::{LogEntry, MonitoredResource, WriteLogEntriesRequest};
use slog::{debug, o, Discard};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc::{channel, Sender};

pub const DEFAULT_API_ENDPOINT: &str = "https://logging.googleapis.com";

// When is using the IP better?
pub const DEFAULT_METADATA_ENDPOINT: &str = "http://metadata.google.internal";

const PARENT_KINDS: [&str; 4] = ["projects", "folders", "organizations", "billingAccounts"];

/// Where and how the [`Client`] talks to Google.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the Logging API.
    pub api_endpoint: String,
    /// Base URL of the metadata server handing out workload identity tokens.
    pub metadata_endpoint: String,
    pub request_timeout: Duration,
    /// Receives the client's own diagnostics, e.g. failed sends.
    pub log: slog::Logger,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            metadata_endpoint: DEFAULT_METADATA_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(30),
            log: slog::Logger::root(Discard, o!()),
        }
    }
}

/// A Cloud Logging client for one resource parent.
///
/// Hands out [`Logger`]s for individual logs. Each logger ships its entries from a background
/// task on a single-worker runtime owned by the client. The client neither needs nor uses the
/// caller's runtime, so loggers never keep that runtime from shutting down.
pub struct Client {
    parent: String,
    transport: Arc<Transport>,
    runtime: Arc<ShipperRuntime>,
    // Only changed together with `closed`, under this lock.
    loggers: Mutex<Vec<Sender<Command>>>,
    closed: Arc<AtomicBool>,
    log: slog::Logger,
}

impl Client {
    /// Creates a client for `parent` with the default configuration.
    ///
    /// `parent` is one of `projects/PROJECT_ID`, `folders/FOLDER_ID`, `organizations/ORG_ID`,
    /// `billingAccounts/ACCOUNT_ID` or a bare project id.
    pub fn new(parent: &str) -> Result<Self, Error> {
        Self::with_config(parent, ClientConfig::default())
    }

    pub fn with_config(parent: &str, config: ClientConfig) -> Result<Self, Error> {
        let parent = normalize_parent(parent)?;
        let transport = Arc::new(Transport::new(&config)?);
        let runtime = Arc::new(ShipperRuntime::start()?);
        let log = config.log.new(o!("parent" => parent.clone()));
        Ok(Client {
            parent,
            transport,
            runtime,
            loggers: Mutex::new(Vec::new()),
            closed: Arc::new(AtomicBool::new(false)),
            log,
        })
    }

    pub fn parent(&self) -> &str {
        &self.parent
    }

    /// Checks that the Logging API accepts writes for this parent with a dry-run write.
    pub async fn ping(&self) -> Result<(), Error> {
        let entry = LogEntry {
            text_payload: Some("ping".to_string()),
            timestamp: Some(Utc::now()),
            ..Default::default()
        };
        let body = WriteLogEntriesRequest {
            log_name: Some(log_name(&self.parent, "ping")),
            resource: Some(MonitoredResource {
                type_: Some("global".to_string()),
                labels: None,
            }),
            entries: Some(vec![entry]),
            dry_run: Some(true),
            ..Default::default()
        };
        let transport = self.transport.clone();
        self.runtime
            .spawn(async move { transport.write_entries(&body).await })
            .await
            .map_err(|_| Error::Closed)?
    }

    /// Creates a logger writing to the log `log_id`.
    ///
    /// A log ID must be less than 512 characters long and can only include upper and lower case
    /// alphanumeric characters and the punctuation characters forward-slash, underscore, hyphen
    /// and period. This is checked by the Logging API, not here.
    pub fn logger(&self, log_id: &str, options: LoggerOptions) -> Logger {
        let log_name = log_name(&self.parent, log_id);
        let (tx, rx) = channel::<Command>(options.buffered_entry_limit);
        let log = self.log.new(o!("log_name" => log_name.clone()));

        let severity_label = options.severity_label.clone();
        let shipper = Shipper::new(
            self.transport.clone(),
            log_name.clone(),
            options,
            rx,
            log.clone(),
        );
        self.runtime.spawn(shipper.run_log_shipper());

        {
            let mut loggers = self.loggers.lock().unwrap_or_else(PoisonError::into_inner);
            if !self.closed.load(Ordering::Acquire) {
                loggers.push(tx.clone());
            }
        }
        debug!(log, "Created logger");
        Logger::new(
            log_name,
            severity_label,
            tx,
            self.runtime.clone(),
            self.closed.clone(),
            log,
        )
    }

    /// Flushes every logger created by this client, then stops their shippers.
    ///
    /// Blocks the calling thread until the flushes complete. Returns the first flush error.
    /// Loggers of a closed client drop new entries. Closing twice returns [`Error::Closed`].
    pub fn close(&self) -> Result<(), Error> {
        let loggers = {
            let mut loggers = self.loggers.lock().unwrap_or_else(PoisonError::into_inner);
            if self.closed.swap(true, Ordering::AcqRel) {
                return Err(Error::Closed);
            }
            std::mem::take(&mut *loggers)
        };
        let mut first_error = None;
        for tx in loggers {
            if let Err(e) = flush_shipper(&self.runtime, &tx) {
                first_error.get_or_insert(e);
            }
        }
        self.runtime.shutdown();
        debug!(self.log, "Closed client");
        first_error.map_or(Ok(()), Err)
    }
}

fn normalize_parent(parent: &str) -> Result<String, Error> {
    let trimmed = parent.trim();
    match trimmed.split_once('/') {
        None if !trimmed.is_empty() => Ok(format!("projects/{trimmed}")),
        Some((kind, id)) if PARENT_KINDS.contains(&kind) && !id.is_empty() && !id.contains('/') => {
            Ok(trimmed.to_string())
        }
        _ => Err(Error::InvalidParent(parent.to_string())),
    }
}

fn log_name(parent: &str, log_id: &str) -> String {
    let escaped: String = url::form_urlencoded::byte_serialize(log_id.as_bytes()).collect();
    format!("{parent}/logs/{escaped}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Entry, Severity};
    use pretty_assertions::assert_eq;

    #[test]
    fn bare_project_id_becomes_projects_parent() {
        assert_eq!("projects/my-project", normalize_parent("my-project").unwrap());
    }

    #[test]
    fn qualified_parents_are_kept() {
        assert_eq!("folders/1234", normalize_parent("folders/1234").unwrap());
        assert_eq!(
            "billingAccounts/0000-AAAA",
            normalize_parent("billingAccounts/0000-AAAA").unwrap()
        );
    }

    #[test]
    fn malformed_parents_are_rejected() {
        for parent in ["", "  ", "projects/", "teams/abc", "projects/a/b", "folders/1/"] {
            assert!(
                matches!(normalize_parent(parent), Err(Error::InvalidParent(_))),
                "{parent}"
            );
        }
    }

    #[test]
    fn log_id_is_path_escaped() {
        assert_eq!(
            "projects/p/logs/cloudaudit.googleapis.com%2Factivity",
            log_name("projects/p", "cloudaudit.googleapis.com/activity")
        );
        assert_eq!("projects/p/logs/my_app-1", log_name("projects/p", "my_app-1"));
    }

    // Nothing is logged in the tests below, so flushing doesn't touch the network.

    #[test]
    fn client_works_without_an_ambient_runtime() {
        let client = Client::new("my-project").unwrap();
        let logger = client.logger("app", LoggerOptions::default());
        assert!(logger.flush().is_ok());
        assert!(client.close().is_ok());
    }

    #[tokio::test]
    async fn flush_returns_on_a_current_thread_runtime() {
        let client = Client::new("my-project").unwrap();
        let logger = client.logger("app", LoggerOptions::default());
        assert!(logger.flush().is_ok());
        assert!(client.close().is_ok());
    }

    #[tokio::test]
    async fn close_twice_reports_closed() {
        let client = Client::new("my-project").unwrap();
        let _logger = client.logger("app", LoggerOptions::default());
        assert!(client.close().is_ok());
        assert!(matches!(client.close(), Err(Error::Closed)));
    }

    #[test]
    fn dropping_the_callers_runtime_does_not_wait_for_loggers() {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let (client, logger) = rt.block_on(async {
            let client = Client::new("my-project").unwrap();
            let logger = client.logger("app", LoggerOptions::default());
            (client, logger)
        });
        client.close().unwrap();

        drop(rt);

        logger.log(Entry::new(Severity::Info, "after shutdown"));
        assert!(matches!(logger.flush(), Err(Error::Closed)));
    }

    #[test]
    fn logger_created_after_close_is_not_tracked() {
        let client = Client::new("my-project").unwrap();
        client.close().unwrap();

        let logger = client.logger("late", LoggerOptions::default());

        assert!(client.loggers.lock().unwrap().is_empty());
        assert!(matches!(logger.flush(), Err(Error::Closed)));
    }

    #[tokio::test]
    async fn ping_after_close_reports_closed() {
        let client = Client::new("my-project").unwrap();
        client.close().unwrap();
        assert!(matches!(client.ping().await, Err(Error::Closed)));
    }
}
