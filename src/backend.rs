//! The seam between the [`LogWriter`](crate::writer::LogWriter) and the logging service client.
//!
//! [`googlelog::Client`] is the production implementation. Errors are the client's own and are
//! passed through untranslated.
use async_trait::async_trait;
use googlelog::{ClientConfig, Entry, Error, LoggerOptions};

/// Something that holds connections and must be closed on shutdown.
pub trait Closer: Send + Sync {
    /// Flushes whatever is buffered and releases the underlying resources.
    fn close(&self) -> Result<(), Error>;
}

/// A logging service client handing out per-log handles.
#[async_trait]
pub trait LogClient: Closer + Sized + 'static {
    type Logger: LogHandle;
    type Config: Send;
    type Options: Send;

    /// Creates a client for the given resource parent, e.g. `projects/my-project`.
    async fn connect(parent: &str, config: Self::Config) -> Result<Self, Error>;

    /// Verifies the service can be reached and written to.
    async fn ping(&self) -> Result<(), Error>;

    /// Returns a handle writing to the log identified by `log_id`.
    fn logger(&self, log_id: &str, options: Self::Options) -> Self::Logger;
}

/// A handle to one log. Entries are buffered; `flush` waits for their delivery.
pub trait LogHandle: Send + Sync {
    fn log(&self, entry: Entry);

    fn flush(&self) -> Result<(), Error>;
}

impl Closer for googlelog::Client {
    fn close(&self) -> Result<(), Error> {
        googlelog::Client::close(self)
    }
}

#[async_trait]
impl LogClient for googlelog::Client {
    type Logger = googlelog::Logger;
    type Config = ClientConfig;
    type Options = LoggerOptions;

    async fn connect(parent: &str, config: ClientConfig) -> Result<Self, Error> {
        googlelog::Client::with_config(parent, config)
    }

    async fn ping(&self) -> Result<(), Error> {
        googlelog::Client::ping(self).await
    }

    fn logger(&self, log_id: &str, options: LoggerOptions) -> googlelog::Logger {
        googlelog::Client::logger(self, log_id, options)
    }
}

impl LogHandle for googlelog::Logger {
    fn log(&self, entry: Entry) {
        googlelog::Logger::log(self, entry)
    }

    fn flush(&self) -> Result<(), Error> {
        googlelog::Logger::flush(self)
    }
}
