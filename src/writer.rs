use crate::backend::{LogClient, LogHandle};
use crate::config;
use crate::error::Error;
use crate::level::{default_level_mapping, Level, LevelMapping};
use crate::registry::ClientRegistry;

use googlelog::{Entry, Severity};
use std::io;
use std::sync::{Arc, PoisonError, RwLock};

/// A sink accepting pre-serialized log records together with their level.
pub trait LevelWrite {
    /// Writes `payload` at `level`, returning the number of bytes accepted.
    ///
    /// Writes at [`Level::Fatal`] block until the payload has been flushed.
    fn write_level(&self, level: Level, payload: &[u8]) -> Result<usize, Error>;
}

/// Writes log records to one log of a Cloud Logging client, translating application levels
/// into Cloud Logging severities.
///
/// Records are handed to the client without blocking, except for [`Level::Fatal`] records:
/// those are flushed before the write returns since the process is expected to exit right
/// after. A fatal write blocks the calling thread until the client has tried to deliver
/// everything buffered, which is safe on any Tokio runtime with [`googlelog::Client`] since
/// it ships from a runtime of its own.
pub struct LogWriter<C: LogClient> {
    client: Arc<C>,
    logger: C::Logger,
    level_mapping: RwLock<Arc<LevelMapping>>,
}

impl<C: LogClient> LogWriter<C> {
    /// Creates a client for `parent` from `config`, checks that it can reach the logging service
    /// and registers it with `registry` so it gets closed on [`ClientRegistry::close`].
    ///
    /// Nothing is registered when connecting or pinging fails. To use a client whose life cycle
    /// you manage yourself, use [`LogWriter::with_client`].
    pub async fn new(
        registry: &ClientRegistry,
        parent: &str,
        log_id: &str,
        config: C::Config,
        options: C::Options,
    ) -> Result<Self, Error> {
        let client = C::connect(parent, config).await?;
        client.ping().await?;

        let client = Arc::new(client);
        registry.register(client.clone());
        Ok(Self::with_client(client, log_id, options))
    }

    /// Creates a writer for the log `log_id` of an existing client.
    ///
    /// A log ID must be less than 512 characters long and can only include upper and lower case
    /// alphanumeric characters and the punctuation characters forward-slash, underscore, hyphen
    /// and period.
    pub fn with_client(client: Arc<C>, log_id: &str, options: C::Options) -> Self {
        let logger = client.logger(log_id, options);
        LogWriter {
            client,
            logger,
            level_mapping: RwLock::new(Arc::new(default_level_mapping())),
        }
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Replaces the level to severity mapping as a whole. Levels absent from `mapping` are
    /// written with [`Severity::Default`] from now on.
    pub fn set_level_mapping(&self, mapping: LevelMapping) {
        *self
            .level_mapping
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(mapping);
    }

    /// The mapping currently in use.
    pub fn level_mapping(&self) -> Arc<LevelMapping> {
        self.level_mapping
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn severity(&self, level: Level) -> Severity {
        self.level_mapping()
            .get(&level)
            .copied()
            .unwrap_or_default()
    }
}

impl LogWriter<googlelog::Client> {
    /// Like [`LogWriter::new`], taking the parent, log ID and endpoints from the environment.
    ///
    /// The client's own diagnostics are discarded. Pass a [`googlelog::ClientConfig`] with a
    /// logger of your own to [`LogWriter::new`] to receive them, e.g.
    /// `ClientConfig { log, ..config::client_config()? }`.
    pub async fn from_env(registry: &ClientRegistry) -> Result<Self, Error> {
        let settings = config::WriterSettings::from_env()?;
        Self::new(
            registry,
            &settings.parent,
            &settings.log_id,
            config::client_config()?,
            googlelog::LoggerOptions::default(),
        )
        .await
    }
}

impl<C: LogClient> LevelWrite for LogWriter<C> {
    fn write_level(&self, level: Level, payload: &[u8]) -> Result<usize, Error> {
        self.logger.log(Entry::new(self.severity(level), payload.to_vec()));

        // The entry may already be on its way when the flush fails, the write is reported as
        // failed regardless.
        if level == Level::Fatal {
            self.logger.flush()?;
        }
        Ok(payload.len())
    }
}

impl<C: LogClient> io::Write for LogWriter<C> {
    /// Writes `buf` as a record without a level.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_level(Level::NoLevel, buf).map_err(io::Error::other)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.logger.flush().map_err(io::Error::other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{MockClient, Recording};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::atomic::Ordering;
    use strum::IntoEnumIterator;

    fn writer() -> (LogWriter<MockClient>, Arc<Recording>) {
        let client = Arc::new(MockClient::new());
        let recording = client.recording.clone();
        (LogWriter::with_client(client, "app", ()), recording)
    }

    #[test]
    fn levels_map_to_default_severities() {
        let (writer, recording) = writer();
        let mapping = default_level_mapping();
        for level in Level::iter() {
            writer.write_level(level, b"{}").unwrap();
            assert_eq!(mapping[&level], recording.last_entry().severity, "{level}");
        }
    }

    #[test]
    fn unmapped_level_gets_default_severity() {
        let (writer, recording) = writer();
        writer.set_level_mapping(HashMap::from([(Level::Error, Severity::Error)]));

        writer.write_level(Level::Warn, b"{}").unwrap();
        writer.write_level(Level::Error, b"{}").unwrap();

        assert_eq!(
            vec![Severity::Default, Severity::Error],
            recording.severities()
        );
    }

    #[test]
    fn payload_is_passed_as_is() {
        let (writer, recording) = writer();
        writer.set_level_mapping(HashMap::from([(Level::Error, Severity::Error)]));

        let written = writer.write_level(Level::Error, br#"{"msg":"x"}"#).unwrap();

        assert_eq!(11, written);
        let entry = recording.last_entry();
        assert_eq!(Severity::Error, entry.severity);
        assert_eq!(br#"{"msg":"x"}"#.to_vec(), entry.payload);
    }

    #[test]
    fn plain_write_has_no_level() {
        let (mut writer, recording) = writer();
        writer.set_level_mapping(HashMap::from([(Level::NoLevel, Severity::Notice)]));

        assert_eq!(5, writer.write(b"hello").unwrap());
        writer.write_level(Level::NoLevel, b"hello").unwrap();

        let entries = recording.entries.lock().unwrap();
        assert_eq!(2, entries.len());
        assert_eq!(entries[0], entries[1]);
        assert_eq!(Severity::Notice, entries[0].severity);
    }

    #[test]
    fn only_fatal_writes_flush() {
        let (writer, recording) = writer();
        for level in Level::iter().filter(|l| *l != Level::Fatal) {
            writer.write_level(level, b"{}").unwrap();
        }
        assert_eq!(0, recording.flush_count());

        writer.write_level(Level::Fatal, b"{}").unwrap();
        assert_eq!(1, recording.flush_count());
    }

    #[test]
    fn failed_fatal_flush_fails_the_write() {
        let (writer, recording) = writer();
        recording.fail_flush.store(true, Ordering::SeqCst);

        let result = writer.write_level(Level::Fatal, b"{\"msg\":\"bye\"}");

        assert!(matches!(
            result,
            Err(Error::Backend(googlelog::Error::Closed))
        ));
        assert_eq!(vec![Severity::Alert], recording.severities());
    }

    #[test]
    fn replacing_the_mapping_drops_old_levels() {
        let (writer, recording) = writer();
        writer.write_level(Level::Info, b"{}").unwrap();
        writer.set_level_mapping(HashMap::from([(Level::Error, Severity::Critical)]));
        writer.write_level(Level::Info, b"{}").unwrap();

        assert_eq!(vec![Severity::Info, Severity::Default], recording.severities());
        assert_eq!(1, writer.level_mapping().len());
    }

    #[test]
    fn io_flush_flushes_the_logger() {
        let (mut writer, recording) = writer();
        writer.flush().unwrap();
        assert_eq!(1, recording.flush_count());
    }
}
