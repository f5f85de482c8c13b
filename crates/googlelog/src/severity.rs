use std::fmt;

/// The severity of a log entry as understood by Cloud Logging.
///
/// See <https://cloud.google.com/logging/docs/reference/v2/rest/v2/LogEntry#logseverity>
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    /// The log entry has no assigned severity level.
    #[default]
    Default,
    Debug,
    Info,
    /// Normal but significant events, such as start up, shut down, or a configuration change.
    Notice,
    Warning,
    Error,
    /// Critical events cause more severe problems or outages.
    Critical,
    /// A person must take an action immediately.
    Alert,
    /// One or more systems are unusable.
    Emergency,
}

impl Severity {
    /// The `LogSeverity` name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Default => "DEFAULT",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Notice => "NOTICE",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
            Severity::Alert => "ALERT",
            Severity::Emergency => "EMERGENCY",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
