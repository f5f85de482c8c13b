use thiserror::Error;

/// Errors returned by the [`LogWriter`](crate::writer::LogWriter) and its constructors.
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the Cloud Logging client, passed through as is.
    #[error(transparent)]
    Backend(#[from] googlelog::Error),

    /// A required environment variable is not set.
    #[error("required setting {0} is not set")]
    MissingSetting(String),

    /// The key-values of a slog record could not be serialized.
    #[error("could not serialize log record: {0}")]
    Record(#[from] slog::Error),

    #[error("could not encode log record as JSON: {0}")]
    Json(#[from] serde_json::Error),
}
