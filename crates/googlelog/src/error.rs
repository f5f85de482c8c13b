use reqwest::{self, StatusCode};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Failed to read the common labels object, it must be a JSON object of strings. Parse error: {0}")]
    CommonLabelsError(serde_json::Error),
    #[error("Failed to read the resource labels object, it must be a JSON object of strings. Parse error: {0}")]
    ResourceLabelsError(serde_json::Error),
    #[error("Serde JSON serialization failed with context '{context}'. Error: {source}")]
    SerializeError {
        context: String,
        source: serde_json::Error,
    },
    #[error("Reqwest error with context '{context}'. Error: {source}")]
    ReqwestError {
        context: String,
        source: reqwest::Error,
    },
    #[error("No 'access_token' found in the metadata server response body")]
    TokenNotFound,
    #[error("No 'expires_in' found in the metadata server response body")]
    TokenExpiryNotFound,
    #[error("unsuccessful HTTP response error with context '{context}'. HTTP status code: '{status}', body: '{body}'")]
    HttpResponseError {
        context: String,
        status: StatusCode,
        body: String,
    },
    #[error("invalid resource parent '{0}', expected e.g. 'projects/my-project'")]
    InvalidParent(String),
    #[error("Failed to start the shipper runtime: {0}")]
    RuntimeError(std::io::Error),
    #[error("the logging client is closed")]
    Closed,
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::ReqwestError {
            context: "Error sending HTTP request".to_string(),
            source: err,
        }
    }
}
