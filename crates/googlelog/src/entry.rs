use crate::severity::Severity;

use chrono::{DateTime, Utc};
use google_logging2::api::LogEntry;
use std::collections::HashMap;

/// A single log entry handed to a [`Logger`](crate::logger::Logger).
///
/// The payload is opaque to the client. If it parses as a JSON object it is sent as the
/// entry's `jsonPayload`, otherwise as `textPayload`.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub severity: Severity,
    pub payload: Vec<u8>,
    /// Set to the time of [`Logger::log`](crate::logger::Logger::log) when absent.
    pub timestamp: Option<DateTime<Utc>>,
}

impl Entry {
    pub fn new(severity: Severity, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            severity,
            payload: payload.into(),
            timestamp: None,
        }
    }

    #[must_use]
    pub fn with_timestamp(self, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp: Some(timestamp),
            ..self
        }
    }

    pub(crate) fn into_log_entry(self, severity_label: Option<&str>) -> LogEntry {
        let labels = severity_label.map(|label| {
            HashMap::from([(label.to_string(), self.severity.as_str().to_string())])
        });

        let (json_payload, text_payload) =
            match serde_json::from_slice::<HashMap<String, serde_json::Value>>(&self.payload) {
                Ok(fields) => (Some(fields), None),
                Err(_) => {
                    let text = String::from_utf8_lossy(&self.payload);
                    let text = text.trim_end_matches(|c: char| c == '\n' || c == '\r');
                    (None, Some(text.to_string()))
                }
            };

        LogEntry {
            json_payload,
            text_payload,
            labels,
            severity: Some(self.severity.as_str().to_string()),
            timestamp: Some(self.timestamp.unwrap_or_else(Utc::now)),
            ..Default::default()
        }
    }
}
