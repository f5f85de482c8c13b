use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Receiver;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;

use google_logging2::api::{LogEntry, MonitoredResource, WriteLogEntriesRequest};

use chrono::{DateTime, TimeDelta, Utc};

use reqwest::{Client, Response};

use slog::error;

use crate::client::ClientConfig;
use crate::error::Error;
use crate::logger::{Command, LoggerOptions};

const USER_AGENT: &str = concat!("googlelog/", env!("CARGO_PKG_VERSION"));

/// Token caching
#[derive(Default)]
pub(crate) struct Token {
    token: Option<String>,
    renew_after: DateTime<Utc>,
}

async fn get_error_response(response: Response, context: String) -> Error {
    let status = response.status();

    let body = match response.bytes().await {
        Ok(bytes) => match serde_json::from_slice::<String>(&bytes) {
            Ok(json) => json,
            Err(_) => String::from_utf8_lossy(&bytes).to_string(),
        },
        Err(e) => format!("could not decode body of HTTP Error response: {e}"),
    };

    Error::HttpResponseError {
        context,
        status,
        body,
    }
}

impl Token {
    fn renew_after_from_expires_in(expires_in: u64) -> DateTime<Utc> {
        let renew_after = TimeDelta::seconds(expires_in.saturating_sub(60) as i64);
        Utc::now() + renew_after
    }

    async fn fetch_access_token(
        &mut self,
        client: &Client,
        metadata_endpoint: &str,
    ) -> Result<String, Error> {
        if let Some(token) = &self.token {
            if Utc::now() < self.renew_after {
                return Ok(token.clone());
            }
        }

        let url = format!(
            "{metadata_endpoint}/computeMetadata/v1/instance/service-accounts/default/token"
        );
        let response = client
            .get(url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| Error::ReqwestError {
                context: "performing HTTP GET token credentials from metadata server".to_string(),
                source: e,
            })?;

        if response.status().is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| Error::ReqwestError {
                    context: "consuming response body of access token request".to_string(),
                    source: e,
                })?;
            let token_data: serde_json::Value =
                serde_json::from_str(&body).map_err(|e| Error::SerializeError {
                    context: "deserializing token data".to_string(),
                    source: e,
                })?;
            let token_str = token_data["access_token"]
                .as_str()
                .ok_or(Error::TokenNotFound)?
                .to_string();
            let expires_in = token_data["expires_in"]
                .as_u64()
                .ok_or(Error::TokenExpiryNotFound)?;
            self.token = Some(token_str.clone());
            self.renew_after = Self::renew_after_from_expires_in(expires_in);
            Ok(token_str)
        } else {
            Err(get_error_response(response, "fetching token".to_string()).await)
        }
    }
}

/// Authenticated access to the Logging API, shared by all shippers of a client.
pub(crate) struct Transport {
    client: Client,
    token: Mutex<Token>,
    api_endpoint: String,
    metadata_endpoint: String,
}

impl Transport {
    pub(crate) fn new(config: &ClientConfig) -> Result<Self, Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::ReqwestError {
                context: "building the HTTP client".to_string(),
                source: e,
            })?;
        Ok(Self {
            client,
            token: Mutex::new(Token::default()),
            api_endpoint: config.api_endpoint.trim_end_matches('/').to_string(),
            metadata_endpoint: config.metadata_endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub(crate) async fn write_entries(&self, body: &WriteLogEntriesRequest) -> Result<(), Error> {
        let token = self
            .token
            .lock()
            .await
            .fetch_access_token(&self.client, &self.metadata_endpoint)
            .await?;

        let url = format!("{}/v2/entries:write", self.api_endpoint);
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::ReqwestError {
                context: "performing HTTP POST request to the Google Logging API".to_string(),
                source: e,
            })?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(get_error_response(
                response,
                "response when sending log entries to Google Logging API".to_string(),
            )
            .await)
        }
    }
}

/// Batches the entries of one log and sends them to the Google Logging API
pub(crate) struct Shipper {
    transport: Arc<Transport>,
    log_name: String,
    resource: MonitoredResource,
    labels: HashMap<String, String>,
    entry_count_threshold: usize,
    delay_threshold: Duration,
    rx: Receiver<Command>,
    pending: Vec<LogEntry>,
    first_error: Option<Error>,
    log: slog::Logger,
}

impl Shipper {
    pub(crate) fn new(
        transport: Arc<Transport>,
        log_name: String,
        options: LoggerOptions,
        rx: Receiver<Command>,
        log: slog::Logger,
    ) -> Self {
        Shipper {
            transport,
            log_name,
            resource: options.resource,
            labels: options.common_labels,
            entry_count_threshold: options.entry_count_threshold,
            delay_threshold: options.delay_threshold,
            rx,
            pending: Vec::new(),
            first_error: None,
            log,
        }
    }

    async fn ship(&mut self) -> Result<(), Error> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let entries = std::mem::take(&mut self.pending);
        let count = entries.len();
        let body = WriteLogEntriesRequest {
            log_name: Some(self.log_name.clone()),
            resource: Some(self.resource.clone()),
            labels: (!self.labels.is_empty()).then(|| self.labels.clone()),
            entries: Some(entries),
            ..Default::default()
        };
        self.transport.write_entries(&body).await.map_err(|e| {
            error!(self.log, "Failed to send log entries: {}", e; "count" => count);
            e
        })
    }

    // Ships outside of a flush, keeping the error for the next flush to report.
    async fn ship_pending(&mut self) {
        if let Err(e) = self.ship().await {
            self.first_error.get_or_insert(e);
        }
    }

    /// The process that receives log entries and sends them to the Google Logging API
    pub(crate) async fn run_log_shipper(mut self) {
        let start = tokio::time::Instant::now() + self.delay_threshold;
        let mut ticker = tokio::time::interval_at(start, self.delay_threshold);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(Command::Entry(entry)) => {
                        self.pending.push(entry);
                        if self.pending.len() >= self.entry_count_threshold {
                            self.ship_pending().await;
                        }
                    }
                    Some(Command::Flush(ack)) => {
                        let result = self.ship().await;
                        let result = match self.first_error.take() {
                            Some(e) => Err(e),
                            None => result,
                        };
                        let _ = ack.send(result);
                    }
                    None => {
                        let _ = self.ship().await;
                        break;
                    }
                },
                _ = ticker.tick() => self.ship_pending().await,
            }
        }
    }
}
