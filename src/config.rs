use crate::error::Error;

use googlelog::client::{ClientConfig, DEFAULT_API_ENDPOINT, DEFAULT_METADATA_ENDPOINT};
use std::env;

/// The resource parent logs are written to, e.g. `projects/my-project` or just `my-project`.
pub const PARENT: Arg = Arg::NoDefault("GOOGLE_CLOUD_PROJECT");

/// The log ID records are written to.
pub const LOG_ID: Arg = Arg::WithDefault("GCL_LOG_ID", "app");

/// Base URL of the Cloud Logging API, override for emulators.
pub const API_ENDPOINT: Arg = Arg::WithDefault("GCL_API_ENDPOINT", DEFAULT_API_ENDPOINT);

/// Host of the metadata server handing out access tokens.
pub const METADATA_HOST: Arg = Arg::NoDefault("GCE_METADATA_HOST");

/// An environment variable, optionally with a default value.
pub enum Arg {
    NoDefault(&'static str),
    WithDefault(&'static str, &'static str),
}

impl Arg {
    fn name(&self) -> &'static str {
        match self {
            Arg::NoDefault(name) | Arg::WithDefault(name, _) => name,
        }
    }

    pub fn val(&self) -> Result<String, Error> {
        match self {
            Arg::NoDefault(name) => {
                env::var(name).map_err(|_| Error::MissingSetting(name.to_string()))
            }
            Arg::WithDefault(name, default) => {
                Ok(env::var(name).unwrap_or_else(|_| default.to_string()))
            }
        }
    }

    /// Whether the variable is set to something other than the empty string.
    pub fn provided(&self) -> bool {
        env::var_os(self.name()).is_some_and(|val| !val.is_empty())
    }
}

/// Where a [`LogWriter`](crate::writer::LogWriter) created from the environment writes to.
#[derive(Debug, Clone, PartialEq)]
pub struct WriterSettings {
    pub parent: String,
    pub log_id: String,
}

impl WriterSettings {
    pub fn from_env() -> Result<Self, Error> {
        Ok(WriterSettings {
            parent: PARENT.val()?,
            log_id: LOG_ID.val()?,
        })
    }
}

/// The endpoints of clients created by [`LogWriter::from_env`](crate::writer::LogWriter::from_env).
///
/// Diagnostics are discarded and requests time out after the default timeout.
pub fn client_config() -> Result<ClientConfig, Error> {
    let metadata_endpoint = if METADATA_HOST.provided() {
        format!("http://{}", METADATA_HOST.val()?)
    } else {
        DEFAULT_METADATA_ENDPOINT.to_string()
    };
    Ok(ClientConfig {
        api_endpoint: API_ENDPOINT.val()?,
        metadata_endpoint,
        ..ClientConfig::default()
    })
}
