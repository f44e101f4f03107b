use clap::Parser;
use thiserror::Error;
use url::Url;

use crate::probe::{ProbeConfig, DEFAULT_ADDR, DEFAULT_CLIENT_ID};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid endpoint address")]
    InvalidAddr(#[from] url::ParseError),
    #[error("unsupported scheme {0:?}, expected ws or wss")]
    UnsupportedScheme(String),
    #[error("client id must not be empty")]
    EmptyClientId,
}

/// Opens a websocket, authenticates and pings it every few seconds.
#[derive(Parser, Debug)]
#[command(name = "ws-probe", version)]
pub struct Args {
    /// Websocket address of the endpoint to probe
    #[arg(long, env = "WS_PROBE_ADDR", default_value = DEFAULT_ADDR)]
    pub addr: String,

    /// Client identifier sent when authenticating
    #[arg(long, env = "WS_PROBE_CLIENT_ID", default_value = DEFAULT_CLIENT_ID)]
    pub client_id: String,
}

impl Args {
    pub fn into_config(self) -> Result<ProbeConfig, ConfigError> {
        let url = Url::parse(&self.addr)?;
        match url.scheme() {
            "ws" | "wss" => (),
            other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
        }
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::EmptyClientId);
        }
        Ok(ProbeConfig::new(url).with_client_id(self.client_id))
    }
}
