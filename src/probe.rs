pub mod session;

use std::{future::Future, time::Duration};

use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};
use url::Url;

pub use session::{Report, SessionEnd};

/// Demo endpoint probed when no address is configured.
pub const DEFAULT_ADDR: &str = "ws://localhost:8375/ws/world/sample/";
/// Identifier sent in the authenticate frame.
pub const DEFAULT_CLIENT_ID: &str = "0e8f1b9c-6a3d-4c2e-9f7a-5b4d3c2a1e0f";
pub const PING_INTERVAL: Duration = Duration::from_secs(5);
/// Upper bound on how long an interrupted session waits for the close handshake.
pub const CLOSE_GRACE: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("error establishing websocket connection")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("failed to encode outbound message")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write to websocket")]
    Write(#[from] tokio_tungstenite::tungstenite::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeConfig {
    pub url: Url,
    pub client_id: String,
    pub ping_interval: Duration,
    pub close_grace: Duration,
}

impl ProbeConfig {
    pub fn new(url: Url) -> ProbeConfig {
        ProbeConfig {
            url,
            client_id: DEFAULT_CLIENT_ID.to_string(),
            ping_interval: PING_INTERVAL,
            close_grace: CLOSE_GRACE,
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> ProbeConfig {
        self.client_id = client_id.into();
        self
    }
}

pub struct Probe {
    config: ProbeConfig,
}

impl Probe {
    pub fn new(config: ProbeConfig) -> Probe {
        Probe { config }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Dials the configured endpoint once. Failure is not retried.
    pub async fn connect(&self) -> Result<WebSocketStream<MaybeTlsStream<TcpStream>>, ProbeError> {
        info!(url = %self.config.url, "connecting");
        let (ws_stream, response) = connect_async(self.config.url.as_str()).await?;
        debug!(status = %response.status(), "websocket connected");
        Ok(ws_stream)
    }

    /// Connects and probes until the connection drops, a send fails or
    /// `interrupt` resolves.
    pub async fn run<F>(&self, interrupt: F) -> Result<Report, ProbeError>
    where
        F: Future<Output = ()>,
    {
        let ws_stream = self.connect().await?;
        Ok(self.session(ws_stream, interrupt).await)
    }

    /// Drives one probe session over an already established websocket.
    pub async fn session<S, F>(&self, ws_stream: WebSocketStream<S>, interrupt: F) -> Report
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
        F: Future<Output = ()>,
    {
        session::Session::new(&self.config)
            .run(ws_stream, interrupt)
            .await
    }
}
