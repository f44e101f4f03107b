use std::{
    future::Future,
    io::Write,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::oneshot,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_tungstenite::{
    tungstenite::protocol::{frame::coding::CloseCode, CloseFrame},
    tungstenite::Message as WsMessage,
    WebSocketStream,
};
use tracing::{debug, error, info, trace, warn};

use crate::probe::{ProbeConfig, SendError};
use crate::protocol::{classify, Inbound, Outbound};

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The listener hit a read error or the remote side went away.
    ConnectionLost,
    /// An interrupt arrived and the close handshake was attempted.
    Interrupted,
    /// Writing the authenticate, ping or close frame failed.
    SendFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub end: SessionEnd,
    pub pings_sent: u64,
    pub pongs_received: u64,
    pub unclassified: u64,
}

#[derive(Default)]
struct Counters {
    pongs: AtomicU64,
    unclassified: AtomicU64,
}

type Writer<S> = SplitSink<WebSocketStream<S>, WsMessage>;
type Reader<S> = SplitStream<WebSocketStream<S>>;

pub(crate) struct Session {
    client_id: String,
    ping_interval: Duration,
    close_grace: Duration,
}

impl Session {
    pub(crate) fn new(config: &ProbeConfig) -> Session {
        Session {
            client_id: config.client_id.clone(),
            ping_interval: config.ping_interval,
            close_grace: config.close_grace,
        }
    }

    pub(crate) async fn run<S, F>(self, ws_stream: WebSocketStream<S>, interrupt: F) -> Report
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
        F: Future<Output = ()>,
    {
        let (mut writer, reader) = ws_stream.split();
        let counters = Arc::new(Counters::default());
        let mut pings_sent = 0;

        let auth = Outbound::Authenticate {
            client_id: self.client_id.clone(),
        };
        if let Err(err) = send(&mut writer, &auth).await {
            error!(%err, "failed to send authenticate");
            return finish(SessionEnd::SendFailed, pings_sent, &counters);
        }
        debug!(client_id = %self.client_id, "sent authenticate");

        let (done_tx, mut done) = oneshot::channel();
        tokio::spawn(listen(reader, counters.clone(), done_tx));

        // First ping goes out one full interval after authenticating.
        let mut ticker = time::interval_at(Instant::now() + self.ping_interval, self.ping_interval);
        // A stalled write must not be followed by a burst of catch-up pings.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(interrupt);

        let end = loop {
            tokio::select! {
                _ = &mut done => break SessionEnd::ConnectionLost,
                _ = ticker.tick() => {
                    match send(&mut writer, &Outbound::ping_now()).await {
                        Ok(()) => pings_sent += 1,
                        Err(err) => {
                            error!(%err, "failed to send ping");
                            break SessionEnd::SendFailed;
                        }
                    }
                }
                _ = &mut interrupt => {
                    info!("interrupt received, closing connection");
                    let close = WsMessage::Close(Some(CloseFrame {
                        code: CloseCode::Normal,
                        reason: "".into(),
                    }));
                    if let Err(err) = writer.send(close).await {
                        error!(%err, "failed to send close frame");
                        break SessionEnd::SendFailed;
                    }
                    tokio::select! {
                        _ = &mut done => debug!("remote endpoint closed the connection"),
                        _ = time::sleep(self.close_grace) => {
                            warn!(grace = ?self.close_grace, "no close acknowledgement, giving up")
                        }
                    }
                    break SessionEnd::Interrupted;
                }
            }
        };

        finish(end, pings_sent, &counters)
    }
}

async fn send<S>(writer: &mut Writer<S>, message: &Outbound) -> Result<(), SendError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let text = message.encode()?;
    trace!(%text, "sending");
    writer.send(WsMessage::Text(text)).await?;
    Ok(())
}

fn finish(end: SessionEnd, pings_sent: u64, counters: &Counters) -> Report {
    let report = Report {
        end,
        pings_sent,
        pongs_received: counters.pongs.load(Ordering::Relaxed),
        unclassified: counters.unclassified.load(Ordering::Relaxed),
    };
    info!(
        end = ?report.end,
        pings_sent = report.pings_sent,
        pongs_received = report.pongs_received,
        unclassified = report.unclassified,
        "session ended"
    );
    report
}

/// Reads until the connection fails, then fires `done`.
async fn listen<S>(mut reader: Reader<S>, counters: Arc<Counters>, done: oneshot::Sender<()>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        match reader.next().await {
            Some(Ok(message)) => handle_message(message, &counters),
            Some(Err(err)) => {
                error!(%err, "read failed");
                break;
            }
            None => {
                warn!("connection closed");
                break;
            }
        }
    }
    // The main loop may already be gone.
    let _ = done.send(());
}

fn handle_message(message: WsMessage, counters: &Counters) {
    match message {
        WsMessage::Text(text) => handle_text(&text, counters),
        WsMessage::Binary(data) => handle_text(&String::from_utf8_lossy(&data), counters),
        // tungstenite answers transport level pings on its own
        WsMessage::Ping(_) | WsMessage::Pong(_) => trace!("control frame"),
        WsMessage::Close(frame) => info!(?frame, "received close frame"),
        WsMessage::Frame(_) => error!("received raw Message::Frame, ignoring"),
    }
}

fn handle_text(text: &str, counters: &Counters) {
    match classify(text) {
        Inbound::Pong => {
            counters.pongs.fetch_add(1, Ordering::Relaxed);
            let mut stdout = std::io::stdout();
            let _ = write!(stdout, ".");
            let _ = stdout.flush();
        }
        Inbound::Unclassified(text) => {
            counters.unclassified.fetch_add(1, Ordering::Relaxed);
            info!(%text, "recv");
        }
    }
}
