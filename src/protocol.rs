use chrono::{DateTime, Utc};
use serde::Serialize;

/// Prefix that marks a server reply to one of our liveness pings.
pub const PONG_PREFIX: &str = r#"["pong""#;

#[derive(Serialize, Debug)]
struct AuthPayload<'a> {
    client_id: &'a str,
}

/// Text frames the probe sends. Every frame is a two element array of
/// `[tag, payload]`.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Authenticate { client_id: String },
    Ping(u64),
}

impl Outbound {
    pub fn ping_now() -> Outbound {
        Outbound::ping_at(Utc::now())
    }

    /// Clocks set before the Unix epoch report zero.
    pub fn ping_at(now: DateTime<Utc>) -> Outbound {
        Outbound::Ping(u64::try_from(now.timestamp()).unwrap_or(0))
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Outbound::Authenticate { .. } => "authenticate",
            Outbound::Ping(_) => "ping",
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let payload = match self {
            Outbound::Authenticate { client_id } => {
                serde_json::to_string(&AuthPayload { client_id })?
            }
            Outbound::Ping(timestamp) => timestamp.to_string(),
        };
        Ok(format!(r#"["{}", {}]"#, self.tag(), payload))
    }
}

#[derive(Debug, PartialEq)]
pub enum Inbound<'a> {
    Pong,
    Unclassified(&'a str),
}

/// Only the prefix is inspected, anything after the tag is left unparsed.
pub fn classify(text: &str) -> Inbound<'_> {
    if text.starts_with(PONG_PREFIX) {
        Inbound::Pong
    } else {
        Inbound::Unclassified(text)
    }
}
