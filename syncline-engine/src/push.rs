//! Push channel message layer.
//!
//! The push channel is a persistent message stream keyed by connector. This
//! module only defines the typed events and their classification; any
//! transport (WebSocket, SSE, a test harness) can feed the reconciler's
//! `mpsc::Receiver<PushEvent>` with them.

use syncline_core::record::RawRecord;

/// Reserved `type` value marking a channel-established control message.
const TYPE_CONNECTED: &str = "connected";
/// Reserved `type` value marking a keepalive control message.
const TYPE_PING: &str = "ping";

/// A typed event arriving over the push channel.
#[derive(Clone, Debug)]
pub enum PushEvent {
    /// The channel has been established.
    Connected,
    /// A keepalive frame; not data.
    Ping,
    /// One data record.
    Data(Box<RawRecord>),
    /// The transport reports the channel as closed.
    Disconnected,
    /// The transport surfaced an error, or a frame failed to parse.
    Error(String),
}

impl PushEvent {
    /// Classify a decoded wire frame.
    ///
    /// `connected` and `ping` are control messages; everything else is data.
    pub fn classify(raw: RawRecord) -> Self {
        match raw.kind.as_deref() {
            Some(TYPE_CONNECTED) => Self::Connected,
            Some(TYPE_PING) => Self::Ping,
            _ => Self::Data(Box::new(raw)),
        }
    }

    /// Parse and classify a raw frame payload.
    pub fn from_json(payload: &str) -> Self {
        match serde_json::from_str::<RawRecord>(payload) {
            Ok(raw) => Self::classify(raw),
            Err(err) => Self::Error(format!("error parsing push frame: {}", err)),
        }
    }
}
