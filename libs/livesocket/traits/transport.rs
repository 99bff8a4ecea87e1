//! Transport seam
//!
//! A transport turns an endpoint URL into a live bidirectional connection.
//! The manager owns the outbound side through a [`TransportHandle`]; the
//! transport reports back through a [`TransportSink`] tagged with the
//! generation of the handle, so events from a replaced connection are
//! recognised and ignored.

use super::error::{LiveSocketError, Result};
use std::sync::Weak;
use tokio::sync::mpsc;

/// Raw WebSocket frame payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsMessage {
    Text(String),
    Binary(Vec<u8>),
}

impl WsMessage {
    /// Get the message as text, if it is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            WsMessage::Text(s) => Some(s),
            WsMessage::Binary(_) => None,
        }
    }

    /// Raw bytes regardless of frame kind
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            WsMessage::Text(s) => s.as_bytes(),
            WsMessage::Binary(b) => b,
        }
    }
}

/// Normal closure
pub const CLOSE_NORMAL: u16 = 1000;
/// Closed without a close frame (network drop, failed handshake)
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Command written to a transport's outbound queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Frame(WsMessage),
    Close { code: u16, reason: String },
}

/// Receiving end of a handle's outbound queue, consumed by the transport
pub type OutboundQueue = mpsc::UnboundedReceiver<Outbound>;

/// Exclusive handle to one connection attempt
///
/// Writes are queued in call order. Dropping the handle closes the queue,
/// which the transport treats as a request to close the connection.
#[derive(Debug)]
pub struct TransportHandle {
    generation: u64,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl TransportHandle {
    /// Create a handle and the queue the transport will drain
    pub fn channel(generation: u64) -> (Self, OutboundQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { generation, tx }, rx)
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn send(&self, frame: WsMessage) -> Result<()> {
        self.tx
            .send(Outbound::Frame(frame))
            .map_err(|e| LiveSocketError::ChannelSend(e.to_string()))
    }

    pub fn close(&self, code: u16, reason: impl Into<String>) -> Result<()> {
        self.tx
            .send(Outbound::Close {
                code,
                reason: reason.into(),
            })
            .map_err(|e| LiveSocketError::ChannelSend(e.to_string()))
    }
}

/// Receiver of transport events, implemented by the manager
pub trait TransportEvents: Send + Sync {
    fn on_open(&self, generation: u64);
    fn on_frame(&self, generation: u64, frame: WsMessage);
    fn on_error(&self, generation: u64, error: String);
    fn on_close(&self, generation: u64, code: u16, reason: String);
}

/// Generation-tagged callback channel handed to a transport
///
/// Holds only a weak reference, so a connection task never keeps a
/// dropped manager alive.
#[derive(Clone)]
pub struct TransportSink {
    generation: u64,
    events: Weak<dyn TransportEvents>,
}

impl TransportSink {
    pub fn new(generation: u64, events: Weak<dyn TransportEvents>) -> Self {
        Self { generation, events }
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn opened(&self) {
        if let Some(events) = self.events.upgrade() {
            events.on_open(self.generation);
        }
    }

    pub fn frame(&self, frame: WsMessage) {
        if let Some(events) = self.events.upgrade() {
            events.on_frame(self.generation, frame);
        }
    }

    pub fn error(&self, error: impl Into<String>) {
        if let Some(events) = self.events.upgrade() {
            events.on_error(self.generation, error.into());
        }
    }

    pub fn closed(&self, code: u16, reason: impl Into<String>) {
        if let Some(events) = self.events.upgrade() {
            events.on_close(self.generation, code, reason.into());
        }
    }
}

impl std::fmt::Debug for TransportSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSink")
            .field("generation", &self.generation)
            .finish()
    }
}

/// Opens connections on behalf of the manager
///
/// `open` must not block: it starts the attempt and returns. The outcome is
/// reported later through the sink (`opened`, then any number of `frame`s,
/// then exactly one `closed`). A synchronous `Err` means no attempt was made
/// and no event will follow.
pub trait Transport: Send + Sync + 'static {
    fn open(&self, url: &str, outbound: OutboundQueue, sink: TransportSink) -> Result<()>;
}
