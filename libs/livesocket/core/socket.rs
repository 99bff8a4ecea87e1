//! WebSocket transport over tokio-tungstenite
//!
//! Each `open` spawns one task that owns the socket for the lifetime of the
//! attempt. The task reports back through the [`TransportSink`] and drains
//! the handle's outbound queue; it exits after reporting exactly one close.

use crate::traits::*;
use futures::{SinkExt, StreamExt};
use std::borrow::Cow;
use tokio::runtime::Handle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Production [`Transport`] backed by tokio-tungstenite
#[derive(Debug, Clone)]
pub struct TungsteniteTransport {
    runtime: Handle,
}

impl TungsteniteTransport {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Transport on the runtime this is called from
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| LiveSocketError::Configuration(format!("no tokio runtime available: {}", e)))
    }
}

impl Transport for TungsteniteTransport {
    fn open(&self, url: &str, outbound: OutboundQueue, sink: TransportSink) -> Result<()> {
        let request = url
            .into_client_request()
            .map_err(|e| LiveSocketError::InvalidUrl(format!("{}: {}", url, e)))?;
        let url = url.to_string();

        self.runtime.spawn(async move {
            debug!("Connecting to {} (#{})", url, sink.generation());

            match connect_async(request).await {
                Ok((socket, _)) => {
                    info!("Connected to {}", url);
                    sink.opened();
                    let (code, reason) = run_socket(socket, outbound, &sink).await;
                    sink.closed(code, reason);
                }
                Err(e) => {
                    error!("Failed to connect to {}: {}", url, e);
                    sink.error(e.to_string());
                    sink.closed(CLOSE_ABNORMAL, "Connection failed");
                }
            }
        });

        Ok(())
    }
}

/// Pump frames both ways until either side closes; returns the close code
/// and reason to report
async fn run_socket(socket: Socket, mut outbound: OutboundQueue, sink: &TransportSink) -> (u16, String) {
    let (mut write, mut read) = socket.split();

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = match frame {
                            Some(frame) => (u16::from(frame.code), frame.reason.into_owned()),
                            None => (CLOSE_NORMAL, String::new()),
                        };
                        debug!("Server closed connection: {} {}", code, reason);
                        return (code, reason);
                    }
                    Some(Ok(msg)) => {
                        if let Some(frame) = tungstenite_to_ws_message(msg) {
                            sink.frame(frame);
                        }
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error: {}", e);
                        sink.error(e.to_string());
                        return (CLOSE_ABNORMAL, e.to_string());
                    }
                    None => {
                        warn!("WebSocket stream closed");
                        return (CLOSE_ABNORMAL, "Stream ended".to_string());
                    }
                }
            }

            cmd = outbound.recv() => {
                match cmd {
                    Some(Outbound::Frame(frame)) => {
                        if let Err(e) = write.send(ws_message_to_tungstenite(frame)).await {
                            error!("Failed to send frame: {}", e);
                            sink.error(e.to_string());
                            return (CLOSE_ABNORMAL, e.to_string());
                        }
                    }
                    Some(Outbound::Close { code, reason }) => {
                        let frame = CloseFrame {
                            code: CloseCode::from(code),
                            reason: Cow::Owned(reason.clone()),
                        };
                        if let Err(e) = write.send(Message::Close(Some(frame))).await {
                            debug!("Close frame not sent: {}", e);
                        }
                        let _ = write.close().await;
                        return (code, reason);
                    }
                    None => {
                        debug!("Handle dropped, closing connection");
                        let _ = write.close().await;
                        return (CLOSE_NORMAL, "Handle released".to_string());
                    }
                }
            }
        }
    }
}

fn ws_message_to_tungstenite(msg: WsMessage) -> Message {
    match msg {
        WsMessage::Text(text) => Message::Text(text),
        WsMessage::Binary(data) => Message::Binary(data),
    }
}

fn tungstenite_to_ws_message(msg: Message) -> Option<WsMessage> {
    match msg {
        Message::Text(text) => Some(WsMessage::Text(text)),
        Message::Binary(data) => Some(WsMessage::Binary(data)),
        Message::Ping(_) | Message::Pong(_) | Message::Close(_) | Message::Frame(_) => None,
    }
}
