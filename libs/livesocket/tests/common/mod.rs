//! Common test utilities for Livesocket integration tests
//!
//! Provides a scriptable WebSocket server that records what clients send
//! and can push frames to, or drop, every connected client.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Notify};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// Command broadcast to every live server-side connection
#[derive(Debug, Clone)]
pub enum ServerCommand {
    /// Send a text frame
    Push(String),
    /// Drop the TCP stream without a close frame
    Drop,
}

#[derive(Default)]
struct Recorded {
    /// Request URI (path and query) of every accepted handshake
    uris: Mutex<Vec<String>>,
    /// Text frames received from clients
    frames: Mutex<Vec<String>>,
    /// Close frames received from clients as (code, reason)
    closes: Mutex<Vec<(u16, String)>>,
    accepted: AtomicUsize,
    live: AtomicUsize,
}

/// Mock realtime server for testing
pub struct MockLiveServer {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
    commands: broadcast::Sender<ServerCommand>,
    recorded: Arc<Recorded>,
}

impl MockLiveServer {
    /// Create and start a new mock server
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let (commands, _) = broadcast::channel(64);
        let recorded = Arc::new(Recorded::default());

        let shutdown_clone = shutdown.clone();
        let commands_clone = commands.clone();
        let recorded_clone = recorded.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let shutdown = shutdown_clone.clone();
                                let commands = commands_clone.subscribe();
                                let recorded = recorded_clone.clone();
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, shutdown, commands, recorded).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_clone.notified() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown,
            commands,
            recorded,
        }
    }

    async fn handle_connection(
        stream: tokio::net::TcpStream,
        shutdown: Arc<Notify>,
        mut commands: broadcast::Receiver<ServerCommand>,
        recorded: Arc<Recorded>,
    ) {
        let uri_sink = recorded.clone();
        let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            uri_sink.uris.lock().push(request.uri().to_string());
            Ok(response)
        };

        let ws_stream = match tokio_tungstenite::accept_hdr_async(stream, callback).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        recorded.accepted.fetch_add(1, Ordering::SeqCst);
        recorded.live.fetch_add(1, Ordering::SeqCst);

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            recorded.frames.lock().push(text);
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let entry = frame
                                .map(|f| (u16::from(f.code), f.reason.into_owned()))
                                .unwrap_or((1005, String::new()));
                            recorded.closes.lock().push(entry);
                            let _ = write.close().await;
                            break;
                        }
                        Some(Ok(msg)) if msg.is_ping() => {
                            if write.send(Message::Pong(msg.into_data())).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(_)) => {}
                        Some(Err(_)) | None => break,
                    }
                }
                cmd = commands.recv() => {
                    match cmd {
                        Ok(ServerCommand::Push(text)) => {
                            if write.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Ok(ServerCommand::Drop) | Err(_) => break,
                    }
                }
                _ = shutdown.notified() => {
                    break;
                }
            }
        }

        recorded.live.fetch_sub(1, Ordering::SeqCst);
    }

    /// Get the WebSocket URL for this server
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Send a text frame to every connected client
    pub fn push(&self, text: impl Into<String>) {
        let _ = self.commands.send(ServerCommand::Push(text.into()));
    }

    /// Drop every connected client without a close handshake
    pub fn drop_clients(&self) {
        let _ = self.commands.send(ServerCommand::Drop);
    }

    pub fn accepted(&self) -> usize {
        self.recorded.accepted.load(Ordering::SeqCst)
    }

    pub fn live_connections(&self) -> usize {
        self.recorded.live.load(Ordering::SeqCst)
    }

    pub fn uris(&self) -> Vec<String> {
        self.recorded.uris.lock().clone()
    }

    /// Received text frames parsed as JSON
    pub fn frames(&self) -> Vec<serde_json::Value> {
        self.recorded
            .frames
            .lock()
            .iter()
            .filter_map(|f| serde_json::from_str(f).ok())
            .collect()
    }

    /// Received frames of the given `type`
    pub fn frames_of(&self, kind: &str) -> Vec<serde_json::Value> {
        self.frames()
            .into_iter()
            .filter(|f| f["type"] == kind)
            .collect()
    }

    pub fn closes(&self) -> Vec<(u16, String)> {
        self.recorded.closes.lock().clone()
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockLiveServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Poll `condition` every 10ms until it holds or `timeout` passes
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Run `future` with a test-wide timeout
pub async fn within<T>(timeout: Duration, future: impl Future<Output = T>) -> T {
    tokio::time::timeout(timeout, future)
        .await
        .expect("test step timed out")
}

/// Test fixtures for manager configuration
pub mod fixtures {
    use livesocket::{Endpoints, ManagerConfig, ReconnectConfig};

    /// Configuration pointing at `url` with fast reconnects
    pub fn fast_config(url: &str) -> ManagerConfig {
        let mut config = ManagerConfig::with_endpoints(Endpoints::single(url));
        config.reconnect = ReconnectConfig {
            base_delay_ms: 25,
            max_delay_ms: 200,
            max_attempts: 3,
        };
        config
    }
}
