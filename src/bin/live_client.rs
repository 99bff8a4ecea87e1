//! Live client
//!
//! Connects to the realtime server, logs status changes and inbound
//! messages, and forwards stdin lines as chat messages.
//!
//! Usage: `live_client [--config PATH] [username]`
//!
//! Without `--config`, settings come from `LIVE_CLIENT_CONFIG_PATH` or
//! `config/live_client.yaml`.
//!
//! Commands read from stdin:
//! - `/reconnect`  force a reconnect
//! - `/bestmatch`  switch to the best-match endpoint
//! - `/default`    switch back to the default endpoint
//! - `/server URL` connect to another server
//! - `/background`, `/foreground`  simulate app lifecycle changes
//! - `/status`     print the connection status
//! - `/quit`       exit
//!
//! Any other line is sent as `{"type": "message", "payload": {"text": ...}}`.

use anyhow::{Context, Result};
use proximatch_client::bin_common::{
    init_tracing, BinaryRunner, CliArgs, ClientSettings, ConfigType, RunConfig, ShutdownManager,
    USAGE,
};
use proximatch_client::livesocket::{
    AppState, ConnectionManager, Event, Feedback, JsonFileStore, Lifecycle, ManagerEvent, Message,
    Variant,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

struct LiveClientApp {
    run_config: RunConfig,
    manager: ConnectionManager,
    lifecycle: Lifecycle,
    shutdown: ShutdownManager,
    username: Option<String>,
}

impl LiveClientApp {
    fn new(settings: ClientSettings, username: Option<String>) -> Result<Self> {
        let lifecycle = Lifecycle::default();

        let manager = ConnectionManager::builder()
            .config(settings.manager.clone())
            .store(Arc::new(JsonFileStore::new(&settings.identity_file)))
            .lifecycle(lifecycle.subscribe())
            .build()
            .context("Failed to build connection manager")?;

        Ok(Self {
            run_config: RunConfig::new("Live Client").with_status_interval(60),
            manager,
            lifecycle,
            shutdown: ShutdownManager::new(),
            username,
        })
    }

    fn register_listeners(&self) {
        self.manager.add_connection_listener(Arc::new(|connected: bool| {
            if connected {
                info!("Status: connected");
            } else {
                info!("Status: disconnected");
            }
        }));

        self.manager
            .add_message_listener(Arc::new(|message: &Message| match &message.event {
                Event::Chat(chat) => {
                    info!("[{}] {}", chat.from.as_deref().unwrap_or("?"), chat.text)
                }
                Event::ProximityAlert(alert) => info!(
                    "Proximity alert: {} at {:?}m",
                    alert.username.as_deref().unwrap_or("someone"),
                    alert.distance
                ),
                Event::Unknown { kind, payload } => info!("Unhandled '{}': {}", kind, payload),
                other => info!("{}: {:?}", message.kind(), other),
            }));
    }

    /// Returns false when the client should exit
    fn handle_line(&self, line: &str) -> bool {
        let line = line.trim();
        if line.is_empty() {
            return true;
        }

        let mut parts = line.splitn(2, ' ');
        match (parts.next(), parts.next()) {
            (Some("/quit"), _) => return false,
            (Some("/reconnect"), _) => {
                self.manager.reconnect();
            }
            (Some("/bestmatch"), _) => {
                self.manager
                    .connect_variant(self.username.as_deref(), Variant::BestMatch);
            }
            (Some("/default"), _) => {
                self.manager
                    .connect_variant(self.username.as_deref(), Variant::Default);
            }
            (Some("/server"), Some(url)) => {
                self.manager
                    .connect_to_server(url.trim(), self.username.as_deref());
            }
            (Some("/background"), _) => self.lifecycle.set(AppState::Background),
            (Some("/foreground"), _) => self.lifecycle.set(AppState::Active),
            (Some("/status"), _) => self.report_status(),
            (Some(cmd), _) if cmd.starts_with('/') => warn!("Unknown command: {}", cmd),
            _ => {
                if !self.manager.send_message("message", &json!({ "text": line })) {
                    warn!("Message not sent: not connected");
                }
            }
        }
        true
    }

    fn drain_events(&self) {
        while let Some(event) = self.manager.try_recv_event() {
            match event {
                ManagerEvent::Feedback(Feedback::Warning) => info!("(!) attention"),
                ManagerEvent::ReconnectExhausted { attempts } => warn!(
                    "Gave up after {} reconnect attempts, type /reconnect to retry",
                    attempts
                ),
                ManagerEvent::Error(e) => warn!("Connection error: {}", e),
                _ => {}
            }
        }
    }
}

impl BinaryRunner for LiveClientApp {
    async fn run(&mut self) -> Result<()> {
        self.shutdown.spawn_signal_handler();
        self.register_listeners();
        self.manager.connect(self.username.as_deref());

        let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line_tx.send(line).is_err() {
                    break;
                }
            }
        });

        let mut status_tick = self.run_config.status_ticker();
        let mut event_tick = tokio::time::interval(Duration::from_millis(100));

        loop {
            tokio::select! {
                line = line_rx.recv() => {
                    match line {
                        Some(line) => {
                            if !self.handle_line(&line) {
                                break;
                            }
                        }
                        None => {
                            info!("stdin closed, waiting for Ctrl+C");
                            self.shutdown.wait().await;
                            break;
                        }
                    }
                }
                _ = event_tick.tick() => self.drain_events(),
                _ = status_tick.tick() => self.report_status(),
                _ = self.shutdown.wait() => break,
            }
        }

        self.manager.cleanup();
        Ok(())
    }

    fn config(&self) -> &RunConfig {
        &self.run_config
    }

    fn report_status(&self) {
        let status = self.manager.status();
        let metrics = self.manager.metrics();
        info!(
            "connected={} user={} endpoint={} attempts={} sent={} received={} dropped={}",
            status.is_connected,
            status.username.as_deref().unwrap_or("-"),
            status.server_url.as_deref().unwrap_or("-"),
            status.reconnect_attempts,
            metrics.messages_sent,
            metrics.messages_received,
            metrics.frames_dropped
        );
    }

    fn stats(&self) -> Option<String> {
        let metrics = self.manager.metrics();
        Some(format!(
            "Messages sent: {} | received: {} | reconnects scheduled: {}",
            metrics.messages_sent, metrics.messages_received, metrics.reconnects_scheduled
        ))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = match CliArgs::from_env() {
        Ok(args) => args,
        Err(e) => anyhow::bail!("{}\nusage: {}", e, USAGE),
    };

    let config_path = args.config_path(ConfigType::LiveClient);
    // An explicit --config file must exist
    let settings = if args.config.is_some() {
        ClientSettings::load(&config_path)
    } else {
        ClientSettings::load_or_default(&config_path)
    }
    .with_context(|| format!("Failed to load {}", config_path.display()))?;

    init_tracing(&settings.log_level);
    info!("Loaded settings from {}", config_path.display());

    let mut app = LiveClientApp::new(settings, args.username)?;
    app.execute().await
}
