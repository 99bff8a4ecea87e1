//! # Livesocket Core
//!
//! The connection machine, the runtime manager driving it, and the
//! production transport.
//!
//! ## Example
//!
//! ```rust,ignore
//! use livesocket::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let lifecycle = Lifecycle::default();
//!
//!     let manager = ConnectionManager::builder()
//!         .endpoint("ws://localhost:8080/ws")
//!         .store(Arc::new(JsonFileStore::new("data/identity.json")))
//!         .lifecycle(lifecycle.subscribe())
//!         .build()?;
//!
//!     manager.add_connection_listener(Arc::new(|connected| {
//!         println!("connected: {}", connected);
//!     }));
//!     manager.add_message_listener(Arc::new(|message: &Message| {
//!         println!("{}: {:?}", message.kind(), message.event);
//!     }));
//!
//!     manager.connect(Some("alice"));
//!     manager.send_message("message", &serde_json::json!({"text": "hi"}));
//!
//!     manager.cleanup();
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod config;
pub mod events;
pub mod listeners;
pub mod machine;
pub mod manager;
pub mod message;
pub mod metrics;
pub mod socket;

// Re-export main types
pub use builder::{states, ManagerBuilder};
pub use config::{Endpoints, IdentityConfig, ManagerConfig, ReconnectConfig, Variant};
pub use events::{Feedback, ManagerEvent};
pub use listeners::{MessageListener, Registry, StatusListener};
pub use machine::{ConnectionState, ConnectionStatus, Effect, Input, Machine};
pub use manager::ConnectionManager;
pub use message::{Envelope, Event, Message};
pub use metrics::{AtomicMetrics, Metrics};
pub use socket::TungsteniteTransport;

/// Create a new connection manager builder
pub fn builder() -> ManagerBuilder<states::NoConfig> {
    ManagerBuilder::new()
}
