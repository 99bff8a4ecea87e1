//! # Livesocket Traits
//!
//! Seams between the connection manager and its host:
//!
//! - **ReconnectionStrategy**: delay schedule for automatic reconnects
//! - **IdentityStore**: persistence of the connecting identity
//! - **Lifecycle**: application foreground/background signal
//! - **Transport**: the bidirectional connection itself

pub mod error;
pub mod lifecycle;
pub mod reconnect;
pub mod store;
pub mod transport;

// Re-export commonly used types
pub use error::{LiveSocketError, Result};
pub use lifecycle::{AppState, Lifecycle, LifecycleSubscription};
pub use reconnect::{ExponentialBackoff, NeverReconnect, ReconnectionStrategy};
pub use store::{IdentityStore, JsonFileStore, MemoryStore};
pub use transport::{
    Outbound, OutboundQueue, Transport, TransportEvents, TransportHandle, TransportSink,
    WsMessage, CLOSE_ABNORMAL, CLOSE_NORMAL,
};
