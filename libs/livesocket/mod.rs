//! # Livesocket
//!
//! Realtime connection manager for the proximity-matching client: one
//! WebSocket per app, typed inbound messages fanned out to listeners,
//! automatic reconnection with exponential backoff and a forced reconnect
//! when the app returns to the foreground.
//!
//! ## Features
//!
//! - **Pure state machine**: every transition is a function from input to effects
//! - **Generation-tagged transports**: late events from replaced sockets are ignored
//! - **Snapshot dispatch**: listeners may (un)register from inside a callback
//! - **Pluggable seams**: transport, identity store, lifecycle signal, backoff

pub mod core;
pub mod traits;

// Re-export all traits
pub use traits::*;

// Re-export core functionality
pub use self::core::{
    builder, config, events, listeners, machine, manager, message, metrics, socket,
    builder::{states, ManagerBuilder},
    config::{Endpoints, IdentityConfig, ManagerConfig, ReconnectConfig, Variant},
    events::{Feedback, ManagerEvent},
    listeners::{MessageListener, StatusListener},
    machine::{ConnectionState, ConnectionStatus},
    manager::ConnectionManager,
    message::{Envelope, Event, Message, Presence, PresenceStatus},
    metrics::Metrics,
    socket::TungsteniteTransport,
};
