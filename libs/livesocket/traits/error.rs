use thiserror::Error;

/// Main error type for livesocket
#[derive(Error, Debug)]
pub enum LiveSocketError {
    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Connection closed unexpectedly
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Inbound frame did not match the envelope shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Outbound envelope could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Identity store read/write failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Operation requires an open connection
    #[error("Not connected")]
    NotConnected,

    /// Outbound queue of a transport handle is gone
    #[error("Channel send error: {0}")]
    ChannelSend(String),

    /// Endpoint URL rejected by the transport
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<std::io::Error> for LiveSocketError {
    fn from(err: std::io::Error) -> Self {
        LiveSocketError::Storage(err.to_string())
    }
}

/// Result type for livesocket operations
pub type Result<T> = std::result::Result<T, LiveSocketError>;
