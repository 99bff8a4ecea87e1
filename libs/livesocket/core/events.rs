use std::time::Duration;

/// UX hint for the host (haptics, sounds); the manager never acts on it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    /// Connection established
    Success,
    /// Inbound alert worth the user's attention
    Warning,
}

/// Lifecycle events published on the manager's event channel
#[derive(Debug, Clone, PartialEq)]
pub enum ManagerEvent {
    /// Connection attempt started
    Connecting { url: String },
    /// Connected to the server
    Connected { url: String },
    /// Connection closed (locally or remotely)
    Disconnected { code: u16, reason: String },
    /// Automatic reconnection scheduled
    Reconnecting { attempt: u32, delay: Duration },
    /// Automatic reconnection gave up until a manual reconnect
    ReconnectExhausted { attempts: u32 },
    /// Inbound frame dropped as malformed
    FrameDropped(String),
    /// Attention hint
    Feedback(Feedback),
    /// Transport or send error
    Error(String),
}
