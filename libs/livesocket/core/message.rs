//! Wire envelope and typed inbound events
//!
//! Every frame in either direction is a JSON object:
//!
//! ```json
//! { "type": "proximity_alert", "payload": { ... }, "timestamp": "2024-05-01T10:00:00.000Z" }
//! ```
//!
//! Inbound envelopes are decoded into [`Event`]. Types this client does not
//! know yet, and known types whose payload does not fit the typed struct,
//! land in [`Event::Unknown`] with the raw payload preserved. Only frames that
//! are not a `{type, payload, timestamp}` object are rejected.

use crate::config::Variant;
use crate::traits::{LiveSocketError, Result, WsMessage};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

/// ISO-8601 UTC timestamp with millisecond precision
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Raw `{type, payload, timestamp}` envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl Envelope {
    /// Outbound envelope stamped with the current time
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
            timestamp: Some(now_timestamp()),
        }
    }

    pub fn from_payload<P: Serialize>(kind: impl Into<String>, payload: &P) -> Result<Self> {
        Ok(Self::new(kind, serde_json::to_value(payload)?))
    }

    pub fn to_frame(&self) -> Result<WsMessage> {
        Ok(WsMessage::Text(serde_json::to_string(self)?))
    }

    pub fn from_frame(frame: &WsMessage) -> Result<Self> {
        serde_json::from_slice(frame.as_bytes())
            .map_err(|e| LiveSocketError::Parse(format!("invalid envelope: {}", e)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Presence {
    pub username: String,
    #[serde(default)]
    pub status: Option<PresenceStatus>,
}

impl Presence {
    pub fn online(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            status: Some(PresenceStatus::Online),
        }
    }

    pub fn offline(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            status: Some(PresenceStatus::Offline),
        }
    }

    pub fn envelope(&self) -> Envelope {
        Envelope::new(
            kinds::PRESENCE,
            json!({ "username": self.username, "status": self.status }),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedInfo {
    pub username: Option<String>,
    pub variant: Option<Variant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProximityAlert {
    pub username: Option<String>,
    /// Meters
    pub distance: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub title: Option<String>,
    pub body: Option<String>,
}

/// `match_found` / `match_update`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEvent {
    pub match_id: Option<String>,
    pub username: Option<String>,
    pub score: Option<f64>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRequest {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResponse {
    pub from: Option<String>,
    pub accepted: Option<bool>,
    pub status: Option<String>,
    #[serde(alias = "matchId")]
    pub match_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub username: Option<String>,
    pub name: Option<String>,
    #[serde(alias = "score")]
    pub match_score: Option<f64>,
    pub distance: Option<f64>,
    #[serde(default)]
    pub skill_overlap: Vec<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    pub reason: Option<String>,
}

impl MatchCandidate {
    /// Best available label for the candidate
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().or(self.username.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestMatch {
    #[serde(default)]
    pub matches: Vec<MatchCandidate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub from: Option<String>,
    #[serde(default, alias = "message")]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerError {
    #[serde(default)]
    pub message: String,
    pub code: Option<String>,
}

/// Wire `type` discriminators
pub mod kinds {
    pub const CONNECTED: &str = "connected";
    pub const PRESENCE: &str = "presence";
    pub const PROXIMITY_ALERT: &str = "proximity_alert";
    pub const NOTIFICATION: &str = "notification";
    pub const MATCH_FOUND: &str = "match_found";
    pub const MATCH_UPDATE: &str = "match_update";
    pub const MATCH_REQUEST: &str = "match_request";
    pub const MATCH_RESPONSE: &str = "match_response";
    pub const BEST_MATCH: &str = "best_match";
    pub const MESSAGE: &str = "message";
    pub const ERROR: &str = "error";
}

/// Typed inbound event
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Connected(ConnectedInfo),
    Presence(Presence),
    ProximityAlert(ProximityAlert),
    Notification(Notification),
    MatchFound(MatchEvent),
    MatchUpdate(MatchEvent),
    MatchRequest(MatchRequest),
    MatchResponse(MatchResponse),
    BestMatch(BestMatch),
    Chat(ChatMessage),
    Error(ServerError),
    /// Type this client does not recognise
    Unknown { kind: String, payload: Value },
}

impl Event {
    pub fn kind(&self) -> &str {
        match self {
            Event::Connected(_) => kinds::CONNECTED,
            Event::Presence(_) => kinds::PRESENCE,
            Event::ProximityAlert(_) => kinds::PROXIMITY_ALERT,
            Event::Notification(_) => kinds::NOTIFICATION,
            Event::MatchFound(_) => kinds::MATCH_FOUND,
            Event::MatchUpdate(_) => kinds::MATCH_UPDATE,
            Event::MatchRequest(_) => kinds::MATCH_REQUEST,
            Event::MatchResponse(_) => kinds::MATCH_RESPONSE,
            Event::BestMatch(_) => kinds::BEST_MATCH,
            Event::Chat(_) => kinds::MESSAGE,
            Event::Error(_) => kinds::ERROR,
            Event::Unknown { kind, .. } => kind,
        }
    }

    /// Typed view of an envelope. Never fails: a payload that does not fit
    /// the struct for its kind is kept as [`Event::Unknown`].
    pub fn decode(kind: String, payload: Value) -> Self {
        let typed = match kind.as_str() {
            kinds::CONNECTED => typed(&payload, Event::Connected),
            kinds::PRESENCE => typed(&payload, Event::Presence),
            kinds::PROXIMITY_ALERT => typed(&payload, Event::ProximityAlert),
            kinds::NOTIFICATION => typed(&payload, Event::Notification),
            kinds::MATCH_FOUND => typed(&payload, Event::MatchFound),
            kinds::MATCH_UPDATE => typed(&payload, Event::MatchUpdate),
            kinds::MATCH_REQUEST => typed(&payload, Event::MatchRequest),
            kinds::MATCH_RESPONSE => typed(&payload, Event::MatchResponse),
            kinds::BEST_MATCH => typed(&payload, Event::BestMatch),
            kinds::MESSAGE => typed(&payload, Event::Chat),
            kinds::ERROR => typed(&payload, Event::Error),
            _ => return Event::Unknown { kind, payload },
        };

        match typed {
            Ok(event) => event,
            Err(e) => {
                debug!("'{}' payload kept untyped: {}", kind, e);
                Event::Unknown { kind, payload }
            }
        }
    }
}

fn typed<T: DeserializeOwned>(payload: &Value, wrap: fn(T) -> Event) -> serde_json::Result<Event> {
    // A missing payload decodes like an empty object
    let payload = if payload.is_null() { json!({}) } else { payload.clone() };
    serde_json::from_value(payload).map(wrap)
}

/// Inbound message delivered to message listeners
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub event: Event,
    /// Timestamp as sent by the peer
    pub timestamp: Option<String>,
}

impl Message {
    /// Decode a raw frame. Only a frame that is not an envelope is an error.
    pub fn parse(frame: &WsMessage) -> Result<Self> {
        let envelope = Envelope::from_frame(frame)?;
        Ok(Self {
            event: Event::decode(envelope.kind, envelope.payload),
            timestamp: envelope.timestamp,
        })
    }

    /// Locally generated `connected` message
    pub fn connected(username: &str, variant: Variant) -> Self {
        Self {
            event: Event::Connected(ConnectedInfo {
                username: Some(username.to_string()),
                variant: Some(variant),
            }),
            timestamp: Some(now_timestamp()),
        }
    }

    #[inline]
    pub fn kind(&self) -> &str {
        self.event.kind()
    }

    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&Utc))
    }

    /// Whether the UI should draw the user's attention to this message
    pub fn wants_attention(&self) -> bool {
        matches!(
            self.kind(),
            kinds::PROXIMITY_ALERT | kinds::NOTIFICATION | kinds::BEST_MATCH
        )
    }
}
