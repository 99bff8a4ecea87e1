//! Connection state machine
//!
//! Pure transition logic: every transport event, timer firing, lifecycle
//! change and public call becomes an [`Input`], and [`Machine::handle`]
//! answers with the [`Effect`]s the driver must carry out. No I/O happens
//! here, which keeps the reconnection policy testable without a network.
//!
//! ```text
//!                connect
//!  Disconnected ─────────► Connecting ──opened──► Open
//!       ▲  ▲                   │                   │
//!       │  └──── closed ───────┘                   │
//!       │        (schedule reconnect)              │
//!       └──────────────── closed / disconnect ─────┘
//! ```
//!
//! Every connection attempt gets a new generation number. Events tagged with
//! any generation other than the live one are stale and ignored, which is
//! how a local `disconnect()` suppresses the reconnect its own close event
//! would otherwise trigger.

use crate::config::{Endpoints, ManagerConfig, Variant};
use crate::events::{Feedback, ManagerEvent};
use crate::message::{Message, Presence};
use crate::traits::{AppState, ReconnectionStrategy, WsMessage, CLOSE_NORMAL};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Connection state
///
/// "Reconnecting" is `Disconnected` with a pending reconnect timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
}

/// Stimulus fed to the machine
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Connect { username: String, variant: Variant },
    Disconnect,
    /// Used when no identity is known yet
    Reconnect { fallback_username: String },
    Opened { generation: u64 },
    /// Transport refused to start the attempt at all
    OpenFailed { generation: u64, error: String },
    Frame { generation: u64, frame: WsMessage },
    TransportError { generation: u64, error: String },
    Closed { generation: u64, code: u16, reason: String },
    TimerFired { token: u64 },
    AppStateChanged { state: AppState, fallback_username: String },
    Cleanup,
}

/// Side effect requested by the machine, executed in order by the driver
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    PersistIdentity(String),
    OpenTransport { generation: u64, url: String },
    SendFrame { generation: u64, frame: WsMessage },
    CloseTransport { generation: u64, code: u16, reason: String },
    NotifyStatus(bool),
    Dispatch(Message),
    ScheduleReconnect { token: u64, delay: Duration },
    CancelTimer { token: u64 },
    Emit(ManagerEvent),
    ClearListeners,
    Unsubscribe,
}

/// Snapshot returned by `ConnectionManager::status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub is_connected: bool,
    pub state: ConnectionState,
    pub username: Option<String>,
    pub reconnect_attempts: u32,
    pub reconnect_pending: bool,
    pub variant: Variant,
    pub server_url: Option<String>,
}

pub struct Machine {
    endpoints: Endpoints,
    strategy: Box<dyn ReconnectionStrategy>,
    announce_presence: bool,
    emit_connected_event: bool,

    state: ConnectionState,
    username: Option<String>,
    variant: Variant,
    server_url: Option<String>,
    /// Last generation handed out
    generation: u64,
    /// Generation of the handle currently in flight or open
    live_handle: Option<u64>,
    reconnect_attempts: u32,
    pending_timer: Option<u64>,
    next_token: u64,
    app_state: AppState,
}

impl Machine {
    pub fn new(
        config: &ManagerConfig,
        strategy: Box<dyn ReconnectionStrategy>,
        app_state: AppState,
    ) -> Self {
        Self {
            endpoints: config.endpoints.clone(),
            strategy,
            announce_presence: config.announce_presence,
            emit_connected_event: config.emit_connected_event,
            state: ConnectionState::Disconnected,
            username: None,
            variant: Variant::Default,
            server_url: None,
            generation: 0,
            live_handle: None,
            reconnect_attempts: 0,
            pending_timer: None,
            next_token: 0,
            app_state,
        }
    }

    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Open
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    #[inline]
    pub fn variant(&self) -> Variant {
        self.variant
    }

    #[inline]
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    /// Generation of the live handle, if any
    #[inline]
    pub fn live_generation(&self) -> Option<u64> {
        self.live_handle
    }

    #[inline]
    pub fn has_pending_timer(&self) -> bool {
        self.pending_timer.is_some()
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Replace an endpoint; takes effect on the next connect
    pub fn set_endpoint(&mut self, variant: Variant, url: impl Into<String>) {
        self.endpoints.set(variant, url);
    }

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            is_connected: self.is_connected(),
            state: self.state,
            username: self.username.clone(),
            reconnect_attempts: self.reconnect_attempts,
            reconnect_pending: self.pending_timer.is_some(),
            variant: self.variant,
            server_url: self.server_url.clone(),
        }
    }

    /// Apply one input and return the effects to execute
    pub fn handle(&mut self, input: Input) -> Vec<Effect> {
        let mut fx = Vec::new();

        match input {
            Input::Connect { username, variant } => self.connect(username, variant, &mut fx),
            Input::Disconnect => self.disconnect(&mut fx),
            Input::Reconnect { fallback_username } => self.reconnect(fallback_username, &mut fx),
            Input::Opened { generation } => self.opened(generation, &mut fx),
            Input::OpenFailed { generation, error } => self.open_failed(generation, error, &mut fx),
            Input::Frame { generation, frame } => self.frame(generation, frame, &mut fx),
            Input::TransportError { generation, error } => {
                self.transport_error(generation, error, &mut fx)
            }
            Input::Closed {
                generation,
                code,
                reason,
            } => self.closed(generation, code, reason, &mut fx),
            Input::TimerFired { token } => self.timer_fired(token, &mut fx),
            Input::AppStateChanged {
                state,
                fallback_username,
            } => self.app_state_changed(state, fallback_username, &mut fx),
            Input::Cleanup => self.cleanup(&mut fx),
        }

        fx
    }

    #[inline]
    fn is_live(&self, generation: u64) -> bool {
        self.live_handle == Some(generation)
    }

    fn connect(&mut self, username: String, variant: Variant, fx: &mut Vec<Effect>) {
        if self.state == ConnectionState::Open {
            if self.variant == variant && self.username.as_deref() == Some(username.as_str()) {
                debug!("Already connected to {} WebSocket as {}", variant, username);
                return;
            }
            info!(
                "Switching connection from {} to {} WebSocket",
                self.variant, variant
            );
            self.disconnect(fx);
        }

        self.cancel_timer(fx);

        if let Some(generation) = self.live_handle.take() {
            debug!("Replacing in-flight connection attempt #{}", generation);
            fx.push(Effect::CloseTransport {
                generation,
                code: CLOSE_NORMAL,
                reason: "Replaced by new connection".to_string(),
            });
        }

        self.generation += 1;
        let generation = self.generation;
        let url = self.endpoints.connection_url(variant, &username);

        self.live_handle = Some(generation);
        self.state = ConnectionState::Connecting;
        self.variant = variant;
        self.server_url = Some(self.endpoints.base_url(variant).to_string());
        self.username = Some(username.clone());

        info!("Connecting to {} WebSocket as {}...", variant, username);

        fx.push(Effect::PersistIdentity(username));
        fx.push(Effect::Emit(ManagerEvent::Connecting { url: url.clone() }));
        fx.push(Effect::OpenTransport { generation, url });
    }

    fn disconnect(&mut self, fx: &mut Vec<Effect>) {
        self.cancel_timer(fx);

        let Some(generation) = self.live_handle.take() else {
            self.state = ConnectionState::Disconnected;
            return;
        };

        let was_open = self.state == ConnectionState::Open;
        if was_open {
            if let Some(username) = self.username.clone() {
                self.push_presence(Presence::offline(username), generation, fx);
            }
        }

        let reason = "User initiated disconnect".to_string();
        fx.push(Effect::CloseTransport {
            generation,
            code: CLOSE_NORMAL,
            reason: reason.clone(),
        });
        self.state = ConnectionState::Disconnected;

        if was_open {
            fx.push(Effect::NotifyStatus(false));
            fx.push(Effect::Emit(ManagerEvent::Disconnected {
                code: CLOSE_NORMAL,
                reason,
            }));
        }

        info!("{} WebSocket disconnected", self.variant);
    }

    fn reconnect(&mut self, fallback_username: String, fx: &mut Vec<Effect>) {
        self.disconnect(fx);
        self.reconnect_attempts = 0;

        let username = self.username.clone().unwrap_or(fallback_username);
        self.connect(username, self.variant, fx);
    }

    fn opened(&mut self, generation: u64, fx: &mut Vec<Effect>) {
        if !self.is_live(generation) || self.state == ConnectionState::Open {
            debug!("Ignoring open of stale connection #{}", generation);
            return;
        }

        self.state = ConnectionState::Open;
        self.reconnect_attempts = 0;

        info!("{} WebSocket connection established", self.variant);

        fx.push(Effect::NotifyStatus(true));
        fx.push(Effect::Emit(ManagerEvent::Connected {
            url: self.server_url.clone().unwrap_or_default(),
        }));
        fx.push(Effect::Emit(ManagerEvent::Feedback(Feedback::Success)));

        let username = self.username.clone().unwrap_or_default();
        if self.emit_connected_event {
            fx.push(Effect::Dispatch(Message::connected(&username, self.variant)));
        }
        if self.announce_presence {
            self.push_presence(Presence::online(username), generation, fx);
        }
    }

    fn open_failed(&mut self, generation: u64, error: String, fx: &mut Vec<Effect>) {
        if !self.is_live(generation) {
            return;
        }

        error!(
            "Failed to establish {} WebSocket connection: {}",
            self.variant, error
        );
        self.live_handle = None;
        self.state = ConnectionState::Disconnected;
        fx.push(Effect::Emit(ManagerEvent::Error(error)));
    }

    fn frame(&mut self, generation: u64, frame: WsMessage, fx: &mut Vec<Effect>) {
        if !self.is_live(generation) {
            return;
        }

        match Message::parse(&frame) {
            Ok(message) => {
                debug!("Received {} WebSocket message: {}", self.variant, message.kind());
                let attention = message.wants_attention();
                fx.push(Effect::Dispatch(message));
                if attention {
                    fx.push(Effect::Emit(ManagerEvent::Feedback(Feedback::Warning)));
                }
            }
            Err(e) => {
                warn!("Error parsing WebSocket message: {}", e);
                fx.push(Effect::Emit(ManagerEvent::FrameDropped(e.to_string())));
            }
        }
    }

    fn transport_error(&mut self, generation: u64, error: String, fx: &mut Vec<Effect>) {
        if !self.is_live(generation) {
            return;
        }

        error!("{} WebSocket error: {}", self.variant, error);
        fx.push(Effect::Emit(ManagerEvent::Error(error)));
    }

    fn closed(&mut self, generation: u64, code: u16, reason: String, fx: &mut Vec<Effect>) {
        if !self.is_live(generation) {
            debug!("Ignoring close of stale connection #{}", generation);
            return;
        }

        info!(
            "{} WebSocket connection closed: {} {}",
            self.variant, code, reason
        );

        self.live_handle = None;
        self.state = ConnectionState::Disconnected;

        fx.push(Effect::NotifyStatus(false));
        fx.push(Effect::Emit(ManagerEvent::Disconnected { code, reason }));

        self.schedule_reconnect(fx);
    }

    fn schedule_reconnect(&mut self, fx: &mut Vec<Effect>) {
        let attempt = self.reconnect_attempts + 1;

        let Some(delay) = self.strategy.next_delay(attempt) else {
            warn!(
                "Max reconnect attempts reached ({}), waiting for manual reconnect",
                self.reconnect_attempts
            );
            fx.push(Effect::Emit(ManagerEvent::ReconnectExhausted {
                attempts: self.reconnect_attempts,
            }));
            return;
        };

        self.reconnect_attempts = attempt;
        self.cancel_timer(fx);

        self.next_token += 1;
        let token = self.next_token;
        self.pending_timer = Some(token);

        info!(
            "Attempting to reconnect in {:?} (attempt {})",
            delay, attempt
        );

        fx.push(Effect::ScheduleReconnect { token, delay });
        fx.push(Effect::Emit(ManagerEvent::Reconnecting { attempt, delay }));
    }

    fn timer_fired(&mut self, token: u64, fx: &mut Vec<Effect>) {
        if self.pending_timer != Some(token) {
            debug!("Ignoring cancelled reconnect timer #{}", token);
            return;
        }
        self.pending_timer = None;

        let Some(username) = self.username.clone() else {
            return;
        };
        self.connect(username, self.variant, fx);
    }

    fn app_state_changed(&mut self, state: AppState, fallback_username: String, fx: &mut Vec<Effect>) {
        let previous = std::mem::replace(&mut self.app_state, state);

        if AppState::is_resume(previous, state) {
            info!("App has come to the foreground, reconnecting");
            self.reconnect(fallback_username, fx);
        }
    }

    fn cleanup(&mut self, fx: &mut Vec<Effect>) {
        self.disconnect(fx);
        fx.push(Effect::ClearListeners);
        fx.push(Effect::Unsubscribe);
    }

    fn cancel_timer(&mut self, fx: &mut Vec<Effect>) {
        if let Some(token) = self.pending_timer.take() {
            fx.push(Effect::CancelTimer { token });
        }
    }

    fn push_presence(&self, presence: Presence, generation: u64, fx: &mut Vec<Effect>) {
        match presence.envelope().to_frame() {
            Ok(frame) => fx.push(Effect::SendFrame { generation, frame }),
            Err(e) => warn!("Failed to encode presence message: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Envelope, Event, PresenceStatus};
    use crate::traits::{ExponentialBackoff, CLOSE_ABNORMAL};

    fn machine() -> Machine {
        let config = ManagerConfig::with_endpoints(Endpoints {
            default_url: "ws://test/ws".to_string(),
            best_match_url: "ws://test/best".to_string(),
        });
        Machine::new(&config, Box::new(ExponentialBackoff::default()), AppState::Active)
    }

    fn connect(m: &mut Machine, username: &str) -> Vec<Effect> {
        m.handle(Input::Connect {
            username: username.to_string(),
            variant: Variant::Default,
        })
    }

    fn opened_generation(fx: &[Effect]) -> u64 {
        fx.iter()
            .find_map(|e| match e {
                Effect::OpenTransport { generation, .. } => Some(*generation),
                _ => None,
            })
            .expect("no OpenTransport effect")
    }

    fn status_notifications(fx: &[Effect]) -> Vec<bool> {
        fx.iter()
            .filter_map(|e| match e {
                Effect::NotifyStatus(connected) => Some(*connected),
                _ => None,
            })
            .collect()
    }

    fn scheduled(fx: &[Effect]) -> Option<(u64, Duration)> {
        fx.iter().find_map(|e| match e {
            Effect::ScheduleReconnect { token, delay } => Some((*token, *delay)),
            _ => None,
        })
    }

    fn presence_frames(fx: &[Effect]) -> Vec<PresenceStatus> {
        fx.iter()
            .filter_map(|e| match e {
                Effect::SendFrame { frame, .. } => {
                    let envelope = Envelope::from_frame(frame).ok()?;
                    let presence: Presence = serde_json::from_value(envelope.payload).ok()?;
                    presence.status
                }
                _ => None,
            })
            .collect()
    }

    fn close(m: &mut Machine, generation: u64) -> Vec<Effect> {
        m.handle(Input::Closed {
            generation,
            code: CLOSE_ABNORMAL,
            reason: String::new(),
        })
    }

    /// Connect and open; returns the live generation
    fn open(m: &mut Machine, username: &str) -> u64 {
        let generation = opened_generation(&connect(m, username));
        m.handle(Input::Opened { generation });
        generation
    }

    #[test]
    fn test_connect_then_open_notifies_once() {
        let mut m = machine();

        let fx = connect(&mut m, "alice");
        assert_eq!(fx[0], Effect::PersistIdentity("alice".to_string()));
        assert!(fx.contains(&Effect::OpenTransport {
            generation: 1,
            url: "ws://test/ws?username=alice".to_string()
        }));
        assert_eq!(m.state(), ConnectionState::Connecting);
        assert!(status_notifications(&fx).is_empty());

        let fx = m.handle(Input::Opened { generation: 1 });
        assert_eq!(status_notifications(&fx), vec![true]);
        assert_eq!(presence_frames(&fx), vec![PresenceStatus::Online]);
        assert!(fx.iter().any(|e| matches!(
            e,
            Effect::Dispatch(Message { event: Event::Connected(_), .. })
        )));
        assert!(m.is_connected());
        assert_eq!(m.reconnect_attempts(), 0);

        // A duplicate open event is not a new transition
        assert!(m.handle(Input::Opened { generation: 1 }).is_empty());
    }

    #[test]
    fn test_connect_when_open_with_same_identity_is_noop() {
        let mut m = machine();
        let generation = open(&mut m, "alice");

        assert!(connect(&mut m, "alice").is_empty());
        assert_eq!(m.live_generation(), Some(generation));
    }

    #[test]
    fn test_connect_to_other_variant_tears_down_first() {
        let mut m = machine();
        let old = open(&mut m, "alice");

        let fx = m.handle(Input::Connect {
            username: "alice".to_string(),
            variant: Variant::BestMatch,
        });

        assert_eq!(presence_frames(&fx), vec![PresenceStatus::Offline]);
        assert!(fx.contains(&Effect::CloseTransport {
            generation: old,
            code: CLOSE_NORMAL,
            reason: "User initiated disconnect".to_string()
        }));
        assert_eq!(status_notifications(&fx), vec![false]);
        assert!(fx.contains(&Effect::OpenTransport {
            generation: old + 1,
            url: "ws://test/best?username=alice".to_string()
        }));
        assert_eq!(m.live_generation(), Some(old + 1));

        // The old handle's close is stale and must not schedule anything
        assert!(close(&mut m, old).is_empty());
    }

    #[test]
    fn test_connect_while_connecting_replaces_handle() {
        let mut m = machine();
        let first = opened_generation(&connect(&mut m, "alice"));
        let fx = connect(&mut m, "alice");
        let second = opened_generation(&fx);

        assert_ne!(first, second);
        assert!(fx.iter().any(|e| matches!(
            e,
            Effect::CloseTransport { generation, .. } if *generation == first
        )));

        assert!(m.handle(Input::Opened { generation: first }).is_empty());
        assert_eq!(m.state(), ConnectionState::Connecting);
        assert_eq!(
            status_notifications(&m.handle(Input::Opened { generation: second })),
            vec![true]
        );
    }

    #[test]
    fn test_unexpected_close_schedules_backoff_and_timer_reconnects() {
        let mut m = machine();
        let generation = open(&mut m, "alice");

        let fx = close(&mut m, generation);
        assert_eq!(status_notifications(&fx), vec![false]);
        let (token, delay) = scheduled(&fx).unwrap();
        assert_eq!(delay, Duration::from_millis(2000));
        assert_eq!(m.reconnect_attempts(), 1);
        assert!(m.status().reconnect_pending);

        let fx = m.handle(Input::TimerFired { token });
        assert!(fx.contains(&Effect::OpenTransport {
            generation: generation + 1,
            url: "ws://test/ws?username=alice".to_string()
        }));
        assert_eq!(m.reconnect_attempts(), 1);
    }

    #[test]
    fn test_five_failures_then_exhausted() {
        let mut m = machine();
        let mut generation = open(&mut m, "alice");
        let mut delays = Vec::new();

        for _ in 0..5 {
            let fx = close(&mut m, generation);
            let (token, delay) = scheduled(&fx).expect("reconnect should be scheduled");
            delays.push(delay.as_millis() as u64);
            generation = opened_generation(&m.handle(Input::TimerFired { token }));
        }

        assert_eq!(delays, vec![2000, 4000, 8000, 16000, 30000]);

        let fx = close(&mut m, generation);
        assert!(scheduled(&fx).is_none());
        assert!(fx.contains(&Effect::Emit(ManagerEvent::ReconnectExhausted { attempts: 5 })));
        assert!(!m.has_pending_timer());
    }

    #[test]
    fn test_successful_open_resets_attempts() {
        let mut m = machine();
        let generation = open(&mut m, "alice");
        let (token, _) = scheduled(&close(&mut m, generation)).unwrap();
        let generation = opened_generation(&m.handle(Input::TimerFired { token }));
        assert_eq!(m.reconnect_attempts(), 1);

        m.handle(Input::Opened { generation });
        assert_eq!(m.reconnect_attempts(), 0);

        let (_, delay) = scheduled(&close(&mut m, generation)).unwrap();
        assert_eq!(delay, Duration::from_millis(2000));
    }

    #[test]
    fn test_disconnect_sends_offline_and_suppresses_reconnect() {
        let mut m = machine();
        let generation = open(&mut m, "alice");

        let fx = m.handle(Input::Disconnect);
        assert_eq!(presence_frames(&fx), vec![PresenceStatus::Offline]);
        assert!(fx.contains(&Effect::CloseTransport {
            generation,
            code: 1000,
            reason: "User initiated disconnect".to_string()
        }));
        assert_eq!(status_notifications(&fx), vec![false]);
        assert_eq!(m.state(), ConnectionState::Disconnected);

        // The transport's own close event arrives later
        let fx = m.handle(Input::Closed {
            generation,
            code: 1000,
            reason: "User initiated disconnect".to_string(),
        });
        assert!(fx.is_empty());
        assert!(!m.has_pending_timer());
    }

    #[test]
    fn test_disconnect_is_idempotent_and_cancels_timer() {
        let mut m = machine();
        assert!(m.handle(Input::Disconnect).is_empty());

        let generation = open(&mut m, "alice");
        let (token, _) = scheduled(&close(&mut m, generation)).unwrap();

        let fx = m.handle(Input::Disconnect);
        assert_eq!(fx, vec![Effect::CancelTimer { token }]);

        // Timer firing after cancellation does nothing
        assert!(m.handle(Input::TimerFired { token }).is_empty());
        assert!(m.handle(Input::Disconnect).is_empty());
    }

    #[test]
    fn test_manual_connect_cancels_pending_timer() {
        let mut m = machine();
        let generation = open(&mut m, "alice");
        let (token, _) = scheduled(&close(&mut m, generation)).unwrap();

        let fx = connect(&mut m, "alice");
        assert!(fx.contains(&Effect::CancelTimer { token }));
        assert!(m.handle(Input::TimerFired { token }).is_empty());
    }

    #[test]
    fn test_foreground_resume_resets_attempts_and_connects() {
        let mut m = machine();
        let mut generation = open(&mut m, "alice");
        for _ in 0..3 {
            let (token, _) = scheduled(&close(&mut m, generation)).unwrap();
            generation = opened_generation(&m.handle(Input::TimerFired { token }));
        }
        close(&mut m, generation);
        assert_eq!(m.reconnect_attempts(), 4);

        let background = m.handle(Input::AppStateChanged {
            state: AppState::Background,
            fallback_username: "anonymous".to_string(),
        });
        assert!(background.is_empty());

        let fx = m.handle(Input::AppStateChanged {
            state: AppState::Active,
            fallback_username: "anonymous".to_string(),
        });
        assert_eq!(m.reconnect_attempts(), 0);
        assert!(fx.iter().any(|e| matches!(e, Effect::CancelTimer { .. })));
        assert!(fx.contains(&Effect::OpenTransport {
            generation: generation + 1,
            url: "ws://test/ws?username=alice".to_string()
        }));
    }

    #[test]
    fn test_active_to_active_does_not_reconnect() {
        let mut m = machine();
        open(&mut m, "alice");

        let fx = m.handle(Input::AppStateChanged {
            state: AppState::Active,
            fallback_username: "anonymous".to_string(),
        });
        assert!(fx.is_empty());
        assert!(m.is_connected());
    }

    #[test]
    fn test_resume_while_open_forces_fresh_connection() {
        let mut m = machine();
        let generation = open(&mut m, "alice");
        m.handle(Input::AppStateChanged {
            state: AppState::Inactive,
            fallback_username: "x".to_string(),
        });

        let fx = m.handle(Input::AppStateChanged {
            state: AppState::Active,
            fallback_username: "x".to_string(),
        });
        assert_eq!(status_notifications(&fx), vec![false]);
        assert_eq!(opened_generation(&fx), generation + 1);
    }

    #[test]
    fn test_reconnect_without_identity_uses_fallback() {
        let mut m = machine();
        let fx = m.handle(Input::Reconnect {
            fallback_username: "anonymous".to_string(),
        });
        assert_eq!(fx[0], Effect::PersistIdentity("anonymous".to_string()));
        assert_eq!(m.username(), Some("anonymous"));
    }

    #[test]
    fn test_malformed_frame_is_dropped_without_state_change() {
        let mut m = machine();
        let generation = open(&mut m, "alice");

        let fx = m.handle(Input::Frame {
            generation,
            frame: WsMessage::Text("{oops".to_string()),
        });
        assert!(matches!(fx.as_slice(), [Effect::Emit(ManagerEvent::FrameDropped(_))]));
        assert!(m.is_connected());
    }

    #[test]
    fn test_alert_frame_dispatches_with_feedback_hint() {
        let mut m = machine();
        let generation = open(&mut m, "alice");

        let fx = m.handle(Input::Frame {
            generation,
            frame: WsMessage::Text(r#"{"type":"notification","payload":{"title":"hey"}}"#.to_string()),
        });
        assert!(matches!(fx[0], Effect::Dispatch(_)));
        assert_eq!(fx[1], Effect::Emit(ManagerEvent::Feedback(Feedback::Warning)));
    }

    #[test]
    fn test_open_failure_does_not_schedule_reconnect() {
        let mut m = machine();
        let generation = opened_generation(&connect(&mut m, "alice"));

        let fx = m.handle(Input::OpenFailed {
            generation,
            error: "bad url".to_string(),
        });
        assert_eq!(fx, vec![Effect::Emit(ManagerEvent::Error("bad url".to_string()))]);
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert_eq!(m.live_generation(), None);
    }

    #[test]
    fn test_cleanup_is_repeatable() {
        let mut m = machine();
        open(&mut m, "alice");

        let fx = m.handle(Input::Cleanup);
        assert!(fx.ends_with(&[Effect::ClearListeners, Effect::Unsubscribe]));
        assert_eq!(status_notifications(&fx), vec![false]);

        assert_eq!(
            m.handle(Input::Cleanup),
            vec![Effect::ClearListeners, Effect::Unsubscribe]
        );
    }
}
