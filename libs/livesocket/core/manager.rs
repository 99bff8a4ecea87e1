//! Connection manager
//!
//! The runtime half of the connection: owns the [`Machine`], the single live
//! transport handle, the reconnect timer, the lifecycle subscription and the
//! listener registries, and executes the effects the machine produces.
//!
//! The manager is a cheap `Clone` handle. Create one at startup and pass
//! clones to whatever needs it; every clone drives the same connection.
//!
//! Transitions are serialized by a reentrant driver lock: the machine
//! computes a transition and its effects run in order before the next
//! transition from any thread starts. The machine and registry locks are not
//! held while listeners run, so listeners may call back into the manager.
//! Effects of such a nested call are queued behind the ones already running.

use crate::config::{ManagerConfig, Variant};
use crate::events::ManagerEvent;
use crate::listeners::{dispatch, Listeners, MessageListener, StatusListener};
use crate::machine::{ConnectionStatus, Effect, Input, Machine};
use crate::message::Envelope;
use crate::metrics::{AtomicMetrics, Metrics};
use crate::traits::*;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::{Mutex, ReentrantMutex};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Capacity of the manager event channel; events past it are dropped
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Handle to the app-wide realtime connection
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

pub(crate) struct Shared {
    driver: ReentrantMutex<Driver>,
    machine: Mutex<Machine>,
    listeners: Mutex<Listeners>,
    /// At most one handle exists at any time
    handle: Mutex<Option<TransportHandle>>,
    timer: Mutex<Option<(u64, JoinHandle<()>)>>,
    lifecycle_task: Mutex<Option<JoinHandle<()>>>,
    transport: Arc<dyn Transport>,
    store: Arc<dyn IdentityStore>,
    config: ManagerConfig,
    runtime: Handle,
    metrics: AtomicMetrics,
    event_tx: Sender<ManagerEvent>,
    event_rx: Receiver<ManagerEvent>,
    self_ref: Weak<Shared>,
}

/// Effect queue owned by whichever thread holds the driver lock
#[derive(Default)]
struct Driver {
    draining: Cell<bool>,
    /// Last status handed to the status listeners
    notified: Cell<bool>,
    queue: RefCell<VecDeque<Effect>>,
}

impl ConnectionManager {
    /// Create a new manager builder
    pub fn builder() -> crate::builder::ManagerBuilder<crate::builder::states::NoConfig> {
        crate::builder::ManagerBuilder::new()
    }

    pub(crate) fn from_parts(
        config: ManagerConfig,
        strategy: Box<dyn ReconnectionStrategy>,
        transport: Arc<dyn Transport>,
        store: Arc<dyn IdentityStore>,
        lifecycle: Option<LifecycleSubscription>,
        runtime: Handle,
    ) -> Self {
        let initial_app_state = lifecycle
            .as_ref()
            .map(LifecycleSubscription::initial)
            .unwrap_or(AppState::Active);
        let (event_tx, event_rx) = crossbeam_channel::bounded(EVENT_CHANNEL_CAPACITY);

        let shared = Arc::new_cyclic(|self_ref| Shared {
            driver: ReentrantMutex::new(Driver::default()),
            machine: Mutex::new(Machine::new(&config, strategy, initial_app_state)),
            listeners: Mutex::new(Listeners::default()),
            handle: Mutex::new(None),
            timer: Mutex::new(None),
            lifecycle_task: Mutex::new(None),
            transport,
            store,
            config,
            runtime,
            metrics: AtomicMetrics::new(),
            event_tx,
            event_rx,
            self_ref: self_ref.clone(),
        });

        if let Some(subscription) = lifecycle {
            let task = shared
                .runtime
                .spawn(watch_lifecycle(subscription, Arc::downgrade(&shared)));
            *shared.lifecycle_task.lock() = Some(task);
        }

        Self { shared }
    }

    /// Connect to the default endpoint
    ///
    /// `None` falls back to the persisted identity, then to the anonymous
    /// identity. Returns `true` once an attempt has been started (or the
    /// manager is already open with this identity); the outcome arrives on
    /// the status listeners.
    pub fn connect(&self, username: Option<&str>) -> bool {
        self.connect_variant(username, Variant::Default)
    }

    /// Connect to the endpoint selected by `variant`
    pub fn connect_variant(&self, username: Option<&str>, variant: Variant) -> bool {
        let username = self.shared.resolve_identity(username);
        self.shared.apply(Input::Connect { username, variant })
    }

    /// Connect to the best-match sub-service
    pub fn connect_to_best_match(&self, username: Option<&str>) -> bool {
        self.connect_variant(username, Variant::BestMatch)
    }

    /// Drop the current connection, point the default endpoint at `server_url`
    /// and connect to it
    pub fn connect_to_server(&self, server_url: &str, username: Option<&str>) -> bool {
        self.disconnect();
        self.shared
            .machine
            .lock()
            .set_endpoint(Variant::Default, server_url);
        self.connect(username)
    }

    /// Close the connection without scheduling a reconnect
    ///
    /// Sends a best-effort offline presence first when open. Safe to call
    /// when already disconnected.
    pub fn disconnect(&self) -> bool {
        self.shared.apply(Input::Disconnect);
        true
    }

    /// Disconnect, reset the attempt counter and connect again with the
    /// last known identity
    pub fn reconnect(&self) -> bool {
        let fallback_username = self.shared.resolve_identity(None);
        self.shared.apply(Input::Reconnect { fallback_username })
    }

    /// Send `{type, payload, timestamp}` over the open connection
    ///
    /// Fire-and-forget: returns `false` and drops the message when not
    /// connected or when the write cannot be queued.
    pub fn send_message<P: Serialize>(&self, kind: &str, payload: &P) -> bool {
        match self.shared.send_envelope(kind, payload) {
            Ok(()) => true,
            Err(LiveSocketError::NotConnected) => {
                warn!("Cannot send message, WebSocket not connected");
                false
            }
            Err(e) => {
                error!("Error sending WebSocket message: {}", e);
                false
            }
        }
    }

    /// Register a status listener; it is called right away with the
    /// current status
    ///
    /// The replay is the last status the other listeners were given, so the
    /// new listener never sees a status older than one already delivered.
    pub fn add_connection_listener(&self, listener: StatusListener) {
        let driver = self.shared.driver.lock();
        self.shared.listeners.lock().status.add(Arc::clone(&listener));

        let connected = driver.notified.get();
        dispatch(&[listener], "connection", |l| l(connected));
    }

    pub fn remove_connection_listener(&self, listener: &StatusListener) -> bool {
        self.shared.listeners.lock().status.remove(listener)
    }

    /// Register a message listener; past messages are not replayed
    pub fn add_message_listener(&self, listener: MessageListener) {
        self.shared.listeners.lock().messages.add(listener);
    }

    /// Remove one message listener, or all of them with `None`
    pub fn remove_message_listener(&self, listener: Option<&MessageListener>) -> bool {
        let mut listeners = self.shared.listeners.lock();
        match listener {
            Some(listener) => listeners.messages.remove(listener),
            None => {
                listeners.messages.clear();
                true
            }
        }
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.shared.machine.lock().is_connected()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.shared.machine.lock().status()
    }

    pub fn metrics(&self) -> Metrics {
        self.shared.metrics.snapshot()
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.shared.config
    }

    /// Number of registered (status, message) listeners
    pub fn listener_counts(&self) -> (usize, usize) {
        let listeners = self.shared.listeners.lock();
        (listeners.status.len(), listeners.messages.len())
    }

    /// Try to receive an event (non-blocking)
    pub fn try_recv_event(&self) -> Option<ManagerEvent> {
        self.shared.event_rx.try_recv().ok()
    }

    /// Receive an event (blocking)
    pub fn recv_event(&self) -> std::result::Result<ManagerEvent, crossbeam_channel::RecvError> {
        self.shared.event_rx.recv()
    }

    /// Receive an event, giving up after `timeout` (blocking)
    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<ManagerEvent> {
        self.shared.event_rx.recv_timeout(timeout).ok()
    }

    /// Disconnect, clear both registries, cancel timers and stop watching
    /// the lifecycle signal. Safe to call more than once.
    pub fn cleanup(&self) -> bool {
        self.shared.apply(Input::Cleanup);
        info!("Connection manager cleaned up");
        true
    }
}

impl Shared {
    /// Explicit identity, else persisted identity, else the anonymous one
    fn resolve_identity(&self, explicit: Option<&str>) -> String {
        if let Some(username) = explicit.filter(|u| !u.is_empty()) {
            return username.to_string();
        }

        let key = &self.config.identity.storage_key;
        match self.store.load(key) {
            Ok(Some(username)) if !username.is_empty() => username,
            Ok(_) => self.config.identity.anonymous.clone(),
            Err(e) => {
                warn!("Failed to load persisted identity: {}", e);
                self.config.identity.anonymous.clone()
            }
        }
    }

    /// Run one transition and execute its effects; `false` if an effect failed
    fn apply(&self, input: Input) -> bool {
        let driver = self.driver.lock();
        let effects = self.machine.lock().handle(input);
        driver.queue.borrow_mut().extend(effects);

        if driver.draining.get() {
            // Called from inside an effect on this thread; the outer loop
            // runs the queued effects
            return true;
        }

        driver.draining.set(true);
        let mut ok = true;
        loop {
            let next = driver.queue.borrow_mut().pop_front();
            let Some(effect) = next else {
                break;
            };
            ok &= self.execute(effect);
        }
        driver.draining.set(false);
        ok
    }

    fn execute(&self, effect: Effect) -> bool {
        match effect {
            Effect::PersistIdentity(username) => {
                if let Err(e) = self.store.save(&self.config.identity.storage_key, &username) {
                    warn!("Failed to persist identity: {}", e);
                }
            }
            Effect::OpenTransport { generation, url } => return self.open_transport(generation, &url),
            Effect::SendFrame { generation, frame } => {
                let handle = self.handle.lock();
                match handle.as_ref().filter(|h| h.generation() == generation) {
                    Some(h) => match h.send(frame) {
                        Ok(()) => self.metrics.increment_sent(),
                        Err(e) => warn!("Failed to queue frame: {}", e),
                    },
                    None => debug!("No live handle #{} for outbound frame", generation),
                }
            }
            Effect::CloseTransport {
                generation,
                code,
                reason,
            } => {
                let mut slot = self.handle.lock();
                if slot.as_ref().is_some_and(|h| h.generation() == generation) {
                    if let Some(handle) = slot.take() {
                        // A transport that already exited is closed anyway
                        let _ = handle.close(code, reason);
                    }
                }
            }
            Effect::NotifyStatus(connected) => {
                self.driver.lock().notified.set(connected);
                let listeners = self.listeners.lock().status.snapshot();
                dispatch(&listeners, "connection", |l| l(connected));
            }
            Effect::Dispatch(message) => {
                self.metrics.increment_received();
                let listeners = self.listeners.lock().messages.snapshot();
                dispatch(&listeners, "message", |l| l(&message));
            }
            Effect::ScheduleReconnect { token, delay } => self.schedule_timer(token, delay),
            Effect::CancelTimer { token } => {
                let mut timer = self.timer.lock();
                if timer.as_ref().is_some_and(|(t, _)| *t == token) {
                    if let Some((_, task)) = timer.take() {
                        task.abort();
                    }
                }
            }
            Effect::Emit(event) => self.emit(event),
            Effect::ClearListeners => self.listeners.lock().clear(),
            Effect::Unsubscribe => {
                if let Some(task) = self.lifecycle_task.lock().take() {
                    task.abort();
                    debug!("Unsubscribed from lifecycle signal");
                }
            }
        }
        true
    }

    fn open_transport(&self, generation: u64, url: &str) -> bool {
        let (handle, outbound) = TransportHandle::channel(generation);
        // Store before opening so the transport can never report on a
        // handle the manager does not hold yet
        if let Some(previous) = self.handle.lock().replace(handle) {
            debug!("Released handle #{}", previous.generation());
        }

        let events: Weak<dyn TransportEvents> = self.self_ref.clone();
        let sink = TransportSink::new(generation, events);

        match self.transport.open(url, outbound, sink) {
            Ok(()) => true,
            Err(e) => {
                let mut slot = self.handle.lock();
                if slot.as_ref().is_some_and(|h| h.generation() == generation) {
                    slot.take();
                }
                drop(slot);

                self.apply(Input::OpenFailed {
                    generation,
                    error: e.to_string(),
                });
                false
            }
        }
    }

    fn schedule_timer(&self, token: u64, delay: Duration) {
        self.metrics.increment_reconnects();

        let weak = self.self_ref.clone();
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = weak.upgrade() {
                shared.apply(Input::TimerFired { token });
            }
        });

        if let Some((_, previous)) = self.timer.lock().replace((token, task)) {
            previous.abort();
        }
    }

    fn send_envelope<P: Serialize>(&self, kind: &str, payload: &P) -> Result<()> {
        let generation = {
            let machine = self.machine.lock();
            if !machine.is_connected() {
                return Err(LiveSocketError::NotConnected);
            }
            machine.live_generation().ok_or(LiveSocketError::NotConnected)?
        };

        let frame = Envelope::from_payload(kind, payload)?.to_frame()?;

        let handle = self.handle.lock();
        let handle = handle
            .as_ref()
            .filter(|h| h.generation() == generation)
            .ok_or(LiveSocketError::NotConnected)?;
        handle.send(frame)?;
        self.metrics.increment_sent();
        Ok(())
    }

    fn emit(&self, event: ManagerEvent) {
        if let ManagerEvent::FrameDropped(_) = &event {
            self.metrics.increment_dropped();
        }

        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                debug!("Event channel full, dropping {:?}", event);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

impl TransportEvents for Shared {
    fn on_open(&self, generation: u64) {
        self.apply(Input::Opened { generation });
    }

    fn on_frame(&self, generation: u64, frame: WsMessage) {
        self.apply(Input::Frame { generation, frame });
    }

    fn on_error(&self, generation: u64, error: String) {
        self.apply(Input::TransportError { generation, error });
    }

    fn on_close(&self, generation: u64, code: u16, reason: String) {
        // Release the handle of a remotely closed connection
        {
            let mut slot = self.handle.lock();
            if slot.as_ref().is_some_and(|h| h.generation() == generation) {
                slot.take();
            }
        }
        self.apply(Input::Closed {
            generation,
            code,
            reason,
        });
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some((_, task)) = self.timer.get_mut().take() {
            task.abort();
        }
        if let Some(task) = self.lifecycle_task.get_mut().take() {
            task.abort();
        }
    }
}

/// Forward every lifecycle change, in order, until the manager or the
/// lifecycle goes away
async fn watch_lifecycle(mut subscription: LifecycleSubscription, shared: Weak<Shared>) {
    while let Some(state) = subscription.recv().await {
        let Some(shared) = shared.upgrade() else {
            break;
        };

        debug!("App state changed to {:?}", state);
        let fallback_username = shared.resolve_identity(None);
        shared.apply(Input::AppStateChanged {
            state,
            fallback_username,
        });
    }
    debug!("Lifecycle watcher exiting");
}
