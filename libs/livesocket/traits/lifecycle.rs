//! Application foreground/background signal
//!
//! Mobile hosts suspend sockets while the app is in the background, so a
//! socket can be dead on resume without a close event ever firing. The host
//! drives a [`Lifecycle`] and the manager watches it.
//!
//! Every `set` reaches every subscriber, in order. A background -> active
//! pair published back to back is still seen as a resume.

use serde::{Deserialize, Serialize};
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Host application state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppState {
    Active,
    Inactive,
    Background,
}

impl AppState {
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self, AppState::Active)
    }

    /// Inactive or background
    #[inline]
    pub fn is_suspended(&self) -> bool {
        !self.is_active()
    }

    /// True only for the inactive/background -> active transition
    #[inline]
    pub fn is_resume(previous: AppState, next: AppState) -> bool {
        previous.is_suspended() && next.is_active()
    }
}

/// Two-state notifier driven by the host
#[derive(Debug)]
pub struct Lifecycle {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    current: AppState,
    subscribers: Vec<mpsc::UnboundedSender<AppState>>,
}

impl Lifecycle {
    pub fn new(initial: AppState) -> Self {
        Self {
            inner: Mutex::new(Inner {
                current: initial,
                subscribers: Vec::new(),
            }),
        }
    }

    /// Publish a new application state
    pub fn set(&self, state: AppState) {
        let mut inner = self.inner.lock();
        inner.current = state;
        // Dropped subscriptions are pruned here
        inner.subscribers.retain(|tx| tx.send(state).is_ok());
    }

    pub fn current(&self) -> AppState {
        self.inner.lock().current
    }

    /// Subscribe to state changes (used by the manager builder)
    pub fn subscribe(&self) -> LifecycleSubscription {
        let mut inner = self.inner.lock();
        let (tx, rx) = mpsc::unbounded_channel();
        inner.subscribers.push(tx);
        LifecycleSubscription {
            initial: inner.current,
            rx,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.subscribers.retain(|tx| !tx.is_closed());
        inner.subscribers.len()
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new(AppState::Active)
    }
}

/// Ordered stream of the states published after subscribing
#[derive(Debug)]
pub struct LifecycleSubscription {
    initial: AppState,
    rx: mpsc::UnboundedReceiver<AppState>,
}

impl LifecycleSubscription {
    /// State at the time of subscribing
    pub fn initial(&self) -> AppState {
        self.initial
    }

    /// Next published state; `None` once the [`Lifecycle`] is dropped
    pub async fn recv(&mut self) -> Option<AppState> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<AppState> {
        self.rx.try_recv().ok()
    }
}
