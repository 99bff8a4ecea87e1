pub mod states;

use crate::config::{Endpoints, ManagerConfig};
use crate::manager::ConnectionManager;
use crate::socket::TungsteniteTransport;
use crate::traits::*;
use states::*;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Type-state builder for [`ConnectionManager`]
///
/// An endpoint (or a full [`ManagerConfig`]) must be given before the
/// manager can be built. Everything else has a default:
///
/// - transport: [`TungsteniteTransport`] on the current runtime
/// - identity store: [`MemoryStore`]
/// - reconnect strategy: derived from `config.reconnect`
/// - lifecycle: none (the manager never sees foreground changes)
pub struct ManagerBuilder<C>
where
    C: ConfigState,
{
    _state: TypeState<C>,
    config: Option<ManagerConfig>,
    transport: Option<Arc<dyn Transport>>,
    store: Option<Arc<dyn IdentityStore>>,
    lifecycle: Option<LifecycleSubscription>,
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
    runtime: Option<Handle>,
}

impl ManagerBuilder<NoConfig> {
    /// Create a new builder instance
    pub fn new() -> Self {
        Self {
            _state: TypeState::new(),
            config: None,
            transport: None,
            store: None,
            lifecycle: None,
            reconnect_strategy: None,
            runtime: None,
        }
    }

    /// Use a complete configuration
    pub fn config(self, config: ManagerConfig) -> ManagerBuilder<HasConfig> {
        ManagerBuilder {
            _state: TypeState::new(),
            config: Some(config),
            transport: self.transport,
            store: self.store,
            lifecycle: self.lifecycle,
            reconnect_strategy: self.reconnect_strategy,
            runtime: self.runtime,
        }
    }

    /// Use the default configuration with both variants pointing at `url`
    pub fn endpoint(self, url: impl Into<String>) -> ManagerBuilder<HasConfig> {
        self.config(ManagerConfig::with_endpoints(Endpoints::single(url)))
    }
}

impl Default for ManagerBuilder<NoConfig> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> ManagerBuilder<C>
where
    C: ConfigState,
{
    /// Set the transport used to open connections
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set where the connecting identity is persisted
    pub fn store(mut self, store: Arc<dyn IdentityStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Subscribe to an application lifecycle signal
    ///
    /// Returning to `Active` from `Inactive` or `Background` forces a
    /// reconnect.
    pub fn lifecycle(mut self, lifecycle: LifecycleSubscription) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    /// Override the strategy derived from the reconnect configuration
    pub fn reconnect_strategy<S>(mut self, strategy: S) -> Self
    where
        S: ReconnectionStrategy + 'static,
    {
        self.reconnect_strategy = Some(Box::new(strategy));
        self
    }

    /// Spawn timers and connections on this runtime instead of the current one
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }
}

impl ManagerBuilder<HasConfig> {
    /// Build the manager
    ///
    /// Fails if the configuration does not validate, or if no runtime was
    /// given and this is not called from within a tokio runtime.
    pub fn build(self) -> Result<ConnectionManager> {
        let config = self
            .config
            .ok_or_else(|| LiveSocketError::Configuration("missing configuration".into()))?;
        config.validate()?;

        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|e| {
                LiveSocketError::Configuration(format!("no tokio runtime available: {}", e))
            })?,
        };

        let strategy = self
            .reconnect_strategy
            .unwrap_or_else(|| Box::new(config.reconnect.strategy()));
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(TungsteniteTransport::new(runtime.clone())));
        let store = self.store.unwrap_or_else(|| Arc::new(MemoryStore::new()));

        Ok(ConnectionManager::from_parts(
            config,
            strategy,
            transport,
            store,
            self.lifecycle,
            runtime,
        ))
    }
}
