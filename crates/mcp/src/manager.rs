//! Connection fleet orchestrator.
//!
//! [`McpManager`] owns the configured connection handles and drives them
//! through a single lifecycle. Fleet-wide transitions (initialize, start,
//! stop, reload, shutdown) are linearized through a gate mutex so concurrent
//! callers cannot interleave; per-connection status reads stay lock-cheap
//! behind the inner `RwLock`.

use std::{collections::HashMap, mem, sync::Arc};

use {
    futures::future::join_all,
    serde::Serialize,
    tokio::sync::{Mutex, RwLock},
    tracing::{debug, info},
};

use crate::{
    config::FleetConfig,
    error::{log_error, Context, McpError, Result},
    status::{ConnectionState, ConnectionStatus, LastError, StatusRegistry},
    traits::{ConnectionFactory, ConnectionHandle},
};

/// Manager lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Uninitialized,
    Initializing,
    Initialized,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl Lifecycle {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Initialized => "initialized",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

struct ManagerInner {
    lifecycle: Lifecycle,
    config: Option<Arc<FleetConfig>>,
    handles: HashMap<String, Arc<dyn ConnectionHandle>>,
    statuses: StatusRegistry,
}

/// Orchestrates the MCP connection fleet.
///
/// Constructed once with a [`ConnectionFactory`] and shared behind an `Arc`.
pub struct McpManager {
    factory: Arc<dyn ConnectionFactory>,
    inner: RwLock<ManagerInner>,
    /// Serializes fleet-wide transitions and per-connection reconnects.
    /// Never held across a status read.
    transition_gate: Mutex<()>,
}

impl McpManager {
    #[must_use]
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            factory,
            inner: RwLock::new(ManagerInner {
                lifecycle: Lifecycle::Uninitialized,
                config: None,
                handles: HashMap::new(),
                statuses: StatusRegistry::default(),
            }),
            transition_gate: Mutex::new(()),
        }
    }

    /// Apply a configuration and build handles for every enabled server.
    ///
    /// Idempotent for the configuration instance already active: calling
    /// again with the same `Arc` is a no-op. A different instance tears the
    /// current fleet down and rebuilds from scratch. A factory failure for
    /// one server leaves that server in the error state and does not abort
    /// the rest of the fleet.
    pub async fn initialize(&self, config: Arc<FleetConfig>) -> Result<()> {
        let _gate = self.transition_gate.lock().await;
        {
            let inner = self.inner.read().await;
            if matches!(inner.lifecycle, Lifecycle::Initialized | Lifecycle::Running)
                && inner.config.as_ref().is_some_and(|c| Arc::ptr_eq(c, &config))
            {
                debug!("initialize() called with the active configuration, nothing to do");
                return Ok(());
            }
        }
        self.set_lifecycle(Lifecycle::Initializing).await;

        let old_handles = self.inner.read().await.handles.clone();
        if !old_handles.is_empty() {
            for (name, result) in settle_disconnects(&old_handles).await {
                if let Err(e) = result {
                    debug!(server = %name, error = %e, "disconnect during re-initialization failed");
                }
            }
        }

        let (handles, statuses) = if config.enabled {
            self.build_fleet(&config).await
        } else {
            info!("MCP disabled, initializing an empty fleet");
            (HashMap::new(), StatusRegistry::default())
        };

        // One write swaps config, handles, and statuses together so readers
        // never observe a mixed name set.
        let mut inner = self.inner.write().await;
        inner.config = Some(config);
        inner.handles = handles;
        inner.statuses = statuses;
        inner.lifecycle = Lifecycle::Initialized;
        info!(servers = inner.statuses.len(), "MCP manager initialized");
        Ok(())
    }

    /// Connect every handle in the fleet concurrently.
    ///
    /// Individual connect failures are recorded per connection and do not
    /// fail the call; the manager still lands in the running state. Calling
    /// while already running is a no-op.
    pub async fn start(&self) -> Result<()> {
        let _gate = self.transition_gate.lock().await;
        let lifecycle = self.inner.read().await.lifecycle;
        match lifecycle {
            Lifecycle::Running => {
                debug!("start() called while already running");
                Ok(())
            },
            Lifecycle::Initialized => {
                self.connect_fleet().await;
                Ok(())
            },
            other => Err(McpError::client_error(format!(
                "start() requires an initialized manager, state is '{other}'"
            ))),
        }
    }

    /// Disconnect every handle concurrently and return to the initialized
    /// state. Disconnect failures are logged and recorded, never propagated.
    /// Calling while not running is a no-op.
    pub async fn stop(&self) -> Result<()> {
        let _gate = self.transition_gate.lock().await;
        {
            let inner = self.inner.read().await;
            if inner.lifecycle != Lifecycle::Running {
                debug!(state = %inner.lifecycle, "stop() called while not running");
                return Ok(());
            }
        }
        self.set_lifecycle(Lifecycle::Stopping).await;

        let handles = self.inner.read().await.handles.clone();
        let results = settle_disconnects(&handles).await;

        let mut inner = self.inner.write().await;
        for (name, result) in results {
            match result {
                Ok(()) => {
                    inner
                        .statuses
                        .transition(&name, ConnectionState::Disconnected, None);
                },
                Err(e) => {
                    let e = e.with_connection(&name);
                    log_error(&e);
                    inner.statuses.transition(
                        &name,
                        ConnectionState::Disconnected,
                        Some(LastError::from(&e)),
                    );
                },
            }
        }
        inner.lifecycle = Lifecycle::Initialized;
        info!("MCP fleet stopped");
        Ok(())
    }

    /// Tear everything down for process exit. Drops the configuration and
    /// all status entries; the manager ends in the terminal stopped state.
    pub async fn shutdown(&self) {
        let _gate = self.transition_gate.lock().await;
        let handles = {
            let mut inner = self.inner.write().await;
            debug!(from = %inner.lifecycle, to = %Lifecycle::Stopping, "lifecycle transition");
            inner.lifecycle = Lifecycle::Stopping;
            mem::take(&mut inner.handles)
        };
        for (name, result) in settle_disconnects(&handles).await {
            if let Err(e) = result {
                debug!(server = %name, error = %e, "disconnect during shutdown failed");
            }
        }
        let mut inner = self.inner.write().await;
        inner.config = None;
        inner.statuses = StatusRegistry::default();
        inner.lifecycle = Lifecycle::Stopped;
        info!("MCP manager shut down");
    }

    /// Disconnect and reconnect one connection by name.
    ///
    /// Fails only when no connection with that name exists. A connect
    /// failure is recorded in the connection's status and the call still
    /// returns success; the health monitor picks retryable failures up from
    /// there.
    ///
    /// Holds the transition gate for the whole cycle: a reload cannot swap
    /// the fleet out from under an in-flight reconnect, so the outcome is
    /// always recorded against the handle it was observed on.
    pub async fn reconnect(&self, name: &str) -> Result<()> {
        let _gate = self.transition_gate.lock().await;
        let handle = self.inner.read().await.handles.get(name).cloned();
        let Some(handle) = handle else {
            return Err(McpError::resource_not_found(
                name,
                format!("no MCP connection named '{name}'"),
            ));
        };

        info!(server = %name, "reconnecting MCP server");
        self.transition(name, ConnectionState::Connecting, None).await;
        if let Err(e) = handle.disconnect().await {
            debug!(server = %name, error = %e, "disconnect before reconnect failed");
        }
        match handle.connect().await {
            Ok(()) => {
                self.transition(name, ConnectionState::Connected, None).await;
            },
            Err(e) => {
                let e = e.with_connection(name);
                log_error(&e);
                self.transition(name, ConnectionState::Error, Some(LastError::from(&e)))
                    .await;
            },
        }
        Ok(())
    }

    /// Swap in a new configuration. Requires an initialized manager.
    ///
    /// If the fleet was running it is disconnected, rebuilt, and started
    /// again; otherwise the new fleet stays in the initialized state.
    pub async fn reload_config(&self, config: Arc<FleetConfig>) -> Result<()> {
        let _gate = self.transition_gate.lock().await;
        let (was_running, old_handles) = {
            let inner = self.inner.read().await;
            inner
                .config
                .as_ref()
                .context("reload_config() requires an initialized manager")?;
            (inner.lifecycle == Lifecycle::Running, inner.handles.clone())
        };

        info!(servers = config.servers.len(), "reloading MCP configuration");
        self.set_lifecycle(Lifecycle::Initializing).await;
        if was_running {
            for (name, result) in settle_disconnects(&old_handles).await {
                if let Err(e) = result {
                    debug!(server = %name, error = %e, "disconnect during reload failed");
                }
            }
        }

        let (handles, statuses) = if config.enabled {
            self.build_fleet(&config).await
        } else {
            info!("MCP disabled by reloaded configuration");
            (HashMap::new(), StatusRegistry::default())
        };
        {
            let mut inner = self.inner.write().await;
            inner.config = Some(config);
            inner.handles = handles;
            inner.statuses = statuses;
            inner.lifecycle = Lifecycle::Initialized;
        }

        if was_running {
            self.connect_fleet().await;
        }
        Ok(())
    }

    pub async fn get_client(&self, name: &str) -> Option<Arc<dyn ConnectionHandle>> {
        self.inner.read().await.handles.get(name).cloned()
    }

    pub async fn get_client_names(&self) -> Vec<String> {
        let mut names = self.inner.read().await.statuses.names();
        names.sort();
        names
    }

    pub async fn get_all_statuses(&self) -> HashMap<String, ConnectionStatus> {
        self.inner.read().await.statuses.snapshot()
    }

    pub async fn get_client_status(&self, name: &str) -> Option<ConnectionStatus> {
        self.inner.read().await.statuses.get(name).cloned()
    }

    pub async fn get_connected_clients(&self) -> Vec<String> {
        let mut names = self.inner.read().await.statuses.connected_names();
        names.sort();
        names
    }

    pub async fn get_connected_client_count(&self) -> usize {
        self.inner.read().await.statuses.connected_count()
    }

    pub async fn has_connected_clients(&self) -> bool {
        self.get_connected_client_count().await > 0
    }

    /// True from the moment a configuration is applied until shutdown,
    /// including mid-reload.
    pub async fn is_initialized(&self) -> bool {
        let inner = self.inner.read().await;
        inner.config.is_some() && inner.lifecycle != Lifecycle::Stopped
    }

    pub async fn is_running(&self) -> bool {
        self.inner.read().await.lifecycle == Lifecycle::Running
    }

    pub async fn lifecycle(&self) -> Lifecycle {
        self.inner.read().await.lifecycle
    }

    pub async fn active_config(&self) -> Option<Arc<FleetConfig>> {
        self.inner.read().await.config.clone()
    }

    /// Human-readable status report covering the whole fleet.
    pub async fn generate_status_report(&self) -> String {
        let inner = self.inner.read().await;
        let mut out = String::from("=== MCP Client Manager Status ===\n");
        out.push_str(&format!("Manager state: {}\n", inner.lifecycle));
        out.push_str(&format!("Total connections: {}\n", inner.statuses.len()));
        out.push_str(&format!("Connected: {}\n", inner.statuses.connected_count()));

        let mut names = inner.statuses.names();
        names.sort();
        if !names.is_empty() {
            out.push('\n');
            for name in names {
                if let Some(status) = inner.statuses.get(&name) {
                    out.push_str(&status.summary_line());
                    out.push('\n');
                }
            }
        }
        out
    }

    async fn set_lifecycle(&self, to: Lifecycle) {
        let mut inner = self.inner.write().await;
        if inner.lifecycle != to {
            debug!(from = %inner.lifecycle, to = %to, "lifecycle transition");
            inner.lifecycle = to;
        }
    }

    async fn transition(&self, name: &str, state: ConnectionState, last_error: Option<LastError>) {
        let mut inner = self.inner.write().await;
        inner.statuses.transition(name, state, last_error);
    }

    /// Build handles for every enabled server. A failing factory yields an
    /// errored status entry instead of aborting the fleet.
    async fn build_fleet(
        &self,
        config: &FleetConfig,
    ) -> (HashMap<String, Arc<dyn ConnectionHandle>>, StatusRegistry) {
        let mut handles = HashMap::new();
        let mut statuses = StatusRegistry::default();
        for server in config.enabled_servers() {
            match self.factory.build(server).await {
                Ok(handle) => {
                    handles.insert(server.name.clone(), handle);
                    statuses.insert(ConnectionStatus::disconnected(&server.name));
                },
                Err(e) => {
                    let e = e.with_connection(&server.name);
                    log_error(&e);
                    statuses.insert(ConnectionStatus::errored(&server.name, LastError::from(&e)));
                },
            }
        }
        (handles, statuses)
    }

    /// Fan out connects over the current handle set and record each outcome.
    /// Caller must hold the transition gate.
    async fn connect_fleet(&self) {
        let handles: Vec<(String, Arc<dyn ConnectionHandle>)> = {
            let mut inner = self.inner.write().await;
            debug!(from = %inner.lifecycle, to = %Lifecycle::Starting, "lifecycle transition");
            inner.lifecycle = Lifecycle::Starting;
            let handles: Vec<_> = inner
                .handles
                .iter()
                .map(|(n, h)| (n.clone(), Arc::clone(h)))
                .collect();
            for (name, _) in &handles {
                inner.statuses.transition(name, ConnectionState::Connecting, None);
            }
            handles
        };

        let results = join_all(handles.iter().map(|(name, handle)| {
            let name = name.clone();
            let handle = Arc::clone(handle);
            async move { (name, handle.connect().await) }
        }))
        .await;

        let mut inner = self.inner.write().await;
        for (name, result) in results {
            match result {
                Ok(()) => {
                    inner.statuses.transition(&name, ConnectionState::Connected, None);
                },
                Err(e) => {
                    let e = e.with_connection(&name);
                    log_error(&e);
                    inner.statuses.transition(
                        &name,
                        ConnectionState::Error,
                        Some(LastError::from(&e)),
                    );
                },
            }
        }
        inner.lifecycle = Lifecycle::Running;
        info!(
            connected = inner.statuses.connected_count(),
            total = inner.statuses.len(),
            "MCP fleet started"
        );
    }
}

/// Disconnect every handle concurrently, pairing each result with its name.
async fn settle_disconnects(
    handles: &HashMap<String, Arc<dyn ConnectionHandle>>,
) -> Vec<(String, Result<()>)> {
    join_all(handles.iter().map(|(name, handle)| {
        let name = name.clone();
        let handle = Arc::clone(handle);
        async move { (name, handle.disconnect().await) }
    }))
    .await
}
