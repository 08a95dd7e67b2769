//! Scripted fakes for orchestrator and health monitor tests.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use {async_trait::async_trait, tokio::sync::Semaphore};

use crate::{
    config::{FleetConfig, ServerConfig},
    error::{ErrorKind, McpError, Result},
    status::ConnectionState,
    traits::{ConnectionFactory, ConnectionHandle},
};

/// Handle whose connect/disconnect outcomes are scripted up front.
pub(crate) struct MockHandle {
    name: String,
    pub connect_calls: AtomicUsize,
    pub disconnect_calls: AtomicUsize,
    /// Remaining connect attempts that should fail. `usize::MAX` fails forever.
    fail_connects: AtomicUsize,
    fail_kind: ErrorKind,
    fail_disconnects: AtomicUsize,
    /// When set, every connect parks on this semaphore after bumping the
    /// call counter, so a test can hold a connect in flight.
    connect_gate: Option<Arc<Semaphore>>,
    state: Mutex<ConnectionState>,
}

impl MockHandle {
    pub fn ok(name: impl Into<String>) -> Arc<Self> {
        Self::failing(name, 0, ErrorKind::ConnectionFailed)
    }

    pub fn failing(name: impl Into<String>, fail_connects: usize, fail_kind: ErrorKind) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            connect_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
            fail_connects: AtomicUsize::new(fail_connects),
            fail_kind,
            fail_disconnects: AtomicUsize::new(0),
            connect_gate: None,
            state: Mutex::new(ConnectionState::Disconnected),
        })
    }

    /// Handle whose connects succeed but only after a permit is released on
    /// `gate`.
    pub fn gated(name: impl Into<String>, gate: Arc<Semaphore>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            connect_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
            fail_connects: AtomicUsize::new(0),
            fail_kind: ErrorKind::ConnectionFailed,
            fail_disconnects: AtomicUsize::new(0),
            connect_gate: Some(gate),
            state: Mutex::new(ConnectionState::Disconnected),
        })
    }

    pub fn failing_disconnects(name: impl Into<String>, fail_disconnects: usize) -> Arc<Self> {
        let handle = Self::ok(name);
        handle.fail_disconnects.store(fail_disconnects, Ordering::SeqCst);
        handle
    }

    fn take_scripted_failure(&self, counter: &AtomicUsize) -> bool {
        loop {
            let remaining = counter.load(Ordering::SeqCst);
            if remaining == 0 {
                return false;
            }
            let next = if remaining == usize::MAX { remaining } else { remaining - 1 };
            if counter
                .compare_exchange(remaining, next, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return true;
            }
        }
    }
}

#[async_trait]
impl ConnectionHandle for MockHandle {
    fn server_name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> Result<()> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.connect_gate {
            gate.acquire().await.unwrap().forget();
        }
        if self.take_scripted_failure(&self.fail_connects) {
            *self.state.lock().unwrap() = ConnectionState::Error;
            return Err(
                McpError::new(self.fail_kind, "scripted failure").with_connection(&self.name)
            );
        }
        *self.state.lock().unwrap() = ConnectionState::Connected;
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        if self.take_scripted_failure(&self.fail_disconnects) {
            return Err(
                McpError::new(ErrorKind::ServerError, "scripted disconnect failure")
                    .with_connection(&self.name),
            );
        }
        *self.state.lock().unwrap() = ConnectionState::Disconnected;
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }
}

/// Factory that hands out [`MockHandle`]s and remembers them for later
/// inspection.
#[derive(Default)]
pub(crate) struct MockFactory {
    handles: Mutex<HashMap<String, Arc<MockHandle>>>,
    fail_for: Vec<String>,
    build_gate: Mutex<Option<Arc<Semaphore>>>,
    pub build_calls: AtomicUsize,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory that refuses to build handles for the given names.
    pub fn failing_for(names: &[&str]) -> Self {
        Self {
            fail_for: names.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Pre-register a scripted handle to be returned for its name.
    pub fn script(&self, handle: Arc<MockHandle>) {
        self.handles
            .lock()
            .unwrap()
            .insert(handle.server_name().to_string(), handle);
    }

    pub fn handle(&self, name: &str) -> Arc<MockHandle> {
        self.handles.lock().unwrap().get(name).cloned().unwrap()
    }

    /// Park subsequent builds on `gate` until a permit is released, so a
    /// test can observe the manager mid-rebuild.
    pub fn gate_builds(&self, gate: Arc<Semaphore>) {
        *self.build_gate.lock().unwrap() = Some(gate);
    }
}

#[async_trait]
impl ConnectionFactory for MockFactory {
    async fn build(&self, config: &ServerConfig) -> Result<Arc<dyn ConnectionHandle>> {
        self.build_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.build_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }
        if self.fail_for.contains(&config.name) {
            return Err(McpError::initialization_failed(
                &config.name,
                "scripted factory failure",
            ));
        }
        let handle = self
            .handles
            .lock()
            .unwrap()
            .entry(config.name.clone())
            .or_insert_with(|| MockHandle::ok(config.name.clone()))
            .clone();
        Ok(handle)
    }
}

/// Enabled fleet of stdio servers with the given names.
pub(crate) fn fleet(names: &[&str]) -> Arc<FleetConfig> {
    let servers = names
        .iter()
        .map(|n| ServerConfig::stdio(*n, "echo", vec![]))
        .collect();
    Arc::new(FleetConfig::new(true, servers).unwrap())
}
