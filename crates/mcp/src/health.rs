//! Background health monitoring with automatic reconnects.
//!
//! The monitor periodically sweeps the fleet's statuses while the manager is
//! running. Connections stuck in the error state with a retryable error get
//! reconnect attempts with exponential backoff, up to a per-connection
//! budget. A successful reconnect resets the budget.

use std::{collections::HashMap, sync::Arc, time::Duration};

use {
    tokio::{
        sync::Mutex,
        task::JoinHandle,
        time::{interval, Instant, MissedTickBehavior},
    },
    tracing::{debug, info, warn},
};

use crate::{manager::McpManager, status::ConnectionState};

/// Tuning for the health monitor.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Time between status sweeps.
    pub check_interval: Duration,
    /// Reconnect attempts per connection before giving up. Resets when the
    /// connection recovers.
    pub max_reconnect_attempts: u32,
    /// Backoff after the first failed reconnect; doubles per attempt.
    pub base_backoff: Duration,
    /// Ceiling for the backoff delay.
    pub max_backoff: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(30),
            max_reconnect_attempts: 3,
            base_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(60),
        }
    }
}

/// Handle to the background monitoring task.
pub struct HealthMonitor {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl HealthMonitor {
    /// Spawn the monitoring loop on the current runtime.
    #[must_use]
    pub fn spawn(manager: Arc<McpManager>, config: HealthConfig) -> Self {
        let handle = tokio::spawn(run(manager, config));
        Self {
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Abort the monitoring loop. Idempotent.
    pub async fn stop(&self) {
        if let Some(handle) = self.handle.lock().await.take() {
            handle.abort();
            info!("health monitor stopped");
        }
    }
}

async fn run(manager: Arc<McpManager>, config: HealthConfig) {
    info!(
        interval_secs = config.check_interval.as_secs(),
        "health monitor started"
    );
    let mut ticker = interval(config.check_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut attempts: HashMap<String, u32> = HashMap::new();
    let mut next_due: HashMap<String, Instant> = HashMap::new();

    loop {
        ticker.tick().await;
        if !manager.is_running().await {
            continue;
        }
        sweep(&manager, &config, &mut attempts, &mut next_due).await;
    }
}

async fn sweep(
    manager: &McpManager,
    config: &HealthConfig,
    attempts: &mut HashMap<String, u32>,
    next_due: &mut HashMap<String, Instant>,
) {
    let statuses = manager.get_all_statuses().await;
    // Drop bookkeeping for connections removed by a reload.
    attempts.retain(|name, _| statuses.contains_key(name));
    next_due.retain(|name, _| statuses.contains_key(name));

    let now = Instant::now();
    for (name, status) in statuses {
        match status.state {
            ConnectionState::Connected => {
                if attempts.remove(&name).is_some() {
                    info!(server = %name, "connection recovered");
                }
                next_due.remove(&name);
            },
            ConnectionState::Error => {
                let Some(last_error) = &status.last_error else {
                    continue;
                };
                if !last_error.kind.is_retryable() {
                    continue;
                }
                let made = attempts.get(&name).copied().unwrap_or(0);
                if made >= config.max_reconnect_attempts {
                    debug!(server = %name, attempts = made, "reconnect budget exhausted");
                    continue;
                }
                if next_due.get(&name).is_some_and(|due| now < *due) {
                    continue;
                }

                info!(server = %name, attempt = made + 1, "attempting automatic reconnect");
                if let Err(e) = manager.reconnect(&name).await {
                    // Name vanished between snapshot and reconnect.
                    debug!(server = %name, error = %e, "reconnect could not be dispatched");
                }
                let recovered = manager
                    .get_client_status(&name)
                    .await
                    .is_some_and(|s| s.is_connected());
                if recovered {
                    attempts.remove(&name);
                    next_due.remove(&name);
                    info!(server = %name, "connection recovered");
                } else {
                    let made = made + 1;
                    let backoff = backoff_delay(config, made);
                    attempts.insert(name.clone(), made);
                    next_due.insert(name.clone(), now + backoff);
                    warn!(
                        server = %name,
                        attempt = made,
                        backoff_ms = backoff.as_millis() as u64,
                        "reconnect failed, backing off"
                    );
                }
            },
            ConnectionState::Disconnected | ConnectionState::Connecting => {},
        }
    }
}

/// Delay before the attempt after `attempt` failures: base doubled per
/// failure, capped at the configured maximum.
fn backoff_delay(config: &HealthConfig, attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    config
        .base_backoff
        .saturating_mul(1u32 << exp)
        .min(config.max_backoff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ErrorKind,
        test_support::{fleet, MockFactory, MockHandle},
    };
    use std::sync::atomic::Ordering;

    #[test]
    fn backoff_doubles_per_attempt_and_caps() {
        let config = HealthConfig::default();
        assert_eq!(backoff_delay(&config, 1), Duration::from_secs(2));
        assert_eq!(backoff_delay(&config, 2), Duration::from_secs(4));
        assert_eq!(backoff_delay(&config, 3), Duration::from_secs(8));
        assert_eq!(backoff_delay(&config, 6), Duration::from_secs(60));
        assert_eq!(backoff_delay(&config, 30), Duration::from_secs(60));
    }

    fn fast_config() -> HealthConfig {
        HealthConfig {
            check_interval: Duration::from_secs(5),
            max_reconnect_attempts: 3,
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(8),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_recovers_a_retryable_failure() {
        let factory = MockFactory::new();
        factory.script(MockHandle::failing("a", 2, ErrorKind::ConnectionFailed));
        let factory = Arc::new(factory);
        let manager = Arc::new(McpManager::new(factory.clone()));
        manager.initialize(fleet(&["a"])).await.unwrap();
        manager.start().await.unwrap();
        assert!(!manager.get_client_status("a").await.unwrap().is_connected());

        let monitor = HealthMonitor::spawn(manager.clone(), fast_config());
        // First sweep burns the second scripted failure, second sweep
        // reconnects for real.
        tokio::time::sleep(Duration::from_secs(12)).await;

        assert!(manager.get_client_status("a").await.unwrap().is_connected());
        monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_stops_after_the_attempt_budget() {
        let factory = MockFactory::new();
        factory.script(MockHandle::failing("a", usize::MAX, ErrorKind::Timeout));
        let factory = Arc::new(factory);
        let manager = Arc::new(McpManager::new(factory.clone()));
        manager.initialize(fleet(&["a"])).await.unwrap();
        manager.start().await.unwrap();

        let monitor = HealthMonitor::spawn(manager.clone(), fast_config());
        tokio::time::sleep(Duration::from_secs(120)).await;

        // One connect from start plus three monitor attempts.
        assert_eq!(factory.handle("a").connect_calls.load(Ordering::SeqCst), 4);
        monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_ignores_non_retryable_errors() {
        let factory = MockFactory::new();
        factory.script(MockHandle::failing(
            "a",
            usize::MAX,
            ErrorKind::PermissionDenied,
        ));
        let factory = Arc::new(factory);
        let manager = Arc::new(McpManager::new(factory.clone()));
        manager.initialize(fleet(&["a"])).await.unwrap();
        manager.start().await.unwrap();

        let monitor = HealthMonitor::spawn(manager.clone(), fast_config());
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(factory.handle("a").connect_calls.load(Ordering::SeqCst), 1);
        monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_is_idle_while_the_manager_is_not_running() {
        let factory = MockFactory::new();
        factory.script(MockHandle::failing("a", usize::MAX, ErrorKind::Timeout));
        let factory = Arc::new(factory);
        let manager = Arc::new(McpManager::new(factory.clone()));
        manager.initialize(fleet(&["a"])).await.unwrap();

        let monitor = HealthMonitor::spawn(manager.clone(), fast_config());
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(factory.handle("a").connect_calls.load(Ordering::SeqCst), 0);
        monitor.stop().await;
    }
}
