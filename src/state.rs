use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;

use crate::config::Config;
use crate::monitor::MonitorHandle;

#[derive(Clone)]
pub struct AppState {
    monitor: MonitorHandle,
    config: Arc<Config>,
    shutdown_tx: broadcast::Sender<()>,
    started_at: Instant,
}

impl AppState {
    pub fn new(monitor: MonitorHandle, config: &Config, shutdown_tx: broadcast::Sender<()>) -> Self {
        Self {
            monitor,
            config: Arc::new(config.clone()),
            shutdown_tx,
            started_at: Instant::now(),
        }
    }

    pub fn monitor(&self) -> &MonitorHandle {
        &self.monitor
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn shutdown_rx(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::broadcast;

    use crate::config::Config;
    use crate::monitor::spawn_monitor;

    use super::*;

    #[tokio::test]
    async fn shutdown_receiver_can_clone() {
        let cfg = Config::from_env();
        let (tx, _) = broadcast::channel(4);
        let (monitor, _task) =
            spawn_monitor(cfg.engine.to_engine_config(), 8, tx.subscribe());
        let state = AppState::new(monitor, &cfg, tx.clone());

        let mut rx1 = state.shutdown_rx();
        let mut rx2 = state.shutdown_rx();
        tx.send(()).unwrap();
        rx1.recv().await.unwrap();
        rx2.recv().await.unwrap();
    }

    #[tokio::test]
    async fn monitor_is_reachable_through_state() {
        let cfg = Config::from_env();
        let (tx, _) = broadcast::channel(4);
        let (monitor, _task) =
            spawn_monitor(cfg.engine.to_engine_config(), 8, tx.subscribe());
        let state = AppState::new(monitor, &cfg, tx);

        assert!(state.monitor().is_running());
        let snapshot = state.monitor().snapshot().await.unwrap();
        assert_eq!(snapshot.frames_processed, 0);
    }
}
