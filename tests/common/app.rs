use axum::Router;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use vitals_backend::config::{Config, EngineEnvConfig, LimitsConfig};
use vitals_backend::monitor::spawn_monitor;
use vitals_backend::routes::build_router;
use vitals_backend::state::AppState;

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub config: Config,
    pub shutdown_tx: broadcast::Sender<()>,
    pub monitor_task: JoinHandle<()>,
}

/// 直接构造 Config，避免 set_var 造成多线程测试环境变量竞态
pub fn test_config(limits: LimitsConfig, engine: EngineEnvConfig) -> Config {
    Config {
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        port: 3000,
        log_level: "info".to_string(),
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        cors_origin: "http://localhost:5173".to_string(),
        limits,
        engine,
    }
}

pub async fn spawn_with(config: Config) -> TestApp {
    let (shutdown_tx, _) = broadcast::channel::<()>(8);
    let (monitor, monitor_task) = spawn_monitor(
        config.engine.to_engine_config(),
        config.limits.monitor_queue_capacity,
        shutdown_tx.subscribe(),
    );
    let state = AppState::new(monitor, &config, shutdown_tx.clone());
    let app = build_router(state.clone());

    TestApp {
        app,
        state,
        config,
        shutdown_tx,
        monitor_task,
    }
}

/// Default limits with a long interval so tests flush explicitly.
pub async fn spawn_test_app() -> TestApp {
    let engine = EngineEnvConfig {
        interval_ms: 600_000,
        ..EngineEnvConfig::default()
    };
    spawn_with(test_config(LimitsConfig::default(), engine)).await
}
