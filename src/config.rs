use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use vital_signs_wasm::EngineConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub cors_origin: String,
    pub limits: LimitsConfig,
    pub engine: EngineEnvConfig,
}

#[derive(Debug, Clone)]
pub struct LimitsConfig {
    pub max_sse_connections: usize,
    /// Bounded command queue in front of the monitor task.
    pub monitor_queue_capacity: usize,
    pub max_batch_frames: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_sse_connections: 64,
            monitor_queue_capacity: 1024,
            max_batch_frames: 256,
        }
    }
}

/// Engine overrides read from the environment. Anything not listed keeps the
/// `EngineConfig` default.
#[derive(Debug, Clone)]
pub struct EngineEnvConfig {
    pub buffer_size: usize,
    pub interval_ms: u64,
    pub min_rate: f64,
    pub max_rate: f64,
    pub calibration_samples: usize,
    pub calibration_percentile: f64,
    pub perclos_window_secs: f64,
    pub closed_eye_multiplier: f64,
}

impl Default for EngineEnvConfig {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            buffer_size: engine.pulse.buffer_size,
            interval_ms: engine.aggregation.interval_ms,
            min_rate: engine.aggregation.min_rate,
            max_rate: engine.aggregation.max_rate,
            calibration_samples: engine.fatigue.calibration_samples,
            calibration_percentile: engine.fatigue.calibration_percentile,
            perclos_window_secs: engine.fatigue.window_ms / 1000.0,
            closed_eye_multiplier: engine.fatigue.closed_eye_multiplier,
        }
    }
}

impl EngineEnvConfig {
    pub fn to_engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::default();
        config.pulse.buffer_size = self.buffer_size;
        // 缓冲区缩小时最少样本数跟随缩小
        config.pulse.min_samples = config.pulse.min_samples.min(self.buffer_size);
        config.aggregation.interval_ms = self.interval_ms;
        config.aggregation.min_rate = self.min_rate;
        config.aggregation.max_rate = self.max_rate;
        config.fatigue.calibration_samples = self.calibration_samples;
        config.fatigue.calibration_percentile = self.calibration_percentile;
        config.fatigue.window_ms = self.perclos_window_secs * 1000.0;
        config.fatigue.closed_eye_multiplier = self.closed_eye_multiplier;
        config
    }
}

impl Config {
    pub fn from_env() -> Self {
        let engine_defaults = EngineEnvConfig::default();
        let limit_defaults = LimitsConfig::default();
        Self {
            host: env_or_parse("HOST", IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))),
            port: env_or_parse("PORT", 3000_u16),
            log_level: env_or("RUST_LOG", "info"),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            cors_origin: env_or("CORS_ORIGIN", "http://localhost:5173"),
            limits: LimitsConfig {
                max_sse_connections: env_or_parse(
                    "MAX_SSE_CONNECTIONS",
                    limit_defaults.max_sse_connections,
                ),
                monitor_queue_capacity: env_or_parse(
                    "MONITOR_QUEUE_CAPACITY",
                    limit_defaults.monitor_queue_capacity,
                ),
                max_batch_frames: limit_defaults.max_batch_frames,
            },
            engine: EngineEnvConfig {
                buffer_size: env_or_parse("VITALS_BUFFER_SIZE", engine_defaults.buffer_size),
                interval_ms: env_or_parse("VITALS_INTERVAL_MS", engine_defaults.interval_ms),
                min_rate: env_or_parse("VITALS_MIN_RATE", engine_defaults.min_rate),
                max_rate: env_or_parse("VITALS_MAX_RATE", engine_defaults.max_rate),
                calibration_samples: env_or_parse(
                    "VITALS_CALIBRATION_SAMPLES",
                    engine_defaults.calibration_samples,
                ),
                calibration_percentile: env_or_parse(
                    "VITALS_CALIBRATION_PERCENTILE",
                    engine_defaults.calibration_percentile,
                ),
                perclos_window_secs: env_or_parse(
                    "VITALS_PERCLOS_WINDOW_SECS",
                    engine_defaults.perclos_window_secs,
                ),
                closed_eye_multiplier: env_or_parse(
                    "VITALS_CLOSED_EYE_MULTIPLIER",
                    engine_defaults.closed_eye_multiplier,
                ),
            },
        }
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(
                    key,
                    value = %raw,
                    "Failed to parse env var, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}
