//! 生命体征估计 WASM 库
//!
//! 从逐帧的亮度信号估计心率（BPM），从逐帧的睁眼比估计眼部疲劳（0-100），
//! 编译为 WebAssembly 在浏览器端运行，也可作为普通 Rust 库被服务端使用。
//!
//! ## 模块
//! - `signal_buffer`: 固定容量亮度缓冲区
//! - `frame_rate`: 帧率 EMA 估计
//! - `periodicity`: 归一化自相关周期估计
//! - `aggregator`: 区间置信度分层聚合
//! - `perclos`: PERCLOS 闭眼时间百分比窗口
//! - `fatigue`: 校准 + PERCLOS 疲劳评分
//! - `ear`: EAR (Eye Aspect Ratio) 睁眼比计算
//! - `monitor`: 逐帧驱动，组合以上组件

pub mod aggregator;
pub mod config;
pub mod ear;
pub mod fatigue;
pub mod frame_rate;
pub mod monitor;
pub mod perclos;
pub mod periodicity;
pub mod signal_buffer;

// 重新导出核心类型，方便外部使用
pub use aggregator::{ConfidenceTier, FlushOutcome, IntervalStats, Resolution, SampleAggregator};
pub use config::{AggregationConfig, EngineConfig, FatigueConfig, PulseConfig};
pub use ear::{binocular_eye_aspect_ratio, eye_aspect_ratio};
pub use fatigue::{FatigueEstimator, FatigueLevel, FatigueReading};
pub use frame_rate::FrameRateTracker;
pub use monitor::{FlushReport, FrameInput, FrameReport, VitalsMonitor};
pub use perclos::PerclosWindow;
pub use periodicity::{PeriodicityEstimator, RateEstimate};
pub use signal_buffer::SignalBuffer;
