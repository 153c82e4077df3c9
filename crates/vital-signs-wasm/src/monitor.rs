//! 逐帧驱动
//!
//! 每个会话构造一个 `VitalsMonitor`，它独占缓冲区、帧率、聚合器和疲劳估计器。
//! 每帧调用 `process_frame`，区间结束时由外部定时器调用 `flush_at`。
//! 两者都是同步调用；多线程宿主必须串行化这两个调用。

use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

use crate::aggregator::{IntervalStats, Resolution, SampleAggregator};
use crate::config::EngineConfig;
use crate::fatigue::{FatigueEstimator, FatigueReading};
use crate::frame_rate::FrameRateTracker;
use crate::periodicity::{PeriodicityEstimator, RateEstimate};
use crate::signal_buffer::SignalBuffer;

/// 单帧输入
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameInput {
    /// 时间戳（毫秒），倒退视为客户端时钟重启
    pub timestamp_ms: f64,
    pub face_detected: bool,
    /// 感兴趣区域的亮度均值，由调用方计算
    #[serde(default)]
    pub brightness: Option<f64>,
    /// 睁眼比，由调用方根据关键点计算
    #[serde(default)]
    pub eye_ratio: Option<f64>,
}

/// 单帧输出
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameReport {
    pub estimate: RateEstimate,
    /// 本帧估计是否进入了区间聚合
    pub accepted: bool,
    pub fatigue: FatigueReading,
    pub has_displayed_rate: bool,
    pub displayed_rate: Option<u32>,
    pub fps: f64,
}

/// 区间 flush 输出
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlushReport {
    /// flush 之后的显示值（可能沿用之前的值）
    pub displayed_rate: Option<u32>,
    /// 本次解析出的值，`Unchanged` 时为 `None`
    pub resolved_rate: Option<u32>,
    pub resolution: Resolution,
    pub stats: IntervalStats,
    pub flushed_at_ms: f64,
}

#[wasm_bindgen]
#[derive(Debug, Clone)]
pub struct VitalsMonitor {
    config: EngineConfig,
    buffer: SignalBuffer,
    frame_rate: FrameRateTracker,
    periodicity: PeriodicityEstimator,
    aggregator: SampleAggregator,
    fatigue: FatigueEstimator,
    last_estimate: RateEstimate,
    interval_started_ms: Option<f64>,
    frames_processed: u64,
    face_frames: u64,
}

#[wasm_bindgen]
impl VitalsMonitor {
    /// 使用默认配置创建
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// 使用 JS 配置对象创建，缺省字段取默认值
    #[wasm_bindgen(js_name = "withConfig")]
    pub fn with_config_js(config: JsValue) -> Result<VitalsMonitor, JsValue> {
        let config: EngineConfig = serde_wasm_bindgen::from_value(config)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        config.validate().map_err(|e| JsValue::from_str(&e))?;
        Ok(Self::with_config(config))
    }

    /// 处理一帧，返回序列化为 JsValue 的 FrameReport
    #[wasm_bindgen(js_name = "processFrame")]
    pub fn process_frame_js(
        &mut self,
        timestamp_ms: f64,
        face_detected: bool,
        brightness: Option<f64>,
        eye_ratio: Option<f64>,
    ) -> JsValue {
        let report = self.process_frame(FrameInput {
            timestamp_ms,
            face_detected,
            brightness,
            eye_ratio,
        });
        serde_wasm_bindgen::to_value(&report).unwrap_or(JsValue::NULL)
    }

    /// 结束当前测量区间，返回序列化为 JsValue 的 FlushReport
    #[wasm_bindgen(js_name = "flush")]
    pub fn flush_js(&mut self, now_ms: f64) -> JsValue {
        let report = self.flush_at(now_ms);
        serde_wasm_bindgen::to_value(&report).unwrap_or(JsValue::NULL)
    }

    /// 当前区间统计，用于进度显示
    #[wasm_bindgen(js_name = "intervalStats")]
    pub fn interval_stats_js(&self) -> JsValue {
        serde_wasm_bindgen::to_value(&self.interval_stats()).unwrap_or(JsValue::NULL)
    }

    /// 当前区间已过去的比例 (0.0 - 1.0)
    #[wasm_bindgen(js_name = "intervalProgress")]
    pub fn interval_progress(&self, now_ms: f64) -> f64 {
        let Some(start) = self.interval_started_ms else {
            return 0.0;
        };
        ((now_ms - start) / self.config.aggregation.interval_ms as f64).clamp(0.0, 1.0)
    }

    #[wasm_bindgen(js_name = "displayedRate")]
    pub fn displayed_rate(&self) -> Option<u32> {
        self.aggregator.displayed_rate()
    }

    #[wasm_bindgen(js_name = "hasDisplayedRate")]
    pub fn has_displayed_rate(&self) -> bool {
        self.aggregator.displayed_rate().is_some()
    }

    pub fn fps(&self) -> f64 {
        self.frame_rate.fps()
    }

    #[wasm_bindgen(js_name = "framesProcessed")]
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    #[wasm_bindgen(js_name = "faceFrames")]
    pub fn face_frames(&self) -> u64 {
        self.face_frames
    }

    /// 丢弃全部状态，包括校准基线
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.frame_rate.reset();
        self.aggregator.reset();
        self.fatigue.reset();
        self.last_estimate = RateEstimate::NONE;
        self.interval_started_ms = None;
        self.frames_processed = 0;
        self.face_frames = 0;
    }
}

impl Default for VitalsMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl VitalsMonitor {
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            buffer: SignalBuffer::new(config.pulse.buffer_size),
            frame_rate: FrameRateTracker::new(config.pulse.initial_fps, config.pulse.fps_smoothing),
            periodicity: PeriodicityEstimator::from_config(&config.pulse),
            aggregator: SampleAggregator::with_config(config.aggregation.clone()),
            fatigue: FatigueEstimator::with_config(config.fatigue.clone()),
            last_estimate: RateEstimate::NONE,
            interval_started_ms: None,
            frames_processed: 0,
            face_frames: 0,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 处理一帧
    ///
    /// 帧率每帧都更新；未检测到人脸的帧不产生亮度样本和睁眼样本。
    pub fn process_frame(&mut self, input: FrameInput) -> FrameReport {
        let fps = self.frame_rate.tick(input.timestamp_ms);
        self.frames_processed += 1;
        if self.interval_started_ms.is_none() {
            self.interval_started_ms = Some(input.timestamp_ms);
        }

        let mut estimate = RateEstimate::NONE;
        let mut accepted = false;

        if input.face_detected {
            self.face_frames += 1;
            self.aggregator.mark_face_detected();

            if let Some(brightness) = input.brightness.filter(|b| b.is_finite()) {
                self.buffer.push(brightness);
                let window = self.buffer.window(self.buffer.capacity());
                estimate = self.periodicity.estimate(&window, fps);
                accepted = self.aggregator.observe(estimate.rate, estimate.confidence);
            }

            if let Some(ratio) = input.eye_ratio {
                self.fatigue.observe(ratio, input.timestamp_ms);
            }
        }

        self.last_estimate = estimate;
        let displayed_rate = self.aggregator.displayed_rate();

        FrameReport {
            estimate,
            accepted,
            fatigue: self.fatigue.reading(),
            has_displayed_rate: displayed_rate.is_some(),
            displayed_rate,
            fps,
        }
    }

    /// 结束当前区间并重新开始计时
    pub fn flush_at(&mut self, now_ms: f64) -> FlushReport {
        let outcome = self.aggregator.flush();
        self.interval_started_ms = Some(now_ms);
        FlushReport {
            displayed_rate: self.aggregator.displayed_rate(),
            resolved_rate: outcome.resolved_rate,
            resolution: outcome.resolution,
            stats: outcome.stats,
            flushed_at_ms: now_ms,
        }
    }

    pub fn interval_stats(&self) -> IntervalStats {
        self.aggregator.stats()
    }

    pub fn last_estimate(&self) -> RateEstimate {
        self.last_estimate
    }

    pub fn fatigue(&self) -> FatigueReading {
        self.fatigue.reading()
    }

    pub fn signal_len(&self) -> usize {
        self.buffer.len()
    }
}
