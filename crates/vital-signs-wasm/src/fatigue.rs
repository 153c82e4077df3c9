//! 眼部疲劳评分模块
//!
//! 两个阶段，每个会话只单向切换一次：
//! - 校准：前 90 个睁眼比样本进入校准序列，期间输出固定占位评分 (20)。
//!   样本数达到 90 时降序排序，取 `floor(0.2 * n)` 位置的值作为基线，
//!   即一个对校准期间短暂眨眼不敏感的"适度睁眼"参考值。
//! - 评分：每个样本进入 60 秒 PERCLOS 窗口，闭眼阈值为 `基线 × 0.2`，
//!   `fatigue = min(100, round(20 + perclos * 200))`。
//!
//! 疲劳等级（仅用于展示）：
//! - Low (< 40)
//! - Elevated (40 - 60)
//! - High (60 - 80)
//! - Severe (≥ 80)

use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::config::FatigueConfig;
use crate::perclos::PerclosWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FatigueLevel {
    Low,
    Elevated,
    High,
    Severe,
}

impl FatigueLevel {
    pub fn from_score(score: u32) -> Self {
        match score {
            s if s < 40 => Self::Low,
            s if s < 60 => Self::Elevated,
            s if s < 80 => Self::High,
            _ => Self::Severe,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Elevated => "elevated",
            Self::High => "high",
            Self::Severe => "severe",
        }
    }
}

/// 单次观测后的疲劳读数
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FatigueReading {
    /// 疲劳评分 (0-100)
    pub score: u32,
    pub level: FatigueLevel,
    /// PERCLOS (0.0-1.0)，校准期间为 0
    pub perclos: f64,
    /// 是否已完成校准；未完成时 `score` 为占位值
    pub calibrated: bool,
    /// 校准进度 (0.0-1.0)
    pub calibration_progress: f64,
}

/// 校准 + PERCLOS 疲劳估计器
#[wasm_bindgen]
#[derive(Debug, Clone)]
pub struct FatigueEstimator {
    config: FatigueConfig,
    calibration: Vec<f64>,
    baseline: Option<f64>,
    window: PerclosWindow,
    last: FatigueReading,
}

#[wasm_bindgen]
impl FatigueEstimator {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self::with_config(FatigueConfig::default())
    }

    /// 输入当前帧的睁眼比和时间戳（毫秒），返回疲劳评分
    pub fn update(&mut self, ratio: f64, timestamp: f64) -> u32 {
        self.observe(ratio, timestamp).score
    }

    /// 校准得到的基线，校准完成前为 `undefined`
    pub fn baseline(&self) -> Option<f64> {
        self.baseline
    }

    #[wasm_bindgen(js_name = "isCalibrated")]
    pub fn is_calibrated(&self) -> bool {
        self.baseline.is_some()
    }

    #[wasm_bindgen(js_name = "calibrationProgress")]
    pub fn calibration_progress(&self) -> f64 {
        if self.baseline.is_some() {
            return 1.0;
        }
        (self.calibration.len() as f64 / self.config.calibration_samples as f64).min(1.0)
    }

    /// 最近一次计算的 PERCLOS
    #[wasm_bindgen(js_name = "currentPerclos")]
    pub fn current_perclos(&self) -> f64 {
        self.last.perclos
    }

    /// 最近一次的疲劳评分
    #[wasm_bindgen(js_name = "currentScore")]
    pub fn current_score(&self) -> u32 {
        self.last.score
    }

    #[wasm_bindgen(js_name = "getLevel")]
    pub fn get_level(&self) -> String {
        self.last.level.as_str().to_string()
    }

    /// PERCLOS 窗口内的样本数
    #[wasm_bindgen(js_name = "historyLen")]
    pub fn history_len(&self) -> usize {
        self.window.len()
    }

    #[wasm_bindgen(js_name = "isWarmedUp")]
    pub fn is_warmed_up(&self) -> bool {
        self.window.is_warmed_up()
    }

    /// 重置为未校准状态（开始新会话）
    pub fn reset(&mut self) {
        self.calibration.clear();
        self.baseline = None;
        self.window.reset();
        self.last = placeholder_reading(&self.config, 0.0);
    }
}

impl Default for FatigueEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl FatigueEstimator {
    pub fn with_config(config: FatigueConfig) -> Self {
        let window = PerclosWindow::with_window_ms(config.window_ms);
        let last = placeholder_reading(&config, 0.0);
        Self {
            calibration: Vec::new(),
            config,
            baseline: None,
            window,
            last,
        }
    }

    /// 最近一次读数，尚无观测时为占位读数
    pub fn reading(&self) -> FatigueReading {
        self.last
    }

    pub fn window(&self) -> &PerclosWindow {
        &self.window
    }

    /// 处理一个睁眼比样本
    ///
    /// 非有限值视为无效数据，直接返回上一次读数；负值按 0 处理。
    pub fn observe(&mut self, ratio: f64, timestamp: f64) -> FatigueReading {
        if !ratio.is_finite() || !timestamp.is_finite() {
            return self.last;
        }
        let ratio = ratio.max(0.0);

        let reading = match self.baseline {
            None => self.calibrate(ratio),
            Some(baseline) => {
                self.window.push(ratio, timestamp);
                self.active_reading(baseline)
            }
        };
        self.last = reading;
        reading
    }

    fn calibrate(&mut self, ratio: f64) -> FatigueReading {
        self.calibration.push(ratio);
        let target = self.config.calibration_samples;
        if self.calibration.len() < target {
            return placeholder_reading(&self.config, self.calibration_progress());
        }

        let baseline = percentile_descending(&self.calibration, self.config.calibration_percentile);
        self.baseline = Some(baseline);
        self.calibration = Vec::new();
        tracing::debug!(baseline, samples = target, "eye-openness calibration complete");

        self.active_reading(baseline)
    }

    fn active_reading(&self, baseline: f64) -> FatigueReading {
        let closed_threshold = baseline * self.config.closed_eye_multiplier;
        let perclos = self.window.perclos(closed_threshold);
        let score = score_for_perclos(&self.config, perclos);
        FatigueReading {
            score,
            level: FatigueLevel::from_score(score),
            perclos,
            calibrated: true,
            calibration_progress: 1.0,
        }
    }
}

/// PERCLOS → 评分：0 对应下限，`saturation_perclos` 及以上对应上限
pub fn score_for_perclos(config: &FatigueConfig, perclos: f64) -> u32 {
    let floor = config.score_floor as f64;
    let ceiling = config.score_ceiling as f64;
    let gain = (ceiling - floor) / config.saturation_perclos;
    (floor + perclos.max(0.0) * gain).round().min(ceiling) as u32
}

/// 降序排序后取 `floor(percentile * n)` 位置的值
fn percentile_descending(values: &[f64], percentile: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    let idx = ((percentile * sorted.len() as f64).floor() as usize).min(sorted.len() - 1);
    sorted[idx]
}

fn placeholder_reading(config: &FatigueConfig, progress: f64) -> FatigueReading {
    FatigueReading {
        score: config.placeholder_score,
        level: FatigueLevel::from_score(config.placeholder_score),
        perclos: 0.0,
        calibrated: false,
        calibration_progress: progress,
    }
}
