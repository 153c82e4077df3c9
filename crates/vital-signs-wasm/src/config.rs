//! 引擎配置
//!
//! 所有可调常量集中在这里，默认值即推荐值。

use serde::{Deserialize, Serialize};

/// 校准样本数上限（30 fps 下约 5.5 分钟）
pub const MAX_CALIBRATION_SAMPLES: usize = 10_000;

/// 心率信号（亮度周期性）相关配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PulseConfig {
    /// 亮度缓冲区容量（样本数）
    pub buffer_size: usize,
    /// 进行自相关估计所需的最少样本数
    pub min_samples: usize,
    /// 帧率初始估计值
    pub initial_fps: f64,
    /// 帧率 EMA 平滑系数
    pub fps_smoothing: f64,
    /// 滞后搜索上限频率（Hz），决定最小滞后
    pub search_max_hz: f64,
    /// 滞后搜索下限频率（Hz），决定最大滞后
    pub search_min_hz: f64,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            buffer_size: 128,
            min_samples: 64,
            initial_fps: 30.0,
            fps_smoothing: 0.1,
            search_max_hz: 4.0,
            search_min_hz: 0.75,
        }
    }
}

/// 区间聚合配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationConfig {
    /// 测量区间长度（毫秒）
    pub interval_ms: u64,
    /// 可信心率下限（次/分钟）
    pub min_rate: f64,
    /// 可信心率上限（次/分钟）
    pub max_rate: f64,
    pub high_confidence: f64,
    pub mid_confidence: f64,
    pub low_confidence: f64,
    /// 无分层样本时取置信度最高的前 N 个
    pub top_fallback_count: usize,
    /// 区间内无样本但检测到人脸时的默认心率
    pub default_rate: u32,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            interval_ms: 10_000,
            min_rate: 45.0,
            max_rate: 180.0,
            high_confidence: 0.6,
            mid_confidence: 0.4,
            low_confidence: 0.2,
            top_fallback_count: 5,
            default_rate: 60,
        }
    }
}

/// 疲劳（PERCLOS）配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FatigueConfig {
    /// 校准阶段样本数
    pub calibration_samples: usize,
    /// 基线取降序排列后的该分位位置
    pub calibration_percentile: f64,
    /// PERCLOS 滑动窗口（毫秒）
    pub window_ms: f64,
    /// 闭眼阈值 = 基线 × 该系数
    pub closed_eye_multiplier: f64,
    /// 校准期间的占位评分
    pub placeholder_score: u32,
    /// PERCLOS 为 0 时的评分
    pub score_floor: u32,
    pub score_ceiling: u32,
    /// 达到上限评分时的 PERCLOS
    pub saturation_perclos: f64,
}

impl Default for FatigueConfig {
    fn default() -> Self {
        Self {
            calibration_samples: 90,
            calibration_percentile: 0.2,
            window_ms: 60_000.0,
            closed_eye_multiplier: 0.2,
            placeholder_score: 20,
            score_floor: 20,
            score_ceiling: 100,
            saturation_perclos: 0.4,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default)]
    pub pulse: PulseConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub fatigue: FatigueConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), String> {
        let pulse = &self.pulse;
        if pulse.buffer_size < 2 {
            return Err("pulse.buffer_size must be >= 2".to_string());
        }
        if pulse.min_samples < 2 || pulse.min_samples > pulse.buffer_size {
            return Err("pulse.min_samples must be in [2, buffer_size]".to_string());
        }
        if !(pulse.initial_fps.is_finite() && pulse.initial_fps > 0.0) {
            return Err("pulse.initial_fps must be > 0".to_string());
        }
        if !(pulse.fps_smoothing > 0.0 && pulse.fps_smoothing <= 1.0) {
            return Err("pulse.fps_smoothing must be in (0,1]".to_string());
        }
        if !(pulse.search_min_hz > 0.0 && pulse.search_min_hz < pulse.search_max_hz) {
            return Err("pulse.search_min_hz must be > 0 and < search_max_hz".to_string());
        }

        let agg = &self.aggregation;
        if agg.interval_ms == 0 {
            return Err("aggregation.interval_ms must be > 0".to_string());
        }
        if !(agg.min_rate >= 0.0 && agg.min_rate <= agg.max_rate) {
            return Err("aggregation.min_rate must be in [0, max_rate]".to_string());
        }
        if !(0.0..=1.0).contains(&agg.low_confidence)
            || !(0.0..=1.0).contains(&agg.mid_confidence)
            || !(0.0..=1.0).contains(&agg.high_confidence)
        {
            return Err("aggregation confidence tiers must be in [0,1]".to_string());
        }
        if !(agg.low_confidence <= agg.mid_confidence && agg.mid_confidence <= agg.high_confidence)
        {
            return Err("aggregation confidence tiers must satisfy low <= mid <= high".to_string());
        }
        if agg.top_fallback_count == 0 {
            return Err("aggregation.top_fallback_count must be >= 1".to_string());
        }

        let fatigue = &self.fatigue;
        if !(1..=MAX_CALIBRATION_SAMPLES).contains(&fatigue.calibration_samples) {
            return Err(format!(
                "fatigue.calibration_samples must be in [1, {MAX_CALIBRATION_SAMPLES}]"
            ));
        }
        if !(0.0..1.0).contains(&fatigue.calibration_percentile) {
            return Err("fatigue.calibration_percentile must be in [0,1)".to_string());
        }
        if !(fatigue.window_ms > 0.0) {
            return Err("fatigue.window_ms must be > 0".to_string());
        }
        if !(fatigue.closed_eye_multiplier > 0.0) {
            return Err("fatigue.closed_eye_multiplier must be > 0".to_string());
        }
        if fatigue.score_floor > fatigue.score_ceiling || fatigue.score_ceiling > 100 {
            return Err("fatigue scores must satisfy floor <= ceiling <= 100".to_string());
        }
        if !(fatigue.saturation_perclos > 0.0 && fatigue.saturation_perclos <= 1.0) {
            return Err("fatigue.saturation_perclos must be in (0,1]".to_string());
        }
        Ok(())
    }
}
