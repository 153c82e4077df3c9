//! 周期性（心率）估计模块
//!
//! 对最近的亮度样本去均值后，在合理的滞后范围内搜索归一化自相关的最大值：
//! - 最佳滞后换算为每分钟周期数：`rate = round(fps / lag * 60)`
//! - 置信度为该滞后处的归一化自相关，截断到 [0, 1]
//!
//! 置信度反映信号在该周期上的自相似程度，并不代表绝对精度。

use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::config::PulseConfig;

/// 单帧周期估计结果
#[wasm_bindgen]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateEstimate {
    /// 每分钟周期数，无读数时为 0
    pub rate: f64,
    /// 置信度 (0.0 - 1.0)
    pub confidence: f64,
}

impl RateEstimate {
    /// 数据不足或信号退化时的结果
    pub const NONE: Self = Self {
        rate: 0.0,
        confidence: 0.0,
    };

    pub fn is_reading(&self) -> bool {
        self.rate > 0.0
    }
}

/// 基于归一化自相关的周期估计器
///
/// 本身不保存样本，每次调用都从传入的窗口重新计算。
#[wasm_bindgen]
#[derive(Debug, Clone)]
pub struct PeriodicityEstimator {
    max_window: usize,
    min_samples: usize,
    search_max_hz: f64,
    search_min_hz: f64,
}

#[wasm_bindgen]
impl PeriodicityEstimator {
    /// # 参数
    /// - `max_window`: 参与计算的最多样本数，通常等于缓冲区容量
    /// - `min_samples`: 少于该数量时不做估计，推荐 64
    #[wasm_bindgen(constructor)]
    pub fn new(max_window: usize, min_samples: usize) -> Self {
        let defaults = PulseConfig::default();
        Self {
            max_window: max_window.max(2),
            min_samples: min_samples.max(2),
            search_max_hz: defaults.search_max_hz,
            search_min_hz: defaults.search_min_hz,
        }
    }

    /// 估计周期
    ///
    /// # 参数
    /// - `samples`: 按到达顺序排列的亮度样本，只使用最后 `max_window` 个
    /// - `fps`: 当前估计帧率
    pub fn estimate(&self, samples: &[f64], fps: f64) -> RateEstimate {
        let start = samples.len().saturating_sub(self.max_window);
        let window = &samples[start..];
        let n = window.len();

        if n < self.min_samples || !(fps.is_finite() && fps > 0.0) {
            return RateEstimate::NONE;
        }
        if is_flat(window) {
            return RateEstimate::NONE;
        }

        let mean = window.iter().sum::<f64>() / n as f64;
        let detrended: Vec<f64> = window.iter().map(|v| v - mean).collect();
        let variance: f64 = detrended.iter().map(|d| d * d).sum();
        if variance == 0.0 || !variance.is_finite() {
            return RateEstimate::NONE;
        }

        let Some((min_lag, max_lag)) = self.lag_range(fps, n) else {
            return RateEstimate::NONE;
        };

        let mut best_lag = min_lag;
        let mut max_corr = f64::NEG_INFINITY;
        for lag in min_lag..=max_lag {
            let corr = lagged_product(&detrended, lag) / variance;
            // 严格大于：相同相关值保留较小的滞后
            if corr > max_corr {
                max_corr = corr;
                best_lag = lag;
            }
        }

        RateEstimate {
            rate: (fps / best_lag as f64 * 60.0).round(),
            confidence: max_corr.clamp(0.0, 1.0),
        }
    }
}

impl PeriodicityEstimator {
    pub fn from_config(config: &PulseConfig) -> Self {
        Self {
            max_window: config.buffer_size.max(2),
            min_samples: config.min_samples.max(2),
            search_max_hz: config.search_max_hz,
            search_min_hz: config.search_min_hz,
        }
    }

    /// 滞后搜索范围 `[round(fps / max_hz), min(round(fps / min_hz), n - 1)]`
    fn lag_range(&self, fps: f64, n: usize) -> Option<(usize, usize)> {
        let min_lag = ((fps / self.search_max_hz).round() as usize).max(1);
        let max_lag = ((fps / self.search_min_hz).round() as usize).min(n - 1);
        (min_lag <= max_lag).then_some((min_lag, max_lag))
    }
}

fn is_flat(window: &[f64]) -> bool {
    window.windows(2).all(|pair| pair[0] == pair[1])
}

fn lagged_product(detrended: &[f64], lag: usize) -> f64 {
    detrended
        .iter()
        .zip(&detrended[lag..])
        .map(|(a, b)| a * b)
        .sum()
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use super::*;

    fn sinusoid(len: usize, period: f64, amplitude: f64) -> Vec<f64> {
        (0..len)
            .map(|i| 120.0 + amplitude * (2.0 * PI * i as f64 / period).sin())
            .collect()
    }

    /// 确定性的伪随机噪声，取值范围 [-1, 1)
    fn noise(len: usize, seed: u64) -> Vec<f64> {
        let mut state = seed;
        (0..len)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                ((state >> 11) as f64 / (1u64 << 53) as f64) * 2.0 - 1.0
            })
            .collect()
    }

    fn estimator() -> PeriodicityEstimator {
        PeriodicityEstimator::from_config(&PulseConfig::default())
    }

    #[test]
    fn short_window_has_no_confidence() {
        let samples = sinusoid(63, 24.0, 2.0);
        let est = estimator().estimate(&samples, 30.0);
        assert_eq!(est, RateEstimate::NONE);
    }

    #[test]
    fn constant_signal_has_no_confidence() {
        let samples = vec![0.1; 128];
        let est = estimator().estimate(&samples, 30.0);
        assert_eq!(est.confidence, 0.0);
        assert_eq!(est.rate, 0.0);
    }

    #[test]
    fn detects_sinusoid_rate_at_30_fps() {
        let samples = sinusoid(128, 24.0, 2.0);
        let est = estimator().estimate(&samples, 30.0);
        // 30 / 24 * 60 = 75，允许 ±1 个滞后步长
        assert!((72.0..=78.0).contains(&est.rate), "rate = {}", est.rate);
        assert!(est.confidence > 0.7, "confidence = {}", est.confidence);
    }

    #[test]
    fn detects_sinusoid_rate_at_60_fps() {
        let samples = sinusoid(128, 48.0, 2.0);
        let est = estimator().estimate(&samples, 60.0);
        assert!((74.0..=77.0).contains(&est.rate), "rate = {}", est.rate);
        assert!(est.confidence > 0.5, "confidence = {}", est.confidence);
    }

    #[test]
    fn only_last_window_is_used() {
        let mut samples = vec![0.0; 500];
        samples.extend(sinusoid(128, 24.0, 2.0));
        let tail_only = sinusoid(128, 24.0, 2.0);
        let est = estimator();
        assert_eq!(est.estimate(&samples, 30.0), est.estimate(&tail_only, 30.0));
    }

    #[test]
    fn noise_lowers_confidence() {
        let clean = sinusoid(128, 24.0, 2.0);
        let noisy: Vec<f64> = clean
            .iter()
            .zip(noise(128, 7))
            .map(|(s, n)| s + 3.0 * n)
            .collect();
        let est = estimator();
        let clean_conf = est.estimate(&clean, 30.0).confidence;
        let noisy_conf = est.estimate(&noisy, 30.0).confidence;
        assert!(clean_conf > noisy_conf);
    }

    #[test]
    fn confidence_rises_as_noise_shrinks() {
        let clean = sinusoid(128, 24.0, 2.0);
        let jitter = noise(128, 7);
        let est = estimator();
        let confidences: Vec<f64> = [4.0, 2.0, 1.0, 0.5, 0.25, 0.0]
            .iter()
            .map(|amp| {
                let samples: Vec<f64> = clean
                    .iter()
                    .zip(&jitter)
                    .map(|(s, n)| s + amp * n)
                    .collect();
                est.estimate(&samples, 30.0).confidence
            })
            .collect();
        for pair in confidences.windows(2) {
            assert!(pair[0] < pair[1], "confidences = {confidences:?}");
        }
    }

    #[test]
    fn noiseless_window_reaches_overlap_ceiling() {
        // 自相关按全窗口能量归一化，无噪声时上限为 (n - lag) / n
        let est = estimator();
        let whole_periods = est.estimate(&sinusoid(120, 24.0, 2.0), 30.0);
        assert_eq!(whole_periods.rate, 75.0);
        assert!((whole_periods.confidence - 96.0 / 120.0).abs() < 1e-9);

        let short_period = est.estimate(&sinusoid(128, 10.0, 2.0), 30.0);
        assert_eq!(short_period.rate, 180.0);
        assert!(short_period.confidence > 0.9, "confidence = {}", short_period.confidence);
    }

    #[test]
    fn invalid_fps_yields_no_reading() {
        let samples = sinusoid(128, 24.0, 2.0);
        let est = estimator();
        assert_eq!(est.estimate(&samples, 0.0), RateEstimate::NONE);
        assert_eq!(est.estimate(&samples, f64::NAN), RateEstimate::NONE);
    }

    #[test]
    fn lag_range_follows_search_band() {
        let est = estimator();
        assert_eq!(est.lag_range(30.0, 128), Some((8, 40)));
        // 最大滞后受窗口长度限制
        assert_eq!(est.lag_range(120.0, 128), Some((30, 127)));
        assert_eq!(est.lag_range(1.0, 128), Some((1, 1)));
    }
}
