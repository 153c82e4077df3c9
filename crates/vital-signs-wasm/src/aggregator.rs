//! 区间聚合模块
//!
//! 每帧的周期估计噪声很大，因此在一个固定测量区间内收集 (rate, confidence)，
//! 区间结束时按置信度分层选出代表值：
//! 1. confidence ≥ HIGH (0.6)
//! 2. confidence ≥ MID (0.4)
//! 3. confidence ≥ LOW (0.2)
//! 4. 置信度最高的前 5 个样本
//! 5. 无样本：区间内检测到过人脸则使用默认值 60，否则不更新
//!
//! 显示值为选中样本 rate 的四舍五入平均值。每次 flush 后无条件清空区间样本。

use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::config::AggregationConfig;

/// 区间内保留的单个样本
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalSample {
    pub rate: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfidenceTier {
    High,
    Mid,
    Low,
}

/// 一次 flush 采用的决策路径
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "tier", rename_all = "camelCase")]
pub enum Resolution {
    Tier(ConfidenceTier),
    TopConfidence,
    DefaultRate,
    Unchanged,
}

/// 区间统计，各档互不重叠
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalStats {
    pub total: usize,
    pub high: usize,
    pub mid: usize,
    pub low: usize,
    pub below: usize,
    pub face_detected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlushOutcome {
    /// 本次解析出的显示值；`Unchanged` 时为 `None`
    pub resolved_rate: Option<u32>,
    pub resolution: Resolution,
    pub stats: IntervalStats,
}

/// 区间样本聚合器
///
/// 两个隐式状态：Collecting（区间内）与 Resolving（flush 时），flush 后立即回到 Collecting。
#[wasm_bindgen]
#[derive(Debug, Clone)]
pub struct SampleAggregator {
    config: AggregationConfig,
    samples: Vec<IntervalSample>,
    face_detected: bool,
    displayed_rate: Option<u32>,
}

#[wasm_bindgen]
impl SampleAggregator {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self::with_config(AggregationConfig::default())
    }

    /// 记录一帧的估计结果，仅接受落在可信心率范围内的样本
    ///
    /// # 返回
    /// 样本是否被接受
    pub fn observe(&mut self, rate: f64, confidence: f64) -> bool {
        if !rate.is_finite() || rate < self.config.min_rate || rate > self.config.max_rate {
            return false;
        }
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.samples.push(IntervalSample { rate, confidence });
        true
    }

    /// 标记本区间内检测到过人脸
    #[wasm_bindgen(js_name = "markFaceDetected")]
    pub fn mark_face_detected(&mut self) {
        self.face_detected = true;
    }

    /// 当前区间已接受的样本数
    #[wasm_bindgen(js_name = "sampleCount")]
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// 最近一次解析出的显示值，尚未解析时为 `undefined`
    #[wasm_bindgen(js_name = "displayedRate")]
    pub fn displayed_rate(&self) -> Option<u32> {
        self.displayed_rate
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.face_detected = false;
        self.displayed_rate = None;
    }
}

impl Default for SampleAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleAggregator {
    pub fn with_config(config: AggregationConfig) -> Self {
        Self {
            config,
            samples: Vec::new(),
            face_detected: false,
            displayed_rate: None,
        }
    }

    pub fn stats(&self) -> IntervalStats {
        let mut stats = IntervalStats {
            total: self.samples.len(),
            face_detected: self.face_detected,
            ..IntervalStats::default()
        };
        for sample in &self.samples {
            match self.tier_of(sample.confidence) {
                Some(ConfidenceTier::High) => stats.high += 1,
                Some(ConfidenceTier::Mid) => stats.mid += 1,
                Some(ConfidenceTier::Low) => stats.low += 1,
                None => stats.below += 1,
            }
        }
        stats
    }

    /// 结束当前区间，解析显示值并清空区间状态
    pub fn flush(&mut self) -> FlushOutcome {
        let stats = self.stats();
        let (resolved_rate, resolution) = self.resolve();

        if let Some(rate) = resolved_rate {
            self.displayed_rate = Some(rate);
        }
        self.samples.clear();
        self.face_detected = false;

        tracing::debug!(
            ?resolution,
            resolved_rate,
            total = stats.total,
            high = stats.high,
            "interval flushed"
        );

        FlushOutcome {
            resolved_rate,
            resolution,
            stats,
        }
    }

    fn resolve(&self) -> (Option<u32>, Resolution) {
        let tiers = [
            (ConfidenceTier::High, self.config.high_confidence),
            (ConfidenceTier::Mid, self.config.mid_confidence),
            (ConfidenceTier::Low, self.config.low_confidence),
        ];
        for (tier, threshold) in tiers {
            let selected: Vec<f64> = self
                .samples
                .iter()
                .filter(|s| s.confidence >= threshold)
                .map(|s| s.rate)
                .collect();
            if let Some(rate) = mean_rate(&selected) {
                return (Some(rate), Resolution::Tier(tier));
            }
        }

        if !self.samples.is_empty() {
            let mut ranked = self.samples.clone();
            ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
            let top: Vec<f64> = ranked
                .iter()
                .take(self.config.top_fallback_count)
                .map(|s| s.rate)
                .collect();
            return (mean_rate(&top), Resolution::TopConfidence);
        }

        if self.face_detected {
            return (Some(self.config.default_rate), Resolution::DefaultRate);
        }
        (None, Resolution::Unchanged)
    }

    fn tier_of(&self, confidence: f64) -> Option<ConfidenceTier> {
        if confidence >= self.config.high_confidence {
            Some(ConfidenceTier::High)
        } else if confidence >= self.config.mid_confidence {
            Some(ConfidenceTier::Mid)
        } else if confidence >= self.config.low_confidence {
            Some(ConfidenceTier::Low)
        } else {
            None
        }
    }
}

fn mean_rate(rates: &[f64]) -> Option<u32> {
    if rates.is_empty() {
        return None;
    }
    let mean = rates.iter().sum::<f64>() / rates.len() as f64;
    Some(mean.round() as u32)
}
