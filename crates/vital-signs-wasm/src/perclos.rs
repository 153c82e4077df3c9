//! PERCLOS (Percentage of Eye Closure) 计算模块
//!
//! PERCLOS 表示一段时间窗口内眼睛闭合的占比。
//! 使用按时间戳淘汰的滑动窗口（默认 60 秒），样本的睁眼比低于阈值时视为闭眼，
//! PERCLOS = 窗口内闭眼样本数 / 窗口内样本数。

use std::collections::VecDeque;
use wasm_bindgen::prelude::*;

/// 带时间戳的睁眼比样本
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeSample {
    /// 睁眼比（EAR 或同类指标）
    pub ratio: f64,
    /// 时间戳（毫秒）
    pub time: f64,
}

/// PERCLOS 滑动窗口
///
/// 窗口内只保留时间戳不早于 `最新时间戳 - window_ms` 的样本，淘汰按时间而非数量。
#[wasm_bindgen]
#[derive(Debug, Clone)]
pub struct PerclosWindow {
    window_ms: f64,
    samples: VecDeque<EyeSample>,
}

#[wasm_bindgen]
impl PerclosWindow {
    /// # 参数
    /// - `window_seconds`: 滑动窗口大小（秒），推荐 60
    #[wasm_bindgen(constructor)]
    pub fn new(window_seconds: f64) -> Self {
        Self::with_window_ms(window_seconds * 1000.0)
    }

    /// 追加样本并淘汰窗口外的旧样本
    ///
    /// 时间戳早于最新样本时视为时钟重启，先清空窗口。
    pub fn push(&mut self, ratio: f64, timestamp: f64) {
        if let Some(last) = self.samples.back().copied().filter(|last| timestamp < last.time) {
            tracing::debug!(timestamp, previous = last.time, "eye sample clock restarted");
            self.samples.clear();
        }
        self.samples.push_back(EyeSample {
            ratio,
            time: timestamp,
        });

        let cutoff = timestamp - self.window_ms;
        while let Some(front) = self.samples.front() {
            if front.time < cutoff {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// 计算闭眼占比，窗口为空时返回 0
    pub fn perclos(&self, closed_threshold: f64) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let closed = self
            .samples
            .iter()
            .filter(|s| s.ratio < closed_threshold)
            .count();
        closed as f64 / self.samples.len() as f64
    }

    /// 窗口内样本数量
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[wasm_bindgen(js_name = "isEmpty")]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// 判断窗口是否已有足够数据（至少覆盖一半窗口时间）
    #[wasm_bindgen(js_name = "isWarmedUp")]
    pub fn is_warmed_up(&self) -> bool {
        match (self.samples.front(), self.samples.back()) {
            (Some(first), Some(last)) if self.samples.len() >= 2 => {
                (last.time - first.time) >= self.window_ms * 0.5
            }
            _ => false,
        }
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }
}

impl PerclosWindow {
    pub fn with_window_ms(window_ms: f64) -> Self {
        Self {
            window_ms,
            samples: VecDeque::with_capacity(240),
        }
    }

    /// 最早保留的样本时间戳
    pub fn oldest_time(&self) -> Option<f64> {
        self.samples.front().map(|s| s.time)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EyeSample> {
        self.samples.iter()
    }
}
