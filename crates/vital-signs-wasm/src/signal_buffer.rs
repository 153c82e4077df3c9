//! 亮度信号环形缓冲区
//!
//! 只负责存储与淘汰：容量满时丢弃最旧样本，不包含任何估计策略。

use std::collections::VecDeque;
use wasm_bindgen::prelude::*;

/// 固定容量的亮度样本滑动窗口
#[wasm_bindgen]
#[derive(Debug, Clone)]
pub struct SignalBuffer {
    samples: VecDeque<f64>,
    capacity: usize,
}

#[wasm_bindgen]
impl SignalBuffer {
    /// 创建缓冲区，容量为 0 时按 1 处理
    #[wasm_bindgen(constructor)]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// 追加一个样本，超出容量时淘汰最旧样本
    pub fn push(&mut self, value: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    /// 返回最近 `n` 个样本（不足时返回全部），按到达顺序排列
    pub fn window(&self, n: usize) -> Vec<f64> {
        let skip = self.samples.len().saturating_sub(n);
        self.samples.iter().skip(skip).copied().collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[wasm_bindgen(js_name = "isEmpty")]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
