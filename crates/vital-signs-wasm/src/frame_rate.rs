//! 帧率估计
//!
//! 对帧间隔做指数移动平均：`fps = fps * (1 - α) + (1000 / Δms) * α`。

use wasm_bindgen::prelude::*;

#[wasm_bindgen]
#[derive(Debug, Clone)]
pub struct FrameRateTracker {
    fps: f64,
    initial_fps: f64,
    smoothing: f64,
    last_timestamp: Option<f64>,
}

#[wasm_bindgen]
impl FrameRateTracker {
    /// # 参数
    /// - `initial_fps`: 首帧之前使用的帧率，推荐 30
    /// - `smoothing`: EMA 系数，推荐 0.1
    #[wasm_bindgen(constructor)]
    pub fn new(initial_fps: f64, smoothing: f64) -> Self {
        Self {
            fps: initial_fps,
            initial_fps,
            smoothing: smoothing.clamp(0.0, 1.0),
            last_timestamp: None,
        }
    }

    /// 记录一帧的时间戳（毫秒），返回更新后的帧率
    ///
    /// 首帧只记录时间戳；时间未前进的帧不参与平滑。
    /// 时间戳倒退视为时钟重启：保留当前帧率，以新时间戳为基准继续平滑。
    pub fn tick(&mut self, timestamp_ms: f64) -> f64 {
        if !timestamp_ms.is_finite() {
            return self.fps;
        }
        match self.last_timestamp {
            Some(last) if timestamp_ms > last => {
                let delta_ms = timestamp_ms - last;
                self.fps = self.fps * (1.0 - self.smoothing) + (1000.0 / delta_ms) * self.smoothing;
                self.last_timestamp = Some(timestamp_ms);
            }
            Some(last) if timestamp_ms == last => {}
            _ => self.last_timestamp = Some(timestamp_ms),
        }
        self.fps
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn reset(&mut self) {
        self.fps = self.initial_fps;
        self.last_timestamp = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_keeps_initial_estimate() {
        let mut tracker = FrameRateTracker::new(30.0, 0.1);
        assert_eq!(tracker.tick(1_000.0), 30.0);
    }

    #[test]
    fn applies_exponential_smoothing() {
        let mut tracker = FrameRateTracker::new(30.0, 0.1);
        tracker.tick(0.0);
        let fps = tracker.tick(20.0);
        // 30 * 0.9 + 50 * 0.1
        assert!((fps - 32.0).abs() < 1e-9);
    }

    #[test]
    fn converges_to_steady_cadence() {
        let mut tracker = FrameRateTracker::new(30.0, 0.1);
        let mut ts = 0.0;
        for _ in 0..300 {
            tracker.tick(ts);
            ts += 1000.0 / 60.0;
        }
        assert!((tracker.fps() - 60.0).abs() < 0.01);
    }

    #[test]
    fn repeated_timestamp_is_ignored() {
        let mut tracker = FrameRateTracker::new(30.0, 0.1);
        tracker.tick(100.0);
        assert_eq!(tracker.tick(100.0), 30.0);
        let fps = tracker.tick(120.0);
        assert!((fps - (30.0 * 0.9 + 50.0 * 0.1)).abs() < 1e-9);
    }

    #[test]
    fn clock_restart_reanchors_without_freezing() {
        let mut tracker = FrameRateTracker::new(30.0, 0.1);
        tracker.tick(500_000.0);
        // 倒退的帧只更新基准
        assert_eq!(tracker.tick(50.0), 30.0);
        let fps = tracker.tick(150.0);
        assert!((fps - (30.0 * 0.9 + 10.0 * 0.1)).abs() < 1e-9);

        let mut ts = 150.0;
        for _ in 0..300 {
            ts += 1000.0 / 60.0;
            tracker.tick(ts);
        }
        assert!((tracker.fps() - 60.0).abs() < 0.01);
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut tracker = FrameRateTracker::new(30.0, 0.1);
        tracker.tick(0.0);
        tracker.tick(10.0);
        tracker.reset();
        assert_eq!(tracker.fps(), 30.0);
        assert_eq!(tracker.tick(500.0), 30.0);
    }
}
