//! EAR (Eye Aspect Ratio) 睁眼比计算
//!
//! 由眼部 6 个归一化关键点计算睁眼比，作为疲劳估计器的输入。
//! 公式: EAR = (|p2-p6| + |p3-p5|) / (2 * |p1-p4|)
//! - p1, p4: 眼角点（水平方向）
//! - p2, p3: 上眼睑点
//! - p6, p5: 对应的下眼睑点

use wasm_bindgen::prelude::*;

/// 水平距离低于该值时认为关键点退化
const MIN_HORIZONTAL: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// 单眼 6 点 EAR
///
/// 输入: 12 个浮点数 (6 个点 × 2 个坐标)，顺序为 p1(x,y) .. p6(x,y)。
/// 点数不足、坐标非有限或水平距离退化时返回 `None`。
pub fn eye_aspect_ratio(landmarks: &[f64]) -> Option<f64> {
    if landmarks.len() < 12 || landmarks[..12].iter().any(|v| !v.is_finite()) {
        return None;
    }
    let p: Vec<Point> = landmarks[..12]
        .chunks_exact(2)
        .map(|xy| Point::new(xy[0], xy[1]))
        .collect();

    let horizontal = p[0].distance(&p[3]);
    if horizontal < MIN_HORIZONTAL {
        return None;
    }
    let vertical1 = p[1].distance(&p[5]);
    let vertical2 = p[2].distance(&p[4]);
    Some((vertical1 + vertical2) / (2.0 * horizontal))
}

/// 双眼 EAR：取可用眼睛的平均值，两眼都不可用时返回 `None`
pub fn binocular_eye_aspect_ratio(left: &[f64], right: &[f64]) -> Option<f64> {
    match (eye_aspect_ratio(left), eye_aspect_ratio(right)) {
        (Some(l), Some(r)) => Some((l + r) / 2.0),
        (Some(one), None) | (None, Some(one)) => Some(one),
        (None, None) => None,
    }
}

/// JS 侧入口：无法计算时返回 `undefined`
#[wasm_bindgen(js_name = "eyeAspectRatio")]
pub fn eye_aspect_ratio_js(left: &[f64], right: &[f64]) -> Option<f64> {
    binocular_eye_aspect_ratio(left, right)
}
