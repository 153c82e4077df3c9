/// 帧输入验证
/// 引擎本身会忽略非有限值，这里在 HTTP 边界直接拒绝，让客户端尽早发现问题。
use vital_signs_wasm::FrameInput;

/// 验证单帧：时间戳有限且非负；亮度、睁眼比若提供必须是有限值，睁眼比不能为负
pub fn validate_frame(frame: &FrameInput) -> Result<(), &'static str> {
    if !frame.timestamp_ms.is_finite() || frame.timestamp_ms < 0.0 {
        return Err("timestampMs 必须是非负有限数");
    }
    if let Some(brightness) = frame.brightness {
        if !brightness.is_finite() {
            return Err("brightness 必须是有限数");
        }
    }
    if let Some(ratio) = frame.eye_ratio {
        if !ratio.is_finite() || ratio < 0.0 {
            return Err("eyeRatio 必须是非负有限数");
        }
    }
    Ok(())
}

/// 验证批量帧：数量在 1..=max_frames 之间，逐帧验证，错误信息带上下标
pub fn validate_batch(frames: &[FrameInput], max_frames: usize) -> Result<(), String> {
    if frames.is_empty() {
        return Err("frames 不能为空".to_string());
    }
    if frames.len() > max_frames {
        return Err(format!("单次最多提交 {max_frames} 帧"));
    }
    for (index, frame) in frames.iter().enumerate() {
        validate_frame(frame).map_err(|e| format!("frames[{index}]: {e}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(timestamp_ms: f64) -> FrameInput {
        FrameInput {
            timestamp_ms,
            face_detected: true,
            brightness: Some(110.0),
            eye_ratio: Some(0.28),
        }
    }

    #[test]
    fn accepts_regular_frame() {
        assert!(validate_frame(&frame(33.3)).is_ok());
        assert!(validate_frame(&FrameInput {
            brightness: None,
            eye_ratio: None,
            ..frame(0.0)
        })
        .is_ok());
    }

    #[test]
    fn rejects_bad_timestamp() {
        assert!(validate_frame(&frame(-1.0)).is_err());
        assert!(validate_frame(&frame(f64::NAN)).is_err());
        assert!(validate_frame(&frame(f64::INFINITY)).is_err());
    }

    #[test]
    fn rejects_non_finite_signals() {
        let bad_brightness = FrameInput {
            brightness: Some(f64::NAN),
            ..frame(0.0)
        };
        assert!(validate_frame(&bad_brightness).is_err());

        let bad_ratio = FrameInput {
            eye_ratio: Some(-0.1),
            ..frame(0.0)
        };
        assert!(validate_frame(&bad_ratio).is_err());
    }

    #[test]
    fn batch_bounds() {
        assert!(validate_batch(&[], 4).is_err());
        assert!(validate_batch(&[frame(0.0); 5], 4).is_err());
        assert!(validate_batch(&[frame(0.0); 4], 4).is_ok());
    }

    #[test]
    fn batch_error_names_index() {
        let frames = [frame(0.0), frame(33.0), frame(-5.0)];
        let err = validate_batch(&frames, 16).unwrap_err();
        assert!(err.starts_with("frames[2]"), "{err}");
    }
}
