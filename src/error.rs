// THEORY:
// The `error` module defines every failure the engine is willing to surface to a
// caller. The taxonomy is intentionally small: numeric and geometric problems inside
// a tick are resolved locally with safe defaults (clamping, auto-reset, degenerate
// zones), so only contract violations made at configuration or registration time
// reach the caller as an `Err`. Zone transitions are never errors; they travel
// through the change callbacks.

use crate::core_modules::active_zone::ZoneId;

/// Errors produced by the motion engine and its building blocks.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// A configuration value was non-finite or otherwise impossible to clamp.
    #[error("invalid configuration: {0}")]
    Configuration(String),
    /// A zone with this id is already registered.
    #[error("zone `{0}` is already registered")]
    DuplicateId(ZoneId),
    /// No zone with this id is registered.
    #[error("zone `{0}` is not registered")]
    NotFound(ZoneId),
    /// Two frames that must share a resolution and pixel format do not.
    #[error("frame geometry mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        /// `(width, height, channels)` of the reference.
        expected: (u32, u32, usize),
        /// `(width, height, channels)` of the offending frame.
        actual: (u32, u32, usize),
    },
    /// A raw buffer does not hold `width * height * channels` samples.
    #[error("frame buffer holds {actual} samples, expected {expected}")]
    InvalidFrame { expected: usize, actual: usize },
    /// The background task driving an engine stopped abnormally.
    #[error("engine task failed: {0}")]
    TaskFailed(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Clamps a normalized parameter into `[0, 1]`, rejecting NaN and infinities.
///
/// Out-of-range finite values are corrected and logged; they never propagate into
/// the per-pixel math.
pub fn clamp_unit(name: &str, value: f32) -> Result<f32> {
    if !value.is_finite() {
        return Err(EngineError::Configuration(format!(
            "{name} must be a finite number, got {value}"
        )));
    }
    let clamped = value.clamp(0.0, 1.0);
    if clamped != value {
        tracing::warn!(parameter = name, value, clamped, "clamping out-of-range parameter");
    }
    Ok(clamped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_range_values_pass_through() {
        assert_eq!(clamp_unit("threshold", 0.25), Ok(0.25));
        assert_eq!(clamp_unit("threshold", 0.0), Ok(0.0));
        assert_eq!(clamp_unit("threshold", 1.0), Ok(1.0));
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        assert_eq!(clamp_unit("feedback", 1.5), Ok(1.0));
        assert_eq!(clamp_unit("feedback", -0.2), Ok(0.0));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        assert!(matches!(
            clamp_unit("threshold", f32::NAN),
            Err(EngineError::Configuration(_))
        ));
        assert!(matches!(
            clamp_unit("threshold", f32::INFINITY),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn messages_name_the_zone() {
        let err = EngineError::DuplicateId(ZoneId::from("a"));
        assert_eq!(err.to_string(), "zone `a` is already registered");
        let err = EngineError::NotFound(ZoneId::from(7));
        assert_eq!(err.to_string(), "zone `7` is not registered");
    }
}
