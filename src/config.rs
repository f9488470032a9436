// THEORY:
// `EngineConfig` is the single bag of tunables a `MotionEngine` is built from. It is
// plain data: serializable, cloneable and cheap to keep around, so callers can load
// it from a session file, tweak it, and hand it to `MotionEngine::new`.
//
// Every normalized parameter goes through the same clamping rule as the engine's
// runtime setters: finite out-of-range values are pulled into [0, 1] with a warning,
// non-finite values are rejected before they can reach the per-pixel math.

use crate::error::{Result, clamp_unit};
use serde::{Deserialize, Serialize};

pub use crate::core_modules::background::BackgroundMode;
pub use crate::core_modules::frame::Mirror;

/// Configuration for a `MotionEngine`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Static snapshot or progressive running average.
    pub mode: BackgroundMode,
    /// Weight of the existing background in progressive mode. Closer to 1 adapts slower.
    pub feedback: f32,
    /// Per-pixel difference at or above which a pixel counts as moving.
    pub threshold: f32,
    /// Fill threshold for zones that do not carry their own override.
    pub default_fill_threshold: f32,
    /// Flip applied to every incoming frame before analysis.
    pub mirror: Mirror,
    /// When false the images are still maintained but zones are not evaluated.
    pub handle_active_zones: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: BackgroundMode::Progressive,
            feedback: 0.92,
            threshold: 0.1,
            default_fill_threshold: 0.02,
            mirror: Mirror::None,
            handle_active_zones: true,
        }
    }
}

impl EngineConfig {
    /// Returns a copy with every normalized parameter clamped into `[0, 1]`.
    pub fn validated(self) -> Result<Self> {
        Ok(Self {
            feedback: clamp_unit("feedback", self.feedback)?,
            threshold: clamp_unit("threshold", self.threshold)?,
            default_fill_threshold: clamp_unit("default_fill_threshold", self.default_fill_threshold)?,
            ..self
        })
    }
}
