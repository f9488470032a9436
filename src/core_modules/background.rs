// THEORY:
// The `BackgroundModel` is the engine's memory of what the scene looks like when
// nothing is moving. Everything that follows (difference, threshold, zones) is
// measured against the reference frame it maintains.
//
// Key architectural principles:
// 1.  **Two Modes**: in `Static` mode the first frame becomes a permanent snapshot
//     until `reset()`. In `Progressive` mode the reference is an exponentially
//     decayed running average, `bg = feedback * bg + (1 - feedback) * current`,
//     blended per pixel and per channel. Feedback close to 1 adapts slowly.
// 2.  **Self-Healing Geometry**: the reference always matches the geometry of the
//     frame it is compared against. When resolution or pixel format changes,
//     `update` discards the old reference and starts over instead of failing; the
//     strict `blend` primitive reports the mismatch for callers that want it.
// 3.  **Ownership**: the model owns its reference frame outright, so blending in
//     place never touches a caller's frame.

use crate::core_modules::frame::Frame;
use crate::error::{EngineError, Result, clamp_unit};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// How the reference image evolves over time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundMode {
    /// Capture once, never update until reset.
    Static,
    /// Exponentially decayed running average.
    #[default]
    Progressive,
}

/// Maintains the reference frame the current frame is compared against.
#[derive(Debug, Clone)]
pub struct BackgroundModel {
    mode: BackgroundMode,
    /// Weight of the existing reference in progressive mode, in `[0, 1]`.
    feedback: f32,
    reference: Option<Frame>,
}

impl BackgroundModel {
    pub fn new(mode: BackgroundMode, feedback: f32) -> Result<Self> {
        Ok(Self {
            mode,
            feedback: clamp_unit("feedback", feedback)?,
            reference: None,
        })
    }

    pub fn mode(&self) -> BackgroundMode {
        self.mode
    }

    /// Switches mode without discarding the current reference. Switching to
    /// `Static` freezes whatever the reference holds right now.
    pub fn set_mode(&mut self, mode: BackgroundMode) {
        self.mode = mode;
    }

    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    pub fn set_feedback(&mut self, feedback: f32) -> Result<()> {
        self.feedback = clamp_unit("feedback", feedback)?;
        Ok(())
    }

    /// The current reference frame, if one has been captured.
    pub fn reference(&self) -> Option<&Frame> {
        self.reference.as_ref()
    }

    /// Discards the reference; the next frame becomes the new one.
    pub fn reset(&mut self) {
        if self.reference.take().is_some() {
            info!(mode = ?self.mode, "background model reset");
        }
    }

    /// Feeds one frame into the model and returns the updated reference.
    ///
    /// A frame whose geometry differs from the reference triggers an automatic reset.
    pub fn update(&mut self, frame: &Frame) -> &Frame {
        let stale = self
            .reference
            .as_ref()
            .map(Frame::geometry)
            .filter(|expected| *expected != frame.geometry());
        if let Some(expected) = stale {
            warn!(
                ?expected,
                actual = ?frame.geometry(),
                "frame geometry changed, resetting background model"
            );
            self.reference = None;
        }
        if let Some(reference) = self.reference.as_mut() {
            if self.mode == BackgroundMode::Progressive {
                blend_samples(reference.samples_mut(), frame.samples(), self.feedback);
            }
        }
        self.reference.get_or_insert_with(|| frame.clone())
    }

    /// Strict variant of [`BackgroundModel::update`]: a geometry mismatch is
    /// returned as `DimensionMismatch` and leaves the model untouched.
    pub fn blend(&mut self, frame: &Frame) -> Result<()> {
        match self.reference.as_mut() {
            None => {
                self.reference = Some(frame.clone());
            }
            Some(reference) if reference.geometry() != frame.geometry() => {
                return Err(EngineError::DimensionMismatch {
                    expected: reference.geometry(),
                    actual: frame.geometry(),
                });
            }
            Some(reference) => {
                if self.mode == BackgroundMode::Progressive {
                    blend_samples(reference.samples_mut(), frame.samples(), self.feedback);
                }
            }
        }
        Ok(())
    }
}

fn blend_samples(reference: &mut [f32], current: &[f32], feedback: f32) {
    let gain = 1.0 - feedback;
    for (bg, cur) in reference.iter_mut().zip(current) {
        *bg = feedback * *bg + gain * *cur;
    }
}
