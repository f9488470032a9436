// THEORY:
// The `pipeline` module is the top-level API of the engine. `MotionEngine` is an
// explicit object built from an `EngineConfig`; there is no process-wide instance.
// Every call to `tick` runs one full, synchronous pass over a single frame:
//
//   mirror -> BackgroundModel::update -> difference -> threshold -> zone evaluation
//
// and returns a `TickReport` listing the zones that changed state during that tick.
// The same transitions are delivered, in the same order, to the zones' change
// handlers while the tick is running.
//
// Key architectural principles:
// 1.  **One Owner**: the engine owns the background model, the zone registry and the
//     latest diagnostic images. Nothing is shared, so a tick can never observe a
//     half-applied change.
// 2.  **Recoverable Geometry**: a frame with a new resolution or pixel format resets
//     the background model instead of failing the tick.
// 3.  **Read-Only Diagnostics**: the current, background, difference and threshold
//     images of the last tick stay queryable until the next tick replaces them.

use crate::config::EngineConfig;
use crate::core_modules::active_zone::{ActiveZone, ChangeStamp, ZoneEdits, ZoneId, ZoneSnapshot};
use crate::core_modules::background::{BackgroundMode, BackgroundModel};
use crate::core_modules::difference::{DifferenceFrame, compute_difference_into};
use crate::core_modules::frame::{Frame, Mirror};
use crate::core_modules::geometry::NormRect;
use crate::core_modules::threshold::{ThresholdFrame, classify};
use crate::core_modules::zone_evaluator::ActiveZoneEvaluator;
use crate::core_modules::zone_registry::ZoneRegistry;
use crate::error::{Result, clamp_unit};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{info, trace};

/// The outcome of a single tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    /// Zero-based index of the frame this report belongs to.
    pub frame: u64,
    /// Time since the engine was created, or the time supplied to `tick_at`.
    pub elapsed: Duration,
    /// Zones that changed state during this tick, in registration order.
    pub transitions: Vec<ZoneSnapshot>,
}

impl TickReport {
    pub fn has_transitions(&self) -> bool {
        !self.transitions.is_empty()
    }
}

/// The motion engine: one instance per video session.
#[derive(Debug)]
pub struct MotionEngine {
    background: BackgroundModel,
    registry: ZoneRegistry,
    evaluator: ActiveZoneEvaluator,
    threshold: f32,
    mirror: Mirror,
    handle_active_zones: bool,
    current: Option<Frame>,
    difference: DifferenceFrame,
    mask: ThresholdFrame,
    frame_count: u64,
    started: Instant,
}

impl MotionEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let config = config.validated()?;
        info!(?config, "motion engine created");
        Ok(Self {
            background: BackgroundModel::new(config.mode, config.feedback)?,
            registry: ZoneRegistry::new(config.default_fill_threshold)?,
            evaluator: ActiveZoneEvaluator::new(),
            threshold: config.threshold,
            mirror: config.mirror,
            handle_active_zones: config.handle_active_zones,
            current: None,
            difference: DifferenceFrame::default(),
            mask: ThresholdFrame::default(),
            frame_count: 0,
            started: Instant::now(),
        })
    }

    /// Runs one pass over `frame`, stamping transitions with the time since creation.
    pub fn tick(&mut self, frame: Frame) -> Result<TickReport> {
        let elapsed = self.started.elapsed();
        self.tick_at(frame, elapsed)
    }

    /// Runs one pass over `frame`, stamping transitions with a caller-supplied time.
    ///
    /// Useful when frames carry their own capture timestamps, and in replays.
    pub fn tick_at(&mut self, frame: Frame, elapsed: Duration) -> Result<TickReport> {
        let frame = frame.into_mirrored(self.mirror);

        let background = self.background.update(&frame);
        compute_difference_into(&frame, background, &mut self.difference)?;
        self.mask = classify(&self.difference, self.threshold)?;

        let stamp = ChangeStamp {
            frame: self.frame_count,
            elapsed,
        };
        let transitions = if self.handle_active_zones {
            self.evaluator.evaluate(&mut self.registry, &self.mask, stamp)
        } else {
            Vec::new()
        };

        trace!(
            frame = stamp.frame,
            moving = self.mask.moving_count(),
            transitions = transitions.len(),
            "tick"
        );
        self.current = Some(frame);
        self.frame_count += 1;
        Ok(TickReport {
            frame: stamp.frame,
            elapsed,
            transitions,
        })
    }

    /// A configuration equivalent to the engine's current settings.
    pub fn config(&self) -> EngineConfig {
        EngineConfig {
            mode: self.background.mode(),
            feedback: self.background.feedback(),
            threshold: self.threshold,
            default_fill_threshold: self.registry.global_fill_threshold(),
            mirror: self.mirror,
            handle_active_zones: self.handle_active_zones,
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    // Zones

    pub fn register<F>(
        &mut self,
        id: impl Into<ZoneId>,
        rect: NormRect,
        fill_threshold: Option<f32>,
        on_change: F,
    ) -> Result<&ActiveZone>
    where
        F: FnMut(&ZoneSnapshot, &mut ZoneEdits) + Send + 'static,
    {
        self.registry.register(id, rect, fill_threshold, on_change)
    }

    pub fn register_silent(
        &mut self,
        id: impl Into<ZoneId>,
        rect: NormRect,
        fill_threshold: Option<f32>,
    ) -> Result<&ActiveZone> {
        self.registry.register_silent(id, rect, fill_threshold)
    }

    pub fn unregister(&mut self, id: impl Into<ZoneId>) -> Result<()> {
        self.registry.unregister(id)
    }

    pub fn zone(&self, id: impl Into<ZoneId>) -> Option<&ActiveZone> {
        self.registry.get(id)
    }

    pub fn zones(&self) -> &ZoneRegistry {
        &self.registry
    }

    /// Direct access for per-zone edits between ticks.
    pub fn zones_mut(&mut self) -> &mut ZoneRegistry {
        &mut self.registry
    }

    // Settings

    pub fn set_mode(&mut self, mode: BackgroundMode) {
        self.background.set_mode(mode);
    }

    pub fn set_feedback(&mut self, feedback: f32) -> Result<()> {
        self.background.set_feedback(feedback)
    }

    pub fn set_threshold(&mut self, threshold: f32) -> Result<()> {
        self.threshold = clamp_unit("threshold", threshold)?;
        Ok(())
    }

    pub fn set_default_fill_threshold(&mut self, threshold: f32) -> Result<()> {
        self.registry.set_global_fill_threshold(threshold)
    }

    /// Changes the mirroring. The background is reset because the old reference was
    /// captured in the other orientation.
    pub fn set_mirror(&mut self, mirror: Mirror) {
        if mirror != self.mirror {
            self.mirror = mirror;
            self.background.reset();
        }
    }

    pub fn set_handle_active_zones(&mut self, enabled: bool) {
        self.handle_active_zones = enabled;
    }

    /// Discards the background; the next frame becomes the new reference.
    pub fn reset_background(&mut self) {
        self.background.reset();
    }

    // Diagnostics

    /// The last analyzed frame, after mirroring.
    pub fn current_frame(&self) -> Option<&Frame> {
        self.current.as_ref()
    }

    pub fn background_frame(&self) -> Option<&Frame> {
        self.background.reference()
    }

    pub fn difference_frame(&self) -> &DifferenceFrame {
        &self.difference
    }

    pub fn threshold_frame(&self) -> &ThresholdFrame {
        &self.mask
    }
}
