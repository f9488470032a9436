// THEORY:
// This file is the main entry point for the `waldo_zones` library crate. It exposes
// `MotionEngine`, the explicit per-session engine object, together with the data it
// speaks in: frames, normalized zone rectangles, zone snapshots and tick reports.
//
// The building blocks in `core_modules` (background model, difference and threshold
// stages, zone evaluator and registry) stay public for callers that want to run a
// single stage on its own, but most users only need the re-exports below.
//
// For an engine that runs on its own tokio task, see `async_pipeline`.

pub mod async_pipeline;
pub mod config;
pub mod core_modules;
pub mod error;
pub mod pipeline;

pub use crate::config::{BackgroundMode, EngineConfig, Mirror};
pub use crate::core_modules::active_zone::{ActiveZone, ChangeStamp, ZoneEdits, ZoneId, ZoneSnapshot};
pub use crate::core_modules::frame::{Frame, PixelFormat};
pub use crate::core_modules::geometry::{NormRect, TargetRect};
pub use crate::error::{EngineError, Result};
pub use crate::pipeline::{MotionEngine, TickReport};
