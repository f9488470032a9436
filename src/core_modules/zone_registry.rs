// THEORY:
// The `ZoneRegistry` owns every `ActiveZone` the caller registered, together with
// the registry-wide default fill threshold that applies to zones without an
// override.
//
// Key architectural principles:
// 1.  **Insertion Order**: zones live in a `Vec` in registration order. Evaluation,
//     callback dispatch and batch rendering all iterate in that order, so identical
//     input frames always produce identical callback sequences.
// 2.  **Explicit Lifecycle**: zones are only created by `register` and only destroyed
//     by `unregister` (or a queued `Remove` edit). Removal never fires a handler.
// 3.  **Loud Contract Violations**: duplicate ids and unknown ids are returned as
//     errors and leave the registry untouched. Numeric parameters are clamped.

use crate::core_modules::active_zone::{
    ActiveZone, ChangeHandler, ZoneEdit, ZoneEdits, ZoneId, ZoneSnapshot,
};
use crate::core_modules::geometry::NormRect;
use crate::error::{EngineError, Result, clamp_unit};
use tracing::{info, warn};

/// Owns the registered zones and the default fill threshold.
#[derive(Debug)]
pub struct ZoneRegistry {
    zones: Vec<ActiveZone>,
    global_fill_threshold: f32,
}

impl ZoneRegistry {
    pub fn new(global_fill_threshold: f32) -> Result<Self> {
        Ok(Self {
            zones: Vec::new(),
            global_fill_threshold: clamp_unit("default_fill_threshold", global_fill_threshold)?,
        })
    }

    /// Registers a zone with a change handler.
    ///
    /// The rectangle is clamped into the image and `fill_threshold` (when given)
    /// into `[0, 1]`. Fails with `DuplicateId` if the id is taken.
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
        self.insert(id.into(), rect, fill_threshold, Some(Box::new(on_change)))
    }

    /// Registers a zone whose state is only observed by polling.
    pub fn register_silent(
        &mut self,
        id: impl Into<ZoneId>,
        rect: NormRect,
        fill_threshold: Option<f32>,
    ) -> Result<&ActiveZone> {
        self.insert(id.into(), rect, fill_threshold, None)
    }

    fn insert(
        &mut self,
        id: ZoneId,
        rect: NormRect,
        fill_threshold: Option<f32>,
        on_change: Option<ChangeHandler>,
    ) -> Result<&ActiveZone> {
        if self.position(&id).is_some() {
            return Err(EngineError::DuplicateId(id));
        }
        let rect = rect.validated()?;
        let fill_threshold = fill_threshold
            .map(|t| clamp_unit("fill_threshold", t))
            .transpose()?;
        if rect.is_degenerate() {
            warn!(zone = %id, ?rect, "zone has no area and will never trigger");
        }
        info!(zone = %id, ?rect, ?fill_threshold, "zone registered");
        self.zones
            .push(ActiveZone::new(id, rect, fill_threshold, on_change));
        Ok(&self.zones[self.zones.len() - 1])
    }

    /// Removes a zone without invoking its handler. Fails with `NotFound` if absent.
    pub fn unregister(&mut self, id: impl Into<ZoneId>) -> Result<()> {
        let id = id.into();
        let index = self.position(&id).ok_or(EngineError::NotFound(id))?;
        let zone = self.zones.remove(index);
        info!(zone = %zone.id(), "zone unregistered");
        Ok(())
    }

    fn position(&self, id: &ZoneId) -> Option<usize> {
        self.zones.iter().position(|zone| zone.id() == id)
    }

    fn zone_mut(&mut self, id: ZoneId) -> Result<&mut ActiveZone> {
        match self.position(&id) {
            Some(index) => Ok(&mut self.zones[index]),
            None => Err(EngineError::NotFound(id)),
        }
    }

    pub fn get(&self, id: impl Into<ZoneId>) -> Option<&ActiveZone> {
        let id = id.into();
        self.zones.iter().find(|zone| *zone.id() == id)
    }

    pub fn contains(&self, id: impl Into<ZoneId>) -> bool {
        self.get(id).is_some()
    }

    /// Sets or clears a zone's fill threshold override. Takes effect on the next tick.
    pub fn set_fill_threshold(&mut self, id: impl Into<ZoneId>, threshold: Option<f32>) -> Result<()> {
        let threshold = threshold
            .map(|t| clamp_unit("fill_threshold", t))
            .transpose()?;
        self.zone_mut(id.into())?.set_fill_threshold(threshold);
        Ok(())
    }

    /// Enables or disables a zone. A disabled zone keeps its last state frozen.
    pub fn set_enabled(&mut self, id: impl Into<ZoneId>, enabled: bool) -> Result<()> {
        self.zone_mut(id.into())?.set_enabled(enabled);
        Ok(())
    }

    /// Moves or resizes a zone.
    pub fn set_rect(&mut self, id: impl Into<ZoneId>, rect: NormRect) -> Result<()> {
        let rect = rect.validated()?;
        self.zone_mut(id.into())?.set_rect(rect);
        Ok(())
    }

    pub fn global_fill_threshold(&self) -> f32 {
        self.global_fill_threshold
    }

    /// Sets the default threshold used by zones without an override. Applies from
    /// the next tick; fill factors already computed are not re-evaluated.
    pub fn set_global_fill_threshold(&mut self, threshold: f32) -> Result<()> {
        self.global_fill_threshold = clamp_unit("default_fill_threshold", threshold)?;
        Ok(())
    }

    /// Zones in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ActiveZone> {
        self.zones.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut ActiveZone> {
        self.zones.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Snapshots of every zone, in registration order, for batch rendering.
    pub fn snapshots(&self) -> Vec<ZoneSnapshot> {
        self.zones
            .iter()
            .map(|zone| zone.snapshot(self.global_fill_threshold))
            .collect()
    }

    /// Applies edits queued by change handlers, in the order they were queued.
    ///
    /// An edit that fails (unknown zone, non-finite value) is logged and skipped;
    /// the remaining edits still apply.
    pub fn apply_edits(&mut self, edits: Vec<ZoneEdit>) {
        for edit in edits {
            let outcome = match edit.clone() {
                ZoneEdit::SetFillThreshold(id, threshold) => self.set_fill_threshold(id, threshold),
                ZoneEdit::SetEnabled(id, enabled) => self.set_enabled(id, enabled),
                ZoneEdit::SetRect(id, rect) => self.set_rect(id, rect),
                ZoneEdit::SetGlobalFillThreshold(threshold) => self.set_global_fill_threshold(threshold),
                ZoneEdit::Remove(id) => self.unregister(id),
            };
            if let Err(err) = outcome {
                warn!(?edit, %err, "skipping deferred zone edit");
            }
        }
    }
}
