// THEORY:
// An `ActiveZone` is a rectangular region of interest that the engine watches for
// motion. It is the engine's unit of output: callers register zones, and the engine
// tells them, once per state change, when a zone becomes triggered or free.
//
// Key architectural principles:
// 1.  **Two-State Machine**: a zone is either triggered (movement detected) or free.
//     `is_changed` is raised only on the tick the state flips, and that is the only
//     tick on which the change handler runs.
// 2.  **Snapshots, Not References**: handlers receive a `ZoneSnapshot`, an owned
//     copy of the zone's public state. It can be logged, stored or sent across a
//     channel without holding any borrow on the registry.
// 3.  **Deferred Edits**: a handler may want to react by retuning zones (raise a
//     threshold, disable a neighbour, move itself). It does so by queueing
//     `ZoneEdits`; the registry applies them after every zone has been evaluated, so
//     the current tick always sees one consistent zone list.

use crate::core_modules::geometry::NormRect;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Caller-chosen zone identifier: an integer or a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ZoneId {
    Index(i64),
    Name(String),
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneId::Index(index) => write!(f, "{index}"),
            ZoneId::Name(name) => f.write_str(name),
        }
    }
}

impl From<i64> for ZoneId {
    fn from(index: i64) -> Self {
        ZoneId::Index(index)
    }
}

impl From<i32> for ZoneId {
    fn from(index: i32) -> Self {
        ZoneId::Index(index.into())
    }
}

impl From<u32> for ZoneId {
    fn from(index: u32) -> Self {
        ZoneId::Index(index.into())
    }
}

impl From<usize> for ZoneId {
    fn from(index: usize) -> Self {
        ZoneId::Index(index as i64)
    }
}

impl From<&str> for ZoneId {
    fn from(name: &str) -> Self {
        ZoneId::Name(name.to_string())
    }
}

impl From<String> for ZoneId {
    fn from(name: String) -> Self {
        ZoneId::Name(name)
    }
}

/// When a zone last changed state: the tick index and the time since the engine started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChangeStamp {
    pub frame: u64,
    pub elapsed: Duration,
}

/// Owned copy of a zone's public state, as handed to change handlers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneSnapshot {
    pub id: ZoneId,
    pub rect: NormRect,
    pub is_enabled: bool,
    pub is_movement_detected: bool,
    pub is_changed: bool,
    /// Fraction of the zone's pixels classified as moving on the last evaluation.
    pub fill_factor: f32,
    /// Threshold in effect: the zone's override, or the registry default.
    pub fill_threshold: f32,
    /// True when `fill_threshold` comes from a per-zone override.
    pub has_threshold_override: bool,
    pub changed_at: Option<ChangeStamp>,
}

/// Handler invoked synchronously when a zone changes state.
pub type ChangeHandler = Box<dyn FnMut(&ZoneSnapshot, &mut ZoneEdits) + Send>;

/// A zone parameter change requested from inside a change handler.
#[derive(Debug, Clone, PartialEq)]
pub enum ZoneEdit {
    SetFillThreshold(ZoneId, Option<f32>),
    SetEnabled(ZoneId, bool),
    SetRect(ZoneId, NormRect),
    SetGlobalFillThreshold(f32),
    Remove(ZoneId),
}

/// Queue of edits that take effect after the current tick.
#[derive(Debug, Default)]
pub struct ZoneEdits {
    edits: Vec<ZoneEdit>,
}

impl ZoneEdits {
    /// Sets (or with `None`, clears) a zone's fill threshold override.
    pub fn set_fill_threshold(&mut self, id: impl Into<ZoneId>, threshold: Option<f32>) {
        self.edits.push(ZoneEdit::SetFillThreshold(id.into(), threshold));
    }

    pub fn set_enabled(&mut self, id: impl Into<ZoneId>, enabled: bool) {
        self.edits.push(ZoneEdit::SetEnabled(id.into(), enabled));
    }

    pub fn set_rect(&mut self, id: impl Into<ZoneId>, rect: NormRect) {
        self.edits.push(ZoneEdit::SetRect(id.into(), rect));
    }

    pub fn set_global_fill_threshold(&mut self, threshold: f32) {
        self.edits.push(ZoneEdit::SetGlobalFillThreshold(threshold));
    }

    pub fn remove(&mut self, id: impl Into<ZoneId>) {
        self.edits.push(ZoneEdit::Remove(id.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ZoneEdit> {
        self.edits.iter()
    }

    pub(crate) fn take(&mut self) -> Vec<ZoneEdit> {
        std::mem::take(&mut self.edits)
    }
}

/// A registered zone and its runtime state.
pub struct ActiveZone {
    id: ZoneId,
    rect: NormRect,
    enabled: bool,
    fill_threshold: Option<f32>,
    fill_factor: f32,
    movement_detected: bool,
    changed: bool,
    changed_at: Option<ChangeStamp>,
    on_change: Option<ChangeHandler>,
}

impl ActiveZone {
    /// `rect` and `fill_threshold` are expected to be validated by the registry.
    pub(crate) fn new(
        id: ZoneId,
        rect: NormRect,
        fill_threshold: Option<f32>,
        on_change: Option<ChangeHandler>,
    ) -> Self {
        Self {
            id,
            rect,
            enabled: true,
            fill_threshold,
            fill_factor: 0.0,
            movement_detected: false,
            changed: false,
            changed_at: None,
            on_change,
        }
    }

    pub fn id(&self) -> &ZoneId {
        &self.id
    }

    pub fn rect(&self) -> NormRect {
        self.rect
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The per-zone override, if any.
    pub fn fill_threshold_override(&self) -> Option<f32> {
        self.fill_threshold
    }

    pub fn fill_factor(&self) -> f32 {
        self.fill_factor
    }

    pub fn is_movement_detected(&self) -> bool {
        self.movement_detected
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn changed_at(&self) -> Option<ChangeStamp> {
        self.changed_at
    }

    pub(crate) fn set_rect(&mut self, rect: NormRect) {
        self.rect = rect;
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub(crate) fn set_fill_threshold(&mut self, threshold: Option<f32>) {
        self.fill_threshold = threshold;
    }

    /// Threshold in effect given the registry default.
    pub fn effective_fill_threshold(&self, global: f32) -> f32 {
        self.fill_threshold.unwrap_or(global)
    }

    /// Records one evaluation. Returns true when the triggered state flipped.
    pub(crate) fn observe(&mut self, fill_factor: f32, triggered: bool, stamp: ChangeStamp) -> bool {
        self.fill_factor = fill_factor;
        self.changed = triggered != self.movement_detected;
        self.movement_detected = triggered;
        if self.changed {
            self.changed_at = Some(stamp);
        }
        self.changed
    }

    /// Runs the change handler, if one is attached.
    pub(crate) fn notify(&mut self, snapshot: &ZoneSnapshot, edits: &mut ZoneEdits) {
        if let Some(handler) = self.on_change.as_mut() {
            handler(snapshot, edits);
        }
    }

    pub fn snapshot(&self, global: f32) -> ZoneSnapshot {
        ZoneSnapshot {
            id: self.id.clone(),
            rect: self.rect,
            is_enabled: self.enabled,
            is_movement_detected: self.movement_detected,
            is_changed: self.changed,
            fill_factor: self.fill_factor,
            fill_threshold: self.effective_fill_threshold(global),
            has_threshold_override: self.fill_threshold.is_some(),
            changed_at: self.changed_at,
        }
    }
}

impl fmt::Debug for ActiveZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveZone")
            .field("id", &self.id)
            .field("rect", &self.rect)
            .field("enabled", &self.enabled)
            .field("fill_threshold", &self.fill_threshold)
            .field("fill_factor", &self.fill_factor)
            .field("movement_detected", &self.movement_detected)
            .field("changed", &self.changed)
            .field("changed_at", &self.changed_at)
            .field("has_handler", &self.on_change.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn stamp(frame: u64) -> ChangeStamp {
        ChangeStamp {
            frame,
            elapsed: Duration::from_millis(frame * 33),
        }
    }

    #[test]
    fn ids_compare_by_kind_and_value() {
        assert_eq!(ZoneId::from(3), ZoneId::Index(3));
        assert_eq!(ZoneId::from(3usize), ZoneId::from(3i64));
        assert_eq!(ZoneId::from("door"), ZoneId::from(String::from("door")));
        assert_ne!(ZoneId::from("3"), ZoneId::from(3));
        assert_eq!(ZoneId::from("door").to_string(), "door");
    }

    #[test]
    fn ids_deserialize_from_numbers_or_strings() {
        let ids: Vec<ZoneId> = serde_json::from_str(r#"[4, "window"]"#).unwrap();
        assert_eq!(ids, vec![ZoneId::Index(4), ZoneId::from("window")]);
    }

    #[test]
    fn observe_flags_only_transitions() {
        let mut zone = ActiveZone::new(ZoneId::from(0), NormRect::full(), None, None);
        assert!(!zone.observe(0.0, false, stamp(1)));
        assert!(zone.changed_at().is_none());

        assert!(zone.observe(0.6, true, stamp(2)));
        assert!(zone.is_movement_detected());
        assert_eq!(zone.changed_at(), Some(stamp(2)));

        assert!(!zone.observe(0.7, true, stamp(3)));
        assert!(!zone.is_changed());
        assert_eq!(zone.changed_at(), Some(stamp(2)));

        assert!(zone.observe(0.1, false, stamp(4)));
        assert_eq!(zone.changed_at(), Some(stamp(4)));
    }

    #[test]
    fn snapshot_reports_effective_threshold() {
        let zone = ActiveZone::new(ZoneId::from("a"), NormRect::full(), None, None);
        let snapshot = zone.snapshot(0.3);
        assert_eq!(snapshot.fill_threshold, 0.3);
        assert!(!snapshot.has_threshold_override);

        let zone = ActiveZone::new(ZoneId::from("b"), NormRect::full(), Some(0.6), None);
        let snapshot = zone.snapshot(0.3);
        assert_eq!(snapshot.fill_threshold, 0.6);
        assert!(snapshot.has_threshold_override);
    }

    #[test]
    fn notify_hands_a_snapshot_and_collects_edits() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler: ChangeHandler = Box::new(move |zone: &ZoneSnapshot, edits: &mut ZoneEdits| {
            sink.lock().unwrap().push(zone.clone());
            edits.set_enabled(zone.id.clone(), false);
        });
        let mut zone = ActiveZone::new(ZoneId::from(1), NormRect::full(), None, Some(handler));
        zone.observe(1.0, true, stamp(5));

        let mut edits = ZoneEdits::default();
        let snapshot = zone.snapshot(0.5);
        zone.notify(&snapshot, &mut edits);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].is_movement_detected && seen[0].is_changed);
        assert_eq!(edits.iter().collect::<Vec<_>>(), vec![&ZoneEdit::SetEnabled(ZoneId::from(1), false)]);
        // Queued only: the zone itself is untouched until the registry applies the edits.
        assert!(zone.is_enabled());
    }
}
