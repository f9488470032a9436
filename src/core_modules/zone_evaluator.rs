// THEORY:
// The `ActiveZoneEvaluator` is the core of the engine. Once per tick it walks the
// registry in insertion order and, for every enabled zone, turns the threshold mask
// into a decision: is this zone triggered right now?
//
// Per zone:
// 1.  Map the zone's normalized rectangle onto the mask (see `geometry`).
// 2.  `fill_factor = moving pixels / zone pixels`; a zone with no pixels has a fill
//     factor of 0 and never triggers.
// 3.  `triggered = fill_factor >= fill_threshold` (inclusive), where the threshold
//     is the zone's override or the registry default read at the start of the tick.
// 4.  Only when `triggered` differs from the previous state does the zone's handler
//     run, synchronously, before the next zone is looked at.
// 5.  Disabled zones are skipped outright: no recomputation, no flag changes, no
//     handler. Their last state stays frozen until they are re-enabled.
//
// Handlers cannot reach the registry while it is being walked; their `ZoneEdits`
// are applied once the walk is over, so they only ever affect the next tick.

use crate::core_modules::active_zone::{ChangeStamp, ZoneEdits, ZoneSnapshot};
use crate::core_modules::geometry::NormRect;
use crate::core_modules::threshold::ThresholdFrame;
use crate::core_modules::zone_registry::ZoneRegistry;
use tracing::debug;

/// Fill factor of `rect` on `mask`, or `None` when the rectangle covers no pixels.
pub fn fill_factor(rect: &NormRect, mask: &ThresholdFrame) -> Option<f32> {
    let bounds = rect.pixel_bounds(mask.width(), mask.height())?;
    let area = bounds.area();
    if area == 0 {
        return None;
    }
    let moving = mask.count_moving(&bounds);
    Some((moving as f32 / area as f32).clamp(0.0, 1.0))
}

/// Drives the per-zone state machines.
#[derive(Debug, Default)]
pub struct ActiveZoneEvaluator {
    edits: ZoneEdits,
}

impl ActiveZoneEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluates every enabled zone against `mask` and returns a snapshot of each
    /// zone that changed state, in registry order.
    pub fn evaluate(
        &mut self,
        registry: &mut ZoneRegistry,
        mask: &ThresholdFrame,
        stamp: ChangeStamp,
    ) -> Vec<ZoneSnapshot> {
        let global = registry.global_fill_threshold();
        let mut transitions = Vec::new();

        for zone in registry.iter_mut().filter(|zone| zone.is_enabled()) {
            let fill = fill_factor(&zone.rect(), mask);
            let threshold = zone.effective_fill_threshold(global);
            let triggered = fill.is_some_and(|fill| fill >= threshold);

            if zone.observe(fill.unwrap_or(0.0), triggered, stamp) {
                let snapshot = zone.snapshot(global);
                debug!(
                    zone = %snapshot.id,
                    fill = snapshot.fill_factor,
                    threshold,
                    triggered,
                    frame = stamp.frame,
                    "zone changed state"
                );
                zone.notify(&snapshot, &mut self.edits);
                transitions.push(snapshot);
            }
        }

        if !self.edits.is_empty() {
            registry.apply_edits(self.edits.take());
        }
        transitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::active_zone::ZoneId;
    use assert_approx_eq::assert_approx_eq;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn stamp(frame: u64) -> ChangeStamp {
        ChangeStamp {
            frame,
            elapsed: Duration::from_millis(frame * 40),
        }
    }

    fn mask(width: u32, height: u32, moving: &[(u32, u32)]) -> ThresholdFrame {
        let mut flags = vec![false; (width * height) as usize];
        for (x, y) in moving {
            flags[(y * width + x) as usize] = true;
        }
        ThresholdFrame::from_mask(width, height, flags).unwrap()
    }

    fn quarter() -> NormRect {
        NormRect::new(0.0, 0.0, 0.5, 0.5).unwrap()
    }

    type Log = Arc<Mutex<Vec<ZoneSnapshot>>>;

    fn recorder(log: &Log) -> impl FnMut(&ZoneSnapshot, &mut ZoneEdits) + Send + 'static {
        let log = Arc::clone(log);
        move |zone, _| log.lock().unwrap().push(zone.clone())
    }

    #[test]
    fn two_by_two_scenario() {
        let m = mask(2, 2, &[(0, 0)]);
        assert_approx_eq!(fill_factor(&quarter(), &m).unwrap(), 0.25, 1e-6);

        let mut registry = ZoneRegistry::new(0.02).unwrap();
        registry.register_silent("low", quarter(), Some(0.2)).unwrap();
        registry.register_silent("high", quarter(), Some(0.3)).unwrap();
        ActiveZoneEvaluator::new().evaluate(&mut registry, &m, stamp(1));

        assert!(registry.get("low").unwrap().is_movement_detected());
        assert!(!registry.get("high").unwrap().is_movement_detected());
    }

    #[test]
    fn fill_equal_to_threshold_triggers() {
        let mut registry = ZoneRegistry::new(0.02).unwrap();
        registry.register_silent("edge", quarter(), Some(0.25)).unwrap();
        let transitions =
            ActiveZoneEvaluator::new().evaluate(&mut registry, &mask(2, 2, &[(1, 1)]), stamp(1));
        assert_eq!(transitions.len(), 1);
        assert!(transitions[0].is_movement_detected);
        assert_eq!(transitions[0].fill_factor, transitions[0].fill_threshold);
    }

    #[test]
    fn degenerate_zone_never_triggers() {
        let mut registry = ZoneRegistry::new(0.0).unwrap();
        let flat = NormRect::new(0.2, 0.2, 0.0, 0.5).unwrap();
        registry.register_silent("flat", flat, Some(0.0)).unwrap();
        let everything = mask(4, 4, &[(0, 0), (1, 0), (2, 0), (0, 1), (1, 1), (2, 2)]);
        let transitions = ActiveZoneEvaluator::new().evaluate(&mut registry, &everything, stamp(1));
        assert!(transitions.is_empty());
        let zone = registry.get("flat").unwrap();
        assert_eq!(zone.fill_factor(), 0.0);
        assert!(!zone.is_movement_detected());
    }

    #[test]
    fn handler_fires_once_per_crossing() {
        let log: Log = Arc::default();
        let mut registry = ZoneRegistry::new(0.5).unwrap();
        registry.register("z", NormRect::full(), None, recorder(&log)).unwrap();
        let mut evaluator = ActiveZoneEvaluator::new();

        let quiet = mask(2, 2, &[]);
        let busy = mask(2, 2, &[(0, 0), (1, 0), (0, 1)]);
        let sequence = [&quiet, &quiet, &busy, &busy, &busy];
        for (tick, m) in sequence.iter().enumerate() {
            evaluator.evaluate(&mut registry, m, stamp(tick as u64));
        }

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert!(log[0].is_movement_detected);
        assert_eq!(log[0].changed_at, Some(stamp(2)));
        assert!(!registry.get("z").unwrap().is_changed());
    }

    #[test]
    fn changed_flag_lasts_one_tick() {
        let mut registry = ZoneRegistry::new(0.5).unwrap();
        registry.register_silent("z", NormRect::full(), None).unwrap();
        let mut evaluator = ActiveZoneEvaluator::new();
        let busy = mask(1, 1, &[(0, 0)]);

        evaluator.evaluate(&mut registry, &busy, stamp(0));
        assert!(registry.get("z").unwrap().is_changed());
        evaluator.evaluate(&mut registry, &busy, stamp(1));
        let zone = registry.get("z").unwrap();
        assert!(!zone.is_changed());
        assert!(zone.is_movement_detected());
        assert_eq!(zone.changed_at(), Some(stamp(0)));
    }

    #[test]
    fn disabled_zone_is_frozen_and_resumes_from_current_frame() {
        let log: Log = Arc::default();
        let mut registry = ZoneRegistry::new(0.5).unwrap();
        registry.register("z", NormRect::full(), None, recorder(&log)).unwrap();
        let mut evaluator = ActiveZoneEvaluator::new();
        let busy = mask(2, 1, &[(0, 0), (1, 0)]);
        let quiet = mask(2, 1, &[]);

        evaluator.evaluate(&mut registry, &busy, stamp(0));
        registry.set_enabled("z", false).unwrap();
        for tick in 1..5 {
            evaluator.evaluate(&mut registry, &quiet, stamp(tick));
        }
        let zone = registry.get("z").unwrap();
        assert_eq!(zone.fill_factor(), 1.0);
        assert!(zone.is_movement_detected());
        assert!(zone.is_changed());
        assert_eq!(log.lock().unwrap().len(), 1);

        registry.set_enabled("z", true).unwrap();
        evaluator.evaluate(&mut registry, &quiet, stamp(5));
        let zone = registry.get("z").unwrap();
        assert_eq!(zone.fill_factor(), 0.0);
        assert!(!zone.is_movement_detected());
        assert_eq!(zone.changed_at(), Some(stamp(5)));
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ZoneRegistry::new(0.1).unwrap();
        for id in ["second", "first", "third"] {
            let order = Arc::clone(&order);
            registry
                .register(id, NormRect::full(), None, move |zone, _| {
                    order.lock().unwrap().push(zone.id.clone())
                })
                .unwrap();
        }
        ActiveZoneEvaluator::new().evaluate(&mut registry, &mask(1, 1, &[(0, 0)]), stamp(0));
        let expected: Vec<ZoneId> = ["second", "first", "third"].map(ZoneId::from).to_vec();
        assert_eq!(*order.lock().unwrap(), expected);
    }

    #[test]
    fn handler_edits_apply_after_the_tick() {
        let mut registry = ZoneRegistry::new(0.1).unwrap();
        registry
            .register("trigger", NormRect::full(), None, |zone, edits| {
                if zone.is_movement_detected {
                    edits.set_enabled("victim", false);
                    edits.set_global_fill_threshold(0.9);
                }
            })
            .unwrap();
        registry.register_silent("victim", NormRect::full(), None).unwrap();
        let mut evaluator = ActiveZoneEvaluator::new();

        // Half the frame moves: both zones see the same mask during this tick, even
        // though the first handler asked to disable the second.
        let half = mask(2, 1, &[(0, 0)]);
        let transitions = evaluator.evaluate(&mut registry, &half, stamp(0));
        assert_eq!(transitions.len(), 2);
        assert!(!registry.get("victim").unwrap().is_enabled());
        assert_eq!(registry.global_fill_threshold(), 0.9);

        // Next tick: the raised default threshold frees the trigger zone.
        let transitions = evaluator.evaluate(&mut registry, &half, stamp(1));
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].id, ZoneId::from("trigger"));
        assert!(!transitions[0].is_movement_detected);
    }

    #[test]
    fn global_threshold_applies_only_to_zones_without_override() {
        let mut registry = ZoneRegistry::new(0.9).unwrap();
        registry.register_silent("default", NormRect::full(), None).unwrap();
        registry.register_silent("tuned", NormRect::full(), Some(0.4)).unwrap();
        let m = mask(2, 1, &[(0, 0)]);
        let transitions = ActiveZoneEvaluator::new().evaluate(&mut registry, &m, stamp(0));
        let ids: Vec<_> = transitions.iter().map(|t| t.id.clone()).collect();
        assert_eq!(ids, vec![ZoneId::from("tuned")]);
    }
}
