// ── Coherent beam pointings ──
//
// One slot per coherent beam. Readers take lock-free snapshots; writers
// hold the product lock and swap in a whole new table, so an update from
// the authority lands on every slot at once. Sensor publication rewrites
// names in place so a reader never finds a live slot missing.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use arc_swap::ArcSwap;

use crate::model::Target;
use crate::sensor::SensorStore;

pub(crate) const UNSET: &str = "unset";

pub(crate) fn beam_sensor_prefix(product: &str) -> String {
    format!("{product}.coherent-beam-cfbf")
}

pub(crate) fn beam_sensor_name(product: &str, slot: usize) -> String {
    format!("{}{slot:05}", beam_sensor_prefix(product))
}

pub(crate) struct PointingTable {
    slots: ArcSwap<Vec<Option<Target>>>,
    published: AtomicUsize,
}

impl PointingTable {
    pub(crate) fn new() -> Self {
        Self {
            slots: ArcSwap::from_pointee(Vec::new()),
            published: AtomicUsize::new(0),
        }
    }

    pub(crate) fn snapshot(&self) -> Arc<Vec<Option<Target>>> {
        self.slots.load_full()
    }

    /// Change the slot count, keeping the pointings of surviving slots.
    pub(crate) fn resize(&self, nbeams: usize) {
        let mut slots = self.snapshot().as_ref().clone();
        slots.resize(nbeams, None);
        self.slots.store(Arc::new(slots));
    }

    pub(crate) fn clear(&self) {
        let nbeams = self.snapshot().len();
        self.slots.store(Arc::new(vec![None; nbeams]));
    }

    /// Slot `i` takes `targets[i]`; slots past the list keep their value and
    /// targets past the last slot are dropped. Returns how many were applied.
    pub(crate) fn apply(&self, targets: &[Target]) -> usize {
        let mut slots = self.snapshot().as_ref().clone();
        let applied = targets.len().min(slots.len());
        for (slot, target) in slots.iter_mut().zip(targets) {
            *slot = Some(target.clone());
        }
        self.slots.store(Arc::new(slots));
        applied
    }

    /// Start of the first run of `count` consecutive unset slots.
    pub(crate) fn free_run(&self, count: usize) -> Option<usize> {
        if count == 0 {
            return None;
        }
        let slots = self.snapshot();
        let mut run = 0;
        for (i, slot) in slots.iter().enumerate() {
            run = if slot.is_none() { run + 1 } else { 0 };
            if run == count {
                return Some(i + 1 - count);
            }
        }
        None
    }

    pub(crate) fn fill(&self, start: usize, count: usize, target: &Target) {
        let mut slots = self.snapshot().as_ref().clone();
        for slot in slots.iter_mut().skip(start).take(count) {
            *slot = Some(target.clone());
        }
        self.slots.store(Arc::new(slots));
    }

    /// Write every slot to its `<product>.coherent-beam-cfbf#####` sensor.
    ///
    /// Existing names are overwritten in place; only names beyond the
    /// current slot count are removed.
    pub(crate) fn publish(&self, sensors: &SensorStore, product: &str) {
        let slots = self.snapshot();
        sensors.set_many(slots.iter().enumerate().map(|(i, slot)| {
            let value = slot
                .as_ref()
                .map_or_else(|| UNSET.to_string(), ToString::to_string);
            (beam_sensor_name(product, i), value)
        }));
        let previous = self.published.swap(slots.len(), Ordering::AcqRel);
        for slot in slots.len()..previous {
            sensors.remove(&beam_sensor_name(product, slot));
        }
    }
}
