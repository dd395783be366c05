// ── Sensor store ──
//
// Concurrent name -> reading map. Each name is written in place, so a
// reader sees either the old or the new reading, never a gap.

use std::sync::Arc;

use dashmap::DashMap;

use super::{SensorReading, SensorStatus, SensorValue};

/// Process-wide sensor registry shared by the master and all products.
#[derive(Clone)]
pub struct SensorStore {
    inner: Arc<Inner>,
}

struct Inner {
    readings: DashMap<String, SensorReading>,
}

impl Default for SensorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                readings: DashMap::new(),
            }),
        }
    }

    /// Set a sensor with nominal status, creating it if needed.
    pub fn set(&self, name: impl Into<String>, value: impl Into<SensorValue>) {
        self.set_with_status(name, value, SensorStatus::Nominal);
    }

    pub fn set_with_status(
        &self,
        name: impl Into<String>,
        value: impl Into<SensorValue>,
        status: SensorStatus,
    ) {
        let mut reading = SensorReading::nominal(name, value);
        reading.status = status;
        self.inner.readings.insert(reading.name.clone(), reading);
    }

    /// Set several sensors.
    pub fn set_many<I, K, V>(&self, values: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<SensorValue>,
    {
        for (name, value) in values {
            let reading = SensorReading::nominal(name, value);
            self.inner.readings.insert(reading.name.clone(), reading);
        }
    }

    pub fn get(&self, name: &str) -> Option<SensorReading> {
        self.inner.readings.get(name).map(|r| r.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.readings.contains_key(name)
    }

    pub fn remove(&self, name: &str) -> Option<SensorReading> {
        self.inner.readings.remove(name).map(|(_, v)| v)
    }

    /// Remove every sensor whose name starts with `prefix`. Returns the
    /// number removed.
    pub fn remove_prefix(&self, prefix: &str) -> usize {
        let before = self.inner.readings.len();
        self.inner.readings.retain(|name, _| !name.starts_with(prefix));
        before - self.inner.readings.len()
    }

    /// Readings matching `pattern`, sorted by name.
    ///
    /// An empty pattern matches everything, a trailing `*` makes the rest a
    /// prefix, anything else must match a name exactly.
    pub fn list(&self, pattern: &str) -> Vec<SensorReading> {
        let mut out = if pattern.is_empty() {
            self.collect(|_| true)
        } else if let Some(prefix) = pattern.strip_suffix('*') {
            self.collect(|name| name.starts_with(prefix))
        } else {
            self.get(pattern).into_iter().collect()
        };
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub fn len(&self) -> usize {
        self.inner.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.readings.is_empty()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn collect(&self, keep: impl Fn(&str) -> bool) -> Vec<SensorReading> {
        self.inner
            .readings
            .iter()
            .filter(|r| keep(r.key()))
            .map(|r| r.value().clone())
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn set_and_get() {
        let store = SensorStore::new();
        store.set("p.state", "idle");
        let r = store.get("p.state").unwrap();
        assert_eq!(r.value, SensorValue::String("idle".into()));
        assert_eq!(r.status, SensorStatus::Nominal);
    }

    #[test]
    fn remove_prefix_only_touches_that_product() {
        let store = SensorStore::new();
        store.set_many([("a.state", "idle"), ("a.sideband", "upper"), ("ab.state", "idle")]);
        store.set("products", "a,ab");
        assert_eq!(store.remove_prefix("a."), 2);
        assert!(store.contains("ab.state"));
        assert!(store.contains("products"));
    }

    #[test]
    fn list_patterns() {
        let store = SensorStore::new();
        store.set_many([("p.state", "idle"), ("p.sideband", "upper"), ("q.state", "ready")]);
        let names = |pattern: &str| -> Vec<String> {
            store.list(pattern).into_iter().map(|r| r.name).collect()
        };
        assert_eq!(names("p.*"), vec!["p.sideband", "p.state"]);
        assert_eq!(names("q.state"), vec!["q.state"]);
        assert_eq!(names("").len(), 3);
        assert!(names("missing").is_empty());
    }
}
