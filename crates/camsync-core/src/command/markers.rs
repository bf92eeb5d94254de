// ── Expected-stop markers ──
//
// A marker says "a local stop for this device is in flight, so a
// Running→Stopped transition is ours". Markers expire so a stop the
// service never confirms cannot mask a later genuine failure.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::model::DeviceKey;

/// Default lifetime of a marker.
pub const DEFAULT_EXPECTED_STOP_TTL: Duration = Duration::from_secs(10);

/// Shared set of expected-stop markers with a fixed TTL.
#[derive(Debug)]
pub struct ExpectedStops {
    ttl: Duration,
    markers: Mutex<HashMap<DeviceKey, Instant>>,
}

impl Default for ExpectedStops {
    fn default() -> Self {
        Self::new(DEFAULT_EXPECTED_STOP_TTL)
    }
}

impl ExpectedStops {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            markers: Mutex::new(HashMap::new()),
        }
    }

    /// Set (or refresh) the marker for `key`.
    pub fn insert(&self, key: DeviceKey) {
        let expires = Instant::now() + self.ttl;
        self.lock().insert(key, expires);
    }

    pub fn remove(&self, key: &DeviceKey) {
        self.lock().remove(key);
    }

    /// Remove markers that explained a transition.
    pub fn consume(&self, keys: &[DeviceKey]) {
        if keys.is_empty() {
            return;
        }
        let mut markers = self.lock();
        for key in keys {
            markers.remove(key);
        }
    }

    /// Keys with a live marker. Expired markers are pruned.
    pub fn active(&self) -> HashSet<DeviceKey> {
        let now = Instant::now();
        let mut markers = self.lock();
        markers.retain(|_, expires| *expires > now);
        markers.keys().cloned().collect()
    }

    pub fn contains(&self, key: &DeviceKey) -> bool {
        self.active().contains(key)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<DeviceKey, Instant>> {
        self.markers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
