//! # Telemetry Caches
//!
//! Process-wide, time-bounded in-memory stores for device-reported state.
//! Two independent maps, each keyed by device id:
//!
//! - **WeightCache** - last scale reading per device, stale after 10 seconds
//! - **CapabilityCache** - resolved pumpable ingredients per device, stale
//!   after 5 minutes, explicitly invalidated on pump configuration changes
//!
//! Nothing here persists: a restart clears all telemetry and devices simply
//! re-report on their next poll. Reads run an opportunistic sweep that drops
//! every stale entry before answering; there is no background timer.
//!
//! Every public method has an `*_at(now: Instant)` twin taking the clock as
//! a parameter, which is what the tests drive.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use barkeep_core::Pump;

/// Staleness window for scale weight readings.
pub const WEIGHT_TTL: Duration = Duration::from_secs(10);

/// Staleness window for resolved device capabilities.
pub const CAPABILITY_TTL: Duration = Duration::from_secs(5 * 60);

// =============================================================================
// Weight Cache
// =============================================================================

/// One scale reading as reported by a device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightSample {
    /// Calibrated weight in grams.
    pub weight_g: f64,
    /// Raw HX711 measure, used by the calibration workflow.
    pub raw_measure: i64,
}

struct TimedWeight {
    sample: WeightSample,
    observed_at: Instant,
}

/// Last known scale weight per device.
pub struct WeightCache {
    entries: Mutex<HashMap<String, TimedWeight>>,
    ttl: Duration,
}

impl WeightCache {
    pub fn new() -> Self {
        Self::with_ttl(WEIGHT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        WeightCache {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Stores a reading, overwriting any previous one for the device.
    pub fn store(&self, device_id: &str, sample: WeightSample) {
        self.store_at(device_id, sample, Instant::now());
    }

    pub fn store_at(&self, device_id: &str, sample: WeightSample, now: Instant) {
        let mut entries = lock(&self.entries);
        entries.insert(
            device_id.to_string(),
            TimedWeight {
                sample,
                observed_at: now,
            },
        );
    }

    /// The device's last reading, if one was reported within the window.
    pub fn get(&self, device_id: &str) -> Option<WeightSample> {
        self.get_at(device_id, Instant::now())
    }

    pub fn get_at(&self, device_id: &str, now: Instant) -> Option<WeightSample> {
        let mut entries = lock(&self.entries);
        let ttl = self.ttl;
        entries.retain(|_, entry| now.duration_since(entry.observed_at) <= ttl);
        entries.get(device_id).map(|entry| entry.sample)
    }
}

impl Default for WeightCache {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Capability Cache
// =============================================================================

/// Resolved pumpable ingredients of one device: ingredient id → the usable
/// pumps serving it, in GPIO order.
pub type IngredientPumps = HashMap<String, Vec<Pump>>;

struct TimedCapability {
    pumps_by_ingredient: IngredientPumps,
    observed_at: Instant,
}

/// Per-device capability snapshots.
///
/// Populated from a store query on miss; invalidated whenever pump
/// configuration changes (per device, or globally when an ingredient is
/// removed).
pub struct CapabilityCache {
    entries: Mutex<HashMap<String, TimedCapability>>,
    ttl: Duration,
}

impl CapabilityCache {
    pub fn new() -> Self {
        Self::with_ttl(CAPABILITY_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        CapabilityCache {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn store(&self, device_id: &str, pumps_by_ingredient: IngredientPumps) {
        self.store_at(device_id, pumps_by_ingredient, Instant::now());
    }

    pub fn store_at(&self, device_id: &str, pumps_by_ingredient: IngredientPumps, now: Instant) {
        let mut entries = lock(&self.entries);
        entries.insert(
            device_id.to_string(),
            TimedCapability {
                pumps_by_ingredient,
                observed_at: now,
            },
        );
    }

    pub fn get(&self, device_id: &str) -> Option<IngredientPumps> {
        self.get_at(device_id, Instant::now())
    }

    pub fn get_at(&self, device_id: &str, now: Instant) -> Option<IngredientPumps> {
        let mut entries = lock(&self.entries);
        let ttl = self.ttl;
        entries.retain(|_, entry| now.duration_since(entry.observed_at) <= ttl);
        entries
            .get(device_id)
            .map(|entry| entry.pumps_by_ingredient.clone())
    }

    /// Drops one device's snapshot (its pump configuration changed).
    pub fn invalidate_device(&self, device_id: &str) {
        lock(&self.entries).remove(device_id);
    }

    /// Drops every snapshot (a shared entity like an ingredient changed).
    pub fn invalidate_all(&self) {
        lock(&self.entries).clear();
    }
}

impl Default for CapabilityCache {
    fn default() -> Self {
        Self::new()
    }
}

/// The caches hold no invariants across a panic; a poisoned lock just means
/// some other handler died mid-insert, and the lossy data is still usable.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
