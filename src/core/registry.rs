//! Live map of which metrics are switched on.
//!
//! Written by the settings side, read by the metrics worker once per tick.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use super::metrics::{MetricKey, Tier};

/// Metric enablement shared between the settings side and the metrics worker.
///
/// Every key starts enabled. Writes are last-write-wins.
#[derive(Debug)]
pub struct StatEnablementRegistry {
    flags: RwLock<BTreeMap<MetricKey, bool>>,
}

impl StatEnablementRegistry {
    pub fn new() -> Self {
        Self {
            flags: RwLock::new(MetricKey::ALL.iter().map(|key| (*key, true)).collect()),
        }
    }

    pub fn is_enabled(&self, key: MetricKey) -> bool {
        self.flags.read().get(&key).copied().unwrap_or(true)
    }

    pub fn set_enabled(&self, key: MetricKey, enabled: bool) {
        self.flags.write().insert(key, enabled);
        log::debug!("{} -> {}", key, enabled);
    }

    pub fn set_many<I>(&self, updates: I)
    where
        I: IntoIterator<Item = (MetricKey, bool)>,
    {
        let mut flags = self.flags.write();
        for (key, enabled) in updates {
            flags.insert(key, enabled);
        }
    }

    /// Copy of every flag, taken under a single read lock.
    pub fn all_flags(&self) -> BTreeMap<MetricKey, bool> {
        self.flags.read().clone()
    }

    /// Consistent view used by the worker for one tick.
    pub fn snapshot(&self) -> EnabledSet {
        EnabledSet {
            flags: self.all_flags(),
        }
    }
}

impl Default for StatEnablementRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Frozen copy of the registry.
#[derive(Debug, Clone)]
pub struct EnabledSet {
    flags: BTreeMap<MetricKey, bool>,
}

impl EnabledSet {
    pub fn is_enabled(&self, key: MetricKey) -> bool {
        self.flags.get(&key).copied().unwrap_or(true)
    }

    pub fn any_enabled(&self, tier: Tier) -> bool {
        tier.keys().any(|key| self.is_enabled(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_all_enabled() {
        let registry = StatEnablementRegistry::new();
        assert!(MetricKey::ALL.iter().all(|key| registry.is_enabled(*key)));
        assert_eq!(registry.all_flags().len(), MetricKey::ALL.len());
    }

    #[test]
    fn test_last_write_wins() {
        let registry = StatEnablementRegistry::new();
        registry.set_enabled(MetricKey::GpuFan, false);
        registry.set_enabled(MetricKey::GpuFan, true);
        registry.set_enabled(MetricKey::GpuFan, false);
        assert!(!registry.is_enabled(MetricKey::GpuFan));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let registry = StatEnablementRegistry::new();
        let before = registry.snapshot();
        registry.set_enabled(MetricKey::CpuUsage, false);
        assert!(before.is_enabled(MetricKey::CpuUsage));
        assert!(!registry.snapshot().is_enabled(MetricKey::CpuUsage));
    }

    #[test]
    fn test_any_enabled_per_tier() {
        let registry = StatEnablementRegistry::new();
        registry.set_many(Tier::Gpu.keys().map(|key| (key, false)).collect::<Vec<_>>());
        let set = registry.snapshot();
        assert!(!set.any_enabled(Tier::Gpu));
        assert!(set.any_enabled(Tier::Fast));
    }
}
