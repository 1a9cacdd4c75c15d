//! In-memory collaborator implementations for tests and embedding.

use std::sync::RwLock;

use cell_types::{Denomination, ResourceKey};

use crate::traits::{
    DenominationDiscovery, PartitionConfig, StorageGridObserver, UpgradeState,
};

/// Table-driven discovery backed by statically registered chains.
///
/// Each registered chain lists a full family, most-concentrated first, with
/// rates relative to its own least-concentrated form. `chain()` windows the
/// family by the requested tier counts and rebases rates so the
/// least-concentrated form inside the window reads as rate 1.
#[derive(Default)]
pub struct StaticChains {
    chains: Vec<Vec<Denomination>>,
}

impl StaticChains {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chain(mut self, chain: Vec<Denomination>) -> Self {
        self.chains.push(chain);
        self
    }
}

impl DenominationDiscovery for StaticChains {
    fn chain(&self, key: &ResourceKey, tiers_up: u32, tiers_down: u32) -> Vec<Denomination> {
        for family in &self.chains {
            let Some(position) = family.iter().position(|d| d.key == *key) else {
                continue;
            };
            let start = position.saturating_sub(tiers_up as usize);
            let end = (position + tiers_down as usize).min(family.len() - 1);
            let window = &family[start..=end];

            let base = window.last().map(|d| d.rate).unwrap_or(1).max(1);
            return window
                .iter()
                .map(|d| {
                    let rate = if d.rate % base == 0 { d.rate / base } else { d.rate };
                    Denomination::new(d.key.clone(), rate)
                })
                .collect();
        }
        Vec::new()
    }
}

/// Partition configuration held in memory.
#[derive(Default)]
pub struct MemoryPartition {
    inner: RwLock<Option<ResourceKey>>,
}

impl MemoryPartition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(key: ResourceKey) -> Self {
        Self {
            inner: RwLock::new(Some(key)),
        }
    }
}

impl PartitionConfig for MemoryPartition {
    fn get(&self) -> Option<ResourceKey> {
        self.inner.read().ok().and_then(|guard| guard.clone())
    }

    fn set(&self, key: Option<ResourceKey>) {
        if let Ok(mut guard) = self.inner.write() {
            *guard = key;
        }
    }
}

#[derive(Clone, Copy, Default)]
struct Installed {
    overflow_void: bool,
    equal_distribution: Option<u32>,
    tiers_up: u32,
    tiers_down: u32,
}

/// Mutable in-memory upgrade-card state.
///
/// Setters take `&self` so cards can be swapped between operations while the
/// ledger holds the handle, matching how hosts hot-swap cards at runtime.
#[derive(Default)]
pub struct InstalledUpgrades {
    inner: RwLock<Installed>,
}

impl InstalledUpgrades {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_overflow_void(&self, installed: bool) {
        if let Ok(mut guard) = self.inner.write() {
            guard.overflow_void = installed;
        }
    }

    pub fn set_equal_distribution(&self, limit: Option<u32>) {
        if let Ok(mut guard) = self.inner.write() {
            guard.equal_distribution = limit;
        }
    }

    pub fn set_compression_tiers(&self, up: u32, down: u32) {
        if let Ok(mut guard) = self.inner.write() {
            guard.tiers_up = up;
            guard.tiers_down = down;
        }
    }

    fn read(&self) -> Installed {
        self.inner.read().map(|guard| *guard).unwrap_or_default()
    }
}

impl UpgradeState for InstalledUpgrades {
    fn has_overflow_void(&self) -> bool {
        self.read().overflow_void
    }

    fn equal_distribution_limit(&self) -> Option<u32> {
        self.read().equal_distribution
    }

    fn compression_tiers_up(&self) -> u32 {
        self.read().tiers_up
    }

    fn compression_tiers_down(&self) -> u32 {
        self.read().tiers_down
    }
}

/// Observer that records every delta it receives, for assertions.
#[derive(Default)]
pub struct RecordingObserver {
    events: RwLock<Vec<(ResourceKey, i128)>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(ResourceKey, i128)> {
        self.events.read().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.events.write() {
            guard.clear();
        }
    }
}

impl StorageGridObserver for RecordingObserver {
    fn notify_delta(&self, key: &ResourceKey, delta: i128) {
        if let Ok(mut guard) = self.events.write() {
            guard.push((key.clone(), delta));
        }
    }
}
