use cell_types::{Denomination, ResourceKey};
use tracing::warn;

use crate::traits::DenominationDiscovery;

/// Ordered denominations of one resource family sharing a single pool.
///
/// Entries run from most-concentrated (index 0) to least-concentrated; the
/// `main` entry is the one matching the active partition and need not be
/// index 0. Every entry's rate is positive; the empty table has no main.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DenominationTable {
    entries: Vec<Denomination>,
    main_index: usize,
}

impl DenominationTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// A degenerate single-denomination table with rate 1.
    pub fn singleton(key: ResourceKey) -> Self {
        Self {
            entries: vec![Denomination::new(key, 1)],
            main_index: 0,
        }
    }

    /// Build the table for `key` from the discovery collaborator.
    ///
    /// Zero-rate entries are dropped. When discovery yields nothing usable,
    /// or the key itself is missing from the chain, the table degenerates to
    /// a single rate-1 denomination for `key`.
    pub fn build_from(
        key: &ResourceKey,
        tiers_up: u32,
        tiers_down: u32,
        discovery: &dyn DenominationDiscovery,
    ) -> Self {
        let mut entries: Vec<Denomination> = Vec::new();
        for denom in discovery.chain(key, tiers_up, tiers_down) {
            if denom.rate == 0 {
                warn!(key = %denom.key, "dropping zero-rate denomination from chain");
                continue;
            }
            entries.push(denom);
        }

        let Some(main_index) = entries.iter().position(|d| d.key == *key) else {
            return Self::singleton(key.clone());
        };
        Self {
            entries,
            main_index,
        }
    }

    /// Restore a table from persisted parts; `None` when the parts are not a
    /// valid table (load then degrades to absent state).
    pub fn from_parts(entries: Vec<Denomination>, main_index: usize) -> Option<Self> {
        if entries.is_empty() || main_index >= entries.len() {
            return None;
        }
        if entries.iter().any(|d| d.rate == 0) {
            return None;
        }
        Some(Self {
            entries,
            main_index,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[Denomination] {
        &self.entries
    }

    pub fn find_index(&self, key: &ResourceKey) -> Option<usize> {
        self.entries.iter().position(|d| d.key == *key)
    }

    pub fn get(&self, index: usize) -> Option<&Denomination> {
        self.entries.get(index)
    }

    pub fn main(&self) -> Option<&Denomination> {
        self.entries.get(self.main_index)
    }

    /// Index of the main denomination, `None` for the empty table.
    pub fn main_index(&self) -> Option<usize> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.main_index)
        }
    }

    /// Conversion rate of the main denomination; 1 for the empty table.
    pub fn main_rate(&self) -> u64 {
        self.main().map(|d| d.rate).unwrap_or(1)
    }
}
