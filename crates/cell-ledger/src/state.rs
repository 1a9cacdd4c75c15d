use cell_types::ResourceKey;

use crate::table::DenominationTable;

/// One stored resource family: a denomination table plus the base-unit
/// counter that is the single quantity of record for every form in it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Pool {
    pub table: DenominationTable,
    pub base_units: u64,
}

impl Pool {
    pub fn new(table: DenominationTable) -> Self {
        Self {
            table,
            base_units: 0,
        }
    }

    pub fn singleton(key: ResourceKey) -> Self {
        Self::new(DenominationTable::singleton(key))
    }

    pub fn is_occupied(&self) -> bool {
        self.base_units > 0
    }

    pub fn main_rate(&self) -> u64 {
        self.table.main_rate()
    }
}

/// Full in-memory mirror of a cell's persisted ledger state.
///
/// `chain_version` mirrors the persisted version stamp; it moves only when a
/// denomination table is rebuilt, never on plain quantity changes.
/// `tiers_up`/`tiers_down` record the upgrade-card tier configuration at the
/// last rebuild so a card swap can be detected.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LedgerState {
    pub pools: Vec<Pool>,
    pub cached_partition: Option<ResourceKey>,
    pub chain_version: u64,
    pub tiers_up: u32,
    pub tiers_down: u32,
}

impl LedgerState {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of resource types holding a positive quantity.
    pub fn stored_types(&self) -> usize {
        self.pools.iter().filter(|p| p.is_occupied()).count()
    }

    /// Sum of all pools' base units.
    pub fn total_base_units(&self) -> u64 {
        self.pools
            .iter()
            .fold(0u64, |acc, p| acc.saturating_add(p.base_units))
    }

    /// Locate a resource: `(pool index, denomination index)`.
    pub fn locate(&self, key: &ResourceKey) -> Option<(usize, usize)> {
        self.pools.iter().enumerate().find_map(|(pi, pool)| {
            pool.table.find_index(key).map(|di| (pi, di))
        })
    }

    pub fn primary(&self) -> Option<&Pool> {
        self.pools.first()
    }
}
