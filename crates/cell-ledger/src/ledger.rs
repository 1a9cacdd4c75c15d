use std::sync::Arc;

use cell_math::{estimate_used_bytes, sat_add, sat_mul, sat_sub, sat_sub_or_keep};
use cell_store::{LongFormat, SharedRecord};
use cell_types::{CellStatus, ResourceKey, TransferMode};
use tracing::{debug, error};

use crate::capacity::CapacityProfile;
use crate::error::LedgerError;
use crate::gate::PartitionGate;
use crate::persist;
use crate::state::Pool;
use crate::table::DenominationTable;
use crate::traits::{
    DenominationDiscovery, PartitionConfig, StorageGridObserver, UpgradeState,
};

/// Host-side collaborators a cell ledger talks to.
///
/// Upgrade state is re-queried through the handle at the start of every
/// operation, never cached across operations.
pub struct CellHost {
    pub discovery: Arc<dyn DenominationDiscovery>,
    pub partition: Arc<dyn PartitionConfig>,
    pub upgrades: Arc<dyn UpgradeState>,
    pub observers: Vec<Arc<dyn StorageGridObserver>>,
}

impl CellHost {
    pub fn new(
        discovery: Arc<dyn DenominationDiscovery>,
        partition: Arc<dyn PartitionConfig>,
        upgrades: Arc<dyn UpgradeState>,
    ) -> Self {
        Self {
            discovery,
            partition,
            upgrades,
            observers: Vec::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn StorageGridObserver>) -> Self {
        self.observers.push(observer);
        self
    }
}

/// The accounting engine for one storage cell.
///
/// A ledger wraps a [`SharedRecord`]; several independently constructed
/// ledgers may wrap the same record, so every operation starts by
/// reconciling against the persisted state: quantities are re-read, and a
/// changed chain version forces a full table reload before anything trusts
/// the table. Every `Modulate` mutation persists before returning;
/// `Simulate` never writes.
pub struct CellLedger {
    record: SharedRecord,
    profile: CapacityProfile,
    gate: PartitionGate,
    host: CellHost,
    format: LongFormat,
    state: crate::state::LedgerState,
}

impl CellLedger {
    /// Wrap a persisted record, loading whatever state it already holds.
    pub fn wrap(
        record: SharedRecord,
        profile: CapacityProfile,
        host: CellHost,
    ) -> Result<Self, LedgerError> {
        let state = record.read(persist::load_state)?;
        let gate = PartitionGate::new(host.partition.clone());
        Ok(Self {
            record,
            profile,
            gate,
            host,
            format: LongFormat::default(),
            state,
        })
    }

    /// Use the split 32-bit-halves encoding for wide counters, for host
    /// formats without native 64-bit integers.
    pub fn with_long_format(mut self, format: LongFormat) -> Self {
        self.format = format;
        self
    }

    /// The table-version stamp this instance last observed.
    pub fn chain_version(&self) -> u64 {
        self.state.chain_version
    }

    // -----------------------------------------------------------------
    // Insert / extract
    // -----------------------------------------------------------------

    /// Offer `amount` units of `key`; returns the remainder that was not
    /// accepted, in the caller's denomination.
    pub fn insert(
        &mut self,
        key: &ResourceKey,
        amount: u64,
        mode: TransferMode,
    ) -> Result<u64, LedgerError> {
        self.refresh()?;
        if amount == 0 {
            return Ok(0);
        }

        let located = self.state.locate(key);
        let known = located.is_some();

        let slot = match located {
            Some(slot) => Some(slot),
            None => match self.admit(key)? {
                Admission::Rejected => return Ok(amount),
                Admission::Existing(slot) => Some(slot),
                Admission::NewSingleton => None,
            },
        };

        let (rate, pool_base, main_rate) = match slot {
            Some((pi, di)) => {
                let pool = &self.state.pools[pi];
                let rate = pool.table.get(di).map(|d| d.rate).unwrap_or(1);
                (rate, pool.base_units, pool.main_rate())
            }
            None => (1, 0, 1),
        };

        let remaining = sat_sub(self.pool_capacity(main_rate), pool_base);
        let accepted = sat_mul(amount, rate).min(remaining) / rate;

        if accepted > 0 && mode.is_modulate() {
            let (pi, di) = match slot {
                Some(slot) => slot,
                None => {
                    // A new pool changes the persisted table set; aliased
                    // handles must reload it rather than fast-path the
                    // quantities.
                    self.state.pools.push(Pool::singleton(key.clone()));
                    self.state.chain_version = sat_add(self.state.chain_version, 1);
                    (self.state.pools.len() - 1, 0)
                }
            };
            let old = self.state.pools[pi].base_units;
            let new = sat_add(old, sat_mul(accepted, rate));
            self.state.pools[pi].base_units = new;
            let deltas = cross_deltas(&self.state.pools[pi].table, di, old, new);
            self.persist()?;
            self.emit(&deltas);
        }

        let mut remainder = sat_sub_or_keep(amount, accepted);
        if remainder > 0 && known && self.host.upgrades.has_overflow_void() {
            debug!(key = %key, voided = remainder, "overflow-void discarded remainder");
            remainder = 0;
        }
        Ok(remainder)
    }

    /// Request `amount` units of `key`; returns how many were supplied.
    pub fn extract(
        &mut self,
        key: &ResourceKey,
        amount: u64,
        mode: TransferMode,
    ) -> Result<u64, LedgerError> {
        self.refresh()?;
        if amount == 0 {
            return Ok(0);
        }
        let Some((pi, di)) = self.state.locate(key) else {
            return Ok(0);
        };
        let rate = self.state.pools[pi].table.get(di).map(|d| d.rate).unwrap_or(1);
        let available = self.state.pools[pi].base_units / rate;
        let taken = amount.min(available);

        if taken > 0 && mode.is_modulate() {
            let old = self.state.pools[pi].base_units;
            let new = sat_sub(old, sat_mul(taken, rate));
            self.state.pools[pi].base_units = new;
            let deltas = cross_deltas(&self.state.pools[pi].table, di, old, new);
            // An emptied pool frees its type slot, except the partition
            // family, which stays committed. Dropping a pool changes the
            // persisted table set, so the version moves too.
            if new == 0 && self.state.cached_partition.is_none() {
                self.state.pools.remove(pi);
                self.state.chain_version = sat_add(self.state.chain_version, 1);
            }
            self.persist()?;
            self.emit(&deltas);
        }
        Ok(taken)
    }

    /// Every denomination with a positive displayed count, derived from the
    /// shared base-unit pools.
    pub fn query_available(&mut self) -> Result<Vec<(ResourceKey, u64)>, LedgerError> {
        self.refresh()?;
        let mut lines = Vec::new();
        for pool in &self.state.pools {
            for denom in pool.table.entries() {
                let count = denom.displayed(pool.base_units);
                if count > 0 {
                    lines.push((denom.key.clone(), count));
                }
            }
        }
        Ok(lines)
    }

    // -----------------------------------------------------------------
    // Byte and count queries
    // -----------------------------------------------------------------

    pub fn total_bytes(&self) -> u64 {
        self.profile.total_bytes()
    }

    /// Real bytes consumed. Exact (ceiling-based) until the capacity figures
    /// saturate, then a float ratio estimate for display; never consulted by
    /// insert/extract.
    pub fn used_bytes(&mut self) -> Result<u64, LedgerError> {
        self.refresh()?;
        let total = self.profile.total_bytes();
        let saturated = total == u64::MAX;
        let mut used = 0u64;
        for pool in &self.state.pools {
            let main_rate = pool.main_rate();
            let bytes = if saturated {
                let capacity = self.pool_capacity(main_rate).max(1);
                estimate_used_bytes(pool.base_units, capacity, total)
            } else {
                self.profile.pool_used_bytes(pool.base_units, main_rate)
            };
            used = sat_add(used, bytes);
        }
        Ok(used.min(total))
    }

    pub fn free_bytes(&mut self) -> Result<u64, LedgerError> {
        let used = self.used_bytes()?;
        Ok(sat_sub(self.profile.total_bytes(), used))
    }

    /// Stored units, displayed in each pool's main denomination.
    pub fn stored_count(&mut self) -> Result<u64, LedgerError> {
        self.refresh()?;
        Ok(self
            .state
            .pools
            .iter()
            .fold(0u64, |acc, p| sat_add(acc, p.base_units / p.main_rate())))
    }

    pub fn stored_types(&mut self) -> Result<usize, LedgerError> {
        self.refresh()?;
        Ok(self.state.stored_types())
    }

    /// Remaining units in the main denomination of the active family.
    pub fn remaining_count(&mut self) -> Result<u64, LedgerError> {
        self.refresh()?;
        match self.active_distribution() {
            Some(slots) => Ok(sat_sub(
                self.profile.distributed_total(slots),
                self.state.total_base_units(),
            )),
            None => {
                let (main_rate, charged, base) = match self.state.primary() {
                    Some(pool) => (pool.main_rate(), true, pool.base_units),
                    None => (1, false, 0),
                };
                let max = self.profile.max_base_units(main_rate, charged);
                Ok(sat_sub(max, base) / main_rate)
            }
        }
    }

    pub fn remaining_types(&mut self) -> Result<usize, LedgerError> {
        self.refresh()?;
        Ok(self.type_limit().saturating_sub(self.state.stored_types()))
    }

    /// Coarse fill status, in priority order.
    pub fn status(&mut self) -> Result<CellStatus, LedgerError> {
        self.refresh()?;
        if self.state.total_base_units() == 0 && self.state.stored_types() == 0 {
            return Ok(CellStatus::Empty);
        }
        if self.state.stored_types() < self.type_limit() && self.pool_capacity(1) > 0 {
            return Ok(CellStatus::HasRoomForNewType);
        }
        let existing_room = self.state.pools.iter().any(|pool| {
            sat_sub(self.pool_capacity(pool.main_rate()), pool.base_units) > 0
        });
        if existing_room {
            return Ok(CellStatus::HasRoomInExistingType);
        }
        Ok(CellStatus::Full)
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    /// Reconcile with the persisted record and the live collaborators before
    /// trusting any in-memory state.
    fn refresh(&mut self) -> Result<(), LedgerError> {
        let snapshot = self.record.snapshot()?;
        let persisted = persist::read_chain_version(&snapshot);
        if persisted != self.state.chain_version {
            debug!(
                local = self.state.chain_version,
                persisted, "persisted table changed under an aliased handle; reloading"
            );
            self.state = persist::load_state(&snapshot);
        } else {
            persist::refresh_quantities(&mut self.state, &snapshot);
        }

        let tiers_up = self.host.upgrades.compression_tiers_up();
        let tiers_down = self.host.upgrades.compression_tiers_down();

        let transition = self.gate.sync(
            &mut self.state,
            self.host.discovery.as_ref(),
            tiers_up,
            tiers_down,
        );
        if transition.table_changed() {
            self.persist()?;
        }

        if let Some(partition) = self.state.cached_partition.clone() {
            if (tiers_up, tiers_down) != (self.state.tiers_up, self.state.tiers_down) {
                let base = self.state.primary().map(|p| p.base_units).unwrap_or(0);
                let table = DenominationTable::build_from(
                    &partition,
                    tiers_up,
                    tiers_down,
                    self.host.discovery.as_ref(),
                );
                self.state.pools.clear();
                self.state.pools.push(Pool {
                    table,
                    base_units: base,
                });
                self.state.tiers_up = tiers_up;
                self.state.tiers_down = tiers_down;
                self.state.chain_version = sat_add(self.state.chain_version, 1);
                debug!(
                    version = self.state.chain_version,
                    "tier cards changed; table rebuilt with quantity preserved"
                );
                self.persist()?;
            }
        }
        Ok(())
    }

    /// Flush in-memory state to the shared record, refusing to clobber a
    /// newer persisted table.
    fn persist(&self) -> Result<(), LedgerError> {
        let state = &self.state;
        let format = self.format;
        self.record.write(|record| {
            let persisted = persist::read_chain_version(record);
            if persisted > state.chain_version {
                error!(
                    local = state.chain_version,
                    persisted, "refusing to save over a newer denomination table"
                );
                return Err(LedgerError::StaleChainVersion {
                    local: state.chain_version,
                    persisted,
                });
            }
            persist::write_state(state, record, format);
            Ok(())
        })?
    }

    /// Decide whether an identity with no existing denomination slot may
    /// enter the cell.
    fn admit(&mut self, key: &ResourceKey) -> Result<Admission, LedgerError> {
        if !self.gate.can_accept(&self.state, key) {
            return Ok(Admission::Rejected);
        }
        match self.state.cached_partition.clone() {
            Some(partition) => {
                // Committed partition whose table never got built, e.g. a
                // record restored without its table fields.
                let table = DenominationTable::build_from(
                    &partition,
                    self.state.tiers_up,
                    self.state.tiers_down,
                    self.host.discovery.as_ref(),
                );
                self.state.pools.clear();
                self.state.pools.push(Pool::new(table));
                self.state.chain_version = sat_add(self.state.chain_version, 1);
                self.persist()?;
                match self.state.locate(key) {
                    Some(slot) => Ok(Admission::Existing(slot)),
                    None => Ok(Admission::Rejected),
                }
            }
            None => {
                if self.state.pools.len() >= self.type_limit() {
                    return Ok(Admission::Rejected);
                }
                Ok(Admission::NewSingleton)
            }
        }
    }

    /// Base-unit capacity of one pool under the active capacity regime.
    fn pool_capacity(&self, main_rate: u64) -> u64 {
        match self.active_distribution() {
            Some(slots) => self.profile.per_slot_base_units(slots),
            None => self.profile.max_base_units(main_rate, true),
        }
    }

    fn active_distribution(&self) -> Option<u32> {
        self.host
            .upgrades
            .equal_distribution_limit()
            .filter(|n| *n > 0)
    }

    /// Distinct identities this cell may hold: the partition family counts
    /// as one; unpartitioned cells accept types only under equal
    /// distribution.
    fn type_limit(&self) -> usize {
        if self.state.cached_partition.is_some() {
            1
        } else {
            self.active_distribution().map(|n| n as usize).unwrap_or(0)
        }
    }

    fn emit(&self, deltas: &[(ResourceKey, i128)]) {
        for (key, delta) in deltas {
            for observer in &self.host.observers {
                observer.notify_delta(key, *delta);
            }
        }
    }
}

enum Admission {
    Rejected,
    Existing((usize, usize)),
    NewSingleton,
}

/// Stock deltas for every denomination sharing the pool except the one the
/// caller operated on directly.
fn cross_deltas(
    table: &DenominationTable,
    skip: usize,
    old: u64,
    new: u64,
) -> Vec<(ResourceKey, i128)> {
    table
        .entries()
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != skip)
        .filter_map(|(_, denom)| {
            let delta =
                i128::from(new / denom.rate) - i128::from(old / denom.rate);
            (delta != 0).then(|| (denom.key.clone(), delta))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{
        InstalledUpgrades, MemoryPartition, RecordingObserver, StaticChains,
    };
    use crate::persist::keys;
    use cell_types::Denomination;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn key(s: &str) -> ResourceKey {
        ResourceKey::parse(s).unwrap()
    }

    fn iron_chain() -> Vec<Denomination> {
        vec![
            Denomination::new(key("metal:iron_block"), 81),
            Denomination::new(key("metal:iron_ingot"), 9),
            Denomination::new(key("metal:iron_nugget"), 1),
        ]
    }

    struct Rig {
        record: SharedRecord,
        partition: Arc<MemoryPartition>,
        upgrades: Arc<InstalledUpgrades>,
        observer: Arc<RecordingObserver>,
        discovery: Arc<StaticChains>,
        ledger: CellLedger,
    }

    impl Rig {
        fn new(profile: CapacityProfile) -> Self {
            let record = SharedRecord::new();
            let partition = Arc::new(MemoryPartition::new());
            let upgrades = Arc::new(InstalledUpgrades::new());
            let observer = Arc::new(RecordingObserver::new());
            let discovery = Arc::new(StaticChains::new().with_chain(iron_chain()));
            let host = CellHost::new(
                discovery.clone(),
                partition.clone(),
                upgrades.clone(),
            )
            .with_observer(observer.clone());
            let ledger = CellLedger::wrap(record.clone(), profile, host).unwrap();
            Self {
                record,
                partition,
                upgrades,
                observer,
                discovery,
                ledger,
            }
        }

        /// A second ledger instance aliasing the same record and host state.
        fn alias(&self) -> CellLedger {
            let host = CellHost::new(
                self.discovery.clone(),
                self.partition.clone(),
                self.upgrades.clone(),
            );
            CellLedger::wrap(self.record.clone(), self.ledger.profile, host).unwrap()
        }
    }

    fn roomy_profile() -> CapacityProfile {
        CapacityProfile {
            display_bytes: 8,
            byte_multiplier: 1 << 31,
            units_per_byte: 1,
            bytes_per_type: 1,
        }
    }

    fn compacting_rig() -> Rig {
        let rig = Rig::new(roomy_profile());
        rig.upgrades.set_compression_tiers(1, 1);
        rig.partition.set(Some(key("metal:iron_ingot")));
        rig
    }

    #[test]
    fn compacting_scenario_blocks_ingots_nuggets() {
        let mut rig = compacting_rig();

        let remainder = rig
            .ledger
            .insert(&key("metal:iron_block"), 5, TransferMode::Modulate)
            .unwrap();
        assert_eq!(remainder, 0);
        assert_eq!(
            rig.record.read(|r| r.get_u64(keys::STORED_BASE_UNITS)).unwrap(),
            Some(405)
        );

        let extracted = rig
            .ledger
            .extract(&key("metal:iron_nugget"), 40, TransferMode::Modulate)
            .unwrap();
        assert_eq!(extracted, 40);
        assert_eq!(
            rig.record.read(|r| r.get_u64(keys::STORED_BASE_UNITS)).unwrap(),
            Some(365)
        );

        let available = rig.ledger.query_available().unwrap();
        assert_eq!(
            available,
            vec![
                (key("metal:iron_block"), 4),
                (key("metal:iron_ingot"), 40),
                (key("metal:iron_nugget"), 365),
            ]
        );
    }

    #[test]
    fn denomination_counts_derive_from_one_pool() {
        let mut rig = compacting_rig();
        rig.ledger
            .insert(&key("metal:iron_nugget"), 100, TransferMode::Modulate)
            .unwrap();
        let available = rig.ledger.query_available().unwrap();
        assert_eq!(
            available,
            vec![
                (key("metal:iron_block"), 1),
                (key("metal:iron_ingot"), 11),
                (key("metal:iron_nugget"), 100),
            ]
        );
    }

    #[test]
    fn simulate_never_mutates() {
        let mut rig = compacting_rig();
        let remainder = rig
            .ledger
            .insert(&key("metal:iron_block"), 5, TransferMode::Simulate)
            .unwrap();
        assert_eq!(remainder, 0);
        assert_eq!(
            rig.record.read(|r| r.get_u64(keys::STORED_BASE_UNITS)).unwrap(),
            Some(0)
        );
        assert!(rig.ledger.query_available().unwrap().is_empty());

        rig.ledger
            .insert(&key("metal:iron_ingot"), 10, TransferMode::Modulate)
            .unwrap();
        let taken = rig
            .ledger
            .extract(&key("metal:iron_ingot"), 4, TransferMode::Simulate)
            .unwrap();
        assert_eq!(taken, 4);
        assert_eq!(rig.ledger.stored_count().unwrap(), 10);
    }

    #[test]
    fn unpartitioned_cell_rejects_everything() {
        let mut rig = Rig::new(roomy_profile());
        let remainder = rig
            .ledger
            .insert(&key("gem:ruby"), 10, TransferMode::Modulate)
            .unwrap();
        assert_eq!(remainder, 10);
        assert_eq!(rig.ledger.status().unwrap(), CellStatus::Empty);
    }

    #[test]
    fn foreign_identity_rejected_on_partitioned_cell() {
        let mut rig = compacting_rig();
        let remainder = rig
            .ledger
            .insert(&key("gem:ruby"), 10, TransferMode::Modulate)
            .unwrap();
        assert_eq!(remainder, 10);
    }

    #[test]
    fn capacity_clamps_and_reports_remainder() {
        // total 16 real bytes, 2 of them type overhead, 2 units/byte,
        // rate 1: max = 14 * 2 - 1 = 27 base units.
        let profile = CapacityProfile {
            display_bytes: 8,
            byte_multiplier: 2,
            units_per_byte: 2,
            bytes_per_type: 1,
        };
        let mut rig = Rig::new(profile);
        rig.partition.set(Some(key("gem:ruby")));

        let remainder = rig
            .ledger
            .insert(&key("gem:ruby"), 40, TransferMode::Modulate)
            .unwrap();
        assert_eq!(remainder, 13);
        assert_eq!(rig.ledger.stored_count().unwrap(), 27);
        assert_eq!(rig.ledger.remaining_count().unwrap(), 0);
        assert_eq!(rig.ledger.status().unwrap(), CellStatus::Full);

        let rejected = rig
            .ledger
            .insert(&key("gem:ruby"), 1, TransferMode::Modulate)
            .unwrap();
        assert_eq!(rejected, 1);
    }

    #[test]
    fn insert_clamps_to_whole_caller_units() {
        // max = 14*2*9 - 17 = 235 base units for rate 9.
        let profile = CapacityProfile {
            display_bytes: 8,
            byte_multiplier: 2,
            units_per_byte: 2,
            bytes_per_type: 1,
        };
        let mut rig = Rig::new(profile);
        rig.upgrades.set_compression_tiers(1, 1);
        rig.partition.set(Some(key("metal:iron_ingot")));

        let remainder = rig
            .ledger
            .insert(&key("metal:iron_ingot"), 40, TransferMode::Modulate)
            .unwrap();
        // 26 whole ingots fit (26 * 9 = 234 <= 235).
        assert_eq!(remainder, 14);
        assert_eq!(
            rig.record.read(|r| r.get_u64(keys::STORED_BASE_UNITS)).unwrap(),
            Some(234)
        );
    }

    #[test]
    fn overflow_void_discards_known_remainder_only() {
        let profile = CapacityProfile {
            display_bytes: 8,
            byte_multiplier: 2,
            units_per_byte: 2,
            bytes_per_type: 1,
        };
        let mut rig = Rig::new(profile);
        rig.partition.set(Some(key("gem:ruby")));
        rig.upgrades.set_overflow_void(true);

        let remainder = rig
            .ledger
            .insert(&key("gem:ruby"), 500, TransferMode::Modulate)
            .unwrap();
        assert_eq!(remainder, 0);
        assert_eq!(rig.ledger.stored_count().unwrap(), 27);

        // The card does not bypass the type gate.
        let foreign = rig
            .ledger
            .insert(&key("gem:emerald"), 5, TransferMode::Modulate)
            .unwrap();
        assert_eq!(foreign, 5);
    }

    #[test]
    fn equal_distribution_fairness() {
        // per-slot = (100 - 4*5) * 2 * 16 / 4 - 1 = 639 base units.
        let profile = CapacityProfile {
            display_bytes: 100,
            byte_multiplier: 16,
            units_per_byte: 2,
            bytes_per_type: 5,
        };
        let mut rig = Rig::new(profile);
        rig.upgrades.set_equal_distribution(Some(4));

        for gem in ["gem:ruby", "gem:emerald", "gem:topaz", "gem:quartz"] {
            let remainder = rig
                .ledger
                .insert(&key(gem), 639, TransferMode::Modulate)
                .unwrap();
            assert_eq!(remainder, 0, "slot for {gem} should take its full share");
        }
        assert_eq!(rig.ledger.stored_types().unwrap(), 4);
        assert_eq!(rig.ledger.remaining_types().unwrap(), 0);

        // A fifth identity is rejected regardless of raw capacity.
        let fifth = rig
            .ledger
            .insert(&key("gem:sapphire"), 1, TransferMode::Modulate)
            .unwrap();
        assert_eq!(fifth, 1);

        // Existing slots are each capped at the per-slot share.
        let over = rig
            .ledger
            .insert(&key("gem:ruby"), 1, TransferMode::Modulate)
            .unwrap();
        assert_eq!(over, 1);
        assert_eq!(rig.ledger.status().unwrap(), CellStatus::Full);
        assert!(rig.ledger.used_bytes().unwrap() <= rig.ledger.total_bytes());
    }

    #[test]
    fn emptied_slot_is_freed_for_a_new_type() {
        let profile = CapacityProfile {
            display_bytes: 100,
            byte_multiplier: 16,
            units_per_byte: 2,
            bytes_per_type: 5,
        };
        let mut rig = Rig::new(profile);
        rig.upgrades.set_equal_distribution(Some(2));

        rig.ledger
            .insert(&key("gem:ruby"), 10, TransferMode::Modulate)
            .unwrap();
        rig.ledger
            .insert(&key("gem:emerald"), 10, TransferMode::Modulate)
            .unwrap();
        assert_eq!(
            rig.ledger
                .insert(&key("gem:topaz"), 1, TransferMode::Modulate)
                .unwrap(),
            1
        );

        rig.ledger
            .extract(&key("gem:ruby"), 10, TransferMode::Modulate)
            .unwrap();
        assert_eq!(
            rig.ledger
                .insert(&key("gem:topaz"), 1, TransferMode::Modulate)
                .unwrap(),
            0
        );
    }

    #[test]
    fn cross_denomination_notifications() {
        let mut rig = compacting_rig();

        rig.ledger
            .insert(&key("metal:iron_block"), 5, TransferMode::Modulate)
            .unwrap();
        assert_eq!(
            rig.observer.events(),
            vec![
                (key("metal:iron_ingot"), 45),
                (key("metal:iron_nugget"), 405),
            ]
        );

        rig.observer.clear();
        rig.ledger
            .extract(&key("metal:iron_nugget"), 40, TransferMode::Modulate)
            .unwrap();
        assert_eq!(
            rig.observer.events(),
            vec![(key("metal:iron_block"), -1), (key("metal:iron_ingot"), -5)]
        );
    }

    #[test]
    fn partition_locked_while_occupied() {
        let mut rig = compacting_rig();
        rig.ledger
            .insert(&key("metal:iron_ingot"), 10, TransferMode::Modulate)
            .unwrap();

        rig.partition.set(Some(key("gem:ruby")));
        // Any operation runs the gate, which reverts the external write.
        rig.ledger.status().unwrap();
        assert_eq!(rig.partition.get(), Some(key("metal:iron_ingot")));
        assert_eq!(
            rig.ledger.query_available().unwrap()[1],
            (key("metal:iron_ingot"), 10)
        );
    }

    #[test]
    fn partition_clearable_while_empty() {
        let mut rig = compacting_rig();
        rig.ledger
            .insert(&key("metal:iron_ingot"), 10, TransferMode::Modulate)
            .unwrap();
        rig.ledger
            .extract(&key("metal:iron_ingot"), 10, TransferMode::Modulate)
            .unwrap();

        rig.partition.set(None);
        rig.ledger.status().unwrap();
        assert_eq!(rig.partition.get(), None);
        assert_eq!(rig.ledger.status().unwrap(), CellStatus::Empty);
        // Unpartitioned again: nothing is accepted.
        assert_eq!(
            rig.ledger
                .insert(&key("metal:iron_ingot"), 1, TransferMode::Modulate)
                .unwrap(),
            1
        );
    }

    #[test]
    fn aliased_instances_observe_each_other() {
        let mut rig = compacting_rig();
        let mut other = rig.alias();

        rig.ledger
            .insert(&key("metal:iron_ingot"), 10, TransferMode::Modulate)
            .unwrap();
        assert_eq!(other.stored_count().unwrap(), 10);

        other
            .extract(&key("metal:iron_ingot"), 4, TransferMode::Modulate)
            .unwrap();
        assert_eq!(rig.ledger.stored_count().unwrap(), 6);
    }

    #[test]
    fn new_distributed_pool_is_seen_by_aliased_handles() {
        let profile = CapacityProfile {
            display_bytes: 100,
            byte_multiplier: 16,
            units_per_byte: 2,
            bytes_per_type: 5,
        };
        let mut rig = Rig::new(profile);
        rig.upgrades.set_equal_distribution(Some(2));
        let mut other = rig.alias();

        // other creates the first pool; its table set is new, so the
        // version must move and force rig off the quantity fast path.
        other
            .insert(&key("gem:ruby"), 10, TransferMode::Modulate)
            .unwrap();
        assert_eq!(other.chain_version(), 1);

        rig.ledger
            .insert(&key("gem:emerald"), 10, TransferMode::Modulate)
            .unwrap();

        let mut fresh = rig.alias();
        assert_eq!(
            fresh.query_available().unwrap(),
            vec![(key("gem:ruby"), 10), (key("gem:emerald"), 10)]
        );
        assert_eq!(other.stored_count().unwrap(), 20);
    }

    #[test]
    fn removed_pool_is_seen_by_aliased_handles() {
        let profile = CapacityProfile {
            display_bytes: 100,
            byte_multiplier: 16,
            units_per_byte: 2,
            bytes_per_type: 5,
        };
        let mut rig = Rig::new(profile);
        rig.upgrades.set_equal_distribution(Some(2));
        rig.ledger
            .insert(&key("gem:ruby"), 10, TransferMode::Modulate)
            .unwrap();
        rig.ledger
            .insert(&key("gem:emerald"), 20, TransferMode::Modulate)
            .unwrap();
        let mut other = rig.alias();

        // Emptying ruby drops its pool and promotes emerald to primary;
        // without a reload, other would read emerald's counter under
        // ruby's identity.
        rig.ledger
            .extract(&key("gem:ruby"), 10, TransferMode::Modulate)
            .unwrap();

        assert_eq!(
            other.query_available().unwrap(),
            vec![(key("gem:emerald"), 20)]
        );
        assert_eq!(other.stored_count().unwrap(), 20);
    }

    #[test]
    fn version_mismatch_forces_table_reload() {
        let rig = compacting_rig();
        let mut first = rig.alias();
        // Prime the first instance before the partition is adopted anywhere.
        let mut second = rig.alias();

        // second adopts the partition, rebuilding the table and bumping the
        // persisted version.
        second
            .insert(&key("metal:iron_block"), 2, TransferMode::Modulate)
            .unwrap();
        let v = second.chain_version();

        // first must reload rather than trust its empty table.
        assert_eq!(
            first.query_available().unwrap(),
            vec![
                (key("metal:iron_block"), 2),
                (key("metal:iron_ingot"), 18),
                (key("metal:iron_nugget"), 162),
            ]
        );
        assert_eq!(first.chain_version(), v);
    }

    #[test]
    fn stale_table_save_is_refused() {
        let rig = compacting_rig();
        rig.record
            .write(|r| r.put_u64(keys::CHAIN_VERSION, 99, LongFormat::Native))
            .unwrap();

        // The ledger still believes version 0; a direct save must fail
        // rather than clobber the newer table.
        let error = rig.ledger.persist().unwrap_err();
        assert_eq!(
            error,
            LedgerError::StaleChainVersion {
                local: 0,
                persisted: 99
            }
        );
    }

    #[test]
    fn tier_change_rebuilds_table_preserving_quantity() {
        let mut rig = compacting_rig();
        rig.ledger
            .insert(&key("metal:iron_block"), 5, TransferMode::Modulate)
            .unwrap();
        let version_before = rig.ledger.chain_version();

        // Pull the decompression card: the nugget tier disappears and the
        // ingot becomes the rate-1 base, but the counter is untouched.
        rig.upgrades.set_compression_tiers(1, 0);
        let available = rig.ledger.query_available().unwrap();
        assert_eq!(
            available,
            vec![
                (key("metal:iron_block"), 45),
                (key("metal:iron_ingot"), 405),
            ]
        );
        assert_eq!(
            rig.record.read(|r| r.get_u64(keys::STORED_BASE_UNITS)).unwrap(),
            Some(405)
        );
        assert!(rig.ledger.chain_version() > version_before);
    }

    #[test]
    fn used_bytes_bounded_even_when_saturated() {
        let profile = CapacityProfile {
            display_bytes: u64::MAX,
            byte_multiplier: 2,
            units_per_byte: 1,
            bytes_per_type: 0,
        };
        let mut rig = Rig::new(profile);
        rig.partition.set(Some(key("gem:ruby")));
        rig.ledger
            .insert(&key("gem:ruby"), u64::MAX / 3, TransferMode::Modulate)
            .unwrap();
        assert!(rig.ledger.used_bytes().unwrap() <= rig.ledger.total_bytes());
        assert!(rig.ledger.free_bytes().unwrap() <= rig.ledger.total_bytes());
    }

    #[test]
    fn status_priority_order() {
        let profile = CapacityProfile {
            display_bytes: 100,
            byte_multiplier: 16,
            units_per_byte: 2,
            bytes_per_type: 5,
        };
        let mut rig = Rig::new(profile);
        rig.upgrades.set_equal_distribution(Some(2));

        assert_eq!(rig.ledger.status().unwrap(), CellStatus::Empty);

        rig.ledger
            .insert(&key("gem:ruby"), 1, TransferMode::Modulate)
            .unwrap();
        assert_eq!(rig.ledger.status().unwrap(), CellStatus::HasRoomForNewType);

        let per_slot = rig.ledger.profile.per_slot_base_units(2);
        rig.ledger
            .insert(&key("gem:emerald"), per_slot, TransferMode::Modulate)
            .unwrap();
        assert_eq!(
            rig.ledger.status().unwrap(),
            CellStatus::HasRoomInExistingType
        );

        rig.ledger
            .insert(&key("gem:ruby"), per_slot, TransferMode::Modulate)
            .unwrap();
        assert_eq!(rig.ledger.status().unwrap(), CellStatus::Full);
    }

    #[test]
    fn conservation_over_randomized_operations() {
        let mut rig = compacting_rig();
        let mut rng = StdRng::seed_from_u64(0x5EED);
        let forms = [
            (key("metal:iron_block"), 81u64),
            (key("metal:iron_ingot"), 9),
            (key("metal:iron_nugget"), 1),
        ];

        let mut expected_base: u64 = 0;
        for _ in 0..10_000 {
            let (form, rate) = &forms[rng.gen_range(0..forms.len())];
            let amount = rng.gen_range(0..50u64);
            if rng.gen_bool(0.5) {
                let remainder = rig
                    .ledger
                    .insert(form, amount, TransferMode::Modulate)
                    .unwrap();
                expected_base += (amount - remainder) * rate;
            } else {
                let taken = rig
                    .ledger
                    .extract(form, amount, TransferMode::Modulate)
                    .unwrap();
                expected_base -= taken * rate;
            }
        }

        assert_eq!(
            rig.record.read(|r| r.get_u64(keys::STORED_BASE_UNITS)).unwrap(),
            Some(expected_base)
        );
        // Every denomination line is derived from the same counter.
        for (form, rate) in &forms {
            let listed = rig
                .ledger
                .query_available()
                .unwrap()
                .into_iter()
                .find(|(k, _)| k == form)
                .map(|(_, n)| n)
                .unwrap_or(0);
            assert_eq!(listed, expected_base / rate);
        }
        assert!(rig.ledger.used_bytes().unwrap() <= rig.ledger.total_bytes());
    }
}
