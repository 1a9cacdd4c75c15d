//! Persistence adapter: maps [`LedgerState`] onto the host's record tree.
//!
//! Loading is lenient by contract — any missing or malformed field degrades
//! to absent/zero state rather than failing. Key names are stable for
//! save-compatibility.

use cell_types::{Denomination, ResourceKey};
use cell_store::{LongFormat, Record};

use crate::state::{LedgerState, Pool};
use crate::table::DenominationTable;

/// Stable record key names.
pub mod keys {
    pub const STORED_BASE_UNITS: &str = "storedBaseUnits";
    pub const CHAIN_VERSION: &str = "chainVersion";
    pub const MAIN_TIER_INDEX: &str = "mainTierIndex";
    pub const CONVERSION_RATES: &str = "conversionRates";
    pub const DENOMINATION_IDENTITIES: &str = "denominationIdentities";
    pub const CACHED_PARTITION_IDENTITY: &str = "cachedPartitionIdentity";
    pub const TIERS_UP: &str = "tiersUp";
    pub const TIERS_DOWN: &str = "tiersDown";
    pub const EXTRA_POOLS: &str = "extraPools";

    pub const IDENTITY: &str = "identity";
    pub const BASE_UNITS: &str = "baseUnits";
    pub const NAMESPACE: &str = "namespace";
    pub const PATH: &str = "path";
}

/// The persisted table-version stamp; 0 when absent.
pub fn read_chain_version(record: &Record) -> u64 {
    record.get_u64(keys::CHAIN_VERSION).unwrap_or(0)
}

/// Load full ledger state from a record. A fresh or malformed record yields
/// empty state.
pub fn load_state(record: &Record) -> LedgerState {
    let chain_version = read_chain_version(record);
    let tiers_up = read_tier(record, keys::TIERS_UP);
    let tiers_down = read_tier(record, keys::TIERS_DOWN);
    let cached_partition = record
        .get_record(keys::CACHED_PARTITION_IDENTITY)
        .and_then(read_identity);

    let stored = record.get_u64(keys::STORED_BASE_UNITS).unwrap_or(0);
    let mut pools = Vec::new();
    match load_primary_table(record) {
        Some(table) => pools.push(Pool {
            table,
            base_units: stored,
        }),
        // A quantity without a usable table is only recoverable when the
        // committed partition tells us what it is.
        None => {
            if stored > 0 {
                if let Some(partition) = &cached_partition {
                    pools.push(Pool {
                        table: DenominationTable::singleton(partition.clone()),
                        base_units: stored,
                    });
                }
            }
        }
    }

    for entry in record.get_list(keys::EXTRA_POOLS).unwrap_or(&[]) {
        let Some(identity) = entry.get_record(keys::IDENTITY).and_then(read_identity)
        else {
            continue;
        };
        let base_units = entry.get_u64(keys::BASE_UNITS).unwrap_or(0);
        pools.push(Pool {
            table: DenominationTable::singleton(identity),
            base_units,
        });
    }

    LedgerState {
        pools,
        cached_partition,
        chain_version,
        tiers_up,
        tiers_down,
    }
}

/// Re-read only the quantities from the record, leaving tables alone.
///
/// Used on the fast path when the persisted chain version matches: an
/// aliased handle may have moved counts without rebuilding any table.
pub fn refresh_quantities(state: &mut LedgerState, record: &Record) {
    if let Some(stored) = record.get_u64(keys::STORED_BASE_UNITS) {
        if let Some(primary) = state.pools.first_mut() {
            primary.base_units = stored;
        }
    }
    let extras: Vec<Pool> = record
        .get_list(keys::EXTRA_POOLS)
        .unwrap_or(&[])
        .iter()
        .filter_map(|entry| {
            let identity = entry.get_record(keys::IDENTITY).and_then(read_identity)?;
            Some(Pool {
                table: DenominationTable::singleton(identity),
                base_units: entry.get_u64(keys::BASE_UNITS).unwrap_or(0),
            })
        })
        .collect();
    state.pools.truncate(1);
    state.pools.extend(extras);
}

/// Write full ledger state into a record, replacing prior ledger fields.
pub fn write_state(state: &LedgerState, record: &mut Record, format: LongFormat) {
    record.put_u64(keys::CHAIN_VERSION, state.chain_version, format);
    record.put_i64(keys::TIERS_UP, i64::from(state.tiers_up));
    record.put_i64(keys::TIERS_DOWN, i64::from(state.tiers_down));

    let primary = state.primary();
    let stored = primary.map(|p| p.base_units).unwrap_or(0);
    record.put_u64(keys::STORED_BASE_UNITS, stored, format);

    let table = primary.map(|p| &p.table);
    let main_index = table
        .and_then(DenominationTable::main_index)
        .map(|i| i as i64)
        .unwrap_or(-1);
    record.put_i64(keys::MAIN_TIER_INDEX, main_index);

    let entries = table.map(DenominationTable::entries).unwrap_or(&[]);
    record.put_long_array(
        keys::CONVERSION_RATES,
        entries.iter().map(|d| d.rate).collect(),
    );
    record.put_list(
        keys::DENOMINATION_IDENTITIES,
        entries.iter().map(|d| identity_record(&d.key)).collect(),
    );

    match &state.cached_partition {
        Some(partition) => {
            record.put_record(keys::CACHED_PARTITION_IDENTITY, identity_record(partition));
        }
        None => {
            record.remove(keys::CACHED_PARTITION_IDENTITY);
        }
    }

    let extras: Vec<Record> = state
        .pools
        .iter()
        .skip(1)
        .filter_map(|pool| {
            let main = pool.table.main()?;
            let mut entry = Record::new();
            entry.put_record(keys::IDENTITY, identity_record(&main.key));
            entry.put_u64(keys::BASE_UNITS, pool.base_units, format);
            Some(entry)
        })
        .collect();
    if extras.is_empty() {
        record.remove(keys::EXTRA_POOLS);
    } else {
        record.put_list(keys::EXTRA_POOLS, extras);
    }
}

fn read_tier(record: &Record, key: &str) -> u32 {
    record
        .get_i64(key)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0)
}

fn read_identity(record: &Record) -> Option<ResourceKey> {
    let namespace = record.get_text(keys::NAMESPACE)?;
    let path = record.get_text(keys::PATH)?;
    ResourceKey::from_parts(namespace, path).ok()
}

fn identity_record(key: &ResourceKey) -> Record {
    let mut record = Record::new();
    record.put_text(keys::NAMESPACE, key.namespace());
    record.put_text(keys::PATH, key.path());
    record
}

fn load_primary_table(record: &Record) -> Option<DenominationTable> {
    let rates = record.get_long_array(keys::CONVERSION_RATES)?;
    let identities = record.get_list(keys::DENOMINATION_IDENTITIES)?;
    if rates.len() != identities.len() {
        return None;
    }
    let mut entries = Vec::with_capacity(rates.len());
    for (rate, identity) in rates.iter().zip(identities) {
        let key = read_identity(identity)?;
        entries.push(Denomination::new(key, *rate));
    }
    let main_index = record.get_i64(keys::MAIN_TIER_INDEX).unwrap_or(-1);
    let main_index = usize::try_from(main_index).ok()?;
    DenominationTable::from_parts(entries, main_index)
}
