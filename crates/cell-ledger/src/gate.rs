use std::sync::Arc;

use cell_math::sat_add;
use cell_types::ResourceKey;
use tracing::{debug, warn};

use crate::state::{LedgerState, Pool};
use crate::table::DenominationTable;
use crate::traits::{DenominationDiscovery, PartitionConfig};

/// What a gate sync did to the ledger state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateTransition {
    /// External configuration matches the cached partition.
    Unchanged,
    /// A new partition was committed; the table was rebuilt.
    Adopted,
    /// The partition was cleared while empty; the table was reset.
    Cleared,
    /// An external partition change was rejected and written back, because
    /// the cell still holds items counted under the old identity.
    Reverted,
}

impl GateTransition {
    /// Whether the transition rebuilt or reset the table (version bumped,
    /// caller must persist).
    pub fn table_changed(self) -> bool {
        matches!(self, GateTransition::Adopted | GateTransition::Cleared)
    }
}

/// Guards the partition lifecycle of a cell.
///
/// Unpartitioned → Partitioned-Empty → Partitioned-Occupied. The gate
/// observes the externally-writable partition configuration at the start of
/// every ledger operation and keeps it consistent with the cached identity:
/// an empty cell adopts changes, an occupied cell actively reverts them so
/// items counted under the old identity stay retrievable.
pub struct PartitionGate {
    config: Arc<dyn PartitionConfig>,
}

impl PartitionGate {
    pub fn new(config: Arc<dyn PartitionConfig>) -> Self {
        Self { config }
    }

    /// Reconcile cached state with the external partition configuration,
    /// rebuilding the denomination table with the given tier counts when a
    /// partition is adopted.
    pub fn sync(
        &self,
        state: &mut LedgerState,
        discovery: &dyn DenominationDiscovery,
        tiers_up: u32,
        tiers_down: u32,
    ) -> GateTransition {
        let external = self.config.get();
        if external == state.cached_partition {
            return GateTransition::Unchanged;
        }

        if state.stored_types() > 0 {
            warn!(
                cached = state.cached_partition.as_ref().map(ToString::to_string),
                requested = external.as_ref().map(ToString::to_string),
                "partition change rejected on occupied cell; reverting external config"
            );
            self.config.set(state.cached_partition.clone());
            return GateTransition::Reverted;
        }

        match external {
            Some(key) => {
                let table =
                    DenominationTable::build_from(&key, tiers_up, tiers_down, discovery);
                debug!(partition = %key, tiers = table.len(), "partition adopted");
                state.pools.clear();
                state.pools.push(Pool::new(table));
                state.cached_partition = Some(key);
                state.tiers_up = tiers_up;
                state.tiers_down = tiers_down;
                state.chain_version = sat_add(state.chain_version, 1);
                GateTransition::Adopted
            }
            None => {
                debug!("partition cleared; table reset");
                state.pools.clear();
                state.cached_partition = None;
                state.chain_version = sat_add(state.chain_version, 1);
                GateTransition::Cleared
            }
        }
    }

    /// Whether a resource identity may be stored given current state: a
    /// denomination already in a table, or the raw partition identity before
    /// its table exists. Unpartitioned admission is governed by the type
    /// limit, which is the ledger's call, not the gate's.
    pub fn can_accept(&self, state: &LedgerState, key: &ResourceKey) -> bool {
        if state.locate(key).is_some() {
            return true;
        }
        match &state.cached_partition {
            Some(partition) => state.pools.is_empty() && key == partition,
            None => true,
        }
    }
}
