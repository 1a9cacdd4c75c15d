use cell_types::{Denomination, ResourceKey};

/// Resolves the compressed/decompressed family of a resource.
///
/// Implementations live host-side: they know which block, ingot, and nugget
/// forms exist for a given base resource. The engine only consumes the
/// resulting chain.
pub trait DenominationDiscovery: Send + Sync {
    /// The chain of forms around `key`: up to `tiers_up` more-concentrated
    /// forms, the key itself, and up to `tiers_down` less-concentrated
    /// forms, ordered most-concentrated first. Rates are relative to the
    /// least-concentrated returned form, which has rate 1.
    ///
    /// Returns an empty chain when no data source is available; the caller
    /// degrades to a single rate-1 denomination.
    fn chain(&self, key: &ResourceKey, tiers_up: u32, tiers_down: u32) -> Vec<Denomination>;
}

/// The externally-writable partition configuration of a cell.
///
/// Read by the partition gate at the start of every operation; written back
/// by the gate when an external change must be reverted.
pub trait PartitionConfig: Send + Sync {
    fn get(&self) -> Option<ResourceKey>;
    fn set(&self, key: Option<ResourceKey>);
}

/// Installed upgrade cards, queried fresh at the start of every operation.
///
/// Never cache the answers across operations: cards can be swapped between
/// any two calls.
pub trait UpgradeState: Send + Sync {
    /// Overflow-void card: surplus of an already-known identity is discarded
    /// instead of returned.
    fn has_overflow_void(&self) -> bool {
        false
    }

    /// Equal-distribution card: capacity is split evenly across this many
    /// resource-type slots.
    fn equal_distribution_limit(&self) -> Option<u32> {
        None
    }

    /// Compression tiers above the partition resource.
    fn compression_tiers_up(&self) -> u32 {
        0
    }

    /// Decompression tiers below the partition resource.
    fn compression_tiers_down(&self) -> u32 {
        0
    }
}

/// Sink for cross-denomination stock deltas.
///
/// One pool backs every denomination of a family, so mutating one form moves
/// the displayed count of every other form. Subscribing aggregation layers
/// receive those secondary deltas here instead of polling.
pub trait StorageGridObserver: Send + Sync {
    fn notify_delta(&self, key: &ResourceKey, delta: i128);
}
