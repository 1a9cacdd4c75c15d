//! Accounting engine for fungible-resource storage cells.
//!
//! A cell stores one family of interchangeable resource forms (think metal
//! blocks, ingots and nuggets) behind a single base-unit counter. This crate
//! owns everything between the host's persisted record and the insert/extract
//! surface:
//!
//! - [`DenominationTable`]: the ordered conversion-rate table for a family,
//!   built from a [`DenominationDiscovery`] source and windowed by the
//!   installed compression tier cards.
//! - [`CapacityProfile`]: the byte-capacity model, including the per-type
//!   overhead charge and the rounding reserve that keeps ceiling-rounded
//!   used-bytes displays within the total.
//! - [`PartitionGate`]: the partition lifecycle guard; occupied cells revert
//!   external partition changes instead of stranding their contents.
//! - [`CellLedger`]: the operation surface. Ledgers are aliasable: several
//!   instances may wrap one [`cell_store::SharedRecord`], reconciling through
//!   quantity re-reads and a version-stamped table reload protocol.
//!
//! In-memory collaborator implementations for tests and embedding live in
//! [`memory`].

pub mod capacity;
pub mod error;
pub mod gate;
pub mod memory;
pub mod persist;
pub mod state;
pub mod table;
pub mod traits;

mod ledger;

pub use capacity::CapacityProfile;
pub use error::LedgerError;
pub use gate::{GateTransition, PartitionGate};
pub use ledger::{CellHost, CellLedger};
pub use state::{LedgerState, Pool};
pub use table::DenominationTable;
pub use traits::{
    DenominationDiscovery, PartitionConfig, StorageGridObserver, UpgradeState,
};
