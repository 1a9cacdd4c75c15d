use cell_store::StoreError;
use thiserror::Error;

/// Errors produced by ledger operations.
///
/// Ordinary rejection ("does not fit", "not stored here") is communicated
/// through return values, never through this type. The variants below are
/// operator-facing conditions: a collaborator bypassed the reload protocol,
/// or the shared record itself is unusable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// A save was attempted over a newer persisted table. Another ledger
    /// instance rebuilt the denomination table and this instance skipped the
    /// reload check; committing would destroy the newer table.
    #[error("stale chain version: local {local} behind persisted {persisted}")]
    StaleChainVersion { local: u64, persisted: u64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}
