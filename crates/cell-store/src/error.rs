use thiserror::Error;

/// Errors produced by the record store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("shared record lock poisoned")]
    Poisoned,
}
