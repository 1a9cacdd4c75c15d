use std::sync::{Arc, RwLock};

use crate::error::StoreError;
use crate::record::Record;

/// An aliasable handle to a persisted record.
///
/// Cloning a `SharedRecord` does not copy the record: both handles address
/// the same backing store, the way two independently constructed ledgers can
/// wrap one durable record on the host. Cross-handle consistency is the
/// ledger's job (version stamping), not this type's; the lock here only
/// keeps individual reads and writes whole.
#[derive(Clone, Default)]
pub struct SharedRecord {
    inner: Arc<RwLock<Record>>,
}

impl SharedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_record(record: Record) -> Self {
        Self {
            inner: Arc::new(RwLock::new(record)),
        }
    }

    /// Run a closure over the current record contents.
    pub fn read<R>(&self, f: impl FnOnce(&Record) -> R) -> Result<R, StoreError> {
        let guard = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&guard))
    }

    /// Run a closure that may mutate the record contents.
    pub fn write<R>(&self, f: impl FnOnce(&mut Record) -> R) -> Result<R, StoreError> {
        let mut guard = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&mut guard))
    }

    /// Snapshot the current record contents.
    pub fn snapshot(&self) -> Result<Record, StoreError> {
        self.read(Record::clone)
    }
}
