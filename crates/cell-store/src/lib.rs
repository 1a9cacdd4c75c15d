//! Key/value persisted-record tree for the hypercell storage engine.
//!
//! The host persists cell state in an NBT-style tree of named values. This
//! crate models that store: a [`Record`] maps string keys to [`Value`]s
//! (integers, integer arrays, text, lists, and nested records), and a
//! [`SharedRecord`] is an aliasable handle — multiple independently
//! constructed ledgers may wrap the same backing record, which is exactly the
//! external-aliasing hazard the ledger's version stamping exists for.
//!
//! Getters are lenient by contract: a missing or differently-typed field
//! reads as absent, never as an error. Hosts whose integer support tops out
//! at 32 bits store wide counters as two halves; [`Record::get_u64`] accepts
//! either encoding transparently.

pub mod error;
pub mod record;
pub mod shared;
pub mod value;

pub use error::StoreError;
pub use record::Record;
pub use shared::SharedRecord;
pub use value::{join_u64, split_u64, LongFormat, Value};
