//! Foundation types for the hypercell storage engine.
//!
//! This crate provides the identity and protocol types shared by every other
//! hypercell crate.
//!
//! # Key Types
//!
//! - [`ResourceKey`] — Opaque namespaced identity for a fungible resource
//! - [`Denomination`] — A resource form plus its conversion rate to base units
//! - [`TransferMode`] — Simulate (dry-run) vs. Modulate (committed) transfers
//! - [`CellStatus`] — Coarse fill state reported to UI and observability layers

pub mod denomination;
pub mod error;
pub mod mode;
pub mod resource;
pub mod status;

pub use denomination::Denomination;
pub use error::TypeError;
pub use mode::TransferMode;
pub use resource::ResourceKey;
pub use status::CellStatus;
