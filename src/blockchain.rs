// Thin re-export module: implementation is in `blockchain/core.rs`, split into
// the block/ledger types, the derived index and chain validation.

pub mod core;
pub use self::core::*;
