// Thin re-export module: the ledger lives in `blockchain/core.rs`, split
// into chain management, balance replay, and validation.

pub mod core;
pub use self::core::*;
