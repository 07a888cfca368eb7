//! SealChain - a single-process proof-of-work ledger with signed transfers
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, the ledger aggregate, balance replay and validation
//! - [`transaction`] - Transfer types, canonical payload and signature checks
//! - [`mempool`] - Bounded pending transaction pool
//! - [`amount`] - Fixed-point amounts
//!
//! ## Consensus
//! - [`miner`] - Proof-of-work sealing
//!
//! ## Cryptography
//! - [`crypto`] - Hashing, addresses and secp256k1 key pairs
//! - [`addressbook`] - Generated address to private key registry
//!
//! ## State Management
//! - [`persistence`] - Snapshots and the JSON / SQLite / in-memory stores
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//! - [`logging`] - Tracing subscriber setup
//! - [`cli`] - CLI utilities

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod amount;
pub mod blockchain;
pub mod mempool;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod miner;

// ============================================================================
// Cryptography
// ============================================================================
pub mod addressbook;
pub mod crypto;

// ============================================================================
// State Management
// ============================================================================
pub mod persistence;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;

pub use amount::Amount;
pub use blockchain::{Block, Blockchain};
pub use crypto::{Address, KeyPair};
pub use error::{ChainError, Result};
pub use transaction::Transaction;
