//! UpChain - a single-node proof-of-work ledger with a namespaced asset registry
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, the ledger and chain validation
//! - [`transaction`] - Transaction type and field validation
//! - [`mempool`] - Pending transactions
//! - [`registry`] - Startup, NFT, token and DApp namespaces
//! - [`economics`] - Supply, burn and fee constants
//!
//! ## Consensus
//! - [`miner`] - Cancellable proof-of-work search
//! - [`sync`] - Longest-valid-chain fork choice
//!
//! ## Cryptography
//! - [`crypto`] - Addresses, hashing and canonical encoding
//!
//! ## Node & Networking
//! - [`node`] - Lock-owning node handle
//! - `network` - HTTP peer transport (feature `api`)
//! - `api` - REST API (feature `api`)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod economics;
pub mod mempool;
pub mod registry;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod miner;
pub mod sync;

// ============================================================================
// Cryptography
// ============================================================================
pub mod crypto;

// ============================================================================
// Node & Networking
// ============================================================================
#[cfg(feature = "api")]
pub mod network;
pub mod node;

// ============================================================================
// Integration
// ============================================================================
#[cfg(feature = "api")]
pub mod api;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;

pub use blockchain::{Block, ChainSnapshot, Ledger};
pub use error::{LedgerError, Result};
pub use miner::{CancelToken, MiningOutcome};
pub use transaction::Transaction;
