//! Error types for UpChain

use thiserror::Error;

/// Every failure the ledger core can report. All of them are local and
/// recoverable; the caller decides whether to retry, surface or drop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Invalid amount or fee: {0}")]
    InvalidAmountOrFee(String),
    #[error("Insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: i128, required: u64 },
    #[error("Duplicate key in namespace {namespace}: {key}")]
    DuplicateKey { namespace: String, key: String },
    #[error("Invalid registry field: {0}")]
    InvalidRegistryField(String),
    #[error("Unknown registry namespace: {0}")]
    UnknownNamespace(String),
    #[error("Block rejected: {0}")]
    BlockRejected(String),
    #[error("Chain invalid: {0}")]
    ChainInvalid(String),
    #[error("Peer unreachable: {0}")]
    PeerUnreachable(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, LedgerError>;
