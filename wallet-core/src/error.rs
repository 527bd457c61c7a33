//! Error types for the wallet core

use thiserror::Error;

/// Result type for wallet operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wallet core errors
#[derive(Error, Debug)]
pub enum Error {
    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Ledger entry with a zero amount
    #[error("Ledger entry amount must not be zero")]
    ZeroAmountEntry,

    /// Entry not found
    #[error("Ledger entry not found: {0}")]
    EntryNotFound(String),

    /// User not found
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Job not found
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Withdrawal not found
    #[error("Withdrawal not found: {0}")]
    WithdrawalNotFound(String),

    /// Hash chain verification failed
    #[error("Ledger chain integrity violation: {0}")]
    ChainIntegrity(String),

    /// Bounded lock wait exceeded (retryable)
    #[error("Lock contention on entity {0}")]
    Contention(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
