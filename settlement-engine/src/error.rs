//! Error types for the settlement engine
//!
//! Every precondition failure is a distinct, named condition so callers can
//! branch on it; nothing is collapsed into a generic failure. `Contention`
//! is retryable with backoff; `Ledger` wraps hard storage failures.

use thiserror::Error;

/// Result type for settlement operations
pub type Result<T> = std::result::Result<T, Error>;

/// Settlement engine errors
#[derive(Error, Debug)]
pub enum Error {
    /// Wallet core / storage error
    #[error("Ledger error: {0}")]
    Ledger(wallet_core::Error),

    /// User not found
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Job not found
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Job exists but is owned by someone else
    #[error("Job {0} is not owned by the caller")]
    JobNotOwned(String),

    /// Operation not legal for the job's current lifecycle state
    #[error("Invalid job state: expected {expected}, found {found}")]
    InvalidState {
        /// State the operation requires
        expected: String,
        /// State actually observed
        found: String,
    },

    /// Daily send limit reached
    #[error("Daily send limit reached")]
    DailyLimitReached,

    /// No active rate configuration
    #[error("No active rate configuration")]
    NoActiveRateConfig,

    /// Non-positive withdrawal amount
    #[error("Withdrawal amount must be greater than zero")]
    InvalidAmount,

    /// Balance below the requested withdrawal amount
    #[error("Insufficient balance for withdrawal")]
    InsufficientBalance,

    /// Unknown referral code at registration
    #[error("Invalid referral code: {0}")]
    InvalidReferralCode(String),

    /// Username already taken
    #[error("Username already exists: {0}")]
    DuplicateUsername(String),

    /// Bounded lock wait exceeded (retryable)
    #[error("Lock contention on entity {0}")]
    Contention(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<wallet_core::Error> for Error {
    fn from(err: wallet_core::Error) -> Self {
        match err {
            wallet_core::Error::UserNotFound(id) => Error::UserNotFound(id),
            wallet_core::Error::JobNotFound(id) => Error::JobNotFound(id),
            wallet_core::Error::Contention(id) => Error::Contention(id),
            other => Error::Ledger(other),
        }
    }
}

impl Error {
    /// Whether the caller may retry with backoff
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Contention(_))
    }
}
