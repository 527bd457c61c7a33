//! TaskPay Wallet Core
//!
//! Append-only financial ledger with per-user hash chains, plus the
//! persistent stores and row-level locking that the settlement engine
//! builds on.
//!
//! # Architecture
//!
//! - **Ledger as source of truth**: balances are derived by folding a
//!   user's immutable entries, never stored
//! - **Atomic multi-row writes**: every settlement commits through a
//!   single RocksDB `WriteBatch`
//! - **Row-level locking**: user and job rows are serialized through a
//!   keyed lock table with bounded waits
//! - **Tamper evidence**: each user's entries form a SHA-256 hash chain
//!
//! # Invariants
//!
//! - No zero-amount entries, enforced at write time
//! - Entries are never modified or deleted
//! - Balance always equals the sum of a user's entries

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod config;
pub mod error;
pub mod ledger;
pub mod locks;
pub mod metrics;
pub mod storage;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use ledger::Ledger;
pub use locks::{EntityGuard, LockTable};
pub use storage::Storage;
pub use types::{
    EntryKind, Job, JobStatus, LedgerEntry, RateConfig, User, Withdrawal, WithdrawalStatus,
};
