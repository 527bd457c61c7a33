//! Settlement engine for the task-for-reward wallet
//!
//! Orchestrates the job lifecycle over the wallet ledger:
//!
//! - **Claims**: exactly-once binding of a pending job to a worker, FIFO
//! - **Settlement**: on completion, credit the earning plus referral
//!   bonuses up to three levels, atomically with the job transition
//! - **Withdrawals**: eager fund locking through negative ledger entries
//! - **Users**: registration with referral linkage, daily counter resets
//! - **Rates**: a single active earning rate config
//!
//! All monetary writes go through `wallet-core`'s atomic storage; all
//! read-modify-write sequences hold per-entity row locks, user before job.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod config;
pub mod engine;
pub mod error;
pub mod rates;
pub mod referral;
pub mod scheduler;
pub mod users;
pub mod withdrawal;

pub use config::{Config, ReferralConfig};
pub use engine::SettlementEngine;
pub use error::{Error, Result};
pub use rates::RatePolicy;
pub use referral::{ReferralGraph, MAX_REFERRAL_DEPTH};
pub use scheduler::DailyResetScheduler;
pub use users::UserDirectory;
pub use withdrawal::WithdrawalEngine;
