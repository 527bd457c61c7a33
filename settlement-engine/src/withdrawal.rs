//! Withdrawal engine
//!
//! Funds are locked eagerly: the negative debit entry is appended in the
//! same atomic write that persists the withdrawal request. Two requests
//! against the same balance therefore cannot both succeed, at the cost of
//! a rejected withdrawal needing a compensating `AdjustmentCredit` from an
//! administrator (outside this crate).

use crate::{Error, Result};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use wallet_core::{
    types::{EntryKind, LedgerEntry, Withdrawal, WithdrawalStatus},
    Ledger, LockTable, Storage,
};

/// Withdrawal engine over shared storage
#[derive(Clone)]
pub struct WithdrawalEngine {
    storage: Arc<Storage>,
    ledger: Ledger,
    locks: LockTable,
    lock_wait: Duration,
}

impl WithdrawalEngine {
    /// Create a withdrawal engine
    pub fn new(
        storage: Arc<Storage>,
        ledger: Ledger,
        locks: LockTable,
        lock_wait: Duration,
    ) -> Self {
        Self {
            storage,
            ledger,
            locks,
            lock_wait,
        }
    }

    /// Create a withdrawal request, locking funds immediately
    ///
    /// The balance read and the debit append happen under the user's row
    /// lock, so a concurrent request cannot observe the same balance.
    pub fn create(
        &self,
        user_id: Uuid,
        amount: Decimal,
        payment_method: &str,
        payment_details: &str,
    ) -> Result<Withdrawal> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount);
        }

        let _user_guard = self.locks.acquire(user_id, self.lock_wait)?;

        // Existence check before any financial read
        self.storage.get_user(user_id)?;

        let balance = self.ledger.balance_of(user_id)?;
        if balance < amount {
            return Err(Error::InsufficientBalance);
        }

        let withdrawal = Withdrawal::new(user_id, amount, payment_method, payment_details);
        let debit = LedgerEntry::new(
            user_id,
            -amount,
            EntryKind::WithdrawalDebit,
            Some(withdrawal.id),
            "Withdrawal request",
        );

        self.ledger.record_withdrawal(&withdrawal, debit)?;

        tracing::info!(
            withdrawal_id = %withdrawal.id,
            user_id = %user_id,
            %amount,
            "Withdrawal created, funds locked"
        );

        Ok(withdrawal)
    }

    /// Withdrawals for a user, newest first
    pub fn list(&self, user_id: Uuid, offset: usize, limit: usize) -> Result<Vec<Withdrawal>> {
        let mut withdrawals = self.storage.withdrawals_of(user_id)?;
        withdrawals.reverse();
        Ok(withdrawals.into_iter().skip(offset).take(limit).collect())
    }

    /// Withdrawals for a user filtered by status, newest first
    pub fn list_by_status(
        &self,
        user_id: Uuid,
        status: WithdrawalStatus,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Withdrawal>> {
        let mut withdrawals = self.storage.withdrawals_of(user_id)?;
        withdrawals.reverse();
        Ok(withdrawals
            .into_iter()
            .filter(|w| w.status == status)
            .skip(offset)
            .take(limit)
            .collect())
    }
}
