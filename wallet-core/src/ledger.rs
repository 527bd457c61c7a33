//! Append-only wallet ledger
//!
//! The ledger is the sole unit of financial truth: entries are write-once,
//! never updated or deleted, and every balance view is a fold over them.
//! Each user's entries form a SHA-256 hash chain so any after-the-fact
//! mutation of stored rows is detectable.
//!
//! Chain stamping reads the stored head for each entry's user before
//! writing, so callers of the appending operations must hold the row lock
//! of every user receiving an entry; unserialized concurrent appends for
//! one user would fork that user's chain.

use crate::{
    metrics::Metrics,
    types::{Job, LedgerEntry, User},
    Error, Result, Storage,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Ledger over persistent storage
#[derive(Clone)]
pub struct Ledger {
    storage: Arc<Storage>,
    metrics: Metrics,
}

impl Ledger {
    /// Create a ledger over existing storage
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            metrics: Metrics::default(),
        }
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Append a single entry
    ///
    /// Rejects zero amounts, stamps the per-user hash chain, and commits
    /// the entry with its indices in one atomic write.
    pub fn append(&self, mut entry: LedgerEntry) -> Result<Uuid> {
        let start = std::time::Instant::now();

        self.validate(&entry)?;

        let mut heads = HashMap::new();
        self.stamp(&mut entry, &mut heads)?;
        self.storage.append_entry_atomic(&entry)?;

        self.metrics.entries_total.inc();
        self.metrics
            .append_duration
            .observe(start.elapsed().as_secs_f64());

        tracing::info!(
            entry_id = %entry.id,
            user_id = %entry.user_id,
            amount = %entry.amount,
            kind = ?entry.kind,
            "Entry appended"
        );

        Ok(entry.id)
    }

    /// Commit a settlement: entries + user counter + job transition, atomically
    ///
    /// Entries are validated and chain-stamped in order; the whole unit
    /// persists or none of it does. The caller must hold the row lock of
    /// every user appearing in `entries`.
    pub fn settle(&self, entries: &mut [LedgerEntry], user: &User, job: &Job) -> Result<()> {
        let mut heads = HashMap::new();
        for entry in entries.iter_mut() {
            self.validate(entry)?;
            self.stamp(entry, &mut heads)?;
        }

        self.storage.settle_atomic(entries, user, job)?;

        self.metrics.entries_total.inc_by(entries.len() as u64);
        self.metrics.settlements_total.inc();
        Ok(())
    }

    /// Persist a withdrawal request together with its locking debit
    pub fn record_withdrawal(
        &self,
        withdrawal: &crate::types::Withdrawal,
        mut debit: LedgerEntry,
    ) -> Result<()> {
        self.validate(&debit)?;

        let mut heads = HashMap::new();
        self.stamp(&mut debit, &mut heads)?;
        self.storage.withdrawal_atomic(withdrawal, &debit)?;

        self.metrics.entries_total.inc();
        Ok(())
    }

    /// Balance as a pure fold over the user's entries
    pub fn balance_of(&self, user_id: Uuid) -> Result<Decimal> {
        self.metrics.balance_reads_total.inc();

        let entries = self.storage.entries_of(user_id)?;
        Ok(entries.iter().map(|e| e.amount).sum())
    }

    /// Entry history, newest first
    pub fn history_of(&self, user_id: Uuid, offset: usize, limit: usize) -> Result<Vec<LedgerEntry>> {
        let mut entries = self.storage.entries_of(user_id)?;
        entries.reverse();
        Ok(entries.into_iter().skip(offset).take(limit).collect())
    }

    /// Recompute a user's hash chain and verify every stored entry
    pub fn verify_chain(&self, user_id: Uuid) -> Result<()> {
        let entries = self.storage.entries_of(user_id)?;

        let mut prev = [0u8; 32];
        for entry in &entries {
            if entry.prev_hash != prev {
                return Err(Error::ChainIntegrity(format!(
                    "entry {} has broken prev link",
                    entry.id
                )));
            }
            if entry.entry_hash != entry.compute_hash() {
                return Err(Error::ChainIntegrity(format!(
                    "entry {} content does not match its hash",
                    entry.id
                )));
            }
            prev = entry.entry_hash;
        }

        if let Some(head) = self.storage.chain_head(user_id)? {
            if head != prev {
                return Err(Error::ChainIntegrity(format!(
                    "chain head mismatch for user {}",
                    user_id
                )));
            }
        }

        Ok(())
    }

    fn validate(&self, entry: &LedgerEntry) -> Result<()> {
        if entry.amount == Decimal::ZERO {
            return Err(Error::ZeroAmountEntry);
        }
        Ok(())
    }

    /// Stamp the hash chain, tracking in-batch heads per user so multiple
    /// entries for one user within a batch chain correctly
    fn stamp(&self, entry: &mut LedgerEntry, heads: &mut HashMap<Uuid, [u8; 32]>) -> Result<()> {
        let prev = match heads.get(&entry.user_id) {
            Some(head) => *head,
            None => self
                .storage
                .chain_head(entry.user_id)?
                .unwrap_or([0u8; 32]),
        };

        entry.prev_hash = prev;
        entry.entry_hash = entry.compute_hash();
        heads.insert(entry.user_id, entry.entry_hash);
        Ok(())
    }
}
