//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `entries` - Append-only ledger entries (key: entry_id)
//! - `jobs` - Job records (key: job_id)
//! - `users` - User records (key: user_id)
//! - `withdrawals` - Withdrawal requests (key: withdrawal_id)
//! - `config` - Single-slot configuration rows (active rate)
//! - `indices` - Secondary indices for ordered scans
//!
//! # Index keys (all in `indices`)
//!
//! - `'e' || user_id || created_at_be || entry_id` - per-user entry order
//! - `'p' || created_at_be || job_id` - pending jobs, FIFO
//! - `'w' || user_id || created_at_be || withdrawal_id` - per-user withdrawals
//! - `'h' || user_id` - per-user hash chain head
//! - `'c' || referral_code` - referral code -> user_id
//! - `'u' || username` - username -> user_id
//!
//! Every multi-row mutation goes through a single `WriteBatch`, so a
//! settlement either persists all of its ledger entries, the counter
//! increment, and the job transition, or none of them.

use crate::{
    error::{Error, Result},
    types::{Job, JobStatus, LedgerEntry, RateConfig, User, Withdrawal},
    Config,
};
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_ENTRIES: &str = "entries";
const CF_JOBS: &str = "jobs";
const CF_USERS: &str = "users";
const CF_WITHDRAWALS: &str = "withdrawals";
const CF_CONFIG: &str = "config";
const CF_INDICES: &str = "indices";

/// Index tags
const IDX_USER_ENTRY: u8 = b'e';
const IDX_PENDING_JOB: u8 = b'p';
const IDX_USER_WITHDRAWAL: u8 = b'w';
const IDX_CHAIN_HEAD: u8 = b'h';
const IDX_REFERRAL_CODE: u8 = b'c';
const IDX_USERNAME: u8 = b'u';

/// Config slot keys
const CONFIG_ACTIVE_RATE: &[u8] = b"active_rate";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ENTRIES, Self::cf_options_append_only()),
            ColumnFamilyDescriptor::new(CF_JOBS, Self::cf_options_mutable()),
            ColumnFamilyDescriptor::new(CF_USERS, Self::cf_options_mutable()),
            ColumnFamilyDescriptor::new(CF_WITHDRAWALS, Self::cf_options_append_only()),
            ColumnFamilyDescriptor::new(CF_CONFIG, Self::cf_options_mutable()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = ?path, "Opened wallet storage");

        Ok(Self { db: Arc::new(db) })
    }

    fn cf_options_append_only() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_mutable() -> Options {
        let mut opts = Options::default();
        // Frequently read rows, favor decode speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // Index key helpers

    fn timestamp_be(at: DateTime<Utc>) -> [u8; 8] {
        at.timestamp_nanos_opt().unwrap_or(0).to_be_bytes()
    }

    fn user_scoped_key(tag: u8, user_id: &Uuid, at: DateTime<Utc>, id: &Uuid) -> Vec<u8> {
        let mut key = Vec::with_capacity(41);
        key.push(tag);
        key.extend_from_slice(user_id.as_bytes());
        key.extend_from_slice(&Self::timestamp_be(at));
        key.extend_from_slice(id.as_bytes());
        key
    }

    fn pending_job_key(job: &Job) -> Vec<u8> {
        let mut key = Vec::with_capacity(25);
        key.push(IDX_PENDING_JOB);
        key.extend_from_slice(&Self::timestamp_be(job.created_at));
        key.extend_from_slice(job.id.as_bytes());
        key
    }

    fn chain_head_key(user_id: &Uuid) -> Vec<u8> {
        let mut key = Vec::with_capacity(17);
        key.push(IDX_CHAIN_HEAD);
        key.extend_from_slice(user_id.as_bytes());
        key
    }

    fn lookup_key(tag: u8, value: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(1 + value.len());
        key.push(tag);
        key.extend_from_slice(value.as_bytes());
        key
    }

    /// Scan `indices` for keys starting with `prefix`, extracting the
    /// trailing 16 bytes of each key as a UUID
    fn scan_index_ids(&self, prefix: &[u8]) -> Result<Vec<Uuid>> {
        let cf = self.cf_handle(CF_INDICES)?;
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, rocksdb::Direction::Forward));

        let mut ids = Vec::new();
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            if key.len() >= 16 {
                let id_bytes: [u8; 16] = key[key.len() - 16..].try_into().unwrap();
                ids.push(Uuid::from_bytes(id_bytes));
            }
        }
        Ok(ids)
    }

    // User operations

    /// Put user with code/username lookup indices (atomic)
    pub fn put_user(&self, user: &User) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_users = self.cf_handle(CF_USERS)?;
        batch.put_cf(cf_users, user.id.as_bytes(), bincode::serialize(user)?);

        let cf_indices = self.cf_handle(CF_INDICES)?;
        batch.put_cf(
            cf_indices,
            Self::lookup_key(IDX_REFERRAL_CODE, &user.referral_code),
            user.id.as_bytes(),
        );
        batch.put_cf(
            cf_indices,
            Self::lookup_key(IDX_USERNAME, &user.username),
            user.id.as_bytes(),
        );

        self.db.write(batch)?;
        Ok(())
    }

    /// Get user by ID
    pub fn get_user(&self, user_id: Uuid) -> Result<User> {
        let cf = self.cf_handle(CF_USERS)?;
        let value = self
            .db
            .get_cf(cf, user_id.as_bytes())?
            .ok_or_else(|| Error::UserNotFound(user_id.to_string()))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// Resolve a referral code to a user ID
    pub fn find_user_by_code(&self, code: &str) -> Result<Option<Uuid>> {
        self.lookup_id(IDX_REFERRAL_CODE, code)
    }

    /// Resolve a username to a user ID
    pub fn find_user_by_username(&self, username: &str) -> Result<Option<Uuid>> {
        self.lookup_id(IDX_USERNAME, username)
    }

    fn lookup_id(&self, tag: u8, value: &str) -> Result<Option<Uuid>> {
        let cf = self.cf_handle(CF_INDICES)?;
        match self.db.get_cf(cf, Self::lookup_key(tag, value))? {
            Some(bytes) if bytes.len() == 16 => {
                let id_bytes: [u8; 16] = bytes[..].try_into().unwrap();
                Ok(Some(Uuid::from_bytes(id_bytes)))
            }
            _ => Ok(None),
        }
    }

    /// IDs of every stored user (snapshot of the scan)
    ///
    /// Used by the daily reset, which re-reads and rewrites each row under
    /// that user's lock rather than batch-writing a stale snapshot.
    pub fn user_ids(&self) -> Result<Vec<Uuid>> {
        let cf = self.cf_handle(CF_USERS)?;

        let mut ids = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _) = item?;
            if key.len() == 16 {
                let id_bytes: [u8; 16] = key[..].try_into().unwrap();
                ids.push(Uuid::from_bytes(id_bytes));
            }
        }
        Ok(ids)
    }

    // Job operations

    /// Put job; pending jobs also get a FIFO index entry (atomic)
    pub fn put_job(&self, job: &Job) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_jobs = self.cf_handle(CF_JOBS)?;
        batch.put_cf(cf_jobs, job.id.as_bytes(), bincode::serialize(job)?);

        if job.status == JobStatus::Pending {
            let cf_indices = self.cf_handle(CF_INDICES)?;
            batch.put_cf(cf_indices, Self::pending_job_key(job), []);
        }

        self.db.write(batch)?;
        Ok(())
    }

    /// Get job by ID
    pub fn get_job(&self, job_id: Uuid) -> Result<Job> {
        let cf = self.cf_handle(CF_JOBS)?;
        let value = self
            .db
            .get_cf(cf, job_id.as_bytes())?
            .ok_or_else(|| Error::JobNotFound(job_id.to_string()))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// Pending job IDs in FIFO order (snapshot of the scan)
    pub fn pending_job_ids(&self) -> Result<Vec<Uuid>> {
        self.scan_index_ids(&[IDX_PENDING_JOB])
    }

    /// Persist a claimed job and drop it from the pending index (atomic)
    pub fn claim_atomic(&self, job: &Job) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_jobs = self.cf_handle(CF_JOBS)?;
        batch.put_cf(cf_jobs, job.id.as_bytes(), bincode::serialize(job)?);

        let cf_indices = self.cf_handle(CF_INDICES)?;
        batch.delete_cf(cf_indices, Self::pending_job_key(job));

        self.db.write(batch)?;

        tracing::debug!(job_id = %job.id, owner = ?job.owner, "Job claimed");
        Ok(())
    }

    // Ledger entry operations

    fn add_entry_to_batch(&self, batch: &mut WriteBatch, entry: &LedgerEntry) -> Result<()> {
        let cf_entries = self.cf_handle(CF_ENTRIES)?;
        batch.put_cf(cf_entries, entry.id.as_bytes(), bincode::serialize(entry)?);

        let cf_indices = self.cf_handle(CF_INDICES)?;
        batch.put_cf(
            cf_indices,
            Self::user_scoped_key(IDX_USER_ENTRY, &entry.user_id, entry.created_at, &entry.id),
            [],
        );
        batch.put_cf(
            cf_indices,
            Self::chain_head_key(&entry.user_id),
            entry.entry_hash,
        );
        Ok(())
    }

    /// Append a single chain-stamped entry with its indices (atomic)
    pub fn append_entry_atomic(&self, entry: &LedgerEntry) -> Result<()> {
        let mut batch = WriteBatch::default();
        self.add_entry_to_batch(&mut batch, entry)?;
        self.db.write(batch)?;

        tracing::debug!(
            entry_id = %entry.id,
            user_id = %entry.user_id,
            amount = %entry.amount,
            "Ledger entry appended"
        );
        Ok(())
    }

    /// Commit a settlement as one atomic unit
    ///
    /// All ledger entries (earning + bonuses), the counter-bearing user row,
    /// and the completed job row persist together or not at all.
    pub fn settle_atomic(&self, entries: &[LedgerEntry], user: &User, job: &Job) -> Result<()> {
        let mut batch = WriteBatch::default();

        for entry in entries {
            self.add_entry_to_batch(&mut batch, entry)?;
        }

        let cf_users = self.cf_handle(CF_USERS)?;
        batch.put_cf(cf_users, user.id.as_bytes(), bincode::serialize(user)?);

        let cf_jobs = self.cf_handle(CF_JOBS)?;
        batch.put_cf(cf_jobs, job.id.as_bytes(), bincode::serialize(job)?);

        self.db.write(batch)?;
        Ok(())
    }

    /// Persist a withdrawal request and its locking debit entry (atomic)
    pub fn withdrawal_atomic(&self, withdrawal: &Withdrawal, debit: &LedgerEntry) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_withdrawals = self.cf_handle(CF_WITHDRAWALS)?;
        batch.put_cf(
            cf_withdrawals,
            withdrawal.id.as_bytes(),
            bincode::serialize(withdrawal)?,
        );

        let cf_indices = self.cf_handle(CF_INDICES)?;
        batch.put_cf(
            cf_indices,
            Self::user_scoped_key(
                IDX_USER_WITHDRAWAL,
                &withdrawal.user_id,
                withdrawal.created_at,
                &withdrawal.id,
            ),
            [],
        );

        self.add_entry_to_batch(&mut batch, debit)?;

        self.db.write(batch)?;
        Ok(())
    }

    /// Get entry by ID
    pub fn get_entry(&self, entry_id: Uuid) -> Result<LedgerEntry> {
        let cf = self.cf_handle(CF_ENTRIES)?;
        let value = self
            .db
            .get_cf(cf, entry_id.as_bytes())?
            .ok_or_else(|| Error::EntryNotFound(entry_id.to_string()))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// All entries for a user, oldest first
    pub fn entries_of(&self, user_id: Uuid) -> Result<Vec<LedgerEntry>> {
        let mut prefix = Vec::with_capacity(17);
        prefix.push(IDX_USER_ENTRY);
        prefix.extend_from_slice(user_id.as_bytes());

        let mut entries = Vec::new();
        for entry_id in self.scan_index_ids(&prefix)? {
            entries.push(self.get_entry(entry_id)?);
        }
        Ok(entries)
    }

    /// Current hash chain head for a user, if any entry exists
    pub fn chain_head(&self, user_id: Uuid) -> Result<Option<[u8; 32]>> {
        let cf = self.cf_handle(CF_INDICES)?;
        match self.db.get_cf(cf, Self::chain_head_key(&user_id))? {
            Some(bytes) if bytes.len() == 32 => {
                let head: [u8; 32] = bytes[..].try_into().unwrap();
                Ok(Some(head))
            }
            _ => Ok(None),
        }
    }

    // Withdrawal operations

    /// Get withdrawal by ID
    pub fn get_withdrawal(&self, withdrawal_id: Uuid) -> Result<Withdrawal> {
        let cf = self.cf_handle(CF_WITHDRAWALS)?;
        let value = self
            .db
            .get_cf(cf, withdrawal_id.as_bytes())?
            .ok_or_else(|| Error::WithdrawalNotFound(withdrawal_id.to_string()))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// All withdrawals for a user, oldest first
    pub fn withdrawals_of(&self, user_id: Uuid) -> Result<Vec<Withdrawal>> {
        let mut prefix = Vec::with_capacity(17);
        prefix.push(IDX_USER_WITHDRAWAL);
        prefix.extend_from_slice(user_id.as_bytes());

        let mut withdrawals = Vec::new();
        for withdrawal_id in self.scan_index_ids(&prefix)? {
            withdrawals.push(self.get_withdrawal(withdrawal_id)?);
        }
        Ok(withdrawals)
    }

    // Rate config (single active slot)

    /// Currently active rate config, if any
    pub fn get_active_rate(&self) -> Result<Option<RateConfig>> {
        let cf = self.cf_handle(CF_CONFIG)?;
        match self.db.get_cf(cf, CONFIG_ACTIVE_RATE)? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Replace the active rate config slot
    pub fn put_active_rate(&self, config: &RateConfig) -> Result<()> {
        let cf = self.cf_handle(CF_CONFIG)?;
        self.db
            .put_cf(cf, CONFIG_ACTIVE_RATE, bincode::serialize(config)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntryKind;
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    fn test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Storage::open(&config).unwrap(), temp_dir)
    }

    fn stamped_entry(user_id: Uuid, amount: Decimal) -> LedgerEntry {
        let mut entry = LedgerEntry::new(user_id, amount, EntryKind::Earning, None, "test");
        entry.entry_hash = entry.compute_hash();
        entry
    }

    #[test]
    fn test_user_roundtrip_and_lookups() {
        let (storage, _temp) = test_storage();

        let user = User::new("alice", "REFALICE01", None, 100);
        storage.put_user(&user).unwrap();

        let retrieved = storage.get_user(user.id).unwrap();
        assert_eq!(retrieved.username, "alice");
        assert_eq!(
            storage.find_user_by_code("REFALICE01").unwrap(),
            Some(user.id)
        );
        assert_eq!(
            storage.find_user_by_username("alice").unwrap(),
            Some(user.id)
        );
        assert_eq!(storage.find_user_by_code("REFNOPE").unwrap(), None);
    }

    #[test]
    fn test_missing_user_is_not_found() {
        let (storage, _temp) = test_storage();
        let result = storage.get_user(Uuid::now_v7());
        assert!(matches!(result, Err(Error::UserNotFound(_))));
    }

    #[test]
    fn test_pending_jobs_fifo_order() {
        let (storage, _temp) = test_storage();

        let mut ids = Vec::new();
        for i in 0..3 {
            let job = Job::new(format!("+1555000{:04}", i), "hi");
            storage.put_job(&job).unwrap();
            ids.push(job.id);
        }

        let pending = storage.pending_job_ids().unwrap();
        assert_eq!(pending, ids);
    }

    #[test]
    fn test_claim_atomic_removes_pending_index() {
        let (storage, _temp) = test_storage();

        let mut job = Job::new("+15550001111", "hi");
        storage.put_job(&job).unwrap();
        assert_eq!(storage.pending_job_ids().unwrap().len(), 1);

        job.claim(Uuid::now_v7(), Utc::now());
        storage.claim_atomic(&job).unwrap();

        assert!(storage.pending_job_ids().unwrap().is_empty());
        let stored = storage.get_job(job.id).unwrap();
        assert_eq!(stored.status, JobStatus::Claimed);
        assert_eq!(stored.owner, job.owner);
    }

    #[test]
    fn test_settle_atomic_persists_all_rows() {
        let (storage, _temp) = test_storage();

        let mut user = User::new("bob", "REFBOB0001", None, 100);
        storage.put_user(&user).unwrap();

        let mut job = Job::new("+15550001111", "hi");
        storage.put_job(&job).unwrap();
        job.claim(user.id, Utc::now());
        storage.claim_atomic(&job).unwrap();

        let entry = stamped_entry(user.id, Decimal::new(1000, 2));
        user.daily_sent += 1;
        job.complete(Utc::now());

        storage
            .settle_atomic(std::slice::from_ref(&entry), &user, &job)
            .unwrap();

        assert_eq!(storage.get_user(user.id).unwrap().daily_sent, 1);
        assert_eq!(
            storage.get_job(job.id).unwrap().status,
            JobStatus::Completed
        );
        let entries = storage.entries_of(user.id).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount, Decimal::new(1000, 2));
        assert_eq!(storage.chain_head(user.id).unwrap(), Some(entry.entry_hash));
    }

    #[test]
    fn test_withdrawal_atomic() {
        let (storage, _temp) = test_storage();
        let user_id = Uuid::now_v7();

        let withdrawal = Withdrawal::new(user_id, Decimal::new(5000, 2), "bank", "acct-1");
        let mut debit = LedgerEntry::new(
            user_id,
            -withdrawal.amount,
            EntryKind::WithdrawalDebit,
            Some(withdrawal.id),
            "Withdrawal request",
        );
        debit.entry_hash = debit.compute_hash();

        storage.withdrawal_atomic(&withdrawal, &debit).unwrap();

        let listed = storage.withdrawals_of(user_id).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].amount, Decimal::new(5000, 2));

        let entries = storage.entries_of(user_id).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount, -Decimal::new(5000, 2));
        assert_eq!(entries[0].reference, Some(withdrawal.id));
    }

    #[test]
    fn test_user_ids_lists_every_user() {
        let (storage, _temp) = test_storage();
        assert!(storage.user_ids().unwrap().is_empty());

        let mut expected = Vec::new();
        for i in 0..3 {
            let user = User::new(format!("user{}", i), format!("REFU{:06}", i), None, 100);
            storage.put_user(&user).unwrap();
            expected.push(user.id);
        }

        let mut listed = storage.user_ids().unwrap();
        listed.sort();
        expected.sort();
        assert_eq!(listed, expected);
    }

    #[test]
    fn test_active_rate_slot() {
        let (storage, _temp) = test_storage();
        assert!(storage.get_active_rate().unwrap().is_none());

        let rate = RateConfig::new(Decimal::new(1000, 2));
        storage.put_active_rate(&rate).unwrap();

        let active = storage.get_active_rate().unwrap().unwrap();
        assert_eq!(active.earning_rate, Decimal::new(1000, 2));

        // Replacing the slot keeps exactly one active config
        let replacement = RateConfig::new(Decimal::new(500, 2));
        storage.put_active_rate(&replacement).unwrap();
        let active = storage.get_active_rate().unwrap().unwrap();
        assert_eq!(active.id, replacement.id);
    }
}
