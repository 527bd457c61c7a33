//! Settlement engine
//!
//! Orchestrates the job lifecycle against the wallet ledger: claim, credit
//! on completion (earning plus up to three referral bonuses), fail without
//! money movement. Every monetary effect is committed through the ledger's
//! atomic writes; every read-modify-write on a user or job row happens
//! under that row's lock, acquired user before job.

use crate::{
    config::Config,
    rates::RatePolicy,
    referral::{bonus_amounts, ReferralGraph},
    users::UserDirectory,
    withdrawal::WithdrawalEngine,
    Error, Result,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use wallet_core::{
    types::{
        EntryKind, Job, JobStatus, LedgerEntry, RateConfig, User, Withdrawal, WithdrawalStatus,
    },
    Ledger, LockTable, Storage,
};

/// Settlement engine over shared wallet storage
#[derive(Clone)]
pub struct SettlementEngine {
    storage: Arc<Storage>,
    ledger: Ledger,
    locks: LockTable,
    rates: RatePolicy,
    referrals: ReferralGraph,
    users: UserDirectory,
    withdrawals: WithdrawalEngine,
    config: Config,
}

impl SettlementEngine {
    /// Open the engine over the configured data directory
    pub fn open(config: Config) -> Result<Self> {
        let mut core_config = wallet_core::Config::default();
        core_config.data_dir = config.data_dir.clone();
        core_config.lock_wait_ms = config.lock_wait_ms;

        let storage = Arc::new(Storage::open(&core_config)?);
        Ok(Self::with_storage(storage, config))
    }

    /// Build the engine over already-open storage
    pub fn with_storage(storage: Arc<Storage>, config: Config) -> Self {
        let ledger = Ledger::new(storage.clone());
        let locks = LockTable::new();
        let lock_wait = Duration::from_millis(config.lock_wait_ms);

        Self {
            rates: RatePolicy::new(storage.clone()),
            referrals: ReferralGraph::new(storage.clone()),
            users: UserDirectory::new(
                storage.clone(),
                locks.clone(),
                lock_wait,
                config.default_daily_limit,
            ),
            withdrawals: WithdrawalEngine::new(
                storage.clone(),
                ledger.clone(),
                locks.clone(),
                lock_wait,
            ),
            storage,
            ledger,
            locks,
            config,
        }
    }

    fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.config.lock_wait_ms)
    }

    // Job lifecycle

    /// Submit a new pending job
    pub fn submit_job(
        &self,
        recipient: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<Job> {
        let job = Job::new(recipient, message);
        self.storage.put_job(&job)?;

        tracing::info!(job_id = %job.id, "Job submitted");
        Ok(job)
    }

    /// Claim the oldest pending job for `claimant`
    ///
    /// Walks the pending queue in FIFO order; a candidate lost to a
    /// concurrent claimant is skipped, not an error. Returns `Ok(None)`
    /// when no pending job remains. At most one claimant ever observes a
    /// given job as `Pending` under its lock, so a job is claimed exactly
    /// once.
    pub fn claim_job(&self, claimant: Uuid) -> Result<Option<Job>> {
        self.storage.get_user(claimant)?;

        for job_id in self.storage.pending_job_ids()? {
            let _job_guard = match self.locks.acquire(job_id, self.lock_wait()) {
                Ok(guard) => guard,
                // Someone else is deciding this job's fate; move on
                Err(wallet_core::Error::Contention(_)) => continue,
                Err(e) => return Err(e.into()),
            };

            let mut job = self.storage.get_job(job_id)?;
            if job.status != JobStatus::Pending {
                continue;
            }

            job.claim(claimant, Utc::now());
            self.storage.claim_atomic(&job)?;
            self.ledger.metrics().claims_total.inc();

            tracing::info!(job_id = %job.id, claimant = %claimant, "Job claimed");
            return Ok(Some(job));
        }

        Ok(None)
    }

    /// Settle a claimed job: credit the earning and referral bonuses
    ///
    /// Preconditions are checked in order (ownership, lifecycle state,
    /// daily limit, active rate) and nothing is written unless all hold.
    /// The earning, every non-zero bonus, the counter increment, and the
    /// job transition then commit as one atomic write.
    pub fn complete_job(&self, user_id: Uuid, job_id: Uuid) -> Result<Job> {
        let _user_guard = self.locks.acquire(user_id, self.lock_wait())?;
        let _job_guard = self.locks.acquire(job_id, self.lock_wait())?;

        let mut user = self.storage.get_user(user_id)?;
        let mut job = self.storage.get_job(job_id)?;

        if job.owner != Some(user_id) {
            return Err(Error::JobNotOwned(job_id.to_string()));
        }
        if job.status != JobStatus::Claimed {
            return Err(Error::InvalidState {
                expected: "Claimed".to_string(),
                found: format!("{:?}", job.status),
            });
        }
        if user.at_daily_limit() {
            return Err(Error::DailyLimitReached);
        }

        let rate = self.rates.current_rate()?;
        let mut entries = vec![LedgerEntry::new(
            user_id,
            rate,
            EntryKind::Earning,
            Some(job_id),
            "Job earning",
        )];

        let chain = self.referrals.chain_of(&user)?;

        // Chain stamping reads each recipient's hash-chain head, so every
        // bonus recipient's row lock must be held too or two settlements
        // sharing a referrer would fork that referrer's chain. Locks are
        // taken leaf to root along the chain; referrer pointers are acyclic,
        // so waiters cannot form a cycle, and the bounded wait turns any
        // pile-up into a retryable Contention.
        let mut recipient_guards = Vec::with_capacity(chain.len());
        for referrer_id in &chain {
            recipient_guards.push(self.locks.acquire(*referrer_id, self.lock_wait())?);
        }

        let bonuses = bonus_amounts(rate, &self.config.referral);
        for (index, referrer_id) in chain.iter().enumerate() {
            let amount = bonuses[index];
            if amount == Decimal::ZERO {
                // A zero entry is illegal in the ledger; the level simply
                // earns nothing at this rate
                continue;
            }
            let kind = match EntryKind::bonus_for_level(index + 1) {
                Some(kind) => kind,
                None => break,
            };
            entries.push(LedgerEntry::new(
                *referrer_id,
                amount,
                kind,
                Some(job_id),
                format!("Referral bonus L{}", index + 1),
            ));
        }

        user.daily_sent += 1;
        job.complete(Utc::now());

        self.ledger.settle(&mut entries, &user, &job)?;

        tracing::info!(
            job_id = %job_id,
            user_id = %user_id,
            %rate,
            bonuses = entries.len() - 1,
            "Job settled"
        );

        Ok(job)
    }

    /// Mark a claimed job failed; no money moves
    pub fn fail_job(&self, user_id: Uuid, job_id: Uuid, reason: impl Into<String>) -> Result<Job> {
        let _user_guard = self.locks.acquire(user_id, self.lock_wait())?;
        let _job_guard = self.locks.acquire(job_id, self.lock_wait())?;

        self.storage.get_user(user_id)?;
        let mut job = self.storage.get_job(job_id)?;

        if job.owner != Some(user_id) {
            return Err(Error::JobNotOwned(job_id.to_string()));
        }
        if job.status != JobStatus::Claimed {
            return Err(Error::InvalidState {
                expected: "Claimed".to_string(),
                found: format!("{:?}", job.status),
            });
        }

        let reason = reason.into();
        job.fail(Utc::now(), reason.clone());
        self.storage.put_job(&job)?;

        tracing::warn!(job_id = %job_id, user_id = %user_id, reason, "Job failed");
        Ok(job)
    }

    /// Get a job by ID
    pub fn get_job(&self, job_id: Uuid) -> Result<Job> {
        Ok(self.storage.get_job(job_id)?)
    }

    // Users

    /// Register a new user, optionally linked to a referrer by code
    pub fn register_user(&self, username: &str, referral_code: Option<&str>) -> Result<User> {
        self.users.register(username, referral_code)
    }

    /// Get a user by ID
    pub fn get_user(&self, user_id: Uuid) -> Result<User> {
        self.users.get(user_id)
    }

    /// Reset every user's daily counter for `today`
    pub fn reset_all_daily_counters(&self, today: NaiveDate) -> Result<usize> {
        self.users.reset_all_daily_counters(today)
    }

    // Wallet views

    /// Current balance, derived from the ledger
    pub fn get_balance(&self, user_id: Uuid) -> Result<Decimal> {
        self.storage.get_user(user_id)?;
        Ok(self.ledger.balance_of(user_id)?)
    }

    /// Ledger history, newest first
    pub fn get_history(
        &self,
        user_id: Uuid,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>> {
        self.storage.get_user(user_id)?;
        Ok(self.ledger.history_of(user_id, offset, limit)?)
    }

    /// Verify the user's ledger hash chain
    pub fn verify_ledger(&self, user_id: Uuid) -> Result<()> {
        Ok(self.ledger.verify_chain(user_id)?)
    }

    // Withdrawals

    /// Create a withdrawal request, locking funds immediately
    pub fn create_withdrawal(
        &self,
        user_id: Uuid,
        amount: Decimal,
        payment_method: &str,
        payment_details: &str,
    ) -> Result<Withdrawal> {
        self.withdrawals
            .create(user_id, amount, payment_method, payment_details)
    }

    /// Withdrawals for a user, newest first
    pub fn get_withdrawals(
        &self,
        user_id: Uuid,
        status: Option<WithdrawalStatus>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Withdrawal>> {
        match status {
            Some(status) => self.withdrawals.list_by_status(user_id, status, offset, limit),
            None => self.withdrawals.list(user_id, offset, limit),
        }
    }

    // Rates

    /// Replace the active rate config
    pub fn set_active_rate(&self, config: RateConfig) -> Result<()> {
        self.rates.set_active_rate(config)
    }

    /// Currently active rate config
    pub fn active_rate(&self) -> Result<RateConfig> {
        self.rates.active_rate()
    }
}
