//! Core domain types for the wallet ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Memory safety (no unsafe code)
//! - Exact arithmetic (Decimal for money)

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EntryKind {
    /// Base earning for a completed job
    Earning = 1,
    /// Referral bonus, one level up
    ReferralBonusL1 = 2,
    /// Referral bonus, two levels up
    ReferralBonusL2 = 3,
    /// Referral bonus, three levels up
    ReferralBonusL3 = 4,
    /// Funds locked for a withdrawal request (negative amount)
    WithdrawalDebit = 5,
    /// Administrative reversal of a rejected withdrawal
    AdjustmentCredit = 6,
}

impl EntryKind {
    /// Bonus kind for a referral level (1-based)
    pub fn bonus_for_level(level: usize) -> Option<Self> {
        match level {
            1 => Some(EntryKind::ReferralBonusL1),
            2 => Some(EntryKind::ReferralBonusL2),
            3 => Some(EntryKind::ReferralBonusL3),
            _ => None,
        }
    }
}

/// One immutable, signed monetary record
///
/// Entries are write-once: no update or delete path exists anywhere in the
/// crate. A user's balance is always derived by summing their entries.
/// Each entry extends a per-user SHA-256 hash chain for tamper evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique entry ID (UUIDv7 for time-ordering)
    pub id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// Signed amount (exact decimal, never zero)
    pub amount: Decimal,

    /// Entry kind
    pub kind: EntryKind,

    /// Optional reference (job or withdrawal ID)
    pub reference: Option<Uuid>,

    /// Human-readable description
    pub description: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Hash of the previous entry in this user's chain (zero for the first)
    pub prev_hash: [u8; 32],

    /// Hash of this entry's contents
    pub entry_hash: [u8; 32],
}

impl LedgerEntry {
    /// Create an entry with an unstamped hash chain
    ///
    /// `prev_hash` and `entry_hash` are filled in by the ledger at append
    /// time, under the same atomic write as the entry itself.
    pub fn new(
        user_id: Uuid,
        amount: Decimal,
        kind: EntryKind,
        reference: Option<Uuid>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id,
            amount,
            kind,
            reference,
            description: description.into(),
            created_at: Utc::now(),
            prev_hash: [0u8; 32],
            entry_hash: [0u8; 32],
        }
    }

    /// Compute this entry's chain hash from its contents and `prev_hash`
    pub fn compute_hash(&self) -> [u8; 32] {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(self.prev_hash);
        hasher.update(self.id.as_bytes());
        hasher.update(self.user_id.as_bytes());
        hasher.update(self.amount.to_string().as_bytes());
        hasher.update([self.kind as u8]);
        if let Some(reference) = self.reference {
            hasher.update(reference.as_bytes());
        }
        hasher.update(
            self.created_at
                .timestamp_nanos_opt()
                .unwrap_or(0)
                .to_be_bytes(),
        );

        hasher.finalize().into()
    }
}

/// Job lifecycle state
///
/// Transitions are monotonic: `Pending → Claimed → {Completed | Failed}`.
/// There is no requeue path; a claimed job stays bound to its claimant
/// until it reaches a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum JobStatus {
    /// Waiting to be claimed
    Pending = 1,
    /// Claimed by exactly one user
    Claimed = 2,
    /// Completed and credited (terminal)
    Completed = 3,
    /// Failed, non-monetary (terminal)
    Failed = 4,
}

impl JobStatus {
    /// Check if the status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// An atomic messaging job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID
    pub id: Uuid,

    /// Recipient address
    pub recipient: String,

    /// Message payload
    pub message: String,

    /// Lifecycle state
    pub status: JobStatus,

    /// Owning user (null only while Pending)
    pub owner: Option<Uuid>,

    /// When the job was claimed
    pub claimed_at: Option<DateTime<Utc>>,

    /// When the job was completed
    pub completed_at: Option<DateTime<Utc>>,

    /// When the job failed
    pub failed_at: Option<DateTime<Utc>>,

    /// Failure reason, if failed
    pub failure_reason: Option<String>,

    /// Creation timestamp (claim order is FIFO on this)
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Create a new pending job
    pub fn new(recipient: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            recipient: recipient.into(),
            message: message.into(),
            status: JobStatus::Pending,
            owner: None,
            claimed_at: None,
            completed_at: None,
            failed_at: None,
            failure_reason: None,
            created_at: Utc::now(),
        }
    }

    /// Bind the job to a claimant
    pub fn claim(&mut self, owner: Uuid, now: DateTime<Utc>) {
        self.status = JobStatus::Claimed;
        self.owner = Some(owner);
        self.claimed_at = Some(now);
    }

    /// Transition to Completed
    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Completed;
        self.completed_at = Some(now);
    }

    /// Transition to Failed
    pub fn fail(&mut self, now: DateTime<Utc>, reason: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.failed_at = Some(now);
        self.failure_reason = Some(reason.into());
    }
}

/// A worker account (core subset)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID
    pub id: Uuid,

    /// Username (unique)
    pub username: String,

    /// Referral code handed out to invitees (unique)
    pub referral_code: String,

    /// Upward referrer; set once at creation, never mutated (acyclic)
    pub referrer: Option<Uuid>,

    /// Jobs credited today
    pub daily_sent: u32,

    /// Daily credit limit
    pub daily_limit: u32,

    /// Last calendar-day counter reset
    pub last_reset_date: Option<NaiveDate>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new user
    pub fn new(
        username: impl Into<String>,
        referral_code: impl Into<String>,
        referrer: Option<Uuid>,
        daily_limit: u32,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            username: username.into(),
            referral_code: referral_code.into(),
            referrer,
            daily_sent: 0,
            daily_limit,
            last_reset_date: None,
            created_at: Utc::now(),
        }
    }

    /// Check if the daily credit limit has been reached
    pub fn at_daily_limit(&self) -> bool {
        self.daily_sent >= self.daily_limit
    }
}

/// Earning rate configuration
///
/// Exactly one config may be active at a time; uniqueness is enforced by
/// the rate policy's single-slot storage, not by filtering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateConfig {
    /// Unique config ID
    pub id: Uuid,

    /// Per-job earning rate
    pub earning_rate: Decimal,

    /// Active flag
    pub active: bool,

    /// Advisory minimum payout (not enforced here)
    pub min_payout: Option<Decimal>,

    /// Advisory daily cap (not enforced here)
    pub daily_cap: Option<u32>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl RateConfig {
    /// Create an active rate config
    pub fn new(earning_rate: Decimal) -> Self {
        Self {
            id: Uuid::now_v7(),
            earning_rate,
            active: true,
            min_payout: None,
            daily_cap: None,
            created_at: Utc::now(),
        }
    }
}

/// Withdrawal request state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum WithdrawalStatus {
    /// Awaiting administrative review
    Pending = 1,
    /// Approved and paid out (terminal)
    Approved = 2,
    /// Rejected; requires a compensating credit (terminal)
    Rejected = 3,
}

/// A withdrawal request
///
/// The locking debit is appended in the same atomic write that persists
/// the request; terminal status transitions are an administrative concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Withdrawal {
    /// Unique withdrawal ID
    pub id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// Requested amount (positive)
    pub amount: Decimal,

    /// Lifecycle state
    pub status: WithdrawalStatus,

    /// Payment method
    pub payment_method: String,

    /// Payment details
    pub payment_details: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// When the request was processed
    pub processed_at: Option<DateTime<Utc>>,
}

impl Withdrawal {
    /// Create a pending withdrawal request
    pub fn new(
        user_id: Uuid,
        amount: Decimal,
        payment_method: impl Into<String>,
        payment_details: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id,
            amount,
            status: WithdrawalStatus::Pending,
            payment_method: payment_method.into(),
            payment_details: payment_details.into(),
            created_at: Utc::now(),
            processed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_hash_depends_on_contents() {
        let user_id = Uuid::now_v7();
        let mut entry = LedgerEntry::new(
            user_id,
            Decimal::new(1000, 2),
            EntryKind::Earning,
            None,
            "earning",
        );
        let hash1 = entry.compute_hash();

        entry.amount = Decimal::new(1001, 2);
        let hash2 = entry.compute_hash();
        assert_ne!(hash1, hash2);

        entry.amount = Decimal::new(1000, 2);
        assert_eq!(entry.compute_hash(), hash1);
    }

    #[test]
    fn test_entry_hash_chains_on_prev() {
        let entry = LedgerEntry::new(
            Uuid::now_v7(),
            Decimal::new(1000, 2),
            EntryKind::Earning,
            None,
            "earning",
        );
        let unchained = entry.compute_hash();

        let mut chained = entry;
        chained.prev_hash = [7u8; 32];
        assert_ne!(chained.compute_hash(), unchained);
    }

    #[test]
    fn test_job_lifecycle() {
        let mut job = Job::new("+15550001111", "hello");
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.owner.is_none());
        assert!(!job.status.is_terminal());

        let owner = Uuid::now_v7();
        job.claim(owner, Utc::now());
        assert_eq!(job.status, JobStatus::Claimed);
        assert_eq!(job.owner, Some(owner));

        job.complete(Utc::now());
        assert!(job.status.is_terminal());
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_job_failure_records_reason() {
        let mut job = Job::new("+15550001111", "hello");
        job.claim(Uuid::now_v7(), Utc::now());
        job.fail(Utc::now(), "carrier rejected");

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.failure_reason.as_deref(), Some("carrier rejected"));
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn test_bonus_kind_for_level() {
        assert_eq!(
            EntryKind::bonus_for_level(1),
            Some(EntryKind::ReferralBonusL1)
        );
        assert_eq!(
            EntryKind::bonus_for_level(3),
            Some(EntryKind::ReferralBonusL3)
        );
        assert_eq!(EntryKind::bonus_for_level(4), None);
    }

    #[test]
    fn test_user_daily_limit() {
        let mut user = User::new("worker", "REFAAAA1111", None, 2);
        assert!(!user.at_daily_limit());
        user.daily_sent = 2;
        assert!(user.at_daily_limit());
    }
}
