//! User registration and daily counter maintenance
//!
//! Referrer pointers are set exactly once at registration, which keeps the
//! referral tree acyclic by construction. Credential handling (passwords,
//! tokens) lives outside this crate.
//!
//! Registrations are serialized through a single mutex: the storage layer
//! cannot check-and-insert the username index atomically, so without it
//! two concurrent registrations of one name could both pass the duplicate
//! check. The daily reset rewrites each user row under that user's row
//! lock, so a reset can neither clobber nor be clobbered by a concurrent
//! settlement's counter increment.

use crate::{Error, Result};
use chrono::NaiveDate;
use parking_lot::Mutex;
use rand::{distributions::Alphanumeric, Rng};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use wallet_core::{types::User, LockTable, Storage};

/// User directory over storage
#[derive(Clone)]
pub struct UserDirectory {
    storage: Arc<Storage>,
    locks: LockTable,
    lock_wait: Duration,
    registration: Arc<Mutex<()>>,
    default_daily_limit: u32,
}

impl UserDirectory {
    /// Create a directory over storage
    pub fn new(
        storage: Arc<Storage>,
        locks: LockTable,
        lock_wait: Duration,
        default_daily_limit: u32,
    ) -> Self {
        Self {
            storage,
            locks,
            lock_wait,
            registration: Arc::new(Mutex::new(())),
            default_daily_limit,
        }
    }

    /// Register a new user, optionally linked to a referrer by code
    pub fn register(&self, username: &str, referral_code: Option<&str>) -> Result<User> {
        let _reg_guard = self.registration.lock();

        if self.storage.find_user_by_username(username)?.is_some() {
            return Err(Error::DuplicateUsername(username.to_string()));
        }

        let referrer = match referral_code {
            Some(code) => Some(
                self.storage
                    .find_user_by_code(code)?
                    .ok_or_else(|| Error::InvalidReferralCode(code.to_string()))?,
            ),
            None => None,
        };

        let user = User::new(
            username,
            self.generate_referral_code()?,
            referrer,
            self.default_daily_limit,
        );
        self.storage.put_user(&user)?;

        tracing::info!(user_id = %user.id, username, "User registered");
        Ok(user)
    }

    /// Get a user by ID
    pub fn get(&self, user_id: Uuid) -> Result<User> {
        Ok(self.storage.get_user(user_id)?)
    }

    /// Reset every user's daily counter for `today`
    ///
    /// Invoked by the scheduler once per calendar day, or by an external
    /// trigger. Each row is re-read and rewritten under its user's row
    /// lock; a lock held past its bounded wait surfaces as `Contention`
    /// and the whole reset is retried later. Returns the number of users
    /// updated.
    pub fn reset_all_daily_counters(&self, today: NaiveDate) -> Result<usize> {
        let mut updated = 0;
        for user_id in self.storage.user_ids()? {
            let _guard = self.locks.acquire(user_id, self.lock_wait)?;

            let mut user = self.storage.get_user(user_id)?;
            user.daily_sent = 0;
            user.last_reset_date = Some(today);
            self.storage.put_user(&user)?;
            updated += 1;
        }

        tracing::info!(%today, updated, "Daily counters reset");
        Ok(updated)
    }

    fn generate_referral_code(&self) -> Result<String> {
        // Regenerate on the (unlikely) collision
        loop {
            let suffix: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(8)
                .map(|c| (c as char).to_ascii_uppercase())
                .collect();
            let code = format!("REF{}", suffix);
            if self.storage.find_user_by_code(&code)?.is_none() {
                return Ok(code);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wallet_core::Config;

    fn test_directory() -> (UserDirectory, LockTable, Arc<Storage>, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        let storage = Arc::new(Storage::open(&config).unwrap());
        let locks = LockTable::new();
        let directory = UserDirectory::new(
            storage.clone(),
            locks.clone(),
            Duration::from_millis(50),
            100,
        );
        (directory, locks, storage, temp_dir)
    }

    #[test]
    fn test_register_without_referrer() {
        let (directory, _locks, _storage, _temp) = test_directory();

        let user = directory.register("alice", None).unwrap();
        assert!(user.referrer.is_none());
        assert!(user.referral_code.starts_with("REF"));
        assert_eq!(user.daily_limit, 100);
    }

    #[test]
    fn test_register_links_referrer_by_code() {
        let (directory, _locks, _storage, _temp) = test_directory();

        let referrer = directory.register("alice", None).unwrap();
        let invited = directory
            .register("bob", Some(&referrer.referral_code))
            .unwrap();

        assert_eq!(invited.referrer, Some(referrer.id));
    }

    #[test]
    fn test_register_rejects_unknown_code() {
        let (directory, _locks, _storage, _temp) = test_directory();

        let result = directory.register("bob", Some("REFNOSUCH1"));
        assert!(matches!(result, Err(Error::InvalidReferralCode(_))));
    }

    #[test]
    fn test_register_rejects_duplicate_username() {
        let (directory, _locks, _storage, _temp) = test_directory();

        directory.register("alice", None).unwrap();
        let result = directory.register("alice", None);
        assert!(matches!(result, Err(Error::DuplicateUsername(_))));
    }

    #[test]
    fn test_concurrent_registrations_of_one_name_admit_one() {
        let (directory, _locks, storage, _temp) = test_directory();

        const THREADS: usize = 8;
        let barrier = Arc::new(std::sync::Barrier::new(THREADS));
        let mut handles = Vec::new();
        for _ in 0..THREADS {
            let directory = directory.clone();
            let barrier = barrier.clone();
            handles.push(std::thread::spawn(move || {
                barrier.wait();
                directory.register("alice", None)
            }));
        }

        let mut winners = Vec::new();
        for handle in handles {
            match handle.join().unwrap() {
                Ok(user) => winners.push(user),
                Err(Error::DuplicateUsername(_)) => {}
                Err(e) => panic!("unexpected error: {}", e),
            }
        }

        assert_eq!(winners.len(), 1);
        // The username index points at the single winner
        assert_eq!(
            storage.find_user_by_username("alice").unwrap(),
            Some(winners[0].id)
        );
    }

    #[test]
    fn test_reset_all_daily_counters() {
        let (directory, _locks, storage, _temp) = test_directory();

        let mut user = directory.register("alice", None).unwrap();
        user.daily_sent = 10;
        storage.put_user(&user).unwrap();

        let today = Utc::now().date_naive();
        let updated = directory.reset_all_daily_counters(today).unwrap();
        assert_eq!(updated, 1);

        let reloaded = directory.get(user.id).unwrap();
        assert_eq!(reloaded.daily_sent, 0);
        assert_eq!(reloaded.last_reset_date, Some(today));
    }

    #[test]
    fn test_reset_waits_for_held_row_locks() {
        let (directory, locks, _storage, _temp) = test_directory();

        let user = directory.register("alice", None).unwrap();
        let _held = locks.acquire(user.id, Duration::from_millis(50)).unwrap();

        // A settlement-style holder of the row lock blocks the reset; the
        // bounded wait turns that into a retryable Contention
        let today = Utc::now().date_naive();
        let result = directory.reset_all_daily_counters(today);
        assert!(matches!(result, Err(Error::Contention(_))));

        // The held user's counter state was not touched
        assert!(directory.get(user.id).unwrap().last_reset_date.is_none());
    }
}
