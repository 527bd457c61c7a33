//! Referral chain traversal and bonus computation
//!
//! The referral tree is a parent-pointer structure: each user optionally
//! points at the user who referred them, set once at creation. Bonus
//! distribution walks the chain upward at most three levels; the walk is
//! iterative and bounded, never recursive, since the depth is a protocol
//! constant.

use crate::config::ReferralConfig;
use crate::Result;
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;
use uuid::Uuid;
use wallet_core::{types::User, Storage};

/// Maximum bonus depth
pub const MAX_REFERRAL_DEPTH: usize = 3;

/// Read-only view of the upward referrer chain
#[derive(Clone)]
pub struct ReferralGraph {
    storage: Arc<Storage>,
}

impl ReferralGraph {
    /// Create a graph view over storage
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Referrers of `user`, nearest first, at most [`MAX_REFERRAL_DEPTH`]
    ///
    /// Stops early at the first user without a referrer. Levels are
    /// 1-based: element 0 is the level-1 referrer.
    pub fn chain_of(&self, user: &User) -> Result<Vec<Uuid>> {
        let mut chain = Vec::with_capacity(MAX_REFERRAL_DEPTH);
        let mut current = user.referrer;

        while let Some(referrer_id) = current {
            if chain.len() == MAX_REFERRAL_DEPTH {
                break;
            }
            let referrer = self.storage.get_user(referrer_id)?;
            chain.push(referrer_id);
            current = referrer.referrer;
        }

        Ok(chain)
    }
}

/// Bonus amounts per level for a given earning rate
///
/// Each tier share is rounded to 2 decimal places, half-up.
pub fn bonus_amounts(rate: Decimal, tiers: &ReferralConfig) -> [Decimal; MAX_REFERRAL_DEPTH] {
    tiers.tiers().map(|tier| {
        (rate * tier).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    })
}
