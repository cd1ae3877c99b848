//! Token bucket arithmetic.

use chrono::{DateTime, Utc};

use super::QuotaPolicy;

/// Stored state of one owner's bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketState {
    /// Tokens currently available.
    pub tokens: u32,
    /// Start of the current refill interval.
    pub refilled_at: DateTime<Utc>,
}

impl BucketState {
    /// A full bucket whose first interval starts at `now`.
    pub fn full(policy: &QuotaPolicy, now: DateTime<Utc>) -> Self {
        Self {
            tokens: policy.capacity,
            refilled_at: now,
        }
    }

    /// Adds `policy.refill` tokens for every whole interval elapsed since
    /// `refilled_at`, capped at capacity, and advances `refilled_at` by the
    /// same number of intervals.
    pub fn refill(&mut self, policy: &QuotaPolicy, now: DateTime<Utc>) {
        let interval_secs = policy.interval.num_seconds().max(1);
        let elapsed_secs = (now - self.refilled_at).num_seconds();
        if elapsed_secs < interval_secs {
            return;
        }

        let intervals = elapsed_secs / interval_secs;
        let added = u64::try_from(intervals)
            .unwrap_or(u64::MAX)
            .saturating_mul(u64::from(policy.refill));
        let tokens = u64::from(self.tokens)
            .saturating_add(added)
            .min(u64::from(policy.capacity));

        self.tokens = u32::try_from(tokens).unwrap_or(policy.capacity);
        self.refilled_at += chrono::Duration::seconds(intervals * interval_secs);
    }

    /// Takes `cost` tokens if available. Returns whether it did.
    pub fn try_consume(&mut self, cost: u32) -> bool {
        if self.tokens >= cost {
            self.tokens -= cost;
            true
        } else {
            false
        }
    }

    /// Seconds until the next refill boundary, at least one.
    pub fn retry_after(&self, policy: &QuotaPolicy, now: DateTime<Utc>) -> u64 {
        let next = self.refilled_at + policy.interval;
        u64::try_from((next - now).num_seconds()).unwrap_or(0).max(1)
    }
}
