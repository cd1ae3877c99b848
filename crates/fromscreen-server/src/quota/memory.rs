//! In-process quota service.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::{BucketState, QuotaDecision, QuotaPolicy, QuotaService};
use crate::error::AppError;
use crate::models::usage::UsageSnapshot;

#[derive(Debug)]
struct OwnerQuota {
    bucket: BucketState,
    day: NaiveDate,
    count: u32,
}

#[derive(Debug, Default)]
struct Owners {
    entries: HashMap<String, OwnerQuota>,
    swept_on: Option<NaiveDate>,
}

impl Owners {
    /// Drops owners last charged on an earlier day whose bucket is full again.
    /// Such an entry reads the same as an unknown owner.
    fn sweep(&mut self, policy: &QuotaPolicy, now: DateTime<Utc>) {
        let today = now.date_naive();
        if self.swept_on == Some(today) {
            return;
        }
        self.swept_on = Some(today);

        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            let mut bucket = entry.bucket;
            bucket.refill(policy, now);
            entry.day == today || bucket.tokens < policy.capacity
        });
        let removed = before - self.entries.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = self.entries.len(), "Swept idle quota owners");
        }
    }
}

/// Quota service holding all buckets behind one mutex.
///
/// The lock is never held across an await, so one mutex is enough to
/// serialize decisions for every owner. Idle owners are swept once per UTC
/// day so sessions that never return do not accumulate.
#[derive(Debug)]
pub struct MemoryQuota {
    policy: QuotaPolicy,
    owners: Mutex<Owners>,
}

impl MemoryQuota {
    pub fn new(policy: QuotaPolicy) -> Self {
        Self {
            policy,
            owners: Mutex::new(Owners::default()),
        }
    }

    /// Number of owners currently tracked.
    pub fn tracked_owners(&self) -> Result<usize, AppError> {
        let owners = self
            .owners
            .lock()
            .map_err(|_| AppError::Internal("quota lock poisoned".to_string()))?;
        Ok(owners.entries.len())
    }

    /// Check-and-consume against an explicit clock.
    pub fn check_and_consume_at(
        &self,
        owner: &str,
        cost: u32,
        now: DateTime<Utc>,
    ) -> Result<QuotaDecision, AppError> {
        let mut owners = self
            .owners
            .lock()
            .map_err(|_| AppError::Internal("quota lock poisoned".to_string()))?;

        owners.sweep(&self.policy, now);

        let today = now.date_naive();
        let entry = owners
            .entries
            .entry(owner.to_string()).or_insert_with(|| OwnerQuota {
            bucket: BucketState::full(&self.policy, now),
            day: today,
            count: 0,
        });

        entry.bucket.refill(&self.policy, now);
        if !entry.bucket.try_consume(cost) {
            return Ok(QuotaDecision::Deny {
                retry_after: entry.bucket.retry_after(&self.policy, now),
            });
        }

        if entry.day != today {
            entry.day = today;
            entry.count = 0;
        }
        entry.count += 1;

        Ok(QuotaDecision::Allow {
            remaining: entry.bucket.tokens,
        })
    }

    /// Usage snapshot against an explicit clock.
    pub fn usage_at(&self, owner: &str, now: DateTime<Utc>) -> Result<UsageSnapshot, AppError> {
        let owners = self
            .owners
            .lock()
            .map_err(|_| AppError::Internal("quota lock poisoned".to_string()))?;

        let snapshot = match owners.entries.get(owner) {
            Some(entry) => {
                let mut bucket = entry.bucket;
                bucket.refill(&self.policy, now);
                let count = if entry.day == now.date_naive() {
                    entry.count
                } else {
                    0
                };
                UsageSnapshot::new(count, self.policy.capacity, bucket.tokens)
            }
            None => UsageSnapshot::new(0, self.policy.capacity, self.policy.capacity),
        };

        Ok(snapshot)
    }
}

impl Default for MemoryQuota {
    fn default() -> Self {
        Self::new(QuotaPolicy::default())
    }
}

#[async_trait]
impl QuotaService for MemoryQuota {
    async fn check_and_consume(&self, owner: &str, cost: u32) -> Result<QuotaDecision, AppError> {
        self.check_and_consume_at(owner, cost, Utc::now())
    }

    async fn usage(&self, owner: &str) -> Result<UsageSnapshot, AppError> {
        self.usage_at(owner, Utc::now())
    }
}
