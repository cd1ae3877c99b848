//! Per-session conversion quota.
//!
//! Every accepted conversion consumes one token from the caller's bucket and
//! bumps the caller's usage row for the current UTC day. Both happen in one
//! critical section per owner, so the bucket is the single authoritative
//! deduction point and the usage endpoint reads the same state that denies.

pub mod bucket;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::Duration;

use crate::error::AppError;
use crate::models::usage::UsageSnapshot;

pub use bucket::BucketState;
pub use memory::MemoryQuota;
pub use postgres::PgQuota;

/// Tokens consumed by one conversion.
pub const CONVERSION_COST: u32 = 1;

/// Token bucket parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPolicy {
    /// Maximum tokens a bucket holds.
    pub capacity: u32,
    /// Tokens added per elapsed interval.
    pub refill: u32,
    /// Length of one refill interval.
    pub interval: Duration,
}

impl Default for QuotaPolicy {
    /// Five conversions per day.
    fn default() -> Self {
        Self {
            capacity: 5,
            refill: 5,
            interval: Duration::seconds(86_400),
        }
    }
}

/// Outcome of a quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    /// The request may proceed. `remaining` is the budget left afterwards.
    Allow { remaining: u32 },
    /// The request must be rejected.
    Deny {
        /// Seconds until the next refill.
        retry_after: u64,
    },
}

impl QuotaDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, QuotaDecision::Allow { .. })
    }
}

/// Check-and-consume quota service.
///
/// Implementations must serialize decisions per owner: with one token left,
/// at most one of any number of concurrent calls may be allowed.
#[async_trait]
pub trait QuotaService: Send + Sync {
    /// Consumes `cost` tokens for `owner` if available.
    async fn check_and_consume(&self, owner: &str, cost: u32) -> Result<QuotaDecision, AppError>;

    /// Reports today's usage and the remaining budget without consuming.
    async fn usage(&self, owner: &str) -> Result<UsageSnapshot, AppError>;
}
