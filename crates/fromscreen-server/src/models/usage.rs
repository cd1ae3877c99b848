//! Daily usage model backing the quota read endpoint.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Accepted conversions for one owner on one UTC calendar day.
///
/// The count only ever grows within a day. A new day has no row and reads
/// as zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UsageRecord {
    pub owner: String,
    pub day: NaiveDate,
    pub count: i32,
}

/// Quota state reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSnapshot {
    /// Conversions accepted today.
    pub count: u32,
    /// Bucket capacity.
    pub limit: u32,
    /// Tokens currently available.
    pub remaining: u32,
    /// True when the next conversion would be denied.
    pub has_reached_limit: bool,
}

impl UsageSnapshot {
    /// Builds a snapshot from today's count and the bucket's available tokens.
    pub fn new(count: u32, limit: u32, remaining: u32) -> Self {
        Self {
            count,
            limit,
            remaining,
            has_reached_limit: remaining == 0,
        }
    }
}
