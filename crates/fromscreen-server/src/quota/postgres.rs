//! PostgreSQL-backed quota service.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};

use super::{BucketState, QuotaDecision, QuotaPolicy, QuotaService};
use crate::error::AppError;
use crate::models::usage::{UsageRecord, UsageSnapshot};

#[derive(Debug, FromRow)]
struct BucketRow {
    tokens: i32,
    refilled_at: DateTime<Utc>,
}

impl From<BucketRow> for BucketState {
    fn from(row: BucketRow) -> Self {
        BucketState {
            tokens: u32::try_from(row.tokens).unwrap_or(0),
            refilled_at: row.refilled_at,
        }
    }
}

/// Quota service storing buckets and daily usage in PostgreSQL.
///
/// Each decision runs in one transaction holding a row lock on the owner's
/// bucket, so concurrent requests from one owner are serialized by the
/// database.
#[derive(Debug, Clone)]
pub struct PgQuota {
    pool: PgPool,
    policy: QuotaPolicy,
}

impl PgQuota {
    pub fn new(pool: PgPool, policy: QuotaPolicy) -> Self {
        Self { pool, policy }
    }
}

/// Reads today's usage count for an owner, zero when no row exists.
async fn usage_count(pool: &PgPool, owner: &str, day: NaiveDate) -> Result<u32, AppError> {
    let record: Option<UsageRecord> = sqlx::query_as(
        r#"
        SELECT owner, day, count FROM usage
        WHERE owner = $1 AND day = $2
        "#,
    )
    .bind(owner)
    .bind(day)
    .fetch_optional(pool)
    .await?;

    Ok(record
        .map(|record| u32::try_from(record.count).unwrap_or(0))
        .unwrap_or(0))
}

#[async_trait]
impl QuotaService for PgQuota {
    async fn check_and_consume(&self, owner: &str, cost: u32) -> Result<QuotaDecision, AppError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // Make sure a row exists to lock. A new owner starts with a full bucket.
        sqlx::query(
            r#"
            INSERT INTO quota_buckets (owner, tokens, refilled_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (owner) DO NOTHING
            "#,
        )
        .bind(owner)
        .bind(i32::try_from(self.policy.capacity).unwrap_or(i32::MAX))
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let row: BucketRow = sqlx::query_as(
            r#"
            SELECT tokens, refilled_at FROM quota_buckets
            WHERE owner = $1
            FOR UPDATE
            "#,
        )
        .bind(owner)
        .fetch_one(&mut *tx)
        .await?;

        let mut bucket = BucketState::from(row);
        bucket.refill(&self.policy, now);

        let decision = if bucket.try_consume(cost) {
            sqlx::query(
                r#"
                INSERT INTO usage (owner, day, count)
                VALUES ($1, $2, 1)
                ON CONFLICT (owner, day)
                DO UPDATE SET count = usage.count + 1
                "#,
            )
            .bind(owner)
            .bind(now.date_naive())
            .execute(&mut *tx)
            .await?;

            QuotaDecision::Allow {
                remaining: bucket.tokens,
            }
        } else {
            QuotaDecision::Deny {
                retry_after: bucket.retry_after(&self.policy, now),
            }
        };

        sqlx::query(
            r#"
            UPDATE quota_buckets
            SET tokens = $2, refilled_at = $3
            WHERE owner = $1
            "#,
        )
        .bind(owner)
        .bind(i32::try_from(bucket.tokens).unwrap_or(i32::MAX))
        .bind(bucket.refilled_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(decision)
    }

    async fn usage(&self, owner: &str) -> Result<UsageSnapshot, AppError> {
        let now = Utc::now();

        let row: Option<BucketRow> = sqlx::query_as(
            r#"
            SELECT tokens, refilled_at FROM quota_buckets
            WHERE owner = $1
            "#,
        )
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;

        let remaining = match row {
            Some(row) => {
                let mut bucket = BucketState::from(row);
                bucket.refill(&self.policy, now);
                bucket.tokens
            }
            None => self.policy.capacity,
        };
        let count = usage_count(&self.pool, owner, now.date_naive()).await?;

        Ok(UsageSnapshot::new(count, self.policy.capacity, remaining))
    }
}
