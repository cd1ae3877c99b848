//! Conversion persistence.
//!
//! The pipeline talks to a [`ConversionStore`] handle built once by the
//! process entry point. PostgreSQL backs production; the in-memory store
//! serves tests and database-less runs.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::conversion::{Conversion, NewConversion};

/// Maximum number of conversions returned by a history listing.
pub const MAX_HISTORY_LIMIT: i64 = 50;

/// Errors raised by a conversion store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("conversion {0} already exists")]
    DuplicateId(Uuid),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Insert-once, read-many storage for finished conversions.
#[async_trait]
pub trait ConversionStore: Send + Sync {
    /// Inserts a new conversion. Never updates an existing row.
    async fn insert(&self, conversion: NewConversion) -> Result<Conversion, StoreError>;

    /// Looks up a conversion by id.
    async fn find(&self, id: Uuid) -> Result<Option<Conversion>, StoreError>;

    /// Lists the most recent conversions, newest first.
    async fn recent(&self, limit: i64) -> Result<Vec<Conversion>, StoreError>;
}

/// PostgreSQL-backed conversion store.
#[derive(Debug, Clone)]
pub struct PgConversionStore {
    pool: PgPool,
}

impl PgConversionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversionStore for PgConversionStore {
    async fn insert(&self, conversion: NewConversion) -> Result<Conversion, StoreError> {
        let row = sqlx::query_as::<_, Conversion>(
            r#"
            INSERT INTO conversions (id, owner, markup, created_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING id, owner, markup, preview_image, created_at
            "#,
        )
        .bind(conversion.id)
        .bind(&conversion.owner)
        .bind(&conversion.markup)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                StoreError::DuplicateId(conversion.id)
            }
            other => StoreError::Database(other),
        })?;

        Ok(row)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Conversion>, StoreError> {
        let row = sqlx::query_as::<_, Conversion>(
            r#"
            SELECT id, owner, markup, preview_image, created_at
            FROM conversions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn recent(&self, limit: i64) -> Result<Vec<Conversion>, StoreError> {
        let rows = sqlx::query_as::<_, Conversion>(
            r#"
            SELECT id, owner, markup, preview_image, created_at
            FROM conversions
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit.clamp(1, MAX_HISTORY_LIMIT))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

/// In-process conversion store.
#[derive(Debug, Default)]
pub struct MemoryConversionStore {
    rows: RwLock<HashMap<Uuid, Conversion>>,
}

impl MemoryConversionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored conversions.
    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ConversionStore for MemoryConversionStore {
    async fn insert(&self, conversion: NewConversion) -> Result<Conversion, StoreError> {
        let mut rows = self.rows.write().map_err(|_| StoreError::Poisoned)?;
        if rows.contains_key(&conversion.id) {
            return Err(StoreError::DuplicateId(conversion.id));
        }

        let row = Conversion {
            id: conversion.id,
            owner: conversion.owner,
            markup: conversion.markup,
            preview_image: None,
            created_at: Utc::now(),
        };
        rows.insert(row.id, row.clone());

        Ok(row)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Conversion>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::Poisoned)?;
        Ok(rows.get(&id).cloned())
    }

    async fn recent(&self, limit: i64) -> Result<Vec<Conversion>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::Poisoned)?;
        let mut all: Vec<Conversion> = rows.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        all.truncate(limit.clamp(1, MAX_HISTORY_LIMIT) as usize);
        Ok(all)
    }
}
