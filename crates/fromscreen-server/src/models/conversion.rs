//! Conversion model for storing finished markup artifacts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A finished conversion stored in the database.
///
/// Rows are written once, after the upstream stream has been fully consumed
/// and the markup canonicalized, and are never updated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Conversion {
    /// Identifier minted at request start and disclosed in the `id` event.
    pub id: Uuid,
    /// Owner key derived from the caller's session token.
    pub owner: String,
    /// Canonical formatted markup.
    pub markup: String,
    /// Optional preview image. Not written by the conversion pipeline.
    pub preview_image: Option<String>,
    /// When this record was created.
    pub created_at: DateTime<Utc>,
}

/// Data required to create a new conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewConversion {
    pub id: Uuid,
    pub owner: String,
    pub markup: String,
}
