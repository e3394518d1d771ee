//! SyncLog entity model
//!
//! This module contains the SeaORM entity model for the append-only
//! sync_logs table, which records the outcome of every probe attempt.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

/// Audit record for one probe invocation
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "sync_logs")]
pub struct Model {
    /// Unique identifier for the log line (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Account the probe ran against
    pub account_id: Uuid,

    /// Operation name (e.g., "health_check")
    pub operation: String,

    /// Outcome classification: "ok", "soft_fail" or "fail"
    pub outcome: String,

    /// HTTP status returned to the caller, if one was determined
    pub http_status: Option<i32>,

    /// Human-readable outcome detail
    pub message: Option<String>,

    /// Refresh/retry attempts consumed during the invocation
    pub retry_count: i32,

    /// Provider tag (e.g., "ebay")
    pub provider: String,

    /// Timestamp when the record was appended
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
