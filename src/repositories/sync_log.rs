//! Sync log repository
//!
//! Append-only writes to the sync_logs table.

use anyhow::Result;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use uuid::Uuid;

use crate::models::sync_log::{ActiveModel, Model};

/// Repository for audit record appends
#[derive(Debug, Clone)]
pub struct SyncLogRepository {
    db: DatabaseConnection,
}

impl SyncLogRepository {
    /// Creates a new SyncLogRepository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Appends one audit record
    #[allow(clippy::too_many_arguments)]
    pub async fn append(
        &self,
        account_id: Uuid,
        operation: &str,
        outcome: &str,
        http_status: Option<i32>,
        message: Option<String>,
        retry_count: i32,
        provider: &str,
    ) -> Result<Model> {
        let record = ActiveModel {
            id: Set(Uuid::new_v4()),
            account_id: Set(account_id),
            operation: Set(operation.to_string()),
            outcome: Set(outcome.to_string()),
            http_status: Set(http_status),
            message: Set(message),
            retry_count: Set(retry_count),
            provider: Set(provider.to_string()),
            created_at: Set(Utc::now().into()),
        };

        Ok(record.insert(&self.db).await?)
    }
}
