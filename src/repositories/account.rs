//! Marketplace account repository
//!
//! Read-only access to the marketplace_accounts table; account lifecycle is
//! owned by the business layer.

use anyhow::Result;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::models::marketplace_account::{self, Entity as MarketplaceAccount};

/// Repository for marketplace account reads
#[derive(Debug, Clone)]
pub struct AccountRepository {
    db: DatabaseConnection,
}

impl AccountRepository {
    /// Creates a new AccountRepository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds an active account by id; inactive accounts are treated as unknown
    pub async fn find_active(&self, id: Uuid) -> Result<Option<marketplace_account::Model>> {
        Ok(MarketplaceAccount::find_by_id(id)
            .filter(marketplace_account::Column::IsActive.eq(true))
            .one(&self.db)
            .await?)
    }
}
