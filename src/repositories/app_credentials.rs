//! Provider app credentials repository
//!
//! Read-only access to the provider_app_credentials table.

use anyhow::Result;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use crate::models::provider_app_credentials::{self, Entity as ProviderAppCredentials};

/// Repository for encrypted OAuth client identity reads
#[derive(Debug, Clone)]
pub struct AppCredentialsRepository {
    db: DatabaseConnection,
}

impl AppCredentialsRepository {
    /// Creates a new AppCredentialsRepository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds the credentials row for one provider+environment pair
    pub async fn find_by_provider_env(
        &self,
        provider: &str,
        environment: &str,
    ) -> Result<Option<provider_app_credentials::Model>> {
        Ok(ProviderAppCredentials::find()
            .filter(provider_app_credentials::Column::Provider.eq(provider))
            .filter(provider_app_credentials::Column::Environment.eq(environment))
            .one(&self.db)
            .await?)
    }
}
