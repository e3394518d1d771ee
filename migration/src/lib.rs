//! Database migrations for the Marketplace Connect API.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2025_06_01_000100_create_marketplace_accounts;
mod m2025_06_01_000200_create_oauth_tokens;
mod m2025_06_01_000300_create_provider_app_credentials;
mod m2025_06_01_000400_create_sync_logs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_06_01_000100_create_marketplace_accounts::Migration),
            Box::new(m2025_06_01_000200_create_oauth_tokens::Migration),
            Box::new(m2025_06_01_000300_create_provider_app_credentials::Migration),
            Box::new(m2025_06_01_000400_create_sync_logs::Migration),
        ]
    }
}
