//! Migration to create the marketplace_accounts table.
//!
//! This migration creates the marketplace_accounts table which identifies a
//! seller's connection to one external marketplace provider in one environment.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MarketplaceAccounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MarketplaceAccounts::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(MarketplaceAccounts::Provider)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MarketplaceAccounts::Environment)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MarketplaceAccounts::DisplayName)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MarketplaceAccounts::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(MarketplaceAccounts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(MarketplaceAccounts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Index for the active-account lookups performed on every health check
        manager
            .create_index(
                Index::create()
                    .name("idx_marketplace_accounts_provider_env")
                    .table(MarketplaceAccounts::Table)
                    .col(MarketplaceAccounts::Provider)
                    .col(MarketplaceAccounts::Environment)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_marketplace_accounts_provider_env")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(MarketplaceAccounts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum MarketplaceAccounts {
    Table,
    Id,
    Provider,
    Environment,
    DisplayName,
    IsActive,
    CreatedAt,
    UpdatedAt,
}
