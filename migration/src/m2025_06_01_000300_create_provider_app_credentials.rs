//! Migration to create the provider_app_credentials table.
//!
//! This migration creates the provider_app_credentials table which stores the
//! encrypted per-provider, per-environment OAuth client identity.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProviderAppCredentials::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProviderAppCredentials::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ProviderAppCredentials::Provider)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProviderAppCredentials::Environment)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProviderAppCredentials::ClientIdCiphertext)
                            .binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProviderAppCredentials::ClientSecretCiphertext)
                            .binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProviderAppCredentials::EncryptionIv)
                            .binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProviderAppCredentials::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ProviderAppCredentials::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // One client identity per provider+environment pair
        manager
            .create_index(
                Index::create()
                    .name("idx_provider_app_credentials_provider_env")
                    .table(ProviderAppCredentials::Table)
                    .col(ProviderAppCredentials::Provider)
                    .col(ProviderAppCredentials::Environment)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_provider_app_credentials_provider_env")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(
                Table::drop()
                    .table(ProviderAppCredentials::Table)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum ProviderAppCredentials {
    Table,
    Id,
    Provider,
    Environment,
    ClientIdCiphertext,
    ClientSecretCiphertext,
    EncryptionIv,
    CreatedAt,
    UpdatedAt,
}
