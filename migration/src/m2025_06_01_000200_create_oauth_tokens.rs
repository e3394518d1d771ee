//! Migration to create the oauth_tokens table.
//!
//! This migration creates the oauth_tokens table which stores the mutable
//! credential state for one marketplace account: a short-lived plaintext
//! access token and an encrypted refresh token with its IV.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OauthTokens::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OauthTokens::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OauthTokens::AccountId).uuid().not_null())
                    .col(ColumnDef::new(OauthTokens::AccessToken).text().null())
                    .col(
                        ColumnDef::new(OauthTokens::ExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(OauthTokens::RefreshTokenCiphertext)
                            .binary()
                            .null(),
                    )
                    .col(ColumnDef::new(OauthTokens::EncryptionIv).binary().null())
                    .col(ColumnDef::new(OauthTokens::Scope).text().null())
                    .col(
                        ColumnDef::new(OauthTokens::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(OauthTokens::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_oauth_tokens_account_id")
                            .from(OauthTokens::Table, OauthTokens::AccountId)
                            .to(MarketplaceAccounts::Table, MarketplaceAccounts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // The component always reads the most-recently-updated row per account
        manager
            .create_index(
                Index::create()
                    .name("idx_oauth_tokens_account_updated")
                    .table(OauthTokens::Table)
                    .col(OauthTokens::AccountId)
                    .col(OauthTokens::UpdatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_oauth_tokens_account_updated")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(OauthTokens::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum OauthTokens {
    Table,
    Id,
    AccountId,
    AccessToken,
    ExpiresAt,
    RefreshTokenCiphertext,
    EncryptionIv,
    Scope,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum MarketplaceAccounts {
    Table,
    Id,
}
