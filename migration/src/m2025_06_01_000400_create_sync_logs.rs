//! Migration to create the sync_logs table.
//!
//! This migration creates the append-only sync_logs table which records the
//! outcome of every marketplace probe attempt.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SyncLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyncLogs::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SyncLogs::AccountId).uuid().not_null())
                    .col(ColumnDef::new(SyncLogs::Operation).text().not_null())
                    .col(ColumnDef::new(SyncLogs::Outcome).text().not_null())
                    .col(ColumnDef::new(SyncLogs::HttpStatus).integer().null())
                    .col(ColumnDef::new(SyncLogs::Message).text().null())
                    .col(
                        ColumnDef::new(SyncLogs::RetryCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(SyncLogs::Provider).text().not_null())
                    .col(
                        ColumnDef::new(SyncLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sync_logs_account_created")
                    .table(SyncLogs::Table)
                    .col(SyncLogs::AccountId)
                    .col(SyncLogs::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_sync_logs_account_created")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(SyncLogs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SyncLogs {
    Table,
    Id,
    AccountId,
    Operation,
    Outcome,
    HttpStatus,
    Message,
    RetryCount,
    Provider,
    CreatedAt,
}
