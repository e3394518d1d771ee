//! OAuth token repository
//!
//! Access to the oauth_tokens table. The component treats the
//! most-recently-updated row per account as the current generation and
//! overwrites it in place. Writes that install a new token generation are
//! compare-and-swap guarded by the observed `updated_at` so concurrent
//! refreshes serialize instead of clobbering each other.

use anyhow::Result;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

use crate::legacy::MigratedToken;
use crate::models::oauth_token::{self, Column, Entity as OauthToken};

/// Outcome of a compare-and-swap write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// The write committed; no concurrent writer had advanced the row
    Committed,
    /// A concurrent writer advanced the row first; re-read to adopt it
    Lost,
}

/// New token generation produced by a successful refresh grant.
#[derive(Debug, Clone)]
pub struct NewTokenSet {
    pub access_token: String,
    pub expires_at: chrono::DateTime<Utc>,
    /// Present only when the provider rotated the refresh token
    pub refresh_token_ciphertext: Option<Vec<u8>>,
    pub encryption_iv: Option<Vec<u8>>,
}

/// Repository for OAuth token state
#[derive(Debug, Clone)]
pub struct TokenRepository {
    db: DatabaseConnection,
}

impl TokenRepository {
    /// Creates a new TokenRepository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Reads the current (most-recently-updated) token record for an account
    pub async fn find_current(&self, account_id: Uuid) -> Result<Option<oauth_token::Model>> {
        Ok(OauthToken::find()
            .filter(Column::AccountId.eq(account_id))
            .order_by_desc(Column::UpdatedAt)
            .order_by_desc(Column::CreatedAt)
            .one(&self.db)
            .await?)
    }

    /// Rewrites a legacy row into the modern encoding.
    ///
    /// Guarded by the observed `updated_at`: if a concurrent invocation
    /// already migrated (or refreshed) the row, this write is a no-op.
    pub async fn persist_migrated(
        &self,
        record: &oauth_token::Model,
        migrated: &MigratedToken,
    ) -> Result<CasOutcome> {
        let result = OauthToken::update_many()
            .col_expr(
                Column::RefreshTokenCiphertext,
                Expr::value(Some(migrated.refresh_token_ciphertext.clone())),
            )
            .col_expr(
                Column::EncryptionIv,
                Expr::value(Some(migrated.encryption_iv.clone())),
            )
            .col_expr(
                Column::UpdatedAt,
                Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(Utc::now())),
            )
            .filter(Column::Id.eq(record.id))
            .filter(Column::UpdatedAt.eq(record.updated_at))
            .exec(&self.db)
            .await?;

        Ok(if result.rows_affected == 1 {
            CasOutcome::Committed
        } else {
            CasOutcome::Lost
        })
    }

    /// Installs a new token generation after a successful refresh grant.
    ///
    /// Access token and expiry are always written; the refresh token fields
    /// are only touched when the provider rotated the token, so an omitted
    /// rotation keeps the old (still valid) refresh token in place.
    pub async fn persist_refreshed(
        &self,
        record: &oauth_token::Model,
        new_tokens: &NewTokenSet,
    ) -> Result<CasOutcome> {
        let mut update = OauthToken::update_many()
            .col_expr(
                Column::AccessToken,
                Expr::value(Some(new_tokens.access_token.clone())),
            )
            .col_expr(
                Column::ExpiresAt,
                Expr::value(Some(sea_orm::prelude::DateTimeWithTimeZone::from(
                    new_tokens.expires_at,
                ))),
            )
            .col_expr(
                Column::UpdatedAt,
                Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(Utc::now())),
            );

        if let (Some(ciphertext), Some(iv)) = (
            new_tokens.refresh_token_ciphertext.as_ref(),
            new_tokens.encryption_iv.as_ref(),
        ) {
            update = update
                .col_expr(
                    Column::RefreshTokenCiphertext,
                    Expr::value(Some(ciphertext.clone())),
                )
                .col_expr(Column::EncryptionIv, Expr::value(Some(iv.clone())));
        }

        let result = update
            .filter(Column::Id.eq(record.id))
            .filter(Column::UpdatedAt.eq(record.updated_at))
            .exec(&self.db)
            .await?;

        Ok(if result.rows_affected == 1 {
            CasOutcome::Committed
        } else {
            CasOutcome::Lost
        })
    }
}
