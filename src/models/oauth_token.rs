//! OAuthTokenRecord entity model
//!
//! This module contains the SeaORM entity model for the oauth_tokens table.
//! One current row per account: a short-lived plaintext access token plus an
//! AES-256-GCM encrypted refresh token (tag appended to the ciphertext) and
//! its IV. Legacy rows predate the IV column and hold a JSON-encoded
//! ciphertext in the refresh token field with `encryption_iv` empty.

use super::marketplace_account::Entity as MarketplaceAccount;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

/// OAuth token entity holding the mutable credential state for one account
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "oauth_tokens")]
pub struct Model {
    /// Unique identifier for the token record (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Account this token generation belongs to
    pub account_id: Uuid,

    /// Short-lived access token, stored in plaintext
    pub access_token: Option<String>,

    /// Access token expiry
    pub expires_at: Option<DateTimeWithTimeZone>,

    /// Encrypted refresh token; the GCM authentication tag is appended
    pub refresh_token_ciphertext: Option<Vec<u8>>,

    /// 96-bit IV used for the refresh token ciphertext; empty/NULL on legacy rows
    pub encryption_iv: Option<Vec<u8>>,

    /// Space-separated OAuth scope string granted to this token generation
    pub scope: Option<String>,

    /// Timestamp when the token record was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the token record was last updated; doubles as the
    /// compare-and-swap guard for refresh serialization
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "MarketplaceAccount",
        from = "Column::AccountId",
        to = "super::marketplace_account::Column::Id"
    )]
    MarketplaceAccount,
}

impl Related<MarketplaceAccount> for Entity {
    fn to() -> RelationDef {
        Relation::MarketplaceAccount.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
