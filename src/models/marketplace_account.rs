//! MarketplaceAccount entity model
//!
//! This module contains the SeaORM entity model for the marketplace_accounts
//! table, which identifies a seller's connection to one external marketplace
//! provider in one environment. Owned by the business layer; this service
//! only reads active accounts.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

/// MarketplaceAccount entity representing one seller/provider/environment link
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "marketplace_accounts")]
pub struct Model {
    /// Unique identifier for the account (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Provider slug (e.g., "ebay")
    pub provider: String,

    /// Provider environment: "sandbox" or "production"
    pub environment: String,

    /// Display name for the account (optional)
    pub display_name: Option<String>,

    /// Whether the account is active; inactive accounts are treated as unknown
    pub is_active: bool,

    /// Timestamp when the account was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the account was last updated
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::oauth_token::Entity")]
    OauthToken,
}

impl Related<super::oauth_token::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OauthToken.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
