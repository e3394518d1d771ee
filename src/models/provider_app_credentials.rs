//! ProviderAppCredentials entity model
//!
//! This module contains the SeaORM entity model for the
//! provider_app_credentials table: the encrypted per-provider,
//! per-environment OAuth client identity. Read-only to this service.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

/// Encrypted OAuth client identity for one provider+environment pair
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "provider_app_credentials")]
pub struct Model {
    /// Unique identifier (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Provider slug (e.g., "ebay")
    pub provider: String,

    /// Provider environment: "sandbox" or "production"
    pub environment: String,

    /// Encrypted OAuth client id; the GCM authentication tag is appended
    pub client_id_ciphertext: Vec<u8>,

    /// Encrypted OAuth client secret; the GCM authentication tag is appended
    pub client_secret_ciphertext: Vec<u8>,

    /// 96-bit IV shared by both ciphertexts of this row
    pub encryption_iv: Vec<u8>,

    /// Timestamp when the row was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the row was last updated
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
