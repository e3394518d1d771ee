//! # Data Models
//!
//! This module contains all the data models used throughout the Marketplace
//! Connect API.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod marketplace_account;
pub mod oauth_token;
pub mod provider_app_credentials;
pub mod sync_log;

pub use marketplace_account::Entity as MarketplaceAccount;
pub use oauth_token::Entity as OauthToken;
pub use provider_app_credentials::Entity as ProviderAppCredentials;
pub use sync_log::Entity as SyncLog;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "marketplace-connect".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
