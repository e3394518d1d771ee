//! # Repositories
//!
//! This module contains typed database access for the four tables this
//! service touches.

pub mod account;
pub mod app_credentials;
pub mod sync_log;
pub mod token;

pub use account::AccountRepository;
pub use app_credentials::AppCredentialsRepository;
pub use sync_log::SyncLogRepository;
pub use token::TokenRepository;
