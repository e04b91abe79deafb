//! Persistence seams for refresh-token records and accounts.
//!
//! Each concern is an async trait with a Postgres implementation for
//! production and an in-memory one for tests and local runs.

mod accounts;
mod memory;
mod postgres;
mod refresh_tokens;

use thiserror::Error;

pub use accounts::{Account, AccountStore, AccountUpdate};
pub use memory::{MemoryAccountStore, MemoryRefreshTokenStore};
pub use postgres::{PgAccountStore, PgRefreshTokenStore};
pub use refresh_tokens::{NewRefreshToken, RefreshTokenRecord, RefreshTokenStore};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Another record already carries this token hash
    #[error("duplicate refresh token hash")]
    DuplicateHash,
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}
