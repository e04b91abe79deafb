use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::StoreError;
use crate::auth::Role;

/// Account as owned by user management
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub must_change_password: bool,
    pub role: Role,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Partial update of the administrative flags
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct AccountUpdate {
    pub is_active: Option<bool>,
    pub must_change_password: Option<bool>,
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError>;

    /// Lookup by lower-cased email
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    async fn set_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Replace the password hash; returns `false` if the account does not exist
    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
        must_change_password: bool,
    ) -> Result<bool, StoreError>;

    /// Apply flag changes and return the updated account, if it exists
    async fn update_flags(&self, id: Uuid, update: &AccountUpdate) -> Result<Option<Account>, StoreError>;

    async fn create(&self, account: Account) -> Result<(), StoreError>;
}
