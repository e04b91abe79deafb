use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::StoreError;

/// Persisted refresh token; the raw bearer value is never stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub family_id: String,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Unrevoked and unexpired
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked() && !self.is_expired_at(now)
    }
}

/// Insert payload for a new record
#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub user_id: Uuid,
    pub token_hash: String,
    pub family_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Refresh-token persistence
///
/// Every mutation must be a single atomic operation in the backend.
/// `revoke` in particular is a compare-and-swap on a null `revoked_at`:
/// it reports `true` only to the one caller that performed the transition.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// # Errors
    /// `DuplicateHash` if a record with the same hash exists
    async fn create(&self, token: NewRefreshToken) -> Result<RefreshTokenRecord, StoreError>;

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, StoreError>;

    /// Revoke one record; `Ok(false)` if it was already revoked (or unknown)
    async fn revoke(&self, record_id: Uuid) -> Result<bool, StoreError>;

    /// Revoke every unrevoked record of a family, returning how many changed
    async fn revoke_family(&self, family_id: &str) -> Result<u64, StoreError>;

    /// Revoke every unrevoked record of a subject, returning how many changed
    async fn revoke_all_for_subject(&self, user_id: Uuid) -> Result<u64, StoreError>;

    /// All records of a family, oldest first
    async fn find_family(&self, family_id: &str) -> Result<Vec<RefreshTokenRecord>, StoreError>;
}
