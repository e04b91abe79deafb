//! In-memory stores.
//!
//! Same atomicity contract as the Postgres stores: every operation runs
//! under one lock acquisition, so a revoke is a true compare-and-swap.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{
    Account, AccountStore, AccountUpdate, NewRefreshToken, RefreshTokenRecord, RefreshTokenStore,
    StoreError,
};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex
        .lock()
        .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))
}

#[derive(Debug, Default)]
pub struct MemoryRefreshTokenStore {
    /// Keyed by token hash
    records: Mutex<HashMap<String, RefreshTokenRecord>>,
}

impl MemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully-formed record, bypassing `create`
    pub fn insert_record(&self, record: RefreshTokenRecord) -> Result<(), StoreError> {
        let mut records = lock(&self.records)?;
        if records.contains_key(&record.token_hash) {
            return Err(StoreError::DuplicateHash);
        }
        records.insert(record.token_hash.clone(), record);
        Ok(())
    }

    pub fn find_by_subject(&self, user_id: Uuid) -> Result<Vec<RefreshTokenRecord>, StoreError> {
        let records = lock(&self.records)?;
        let mut found: Vec<_> = records
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by_key(|r| r.created_at);
        Ok(found)
    }

    fn revoke_where<F>(&self, predicate: F) -> Result<u64, StoreError>
    where
        F: Fn(&RefreshTokenRecord) -> bool,
    {
        let now = Utc::now();
        let mut records = lock(&self.records)?;
        let mut changed = 0;
        for record in records.values_mut() {
            if record.revoked_at.is_none() && predicate(record) {
                record.revoked_at = Some(now);
                changed += 1;
            }
        }
        Ok(changed)
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn create(&self, token: NewRefreshToken) -> Result<RefreshTokenRecord, StoreError> {
        let record = RefreshTokenRecord {
            id: Uuid::new_v4(),
            user_id: token.user_id,
            token_hash: token.token_hash,
            family_id: token.family_id,
            expires_at: token.expires_at,
            revoked_at: None,
            created_at: Utc::now(),
        };
        self.insert_record(record.clone())?;
        Ok(record)
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, StoreError> {
        Ok(lock(&self.records)?.get(token_hash).cloned())
    }

    async fn revoke(&self, record_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.revoke_where(|r| r.id == record_id)? == 1)
    }

    async fn revoke_family(&self, family_id: &str) -> Result<u64, StoreError> {
        self.revoke_where(|r| r.family_id == family_id)
    }

    async fn revoke_all_for_subject(&self, user_id: Uuid) -> Result<u64, StoreError> {
        self.revoke_where(|r| r.user_id == user_id)
    }

    async fn find_family(&self, family_id: &str) -> Result<Vec<RefreshTokenRecord>, StoreError> {
        let records = lock(&self.records)?;
        let mut family: Vec<_> = records
            .values()
            .filter(|r| r.family_id == family_id)
            .cloned()
            .collect();
        family.sort_by_key(|r| r.created_at);
        Ok(family)
    }
}

#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    accounts: Mutex<HashMap<Uuid, Account>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        Ok(lock(&self.accounts)?.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        Ok(lock(&self.accounts)?
            .values()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn set_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        if let Some(account) = lock(&self.accounts)?.get_mut(&id) {
            account.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
        must_change_password: bool,
    ) -> Result<bool, StoreError> {
        match lock(&self.accounts)?.get_mut(&id) {
            Some(account) => {
                account.password_hash = password_hash.to_string();
                account.must_change_password = must_change_password;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_flags(&self, id: Uuid, update: &AccountUpdate) -> Result<Option<Account>, StoreError> {
        let mut accounts = lock(&self.accounts)?;
        Ok(accounts.get_mut(&id).map(|account| {
            if let Some(is_active) = update.is_active {
                account.is_active = is_active;
            }
            if let Some(must_change) = update.must_change_password {
                account.must_change_password = must_change;
            }
            account.clone()
        }))
    }

    async fn create(&self, account: Account) -> Result<(), StoreError> {
        let mut accounts = lock(&self.accounts)?;
        if accounts.values().any(|a| a.email == account.email) {
            return Err(StoreError::Backend(format!(
                "email already registered: {}",
                account.email
            )));
        }
        accounts.insert(account.id, account);
        Ok(())
    }
}
