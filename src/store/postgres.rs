//! Postgres-backed stores.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    Account, AccountStore, AccountUpdate, NewRefreshToken, RefreshTokenRecord, RefreshTokenStore,
    StoreError,
};
use crate::auth::Role;

/// Postgres SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

type RecordRow = (
    Uuid,
    Uuid,
    String,
    String,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    DateTime<Utc>,
);

fn record_from_row(row: RecordRow) -> RefreshTokenRecord {
    let (id, user_id, token_hash, family_id, expires_at, revoked_at, created_at) = row;
    RefreshTokenRecord {
        id,
        user_id,
        token_hash,
        family_id,
        expires_at,
        revoked_at,
        created_at,
    }
}

#[derive(Debug, Clone)]
pub struct PgRefreshTokenStore {
    pool: PgPool,
}

impl PgRefreshTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn create(&self, token: NewRefreshToken) -> Result<RefreshTokenRecord, StoreError> {
        let row = sqlx::query_as::<_, RecordRow>(
            r#"
            INSERT INTO refresh_tokens (id, user_id, token_hash, family_id, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, token_hash, family_id, expires_at, revoked_at, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(token.user_id)
        .bind(&token.token_hash)
        .bind(&token.family_id)
        .bind(token.expires_at)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let duplicate = matches!(
                &e,
                sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION)
            );
            if duplicate {
                StoreError::DuplicateHash
            } else {
                StoreError::from(e)
            }
        })?;

        Ok(record_from_row(row))
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let row = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT id, user_id, token_hash, family_id, expires_at, revoked_at, created_at
            FROM refresh_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(record_from_row))
    }

    async fn revoke(&self, record_id: Uuid) -> Result<bool, StoreError> {
        // Conditional update: only the first revoker sees a row change.
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = $1
            WHERE id = $2 AND revoked_at IS NULL
            "#,
        )
        .bind(Utc::now())
        .bind(record_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn revoke_family(&self, family_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = $1
            WHERE family_id = $2 AND revoked_at IS NULL
            "#,
        )
        .bind(Utc::now())
        .bind(family_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn revoke_all_for_subject(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = $1
            WHERE user_id = $2 AND revoked_at IS NULL
            "#,
        )
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn find_family(&self, family_id: &str) -> Result<Vec<RefreshTokenRecord>, StoreError> {
        let rows = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT id, user_id, token_hash, family_id, expires_at, revoked_at, created_at
            FROM refresh_tokens
            WHERE family_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(family_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(record_from_row).collect())
    }
}

type AccountRow = (Uuid, String, String, bool, bool, String, Option<DateTime<Utc>>);

fn account_from_row(row: AccountRow) -> Result<Account, StoreError> {
    let (id, email, password_hash, is_active, must_change_password, role, last_login_at) = row;
    let role = role.parse::<Role>().map_err(StoreError::Backend)?;
    Ok(Account {
        id,
        email,
        password_hash,
        is_active,
        must_change_password,
        role,
        last_login_at,
    })
}

#[derive(Debug, Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, email, password_hash, is_active, must_change_password, role, last_login_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(account_from_row)
        .transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, email, password_hash, is_active, must_change_password, role, last_login_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .map(account_from_row)
        .transpose()
    }

    async fn set_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET last_login_at = $1 WHERE id = $2")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
        must_change_password: bool,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $1, must_change_password = $2, updated_at = $3
            WHERE id = $4
            "#,
        )
        .bind(password_hash)
        .bind(must_change_password)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_flags(&self, id: Uuid, update: &AccountUpdate) -> Result<Option<Account>, StoreError> {
        sqlx::query_as::<_, AccountRow>(
            r#"
            UPDATE users
            SET is_active = COALESCE($1, is_active),
                must_change_password = COALESCE($2, must_change_password),
                updated_at = $3
            WHERE id = $4
            RETURNING id, email, password_hash, is_active, must_change_password, role, last_login_at
            "#,
        )
        .bind(update.is_active)
        .bind(update.must_change_password)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(account_from_row)
        .transpose()
    }

    async fn create(&self, account: Account) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, is_active, must_change_password, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            "#,
        )
        .bind(account.id)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.is_active)
        .bind(account.must_change_password)
        .bind(account.role.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
