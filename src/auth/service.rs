//! Token lifecycle manager.
//!
//! Issues, rotates and revokes access/refresh pairs. Refresh tokens form
//! families (one per login); presenting an already-rotated refresh token
//! revokes the whole family.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::alert::{ReuseAlert, ReuseIncident, TracingReuseAlert};
use super::claims::{Claims, PrincipalType, Role, TokenKind, TokenSubject};
use super::errors::{TokenError, TokenResult};
use super::jwt::{SignedToken, TokenCodec};
use super::keys::KeyRing;
use super::refresh_token::{generate_family_id, hash_token};
use crate::store::{NewRefreshToken, RefreshTokenRecord, RefreshTokenStore, StoreError};

const MAX_ISSUE_ATTEMPTS: u32 = 2;

/// Access/refresh pair handed back to the client
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct TokenService {
    store: Arc<dyn RefreshTokenStore>,
    codec: TokenCodec,
    keys: Arc<KeyRing>,
    alert: Arc<dyn ReuseAlert>,
}

impl TokenService {
    pub fn new(store: Arc<dyn RefreshTokenStore>, codec: TokenCodec, keys: KeyRing) -> Self {
        Self {
            store,
            codec,
            keys: Arc::new(keys),
            alert: Arc::new(TracingReuseAlert),
        }
    }

    /// Replace the reuse alert hook
    pub fn with_alert(mut self, alert: Arc<dyn ReuseAlert>) -> Self {
        self.alert = alert;
        self
    }

    pub fn keys(&self) -> &KeyRing {
        &self.keys
    }

    /// Start a new family: sign a pair and persist the refresh record
    pub async fn create_token_pair(
        &self,
        subject_id: Uuid,
        email: &str,
        role: Role,
        principal: PrincipalType,
    ) -> TokenResult<TokenPair> {
        let subject = TokenSubject {
            id: subject_id,
            email: email.to_string(),
            role,
        };
        let family_id = generate_family_id();

        let pair = self.issue_pair(&subject, &family_id, principal).await?;

        tracing::info!(
            user_id = %subject_id,
            family_id = %family_id,
            principal = %principal,
            "Token family created"
        );
        Ok(pair)
    }

    /// Rotate a refresh token within its family
    ///
    /// # Errors
    /// - `InvalidSignature` / `Expired` / `Malformed`: codec rejected the token
    /// - `InvalidTokenType`: not a refresh token, or no family claim
    /// - `TokenNotFound`: no record for this bearer value
    /// - `TokenReuseDetected`: the record was already revoked; the family is now revoked
    /// - `TokenExpired`: the record is past its stored expiry
    pub async fn refresh_token_pair(
        &self,
        refresh_token: &str,
        principal: PrincipalType,
    ) -> TokenResult<TokenPair> {
        let keys = self.keys.keys(principal);
        let claims = self.codec.verify(refresh_token, &keys.refresh_secret)?;
        let claimed_family = match (&claims.kind, &claims.family) {
            (TokenKind::Refresh, Some(family)) => family.clone(),
            _ => return Err(TokenError::InvalidTokenType),
        };

        let token_hash = hash_token(refresh_token);
        let record = match self.store.find_by_hash(&token_hash).await? {
            Some(record) => record,
            None => {
                // Log the claimed family; never revoke on it.
                tracing::warn!(
                    claimed_family = %claimed_family,
                    subject = %claims.sub,
                    principal = %principal,
                    "Refresh token not found in store"
                );
                return Err(TokenError::TokenNotFound);
            }
        };

        if record.is_revoked() {
            return Err(self.compromised(&record, principal).await);
        }

        if record.is_expired_at(Utc::now()) {
            tracing::info!(
                user_id = %record.user_id,
                family_id = %record.family_id,
                "Refresh token record expired"
            );
            return Err(TokenError::TokenExpired);
        }

        // A lost swap means another presentation consumed the token first.
        if !self.store.revoke(record.id).await? {
            return Err(self.compromised(&record, principal).await);
        }

        let subject = claims.subject()?;
        let pair = self.issue_pair(&subject, &record.family_id, principal).await?;

        tracing::info!(
            user_id = %record.user_id,
            family_id = %record.family_id,
            principal = %principal,
            "Refresh token rotated"
        );
        Ok(pair)
    }

    /// Revoke every live token of a family
    pub async fn revoke_family(&self, family_id: &str) -> TokenResult<u64> {
        let revoked = self.store.revoke_family(family_id).await?;
        tracing::info!(family_id = %family_id, revoked, "Token family revoked");
        Ok(revoked)
    }

    /// Logout: revoke the family of the presented refresh token
    ///
    /// Unknown tokens are a no-op; logout never reveals whether a token existed.
    pub async fn revoke_family_by_token(&self, refresh_token: &str) -> TokenResult<()> {
        let token_hash = hash_token(refresh_token);
        match self.store.find_by_hash(&token_hash).await? {
            Some(record) => {
                self.revoke_family(&record.family_id).await?;
            }
            None => {
                tracing::debug!("Logout with unknown refresh token");
            }
        }
        Ok(())
    }

    /// Revoke every session of a subject (account disabled, password reset)
    pub async fn revoke_all_for_subject(&self, subject_id: Uuid) -> TokenResult<u64> {
        let revoked = self.store.revoke_all_for_subject(subject_id).await?;
        tracing::info!(user_id = %subject_id, revoked, "All refresh tokens revoked for user");
        Ok(revoked)
    }

    /// Verify an access token for `principal` and require the access kind
    pub fn verify_access_token(&self, token: &str, principal: PrincipalType) -> TokenResult<Claims> {
        let claims = self
            .codec
            .verify(token, &self.keys.keys(principal).access_secret)?;
        if claims.kind != TokenKind::Access {
            return Err(TokenError::InvalidTokenType);
        }
        Ok(claims)
    }

    async fn issue_pair(
        &self,
        subject: &TokenSubject,
        family_id: &str,
        principal: PrincipalType,
    ) -> TokenResult<TokenPair> {
        let keys = self.keys.keys(principal);

        let access = self.codec.sign(
            TokenKind::Access,
            subject,
            None,
            &keys.access_secret,
            self.keys.access_ttl(),
        )?;
        let mut refresh = self.sign_refresh(subject, family_id, principal)?;
        let mut attempt = 1;

        // Each re-sign draws a fresh jti, so the hash changes
        loop {
            let created = self
                .store
                .create(NewRefreshToken {
                    user_id: subject.id,
                    token_hash: hash_token(&refresh.token),
                    family_id: family_id.to_string(),
                    expires_at: refresh.expires_at,
                })
                .await;

            match created {
                Ok(_) => break,
                Err(StoreError::DuplicateHash) if attempt < MAX_ISSUE_ATTEMPTS => {
                    tracing::warn!(
                        family_id = %family_id,
                        user_id = %subject.id,
                        "Refresh token hash collision; re-signing"
                    );
                    refresh = self.sign_refresh(subject, family_id, principal)?;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
        })
    }

    fn sign_refresh(
        &self,
        subject: &TokenSubject,
        family_id: &str,
        principal: PrincipalType,
    ) -> TokenResult<SignedToken> {
        let keys = self.keys.keys(principal);
        Ok(self.codec.sign(
            TokenKind::Refresh,
            subject,
            Some(family_id),
            &keys.refresh_secret,
            keys.refresh_ttl,
        )?)
    }

    /// Reuse response: revoke the family, raise the alert, return the error
    async fn compromised(&self, record: &RefreshTokenRecord, principal: PrincipalType) -> TokenError {
        let revoked_records = match self.store.revoke_family(&record.family_id).await {
            Ok(count) => count,
            Err(e) => return TokenError::from(e),
        };

        self.alert.token_reuse_detected(&ReuseIncident {
            family_id: record.family_id.clone(),
            user_id: record.user_id,
            record_id: record.id,
            principal,
            revoked_records,
            detected_at: Utc::now(),
        });

        TokenError::TokenReuseDetected
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("codec", &self.codec)
            .field("keys", &self.keys)
            .finish()
    }
}
