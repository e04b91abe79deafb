//! Token lifecycle error types.

use thiserror::Error;

use crate::auth::jwt::CodecError;
use crate::store::StoreError;

/// Token lifecycle errors
///
/// Messages are for logs only; the HTTP layer never echoes them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token is malformed")]
    Malformed,
    #[error("token has expired")]
    Expired,
    /// Wrong `type` claim, or a refresh token without a family
    #[error("invalid token type")]
    InvalidTokenType,
    #[error("refresh token not found")]
    TokenNotFound,
    /// An already-rotated refresh token was presented again
    #[error("refresh token reuse detected")]
    TokenReuseDetected,
    /// Stored record is past its expiry
    #[error("refresh token record expired")]
    TokenExpired,
    #[error("refresh token hash collision")]
    DuplicateHash,
    #[error("token signing failed: {0}")]
    Signing(String),
    #[error("token store unavailable: {0}")]
    Storage(String),
}

impl From<CodecError> for TokenError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::InvalidSignature => TokenError::InvalidSignature,
            CodecError::Expired => TokenError::Expired,
            CodecError::Malformed => TokenError::Malformed,
            CodecError::Signing(msg) => TokenError::Signing(msg),
        }
    }
}

impl From<StoreError> for TokenError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateHash => TokenError::DuplicateHash,
            StoreError::Backend(msg) => TokenError::Storage(msg),
        }
    }
}

/// Result type for token lifecycle operations
pub type TokenResult<T> = Result<T, TokenError>;
