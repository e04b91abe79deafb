/// JWT Claims structure
///
/// Represents the payload carried by both access and refresh tokens,
/// together with the small enums that discriminate them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::auth::TokenError;

/// Account role as stored on the account and embedded in tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Player,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Player => "PLAYER",
            Role::SuperAdmin => "SUPER_ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PLAYER" => Ok(Role::Player),
            "SUPER_ADMIN" => Ok(Role::SuperAdmin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Which secret pair and refresh lifetime apply to a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrincipalType {
    Player,
    Admin,
}

impl fmt::Display for PrincipalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrincipalType::Player => f.write_str("player"),
            PrincipalType::Admin => f.write_str("admin"),
        }
    }
}

/// Access vs refresh discriminator, serialized as the `type` claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Identity embedded in every token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

/// JWT claims for access and refresh tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (account ID as UUID string)
    pub sub: String,
    pub email: String,
    pub role: Role,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    /// Rotation family, refresh tokens only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    /// Unique token id; keeps two tokens minted in the same second distinct
    pub jti: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    /// Extract the subject id
    ///
    /// # Errors
    /// Returns `Malformed` if the subject is not a valid UUID
    pub fn subject_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::Malformed)
    }

    pub fn subject(&self) -> Result<TokenSubject, TokenError> {
        Ok(TokenSubject {
            id: self.subject_id()?,
            email: self.email.clone(),
            role: self.role,
        })
    }
}
