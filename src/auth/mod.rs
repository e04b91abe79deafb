/// Authentication module
///
/// Token signing and verification, password hashing, and the refresh-token
/// lifecycle (issue, rotate, revoke, reuse detection).

mod alert;
mod claims;
mod errors;
mod jwt;
mod keys;
mod password;
mod refresh_token;
mod service;

pub use alert::{ReuseAlert, ReuseIncident, TracingReuseAlert};
pub use claims::{Claims, PrincipalType, Role, TokenKind, TokenSubject};
pub use errors::{TokenError, TokenResult};
pub use jwt::{CodecError, SignedToken, TokenCodec};
pub use keys::{KeyRing, PrincipalKeys};
pub use password::{generate_temporary_password, validate_password_strength, CredentialHasher};
pub use refresh_token::{generate_family_id, hash_token};
pub use service::{TokenPair, TokenService};
