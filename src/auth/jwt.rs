/// JWT Token Signing and Verification
///
/// The only place signing secrets are turned into keys. The codec is
/// principal-agnostic: it checks signature, issuer and expiry, but callers
/// must check the `type` claim themselves.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, Secret};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::claims::{Claims, TokenKind, TokenSubject};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("token signature does not match")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("token could not be parsed")]
    Malformed,
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// A freshly signed token and the expiry embedded in it
#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TokenCodec {
    issuer: String,
}

impl TokenCodec {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
        }
    }

    /// Sign a token of `kind` for `subject`, valid for `ttl` from now
    ///
    /// `family` is embedded only when present; refresh tokens always pass one.
    pub fn sign(
        &self,
        kind: TokenKind,
        subject: &TokenSubject,
        family: Option<&str>,
        secret: &Secret<String>,
        ttl: Duration,
    ) -> Result<SignedToken, CodecError> {
        let now = Utc::now();
        let expires_at = now + ttl;
        let claims = Claims {
            sub: subject.id.to_string(),
            email: subject.email.clone(),
            role: subject.role,
            kind,
            family: family.map(str::to_string),
            jti: Uuid::new_v4().to_string(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
        )
        .map_err(|e| CodecError::Signing(e.to_string()))?;

        Ok(SignedToken { token, expires_at })
    }

    /// Verify signature, issuer and expiry and return the claims
    pub fn verify(&self, token: &str, secret: &Secret<String>) -> Result<Claims, CodecError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        validation.leeway = 0;

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature => CodecError::InvalidSignature,
            ErrorKind::ExpiredSignature => CodecError::Expired,
            _ => {
                tracing::debug!("JWT rejected as malformed: {}", e);
                CodecError::Malformed
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::Role;

    fn secret(s: &str) -> Secret<String> {
        Secret::new(s.to_string())
    }

    fn subject() -> TokenSubject {
        TokenSubject {
            id: Uuid::new_v4(),
            email: "player1@example.com".to_string(),
            role: Role::Player,
        }
    }

    #[test]
    fn test_sign_and_verify_refresh_token() {
        let codec = TokenCodec::new("test");
        let key = secret("test-secret-key-at-least-32-characters-long");
        let subject = subject();

        let signed = codec
            .sign(TokenKind::Refresh, &subject, Some("family-1"), &key, Duration::days(7))
            .expect("Failed to sign token");
        let claims = codec.verify(&signed.token, &key).expect("Failed to verify token");

        assert_eq!(claims.sub, subject.id.to_string());
        assert_eq!(claims.email, subject.email);
        assert_eq!(claims.role, Role::Player);
        assert_eq!(claims.kind, TokenKind::Refresh);
        assert_eq!(claims.family.as_deref(), Some("family-1"));
        assert_eq!(claims.exp, signed.expires_at.timestamp());
        assert_eq!(claims.exp - claims.iat, Duration::days(7).num_seconds());
    }

    #[test]
    fn test_tokens_signed_in_same_second_differ() {
        let codec = TokenCodec::new("test");
        let key = secret("test-secret-key-at-least-32-characters-long");
        let subject = subject();

        let a = codec.sign(TokenKind::Refresh, &subject, Some("f"), &key, Duration::days(7)).unwrap();
        let b = codec.sign(TokenKind::Refresh, &subject, Some("f"), &key, Duration::days(7)).unwrap();

        assert_ne!(a.token, b.token);
    }

    #[test]
    fn test_wrong_secret_is_invalid_signature() {
        let codec = TokenCodec::new("test");
        let signed = codec
            .sign(
                TokenKind::Access,
                &subject(),
                None,
                &secret("player-access-secret-0123456789abcdef"),
                Duration::hours(1),
            )
            .unwrap();

        let result = codec.verify(&signed.token, &secret("admin-access-secret-0123456789abcdef"));

        assert_eq!(result.unwrap_err(), CodecError::InvalidSignature);
    }

    #[test]
    fn test_expired_token() {
        let codec = TokenCodec::new("test");
        let key = secret("test-secret-key-at-least-32-characters-long");
        let signed = codec
            .sign(TokenKind::Access, &subject(), None, &key, Duration::seconds(-60))
            .unwrap();

        assert_eq!(codec.verify(&signed.token, &key).unwrap_err(), CodecError::Expired);
    }

    #[test]
    fn test_garbage_is_malformed() {
        let codec = TokenCodec::new("test");
        let key = secret("test-secret-key-at-least-32-characters-long");

        assert_eq!(codec.verify("invalid.token.here", &key).unwrap_err(), CodecError::Malformed);
        assert_eq!(codec.verify("", &key).unwrap_err(), CodecError::Malformed);
    }

    #[test]
    fn test_tampered_token() {
        let codec = TokenCodec::new("test");
        let key = secret("test-secret-key-at-least-32-characters-long");
        let signed = codec
            .sign(TokenKind::Access, &subject(), None, &key, Duration::hours(1))
            .unwrap();

        let tampered = format!("{}X", signed.token);

        assert!(codec.verify(&tampered, &key).is_err());
    }

    #[test]
    fn test_wrong_issuer() {
        let key = secret("test-secret-key-at-least-32-characters-long");
        let signed = TokenCodec::new("test")
            .sign(TokenKind::Access, &subject(), None, &key, Duration::hours(1))
            .unwrap();

        let result = TokenCodec::new("wrong-issuer").verify(&signed.token, &key);

        assert_eq!(result.unwrap_err(), CodecError::Malformed);
    }
}
