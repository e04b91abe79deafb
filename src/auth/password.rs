/// Password Hashing and Verification
///
/// Argon2id with cost parameters fixed at construction, plus the password
/// strength policy applied whenever a password is changed.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

use crate::configuration::PasswordSettings;
use crate::error::{AppError, ValidationError};

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;
const TEMPORARY_PASSWORD_LENGTH: usize = 12;

#[derive(Clone)]
pub struct CredentialHasher {
    params: Params,
}

impl CredentialHasher {
    /// # Errors
    /// Returns a config error if the cost parameters are out of Argon2's range
    pub fn new(settings: &PasswordSettings) -> Result<Self, AppError> {
        let params = Params::new(
            settings.memory_cost_kib,
            settings.time_cost,
            settings.parallelism,
            None,
        )
        .map_err(|e| {
            AppError::Config(crate::error::ConfigError::InvalidValue(format!(
                "argon2 parameters: {}",
                e
            )))
        })?;

        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password with a fresh random salt
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
    }

    /// Verify a password against a stored PHC-format hash
    ///
    /// Returns `Ok(false)` on mismatch; only unparseable hashes are errors.
    pub fn verify(&self, hash: &str, password: &str) -> Result<bool, AppError> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| AppError::Internal(format!("Invalid password hash format: {}", e)))?;

        match self.argon2().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AppError::Internal(format!(
                "Password verification failed: {}",
                e
            ))),
        }
    }

    /// Hash on the blocking thread pool so request workers keep serving
    pub async fn hash_async(&self, password: String) -> Result<String, AppError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
    }

    /// Verify on the blocking thread pool
    pub async fn verify_async(&self, hash: String, password: String) -> Result<bool, AppError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&hash, &password))
            .await
            .map_err(|e| {
                AppError::Internal(format!("Password verification task failed: {}", e))
            })?
    }
}

impl std::fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialHasher")
            .field("m_cost", &self.params.m_cost())
            .field("t_cost", &self.params.t_cost())
            .field("p_cost", &self.params.p_cost())
            .finish()
    }
}

/// Validate password strength requirements
///
/// Requirements:
/// - 8 to 128 characters
/// - At least one digit, one lowercase and one uppercase letter
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort(
            "password".to_string(),
            MIN_PASSWORD_LENGTH,
        ));
    }

    // DoS prevention: argon2 cost scales with input
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong(
            "password".to_string(),
            MAX_PASSWORD_LENGTH,
        ));
    }

    let has_digit = password.chars().any(|c| c.is_numeric());
    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_uppercase = password.chars().any(|c| c.is_uppercase());

    if !has_digit || !has_lowercase || !has_uppercase {
        return Err(ValidationError::Rejected(
            "password must contain at least one digit, one lowercase letter, and one uppercase letter"
                .to_string(),
        ));
    }

    Ok(())
}

/// Generate a temporary password for an administrative reset
pub fn generate_temporary_password() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TEMPORARY_PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_hasher() -> CredentialHasher {
        // Cheap parameters keep the suite fast
        CredentialHasher::new(&PasswordSettings {
            memory_cost_kib: 1024,
            time_cost: 1,
            parallelism: 1,
        })
        .expect("valid params")
    }

    #[test]
    fn test_hash_password() {
        let password = "ValidPassword123";
        let hash = test_hasher().hash(password).expect("Failed to hash password");

        assert_ne!(password, hash);
        assert!(hash.starts_with("$argon2id$"));
    }

    #[test]
    fn test_verify_password() {
        let hasher = test_hasher();
        let hash = hasher.hash("ValidPassword123").unwrap();

        assert!(hasher.verify(&hash, "ValidPassword123").unwrap());
        assert!(!hasher.verify(&hash, "WrongPassword123").unwrap());
    }

    #[test]
    fn test_same_password_different_salts() {
        let hasher = test_hasher();
        assert_ne!(hasher.hash("ValidPassword123").unwrap(), hasher.hash("ValidPassword123").unwrap());
    }

    #[test]
    fn test_garbage_hash_is_error() {
        assert!(test_hasher().verify("not-a-phc-string", "whatever").is_err());
    }

    #[tokio::test]
    async fn test_async_hash_and_verify() {
        let hasher = test_hasher();
        let hash = hasher
            .hash_async("ValidPassword123".to_string())
            .await
            .expect("Failed to hash password");

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher
            .verify_async(hash.clone(), "ValidPassword123".to_string())
            .await
            .unwrap());
        assert!(!hasher
            .verify_async(hash, "WrongPassword123".to_string())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_async_verify_garbage_hash_is_error() {
        let result = test_hasher()
            .verify_async("not-a-phc-string".to_string(), "whatever".to_string())
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_default_params_are_accepted() {
        assert!(CredentialHasher::new(&PasswordSettings::default()).is_ok());
    }

    #[test]
    fn test_strength_rules() {
        assert!(validate_password_strength("ValidPassword123").is_ok());
        assert!(validate_password_strength("Short1").is_err());
        assert!(validate_password_strength(&("a".repeat(MAX_PASSWORD_LENGTH) + "A1")).is_err());
        assert!(validate_password_strength("NoDigitsPassword").is_err());
        assert!(validate_password_strength("NOLOWERCASE1").is_err());
        assert!(validate_password_strength("nouppercase1").is_err());
    }

    #[test]
    fn test_temporary_password() {
        let temp = generate_temporary_password();

        assert_eq!(temp.len(), TEMPORARY_PASSWORD_LENGTH);
        assert!(temp.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
