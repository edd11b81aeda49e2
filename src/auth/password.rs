use std::fmt;

use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("argon2 hash_password error: {0}")]
    Hash(password_hash::Error),
    #[error("stored password hash is malformed: {0}")]
    Malformed(password_hash::Error),
    #[error("argon2 verify error: {0}")]
    Verify(password_hash::Error),
}

/// A salted Argon2id password hash in PHC string form.
///
/// Plaintext only ever passes through as a function argument; the value
/// itself holds the hash and nothing else.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Hashes `plain` with a fresh random salt.
    pub fn set(plain: &str) -> Result<Self, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                CredentialError::Hash(e)
            })?
            .to_string();
        Ok(Self(hash))
    }

    /// Wraps a hash previously produced by [`Credential::set`] and loaded from storage.
    pub fn from_stored(hash: String) -> Self {
        Self(hash)
    }

    /// `Ok(false)` means the password is wrong; `Err` means the check itself failed.
    pub fn matches(&self, plain: &str) -> Result<bool, CredentialError> {
        let parsed = PasswordHash::new(&self.0).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            CredentialError::Malformed(e)
        })?;
        match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => {
                error!(error = %e, "argon2 verify error");
                Err(CredentialError::Verify(e))
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let credential = Credential::set(password).expect("hashing should succeed");
        assert!(credential.matches(password).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_appended_character() {
        let password = "correct-horse-battery-staple";
        let credential = Credential::set(password).expect("hashing should succeed");
        let wrong = format!("{password}x");
        assert!(!credential.matches(&wrong).expect("mismatch is not an error"));
    }

    #[test]
    fn hash_never_contains_plaintext() {
        let password = "plaintext-marker-123";
        let credential = Credential::set(password).unwrap();
        assert!(!credential.as_str().contains(password));
        assert!(credential.as_str().starts_with("$argon2id$"));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = Credential::set("same-password").unwrap();
        let b = Credential::set("same-password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let credential = Credential::from_stored("not-a-valid-hash".into());
        let err = credential.matches("anything").unwrap_err();
        assert!(matches!(err, CredentialError::Malformed(_)));
    }

    #[test]
    fn debug_output_is_redacted() {
        let credential = Credential::set("hunter22").unwrap();
        assert_eq!(format!("{credential:?}"), "Credential(<redacted>)");
    }
}
