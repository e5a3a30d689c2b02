use crate::application_port::{AuthError, CredentialHasher};
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use hmac::{Hmac, KeyInit, Mac};
use sha2::Sha256;

const COMPARE_KEY: &[u8] = b"portcullis.constant-time-compare";

/// Equality in time independent of where the inputs first differ.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let (Ok(mut left), Ok(mut right)) = (
        Hmac::<Sha256>::new_from_slice(COMPARE_KEY),
        Hmac::<Sha256>::new_from_slice(COMPARE_KEY),
    ) else {
        return false;
    };
    left.update(a);
    right.update(b);
    let tag = right.finalize().into_bytes();
    left.verify_slice(&tag).is_ok()
}

/// Stores the password as given and compares it verbatim.
///
/// Matches what the existing user service stores. Switch to
/// [`Argon2PasswordHasher`] once stored passwords are migrated.
pub struct PlaintextPasswordHasher;

#[async_trait::async_trait]
impl CredentialHasher for PlaintextPasswordHasher {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        Ok(password.to_string())
    }

    async fn verify_password(&self, password: &str, stored: &str) -> Result<bool, AuthError> {
        Ok(constant_time_eq(password.as_bytes(), stored.as_bytes()))
    }
}

pub struct Argon2PasswordHasher;

#[async_trait::async_trait]
impl CredentialHasher for Argon2PasswordHasher {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = argon2::password_hash::SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::Internal(e.to_string()))?
            .to_string();
        Ok(hash)
    }

    async fn verify_password(&self, password: &str, stored: &str) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(stored)
            .map_err(|e| AuthError::Internal(format!("invalid PHC hash: {}", e)))?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(_) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::Internal(format!("verify error: {}", e))),
        }
    }
}
