//! Account passwords, stored in `users.password_hash` as argon2id PHC strings.

use anyhow::{anyhow, Result};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{
    Error as HashError, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;

/// Hashes a new account password with a fresh salt.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow!("password hashing failed: {e}"))
}

/// Checks a login attempt. A wrong password is `Ok(false)`; a stored value
/// that is not a usable PHC string is an error.
pub fn password_matches(attempt: &str, stored: &str) -> Result<bool> {
    let stored =
        PasswordHash::new(stored).map_err(|e| anyhow!("stored password hash unreadable: {e}"))?;
    match Argon2::default().verify_password(attempt.as_bytes(), &stored) {
        Ok(()) => Ok(true),
        Err(HashError::Password) => Ok(false),
        Err(e) => Err(anyhow!("password check failed: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_password_logs_in() {
        let stored = hash_password("hunter-season-2026").unwrap();
        assert!(stored.starts_with("$argon2id$"));
        assert!(password_matches("hunter-season-2026", &stored).unwrap());
    }

    #[test]
    fn test_wrong_password_is_rejected_without_error() {
        let stored = hash_password("hunter-season-2026").unwrap();
        assert!(!password_matches("Hunter-Season-2026", &stored).unwrap());
    }

    #[test]
    fn test_two_accounts_with_one_password_store_different_hashes() {
        assert_ne!(
            hash_password("same-password").unwrap(),
            hash_password("same-password").unwrap()
        );
    }

    #[test]
    fn test_corrupt_stored_hash_is_an_error() {
        let err = password_matches("whatever", "plaintext-by-mistake").unwrap_err();
        assert!(err.to_string().contains("unreadable"));
    }
}
