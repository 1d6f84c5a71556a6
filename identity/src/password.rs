//! Password hashing and the credential-shape rule from spec §4.9: usernames
//! and passwords must each be at least 9 characters.

use crate::error::AuthError;

pub const MIN_CREDENTIAL_LEN: usize = 9;
const BCRYPT_COST: u32 = 11;

pub fn validate_username(username: &str) -> Result<(), AuthError> {
    if username.trim().chars().count() < MIN_CREDENTIAL_LEN {
        return Err(AuthError::WeakCredential { reason: "username must be at least 9 characters" });
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_CREDENTIAL_LEN {
        return Err(AuthError::WeakCredential { reason: "password must be at least 9 characters" });
    }
    Ok(())
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    bcrypt::hash(password, BCRYPT_COST).map_err(|e| AuthError::Hash(e.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    bcrypt::verify(password, hash).map_err(|e| AuthError::Hash(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_roundtrips() {
        let hash = hash_password("correct-horse-battery").unwrap();
        assert!(verify_password("correct-horse-battery", &hash).unwrap());
        assert!(!verify_password("wrong-password-here", &hash).unwrap());
    }

    #[test]
    fn short_username_is_rejected() {
        assert!(validate_username("short").is_err());
        assert!(validate_username("long-enough-name").is_ok());
    }

    #[test]
    fn short_password_is_rejected() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("long-enough-password").is_ok());
    }
}
