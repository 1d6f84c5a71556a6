//! JWT bearer tokens (spec §4.9). Carries the user id and username; the
//! opaque session id in the `sessions` table is the source of truth for
//! revocation, the token itself is never individually revoked.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub exp: i64,
}

pub fn issue(secret: &str, user_id: &str, username: &str, ttl_hours: i64) -> Result<String, AuthError> {
    let exp = (Utc::now() + Duration::hours(ttl_hours)).timestamp();
    let claims = Claims { sub: user_id.to_string(), username: username.to_string(), exp };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| AuthError::Token(e.to_string()))
}

pub fn verify(secret: &str, token: &str) -> Result<Claims, AuthError> {
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| AuthError::Token(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies_back_to_same_claims() {
        let token = issue("s3cr3t-testing-key", "user-1", "alice", 9).unwrap();
        let claims = verify("s3cr3t-testing-key", &token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.username, "alice");
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let token = issue("right-secret-value", "user-1", "alice", 9).unwrap();
        assert!(verify("wrong-secret-value", &token).is_err());
    }
}
