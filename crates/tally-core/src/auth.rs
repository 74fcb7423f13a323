//! PIN hashing and session tokens
//!
//! PINs are hashed with Argon2id and a random salt. Sessions are HS256 JWTs
//! carrying the user id and email.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::User;

/// Environment variable holding the JWT signing secret
pub const JWT_SECRET_ENV: &str = "TALLY_JWT_SECRET";

/// Session lifetime
pub const TOKEN_TTL_HOURS: i64 = 24;

const PIN_MIN_LEN: usize = 4;
const PIN_MAX_LEN: usize = 8;

/// A PIN must be 4-8 ASCII digits
pub fn validate_pin(pin: &str) -> Result<()> {
    let len_ok = (PIN_MIN_LEN..=PIN_MAX_LEN).contains(&pin.len());
    if !len_ok || !pin.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidData(format!(
            "PIN must be {}-{} digits",
            PIN_MIN_LEN, PIN_MAX_LEN
        )));
    }
    Ok(())
}

/// Hash a PIN into a PHC string
pub fn hash_pin(pin: &str) -> Result<String> {
    validate_pin(pin)?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(pin.as_bytes(), &salt)
        .map_err(|e| Error::Auth(format!("Failed to hash PIN: {}", e)))?;
    Ok(hash.to_string())
}

/// Check a PIN against a stored PHC string
pub fn verify_pin(pin: &str, pin_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(pin_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(pin.as_bytes(), &parsed)
        .is_ok()
}

/// Normalized email used as the login identity
pub fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        return Err(Error::InvalidData("Invalid email address".to_string()));
    }
    Ok(email)
}

/// JWT claims for a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: i64,
    pub email: String,
    /// Expiry, seconds since the epoch
    pub exp: i64,
}

/// Issues and validates session tokens
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub fn new(secret: &str) -> Result<Self> {
        if secret.trim().is_empty() {
            return Err(Error::Auth("JWT secret must not be empty".to_string()));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(TOKEN_TTL_HOURS),
        })
    }

    /// Read the secret from `TALLY_JWT_SECRET`
    pub fn from_env() -> Option<Self> {
        let secret = std::env::var(JWT_SECRET_ENV).ok()?;
        Self::new(&secret).ok()
    }

    pub fn issue(&self, user: &User, now: DateTime<Utc>) -> Result<String> {
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| Error::Auth(format!("Failed to sign token: {}", e)))
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| Error::Auth(format!("Invalid token: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 7,
            email: "sam@example.com".to_string(),
            pin_hash: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_validate_pin() {
        assert!(validate_pin("1234").is_ok());
        assert!(validate_pin("12345678").is_ok());
        assert!(validate_pin("123").is_err());
        assert!(validate_pin("123456789").is_err());
        assert!(validate_pin("12a4").is_err());
        assert!(validate_pin("١٢٣٤").is_err());
    }

    #[test]
    fn test_hash_and_verify_pin() {
        let hash = hash_pin("4821").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_pin("4821", &hash));
        assert!(!verify_pin("4822", &hash));
        assert!(!verify_pin("4821", "not-a-hash"));
    }

    #[test]
    fn test_hashes_are_salted() {
        assert_ne!(hash_pin("1111").unwrap(), hash_pin("1111").unwrap());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(
            normalize_email("  Sam@Example.COM ").unwrap(),
            "sam@example.com"
        );
        assert!(normalize_email("nope").is_err());
        assert!(normalize_email("@example.com").is_err());
    }

    #[test]
    fn test_token_round_trip() {
        let signer = TokenSigner::new("test-secret").unwrap();
        let token = signer.issue(&user(), Utc::now()).unwrap();
        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.email, "sam@example.com");
    }

    #[test]
    fn test_expired_token_rejected() {
        let signer = TokenSigner::new("test-secret").unwrap();
        let token = signer
            .issue(&user(), Utc::now() - Duration::hours(48))
            .unwrap();
        assert!(matches!(signer.verify(&token), Err(Error::Auth(_))));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = TokenSigner::new("one")
            .unwrap()
            .issue(&user(), Utc::now())
            .unwrap();
        assert!(TokenSigner::new("two").unwrap().verify(&token).is_err());
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(TokenSigner::new("  ").is_err());
    }
}
