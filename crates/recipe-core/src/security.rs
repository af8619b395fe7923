use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use base64::{engine::general_purpose, Engine as _};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SecurityError {
    #[error("Cryptographic operation failed: {0}")]
    CryptographicFailure(String),
}

/// Authorization header keywords accepted in front of a token key.
pub const TOKEN_KEYWORD: &str = "Token";
pub const BEARER_KEYWORD: &str = "Bearer";

/// Pulls the token key out of an `Authorization` header value.
///
/// Accepts `Token <key>` and `Bearer <key>`. Anything else, including a
/// keyword with no key or a key containing spaces, yields `None`.
pub fn parse_authorization(value: &str) -> Option<&str> {
    let (keyword, key) = value.trim().split_once(' ')?;
    if !keyword.eq_ignore_ascii_case(TOKEN_KEYWORD) && !keyword.eq_ignore_ascii_case(BEARER_KEYWORD)
    {
        return None;
    }
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    Some(key)
}

/// Argon2 password hashing with per-password random salts.
#[derive(Default)]
pub struct PasswordManager {
    argon2: Argon2<'static>,
}

impl PasswordManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hash_password(&self, password: &str) -> Result<String, SecurityError> {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| SecurityError::CryptographicFailure(e.to_string()))?;

        Ok(password_hash.to_string())
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, SecurityError> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| SecurityError::CryptographicFailure(e.to_string()))?;

        match self.argon2.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(_) => Ok(false),
        }
    }
}

/// Generates a fresh API token key: 32 random bytes, URL-safe base64.
pub fn generate_token_key() -> String {
    let key_bytes: [u8; 32] = rand::random();
    general_purpose::URL_SAFE_NO_PAD.encode(key_bytes)
}

/// Security event logging
#[derive(Debug, Clone)]
pub enum SecurityEvent {
    AuthenticationFailure { email: String, reason: String },
    AuthenticationSuccess { user_id: i64, method: String },
    TokenIssued { user_id: i64 },
    InvalidToken { reason: String },
    UserCreated { user_id: i64, superuser: bool },
}

pub struct SecurityLogger;

impl SecurityLogger {
    pub fn log_event(event: SecurityEvent) {
        use tracing::{info, warn};

        match event {
            SecurityEvent::AuthenticationFailure { email, reason } => {
                warn!(email = %email, reason = %reason, "Authentication failure");
            }
            SecurityEvent::AuthenticationSuccess { user_id, method } => {
                info!(user_id, method = %method, "Authentication success");
            }
            SecurityEvent::TokenIssued { user_id } => {
                info!(user_id, "Auth token issued");
            }
            SecurityEvent::InvalidToken { reason } => {
                warn!(reason = %reason, "Rejected auth token");
            }
            SecurityEvent::UserCreated { user_id, superuser } => {
                info!(user_id, superuser, "User created");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_roundtrip() {
        let manager = PasswordManager::new();
        let hash = manager.hash_password("testpass123").unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(manager.verify_password("testpass123", &hash).unwrap());
        assert!(!manager.verify_password("wrongpass", &hash).unwrap());
    }

    #[test]
    fn test_same_password_gets_distinct_hashes() {
        let manager = PasswordManager::new();
        let a = manager.hash_password("pass1234").unwrap();
        let b = manager.hash_password("pass1234").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        let manager = PasswordManager::new();
        assert!(manager.verify_password("pass1234", "not-a-hash").is_err());
    }

    #[test]
    fn test_token_key_generation() {
        let key = generate_token_key();
        assert_eq!(key.len(), 43);
        assert!(!key.contains('='));
        assert_ne!(key, generate_token_key());
    }

    #[test]
    fn test_parse_authorization() {
        assert_eq!(parse_authorization("Token abc123"), Some("abc123"));
        assert_eq!(parse_authorization("Bearer abc123"), Some("abc123"));
        assert_eq!(parse_authorization("token abc123"), Some("abc123"));
        assert_eq!(parse_authorization("Token"), None);
        assert_eq!(parse_authorization("Token "), None);
        assert_eq!(parse_authorization("Basic abc123"), None);
        assert_eq!(parse_authorization("Token abc 123"), None);
    }
}
