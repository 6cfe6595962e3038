//! Password reset tokens
//!
//! The plain token goes to the user by mail; only its blake3 digest is stored.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;

/// Number of random bytes in a reset token
const TOKEN_BYTES: usize = 32;

/// A freshly issued reset token
#[derive(Debug, Clone)]
pub struct ResetToken {
    /// Token sent to the user
    pub plain: String,
    /// Digest stored on the user document
    pub digest: String,
    /// Deadline after which the token is refused
    pub expires_at: DateTime<Utc>,
}

impl ResetToken {
    /// Issue a token valid for `ttl`
    pub fn issue(ttl: std::time::Duration) -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        let plain = URL_SAFE_NO_PAD.encode(bytes);
        let ttl = Duration::from_std(ttl).unwrap_or_else(|_| Duration::minutes(10));

        Self {
            digest: digest(&plain),
            plain,
            expires_at: Utc::now() + ttl,
        }
    }
}

/// Hex blake3 digest of a plain token
pub fn digest(plain: &str) -> String {
    blake3::hash(plain.as_bytes()).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue() {
        let token = ResetToken::issue(std::time::Duration::from_secs(600));
        assert_eq!(token.plain.len(), 43);
        assert_eq!(token.digest, digest(&token.plain));
        assert_eq!(token.digest.len(), 64);
        assert!(token.expires_at > Utc::now() + Duration::minutes(9));
    }

    #[test]
    fn test_tokens_are_unique() {
        let a = ResetToken::issue(std::time::Duration::from_secs(1));
        let b = ResetToken::issue(std::time::Duration::from_secs(1));
        assert_ne!(a.plain, b.plain);
    }
}
