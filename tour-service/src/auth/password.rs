//! Password hashing using Argon2id
//!
//! ```rust,ignore
//! use tour_service::auth::PasswordHasher;
//!
//! let hasher = PasswordHasher::new(&config.password)?;
//! let hash = hasher.hash("my_secure_password")?;
//! assert!(hasher.verify("my_secure_password", &hash)?);
//! ```

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as Argon2Hasher, PasswordVerifier,
        SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use chrono::{DateTime, Utc};

use crate::config::PasswordConfig;
use crate::error::{Error, Result};

/// Password hasher using Argon2id
///
/// Parameters come from [`PasswordConfig`]; verification reads them back from
/// the stored PHC string, so changing the configuration keeps old hashes valid.
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
    min_length: usize,
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("m_cost", &self.params.m_cost())
            .field("t_cost", &self.params.t_cost())
            .field("p_cost", &self.params.p_cost())
            .field("min_length", &self.min_length)
            .finish()
    }
}

impl PasswordHasher {
    /// Create a hasher, rejecting parameters Argon2 cannot run with
    pub fn new(config: &PasswordConfig) -> Result<Self> {
        let params = Params::new(
            config.memory_cost_kib,
            config.time_cost,
            config.parallelism,
            None,
        )
        .map_err(|e| Error::Unexpected(format!("Invalid Argon2 parameters: {}", e)))?;

        Ok(Self {
            params,
            min_length: config.min_length,
        })
    }

    /// Hash a password into a PHC string
    ///
    /// Fails with `ValidationFailed` when the password is shorter than the
    /// configured minimum.
    pub fn hash(&self, password: &str) -> Result<String> {
        if password.chars().count() < self.min_length {
            return Err(Error::ValidationFailed(format!(
                "Password must be at least {} characters",
                self.min_length
            )));
        }

        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());

        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| Error::Unexpected(format!("Failed to hash password: {}", e)))?;

        Ok(hash.to_string())
    }

    /// Verify a password against a stored hash in constant time
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| Error::Unexpected(format!("Invalid password hash format: {}", e)))?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::Unexpected(format!("Password verification failed: {}", e))),
        }
    }

    /// Minimum accepted password length
    pub fn min_length(&self) -> usize {
        self.min_length
    }
}

/// Whether the password changed after a token was issued
///
/// `issued_at` is the token's `iat` in seconds; `changed_at` is the stored
/// `passwordChangedAt` timestamp, if any.
pub fn changed_password_after(changed_at: Option<DateTime<Utc>>, issued_at: i64) -> bool {
    changed_at.is_some_and(|changed| changed.timestamp() > issued_at)
}
