//! Session tokens: HS256 JWT signing, extraction and cookies
//!
//! A token carries only `{sub, iat, exp}`. Everything else about the caller
//! is re-read from the store by the guard chain on each request.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderMap, HeaderValue};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::{Config, JwtConfig};
use crate::error::{Error, Result};

/// Name of the session cookie
pub const TOKEN_COOKIE: &str = "jwt";

/// Value written over the cookie on logout
pub const LOGGED_OUT: &str = "loggedout";

/// Claims carried by a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Signing and verification keys derived from the shared secret
#[derive(Clone)]
pub struct JwtKeys {
    encoding: Arc<EncodingKey>,
    decoding: Arc<DecodingKey>,
    validation: Validation,
    expires_in: Duration,
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtKeys")
            .field("algorithm", &Algorithm::HS256)
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

impl JwtKeys {
    /// Build keys from configuration
    pub fn new(config: &JwtConfig) -> Self {
        let secret = config.secret.as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding: Arc::new(EncodingKey::from_secret(secret)),
            decoding: Arc::new(DecodingKey::from_secret(secret)),
            validation,
            expires_in: config.expires_in(),
        }
    }

    /// Sign a token for a user
    pub fn sign(&self, user_id: &str) -> Result<String> {
        let iat = Utc::now().timestamp();
        let exp = iat.saturating_add(i64::try_from(self.expires_in.as_secs()).unwrap_or(i64::MAX));
        self.sign_claims(&Claims {
            sub: user_id.to_string(),
            iat,
            exp,
        })
    }

    /// Sign explicit claims
    pub fn sign_claims(&self, claims: &Claims) -> Result<String> {
        Ok(encode(&Header::new(Algorithm::HS256), claims, &self.encoding)?)
    }

    /// Verify signature and expiry
    pub fn verify(&self, token: &str) -> std::result::Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding, &self.validation).map(|data| data.claims)
    }
}

/// Extract a token from the `Authorization: Bearer` header, then the cookie
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == TOKEN_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty() && *value != LOGGED_OUT)
        .map(str::to_string)
}

/// `Set-Cookie` value carrying a fresh token
pub fn token_cookie(config: &Config, token: &str) -> Result<HeaderValue> {
    let max_age = config.jwt.cookie_expires_days.saturating_mul(24 * 60 * 60);
    let mut cookie = format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        TOKEN_COOKIE, token, max_age
    );
    if config.environment().is_production() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
        .map_err(|e| Error::Unexpected(format!("invalid cookie value: {}", e)))
}

/// `Set-Cookie` value that replaces the token with a short-lived dummy
pub fn logout_cookie() -> HeaderValue {
    HeaderValue::from_static("jwt=loggedout; Path=/; Max-Age=10; HttpOnly; SameSite=Lax")
}
