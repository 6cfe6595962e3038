//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: TOURS_, nested keys split on `__`)
//! 2. Current working directory: ./config.toml
//! 3. XDG config directory: ~/.config/tour-service/config.toml
//! 4. Default values
//!
//! ```text
//! TOURS_SERVICE__PORT=3000
//! TOURS_JWT__SECRET=a-long-random-secret
//! TOURS_SERVICE__ENVIRONMENT=production
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::query::QueryDefaults;

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "TOURS_";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,

    /// Token signing configuration
    #[serde(default)]
    pub jwt: JwtConfig,

    /// Password hashing configuration
    #[serde(default)]
    pub password: PasswordConfig,

    /// List query limits
    #[serde(default)]
    pub query: QueryDefaults,

    /// Per-IP rate limiting
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Middleware configuration
    #[serde(default)]
    pub middleware: MiddlewareConfig,

    /// Security response headers
    #[serde(default)]
    pub security_headers: SecurityHeadersConfig,
}

/// Deployment mode; controls error detail and log format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Verbose errors, human-readable logs
    #[default]
    Development,
    /// Sanitised errors, JSON logs, secure cookies
    Production,
}

impl Environment {
    /// True in production mode
    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level or `EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Deployment mode
    #[serde(default)]
    pub environment: Environment,

    /// Public base URL used in password reset links
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            port: default_port(),
            log_level: default_log_level(),
            timeout_secs: default_timeout(),
            environment: Environment::default(),
            public_url: default_public_url(),
        }
    }
}

impl ServiceConfig {
    /// Request timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Token signing configuration (HS256)
#[derive(Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Shared signing secret
    #[serde(default = "default_jwt_secret")]
    pub secret: String,

    /// Token lifetime in seconds
    #[serde(default = "default_jwt_expires_in")]
    pub expires_in_secs: u64,

    /// Cookie lifetime in days
    #[serde(default = "default_cookie_expires_days")]
    pub cookie_expires_days: i64,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("expires_in_secs", &self.expires_in_secs)
            .field("cookie_expires_days", &self.cookie_expires_days)
            .finish()
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: default_jwt_secret(),
            expires_in_secs: default_jwt_expires_in(),
            cookie_expires_days: default_cookie_expires_days(),
        }
    }
}

impl JwtConfig {
    /// Token lifetime as a Duration
    pub fn expires_in(&self) -> Duration {
        Duration::from_secs(self.expires_in_secs)
    }
}

/// Password hashing configuration (Argon2id)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordConfig {
    /// Memory cost in KiB
    #[serde(default = "default_memory_cost")]
    pub memory_cost_kib: u32,

    /// Iteration count
    #[serde(default = "default_time_cost")]
    pub time_cost: u32,

    /// Degree of parallelism
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,

    /// Minimum password length
    #[serde(default = "default_min_length")]
    pub min_length: usize,

    /// Password reset token lifetime in seconds
    #[serde(default = "default_reset_expires_in")]
    pub reset_expires_in_secs: u64,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_cost_kib: default_memory_cost(),
            time_cost: default_time_cost(),
            parallelism: default_parallelism(),
            min_length: default_min_length(),
            reset_expires_in_secs: default_reset_expires_in(),
        }
    }
}

impl PasswordConfig {
    /// Reset token lifetime as a Duration
    pub fn reset_expires_in(&self) -> Duration {
        Duration::from_secs(self.reset_expires_in_secs)
    }
}

/// Per-IP rate limiting configuration (governor)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Enable rate limiting
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum requests per period
    #[serde(default = "default_requests_per_period")]
    pub requests_per_period: u32,

    /// Time period in seconds
    #[serde(default = "default_period_secs")]
    pub period_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_period: default_requests_per_period(),
            period_secs: default_period_secs(),
        }
    }
}

impl RateLimitConfig {
    /// Period as a Duration
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }
}

/// Middleware configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiddlewareConfig {
    /// Request tracking configuration (request IDs, header propagation)
    #[serde(default)]
    pub request_tracking: RequestTrackingConfig,

    /// Request body size limit in KiB
    #[serde(default = "default_body_limit_kb")]
    pub body_limit_kb: usize,

    /// Enable panic recovery middleware
    #[serde(default = "default_true")]
    pub catch_panic: bool,

    /// Enable compression
    #[serde(default = "default_true")]
    pub compression: bool,

    /// CORS mode: permissive, restrictive or disabled
    #[serde(default = "default_cors_mode")]
    pub cors_mode: String,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            request_tracking: RequestTrackingConfig::default(),
            body_limit_kb: default_body_limit_kb(),
            catch_panic: true,
            compression: true,
            cors_mode: default_cors_mode(),
        }
    }
}

impl MiddlewareConfig {
    /// Body limit in bytes
    pub fn body_limit_bytes(&self) -> usize {
        self.body_limit_kb.saturating_mul(1024)
    }
}

/// Request tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestTrackingConfig {
    /// Enable request ID generation
    #[serde(default = "default_true")]
    pub request_id_enabled: bool,

    /// Request ID header name
    #[serde(default = "default_request_id_header")]
    pub request_id_header: String,

    /// Enable header propagation
    #[serde(default = "default_true")]
    pub propagate_headers: bool,

    /// Enable sensitive header masking in logs
    #[serde(default = "default_true")]
    pub mask_sensitive_headers: bool,
}

impl Default for RequestTrackingConfig {
    fn default() -> Self {
        Self {
            request_id_enabled: true,
            request_id_header: default_request_id_header(),
            propagate_headers: true,
            mask_sensitive_headers: true,
        }
    }
}

/// Security response headers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityHeadersConfig {
    /// Enable security headers
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Send Strict-Transport-Security (production only)
    #[serde(default = "default_true")]
    pub hsts: bool,

    /// HSTS max-age in seconds
    #[serde(default = "default_hsts_max_age")]
    pub hsts_max_age_secs: u64,

    /// Send `X-Content-Type-Options: nosniff`
    #[serde(default = "default_true")]
    pub x_content_type_options: bool,

    /// X-Frame-Options value; empty disables
    #[serde(default = "default_frame_options")]
    pub x_frame_options: String,

    /// Send `X-XSS-Protection: 0`
    #[serde(default = "default_true")]
    pub x_xss_protection: bool,

    /// Referrer-Policy value; empty disables
    #[serde(default = "default_referrer_policy")]
    pub referrer_policy: String,
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hsts: true,
            hsts_max_age_secs: default_hsts_max_age(),
            x_content_type_options: true,
            x_frame_options: default_frame_options(),
            x_xss_protection: true,
            referrer_policy: default_referrer_policy(),
        }
    }
}

// Default value functions
fn default_service_name() -> String {
    "tour-service".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_public_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_jwt_secret() -> String {
    "change-me-in-production-this-is-not-a-secret".to_string()
}

fn default_jwt_expires_in() -> u64 {
    90 * 24 * 60 * 60 // 90 days
}

fn default_cookie_expires_days() -> i64 {
    90
}

fn default_memory_cost() -> u32 {
    19456 // 19 MiB
}

fn default_time_cost() -> u32 {
    2
}

fn default_parallelism() -> u32 {
    1
}

fn default_min_length() -> usize {
    8
}

fn default_reset_expires_in() -> u64 {
    10 * 60
}

fn default_true() -> bool {
    true
}

fn default_requests_per_period() -> u32 {
    1000
}

fn default_period_secs() -> u64 {
    3600
}

fn default_body_limit_kb() -> usize {
    10
}

fn default_cors_mode() -> String {
    "permissive".to_string()
}

fn default_request_id_header() -> String {
    "x-request-id".to_string()
}

fn default_hsts_max_age() -> u64 {
    15_552_000 // 180 days
}

fn default_frame_options() -> String {
    "SAMEORIGIN".to_string()
}

fn default_referrer_policy() -> String {
    "no-referrer".to_string()
}

impl Config {
    /// Load configuration from all sources
    ///
    /// Searches for config files in this order (later files override earlier ones):
    /// 1. XDG config directory: ~/.config/tour-service/config.toml
    /// 2. Current working directory: ./config.toml
    ///
    /// Environment variables (TOURS_ prefix) override all file-based configs.
    pub fn load() -> Result<Self> {
        let config_paths = Self::find_config_paths();

        tracing::debug!("Searching for config files in order:");
        for path in &config_paths {
            tracing::debug!("  - {}", path.display());
        }

        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Merge config files in reverse order (lowest priority first)
        for path in config_paths.iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        let config: Config = figment.merge(Env::prefixed(ENV_PREFIX).split("__")).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    ///
    /// This bypasses the XDG directory and loads directly from the given path.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Find all possible config file paths
    ///
    /// Returns paths in priority order (highest first).
    fn find_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        let xdg_dirs = xdg::BaseDirectories::with_prefix("tour-service");
        if let Some(path) = xdg_dirs.find_config_file("config.toml") {
            paths.push(path);
        }

        paths
    }

    /// Reject configurations the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.service.environment.is_production() && self.jwt.secret == default_jwt_secret() {
            return Err(Error::Unexpected(
                "jwt.secret must be set in production".to_string(),
            ));
        }
        if self.jwt.secret.len() < 32 {
            return Err(Error::Unexpected(
                "jwt.secret must be at least 32 characters".to_string(),
            ));
        }
        if self.query.default_limit == 0 || self.query.max_limit == 0 {
            return Err(Error::Unexpected("query limits must be positive".to_string()));
        }
        if self.rate_limit.enabled && (self.rate_limit.requests_per_period == 0 || self.rate_limit.period_secs == 0) {
            return Err(Error::Unexpected(
                "rate_limit.requests_per_period and period_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Deployment mode
    pub fn environment(&self) -> Environment {
        self.service.environment
    }
}
