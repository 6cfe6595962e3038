//! Authentication: password hashing, session tokens and the guard chain
//!
//! # Example
//!
//! ```rust,ignore
//! use tour_service::auth::{JwtKeys, PasswordHasher};
//!
//! let hasher = PasswordHasher::new(&config.password)?;
//! let hash = hasher.hash("my_secure_password")?;
//! assert!(hasher.verify("my_secure_password", &hash)?);
//!
//! let keys = JwtKeys::new(&config.jwt);
//! let token = keys.sign("user_01h455vb4pex5vsknk084sn02q")?;
//! ```

pub mod guard;
pub mod mailer;
pub mod password;
pub mod reset;
pub mod token;

pub use guard::{authenticate, enforce, AuthFailure, CurrentUser, Guard, GuardChain, GuardStep};
pub use mailer::{LogMailer, Mailer, Recipient};
pub use password::{changed_password_after, PasswordHasher};
pub use reset::ResetToken;
pub use token::{extract_token, logout_cookie, token_cookie, Claims, JwtKeys, TOKEN_COOKIE};
