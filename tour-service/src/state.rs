//! Application state management

use std::sync::Arc;

use crate::auth::{JwtKeys, LogMailer, Mailer, PasswordHasher};
use crate::config::Config;
use crate::error::Result;
use crate::repository::{DocumentStore, MemoryStore};

/// Application state shared across handlers
///
/// Generic over the document store; `AppState` alone means the in-process
/// [`MemoryStore`]. Every field is cheap to clone.
#[derive(Clone)]
pub struct AppState<S = MemoryStore> {
    config: Arc<Config>,
    store: S,
    keys: JwtKeys,
    hasher: PasswordHasher,
    mailer: Arc<dyn Mailer>,
}

impl<S: DocumentStore> AppState<S> {
    /// Create state from configuration and a store
    ///
    /// Mail goes to [`LogMailer`] until [`AppState::with_mailer`] replaces it.
    pub fn new(config: Config, store: S) -> Result<Self> {
        let keys = JwtKeys::new(&config.jwt);
        let hasher = PasswordHasher::new(&config.password)?;
        Ok(Self {
            config: Arc::new(config),
            store,
            keys,
            hasher,
            mailer: Arc::new(LogMailer),
        })
    }

    /// Replace the mail collaborator
    #[must_use]
    pub fn with_mailer(mut self, mailer: impl Mailer + 'static) -> Self {
        self.mailer = Arc::new(mailer);
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the document store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the token keys
    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    /// Get the password hasher
    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    /// Get the mail collaborator
    pub fn mailer(&self) -> &dyn Mailer {
        self.mailer.as_ref()
    }
}

impl<S> std::fmt::Debug for AppState<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("keys", &self.keys)
            .field("hasher", &self.hasher)
            .finish_non_exhaustive()
    }
}
