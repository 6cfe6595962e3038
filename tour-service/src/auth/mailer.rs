//! Outgoing mail collaborator
//!
//! Delivery is not this service's concern. [`LogMailer`] records what would
//! have been sent.

use async_trait::async_trait;

use crate::error::Result;

/// Recipient of an outgoing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    /// Address
    pub email: String,
    /// Display name
    pub name: String,
}

impl Recipient {
    /// First word of the display name, used in greetings
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }
}

/// Sends account mail on behalf of the auth flows
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Greet a newly signed up user
    async fn send_welcome(&self, to: &Recipient, url: &str) -> Result<()>;

    /// Deliver a password reset link
    async fn send_password_reset(&self, to: &Recipient, url: &str) -> Result<()>;
}

/// Mailer that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_welcome(&self, to: &Recipient, url: &str) -> Result<()> {
        tracing::info!(to = %to.email, name = to.first_name(), %url, "welcome mail");
        Ok(())
    }

    async fn send_password_reset(&self, to: &Recipient, url: &str) -> Result<()> {
        tracing::info!(to = %to.email, name = to.first_name(), "password reset mail");
        tracing::debug!(%url, "password reset link");
        Ok(())
    }
}
