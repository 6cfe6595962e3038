//! Authentication and authorization guard chain
//!
//! A request walks an ordered list of steps. `Protect` moves it through
//!
//! ```text
//! Unauthenticated -> TokenPresent -> TokenValid -> UserExists -> PasswordNotRotatedSinceIssue
//! ```
//!
//! and `RestrictTo(roles)` then requires the loaded user's role to be listed.
//! The first failing step short-circuits with a typed [`AuthFailure`].
//!
//! ```rust,ignore
//! use axum::{middleware, routing::delete};
//! use tour_service::auth::{enforce, Guard, GuardChain};
//! use tour_service::models::Role;
//!
//! let chain = GuardChain::protect().restrict_to(&[Role::Admin, Role::LeadGuide]);
//! let route = delete(delete_tour)
//!     .route_layer(middleware::from_fn_with_state(Guard::new(state.clone(), chain), enforce));
//! ```

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use thiserror::Error;

use super::password::changed_password_after;
use super::token::extract_token;
use crate::error::{Error, ErrorKind};
use crate::models::{parse_timestamp, Resource, Role, User};
use crate::repository::{Document, DocumentStore, FilterCondition, FindQuery, ID_FIELD};
use crate::state::AppState;

/// Why a guard step rejected a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthFailure {
    /// No bearer header and no session cookie
    #[error("You are not logged in! Please log in to get access.")]
    MissingToken,

    /// Signature or structure is invalid
    #[error("Invalid token. Please log in again!")]
    InvalidToken,

    /// The token's `exp` has passed
    #[error("Your token has expired! Please log in again.")]
    TokenExpired,

    /// The token's subject no longer resolves to an active user
    #[error("The user belonging to this token does no longer exist.")]
    UserGone,

    /// The password changed after the token was issued
    #[error("User recently changed password! Please log in again.")]
    PasswordChanged,

    /// The user's role is not in the allowed set
    #[error("You do not have permission to perform this action")]
    RoleNotAllowed,
}

impl AuthFailure {
    /// 403 for role failures, 401 otherwise
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::RoleNotAllowed => ErrorKind::Forbidden,
            _ => ErrorKind::Unauthorized,
        }
    }
}

/// The authenticated caller, inserted into request extensions by [`enforce`]
#[derive(Debug, Clone)]
pub struct CurrentUser {
    /// User id
    pub id: String,
    /// Role at the time of the request
    pub role: Role,
    /// Stored user document, credentials included
    pub document: Document,
}

impl CurrentUser {
    /// The user document as clients may see it
    pub fn profile(&self) -> Document {
        User::present(self.document.clone())
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(Error::Auth(AuthFailure::MissingToken))
    }
}

/// One step of a guard chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardStep {
    /// Require a valid token for an existing user with an unrotated password
    Protect,
    /// Require the authenticated user to hold one of the roles
    RestrictTo(&'static [Role]),
}

/// Ordered guard steps applied to a route
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuardChain {
    steps: Vec<GuardStep>,
}

impl GuardChain {
    /// Chain starting with [`GuardStep::Protect`]
    pub fn protect() -> Self {
        Self {
            steps: vec![GuardStep::Protect],
        }
    }

    /// Append a role restriction
    #[must_use]
    pub fn restrict_to(mut self, roles: &'static [Role]) -> Self {
        self.steps.push(GuardStep::RestrictTo(roles));
        self
    }

    /// The steps in order
    pub fn steps(&self) -> &[GuardStep] {
        &self.steps
    }

    /// Run every step against the request headers
    ///
    /// Returns the authenticated user when the chain contains `Protect`.
    pub async fn run<S: DocumentStore>(
        &self,
        state: &AppState<S>,
        headers: &HeaderMap,
    ) -> Result<Option<CurrentUser>, Error> {
        let mut current: Option<CurrentUser> = None;
        for step in &self.steps {
            match step {
                GuardStep::Protect => {
                    current = Some(authenticate(state, headers).await?);
                }
                GuardStep::RestrictTo(roles) => {
                    let user = current.as_ref().ok_or(AuthFailure::MissingToken)?;
                    if !roles.contains(&user.role) {
                        tracing::debug!(user = %user.id, role = %user.role, "role not allowed");
                        return Err(AuthFailure::RoleNotAllowed.into());
                    }
                }
            }
        }
        Ok(current)
    }
}

/// Resolve the caller from a token, re-reading the user from the store
pub async fn authenticate<S: DocumentStore>(
    state: &AppState<S>,
    headers: &HeaderMap,
) -> Result<CurrentUser, Error> {
    let token = extract_token(headers).ok_or(AuthFailure::MissingToken)?;

    let claims = state.keys().verify(&token).map_err(|e| match e.kind() {
        JwtErrorKind::ExpiredSignature => AuthFailure::TokenExpired,
        _ => AuthFailure::InvalidToken,
    })?;

    let query = FindQuery::new()
        .with_filter(FilterCondition::eq(ID_FIELD, claims.sub.as_str()).into())
        .with_filter(User::decorate())
        .with_window(0, 1);
    let document = state
        .store()
        .find(User::COLLECTION, &query)
        .await?
        .pop()
        .ok_or(AuthFailure::UserGone)?;

    let changed_at = document.get("passwordChangedAt").and_then(parse_timestamp);
    if changed_password_after(changed_at, claims.iat) {
        return Err(AuthFailure::PasswordChanged.into());
    }

    Ok(CurrentUser {
        id: claims.sub,
        role: User::role_of(&document),
        document,
    })
}

/// State for [`enforce`]: the application state plus the chain to run
#[derive(Clone)]
pub struct Guard<S> {
    state: AppState<S>,
    chain: Arc<GuardChain>,
}

impl<S: DocumentStore> Guard<S> {
    /// Guard a route with `chain`
    pub fn new(state: AppState<S>, chain: GuardChain) -> Self {
        Self {
            state,
            chain: Arc::new(chain),
        }
    }
}

/// Middleware running a guard chain before the handler
pub async fn enforce<S: DocumentStore>(
    State(guard): State<Guard<S>>,
    mut request: Request,
    next: Next,
) -> Result<Response, Error> {
    if let Some(user) = guard.chain.run(&guard.state, request.headers()).await? {
        request.extensions_mut().insert(user);
    }
    Ok(next.run(request).await)
}
