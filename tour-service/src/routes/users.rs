//! User routes: authentication flows, the caller's own profile and
//! administration

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use super::guarded;
use crate::auth::{logout_cookie, reset, token_cookie, CurrentUser, GuardChain, Recipient, ResetToken};
use crate::error::{Error, Result};
use crate::handlers::{
    delete_one, get_one, list_all, update_one, CollectionHandler, ItemResponse, JsonBody,
    ResourceHandlers, SUCCESS,
};
use crate::models::{format_timestamp, writable_fields, Resource, Role, User, WriteContext};
use crate::repository::{Document, DocumentStore, Filter, FilterCondition, FindQuery};
use crate::state::AppState;

/// Roles allowed to administer users
pub const ADMINS: &[Role] = &[Role::Admin];

const INCORRECT_CREDENTIALS: &str = "Incorrect email or password";
const INVALID_RESET_TOKEN: &str = "Token is invalid or has expired";

/// User router, mounted at `/api/v1/users`
pub fn routes<S: DocumentStore>(state: &AppState<S>) -> Router<AppState<S>> {
    let protect = GuardChain::protect;
    let admin = || GuardChain::protect().restrict_to(ADMINS);

    Router::new()
        .route("/signup", post(signup::<S>))
        .route("/login", post(login::<S>))
        .route("/logout", get(logout))
        .route("/forgotPassword", post(forgot_password::<S>))
        .route("/resetPassword/{token}", patch(reset_password::<S>))
        .route(
            "/updateMyPassword",
            guarded(patch(update_my_password::<S>), state, protect()),
        )
        .route("/me", guarded(get(me::<S>), state, protect()))
        .route("/updateMe", guarded(patch(update_me::<S>), state, protect()))
        .route("/deleteMe", guarded(delete(delete_me::<S>), state, protect()))
        .route("/", guarded(get(list_all::<User, S>), state, admin()))
        .route(
            "/{id}",
            guarded(
                get(get_one::<User, S>)
                    .patch(update_one::<User, S>)
                    .delete(delete_one::<User, S>),
                state,
                admin(),
            ),
        )
}

/// Sign a token for `user` and answer with it in the body and a cookie
fn send_token<S: DocumentStore>(
    state: &AppState<S>,
    user: Document,
    status: StatusCode,
) -> Result<Response> {
    let id = user
        .get("_id")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Unexpected("user document without an id".to_string()))?;
    let token = state.keys().sign(id)?;
    let cookie = token_cookie(state.config(), &token)?;

    let mut body = ItemResponse::new(User::SINGULAR, User::present(user)).with_token(token);
    if status == StatusCode::CREATED {
        body = body.created();
    }
    Ok(([(header::SET_COOKIE, cookie)], body).into_response())
}

fn recipient(user: &Document) -> Recipient {
    let field = |name: &str| {
        user.get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    Recipient {
        email: field("email"),
        name: field("name"),
    }
}

fn string_field<'a>(payload: &'a Document, field: &str) -> Option<&'a str> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

/// Active user with this email, credentials included
async fn find_by_email<S: DocumentStore>(state: &AppState<S>, email: &str) -> Result<Option<Document>> {
    let query = FindQuery::new()
        .with_filter(FilterCondition::eq("email", email.trim().to_lowercase()).into())
        .with_filter(User::decorate())
        .with_window(0, 1);
    Ok(state.store().find(User::COLLECTION, &query).await?.pop())
}

async fn update_user<S: DocumentStore>(
    state: &AppState<S>,
    id: &str,
    changes: Document,
) -> Result<Document> {
    state
        .store()
        .update_by_id(User::COLLECTION, id, changes)
        .await?
        .ok_or_else(|| Error::not_found(User::SINGULAR, id))
}

/// Changes storing a new password hash
///
/// `passwordChangedAt` is stamped a second early so a token signed right
/// after the change is not rejected as older than the password.
fn password_changes(hash: String) -> Document {
    let mut changes = Document::new();
    changes.insert("password".to_string(), Value::String(hash));
    changes.insert(
        "passwordChangedAt".to_string(),
        Value::String(format_timestamp(Utc::now() - Duration::seconds(1))),
    );
    changes
}

/// `POST /signup`
pub async fn signup<S: DocumentStore>(
    State(state): State<AppState<S>>,
    JsonBody(payload): JsonBody,
) -> Result<Response> {
    let payload = writable_fields(payload, User::SIGNUP_FIELDS);
    let created = ResourceHandlers::<User, S>::from_state(&state)
        .create(payload)
        .await?;

    let user = created.into_item();
    let url = format!("{}/me", state.config().service.public_url);
    if let Err(e) = state.mailer().send_welcome(&recipient(&user), &url).await {
        tracing::warn!(error = %e, "welcome mail failed");
    }
    tracing::info!(user = ?user.get("_id"), "user signed up");
    send_token(&state, user, StatusCode::CREATED)
}

/// `POST /login`
pub async fn login<S: DocumentStore>(
    State(state): State<AppState<S>>,
    JsonBody(payload): JsonBody,
) -> Result<Response> {
    let (Some(email), Some(password)) = (
        string_field(&payload, "email"),
        string_field(&payload, "password"),
    ) else {
        return Err(Error::BadRequest("Please provide email and password!".to_string()));
    };

    let user = find_by_email(&state, email).await?;
    let hash = user
        .as_ref()
        .and_then(|u| u.get("password"))
        .and_then(Value::as_str);
    let verified = match hash {
        Some(hash) => state.hasher().verify(password, hash)?,
        None => false,
    };
    match user {
        Some(user) if verified => send_token(&state, user, StatusCode::OK),
        _ => {
            tracing::debug!("login rejected");
            Err(Error::Unauthorized(INCORRECT_CREDENTIALS.to_string()))
        }
    }
}

/// `GET /logout`: replace the session cookie with a short-lived dummy
pub async fn logout() -> impl IntoResponse {
    (
        [(header::SET_COOKIE, logout_cookie())],
        Json(json!({ "status": SUCCESS })),
    )
}

/// `POST /forgotPassword`
pub async fn forgot_password<S: DocumentStore>(
    State(state): State<AppState<S>>,
    JsonBody(payload): JsonBody,
) -> Result<Json<Value>> {
    let email = string_field(&payload, "email").unwrap_or_default();
    let user = find_by_email(&state, email)
        .await?
        .ok_or_else(|| Error::NotFound("There is no user with that email address.".to_string()))?;
    let id = user
        .get("_id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let token = ResetToken::issue(state.config().password.reset_expires_in());
    let mut changes = Document::new();
    changes.insert("passwordResetToken".to_string(), Value::String(token.digest.clone()));
    changes.insert(
        "passwordResetExpires".to_string(),
        Value::String(format_timestamp(token.expires_at)),
    );
    update_user(&state, &id, changes).await?;

    let url = format!(
        "{}/api/v1/users/resetPassword/{}",
        state.config().service.public_url,
        token.plain
    );
    if let Err(e) = state.mailer().send_password_reset(&recipient(&user), &url).await {
        tracing::error!(user = %id, error = %e, "password reset mail failed");
        let mut clear = Document::new();
        clear.insert("passwordResetToken".to_string(), Value::Null);
        clear.insert("passwordResetExpires".to_string(), Value::Null);
        update_user(&state, &id, clear).await?;
        return Err(Error::Unexpected(
            "There was an error sending the email. Try again later!".to_string(),
        ));
    }

    Ok(Json(json!({ "status": SUCCESS, "message": "Token sent to email!" })))
}

/// `PATCH /resetPassword/{token}`
pub async fn reset_password<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Path(token): Path<String>,
    JsonBody(payload): JsonBody,
) -> Result<Response> {
    let now = format_timestamp(Utc::now());
    let query = FindQuery::new()
        .with_filter(
            Filter::new()
                .and(FilterCondition::eq("passwordResetToken", reset::digest(&token)))
                .and(FilterCondition::gt("passwordResetExpires", now)),
        )
        .with_filter(User::decorate())
        .with_window(0, 1);
    let user = state
        .store()
        .find(User::COLLECTION, &query)
        .await?
        .pop()
        .ok_or_else(|| Error::BadRequest(INVALID_RESET_TOKEN.to_string()))?;
    let id = user
        .get("_id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let ctx = WriteContext::new(state.hasher());
    let hash = User::hash_new_password(payload.get("password"), payload.get("passwordConfirm"), &ctx)?;
    let mut changes = password_changes(hash);
    changes.insert("passwordResetToken".to_string(), Value::Null);
    changes.insert("passwordResetExpires".to_string(), Value::Null);
    let user = update_user(&state, &id, changes).await?;

    tracing::info!(user = %id, "password reset");
    send_token(&state, user, StatusCode::OK)
}

/// `PATCH /updateMyPassword`
pub async fn update_my_password<S: DocumentStore>(
    State(state): State<AppState<S>>,
    current: CurrentUser,
    JsonBody(payload): JsonBody,
) -> Result<Response> {
    let candidate = string_field(&payload, "passwordCurrent").unwrap_or_default();
    let stored = current
        .document
        .get("password")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if candidate.is_empty() || !state.hasher().verify(candidate, stored)? {
        return Err(Error::Unauthorized("Your current password is wrong.".to_string()));
    }

    let ctx = WriteContext::new(state.hasher());
    let hash = User::hash_new_password(payload.get("password"), payload.get("passwordConfirm"), &ctx)?;
    let user = update_user(&state, &current.id, password_changes(hash)).await?;

    tracing::info!(user = %current.id, "password changed");
    send_token(&state, user, StatusCode::OK)
}

/// `GET /me`
pub async fn me<S: DocumentStore>(
    State(state): State<AppState<S>>,
    current: CurrentUser,
) -> Result<ItemResponse> {
    ResourceHandlers::<User, S>::from_state(&state)
        .get(&current.id, Filter::new(), Vec::new())
        .await
}

/// `PATCH /updateMe`: only the profile fields are applied
pub async fn update_me<S: DocumentStore>(
    State(state): State<AppState<S>>,
    current: CurrentUser,
    JsonBody(payload): JsonBody,
) -> Result<ItemResponse> {
    User::reject_password_fields(&payload)?;
    let payload = writable_fields(payload, User::PROFILE_FIELDS);
    ResourceHandlers::<User, S>::from_state(&state)
        .update(&current.id, payload)
        .await
}

/// `DELETE /deleteMe`: deactivate the account
pub async fn delete_me<S: DocumentStore>(
    State(state): State<AppState<S>>,
    current: CurrentUser,
) -> Result<StatusCode> {
    let mut changes = Document::new();
    changes.insert("active".to_string(), Value::Bool(false));
    update_user(&state, &current.id, changes).await?;

    tracing::info!(user = %current.id, "account deactivated");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{config, send, signup, state, user_with_role};
    use super::*;
    use crate::auth::Mailer;
    use crate::repository::MemoryStore;
    use crate::routes::app;
    use async_trait::async_trait;
    use axum::http::Method;
    use std::sync::{Arc, Mutex};

    /// Mailer that remembers reset links, or fails every send
    #[derive(Clone, Default)]
    struct CapturingMailer {
        links: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl Mailer for CapturingMailer {
        async fn send_welcome(&self, _to: &Recipient, _url: &str) -> Result<()> {
            Ok(())
        }

        async fn send_password_reset(&self, _to: &Recipient, url: &str) -> Result<()> {
            if self.fail {
                return Err(Error::Unexpected("smtp down".to_string()));
            }
            self.links.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    fn credentials(email: &str, password: &str) -> Option<Value> {
        Some(json!({ "email": email, "password": password }))
    }

    #[tokio::test]
    async fn test_signup_sets_cookie_and_hides_password() {
        let app = app(state().await);
        let reply = send(
            &app,
            Method::POST,
            "/api/v1/users/signup",
            None,
            Some(json!({
                "name": "Laura Wilson",
                "email": "laura@example.io",
                "password": "pass1234",
                "passwordConfirm": "pass1234",
                "role": "admin"
            })),
        )
        .await;

        assert_eq!(reply.status, StatusCode::CREATED);
        assert_eq!(reply.body["status"], "success");
        assert!(reply.body["token"].is_string());
        let user = &reply.body["data"]["user"];
        assert_eq!(user["role"], "user");
        assert!(user.get("password").is_none());
        let cookie = reply.headers[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("jwt="));
        assert!(cookie.contains("HttpOnly"));

        let reply = send(
            &app,
            Method::POST,
            "/api/v1/users/signup",
            None,
            Some(json!({
                "name": "Laura Again",
                "email": "LAURA@example.io",
                "password": "pass1234",
                "passwordConfirm": "pass1234"
            })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert!(reply.body["message"].as_str().unwrap().contains("Duplicate field value"));
    }

    #[tokio::test]
    async fn test_login() {
        let app = app(state().await);
        signup(&app, "Laura Wilson", "laura@example.io").await;

        let reply = send(&app, Method::POST, "/api/v1/users/login", None, Some(json!({ "email": "laura@example.io" }))).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(reply.body["message"], "Please provide email and password!");

        for (email, password) in [("laura@example.io", "wrongpass"), ("nobody@example.io", "pass1234")] {
            let reply = send(&app, Method::POST, "/api/v1/users/login", None, credentials(email, password)).await;
            assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
            assert_eq!(reply.body["message"], INCORRECT_CREDENTIALS);
        }

        let reply = send(&app, Method::POST, "/api/v1/users/login", None, credentials("Laura@Example.io", "pass1234")).await;
        assert_eq!(reply.status, StatusCode::OK);
        let token = reply.body["token"].as_str().unwrap();

        let reply = send(&app, Method::GET, "/api/v1/users/me", Some(token), None).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["data"]["user"]["email"], "laura@example.io");
    }

    #[tokio::test]
    async fn test_cookie_session_and_logout() {
        let app = app(state().await);
        let (token, _) = signup(&app, "Laura Wilson", "laura@example.io").await;

        let request = axum::http::Request::builder()
            .uri("/api/v1/users/me")
            .header(header::COOKIE, format!("jwt={}", token))
            .body(axum::body::Body::empty())
            .unwrap();
        let response = tower::ServiceExt::oneshot(app.clone(), request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let reply = send(&app, Method::GET, "/api/v1/users/logout", None, None).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert!(reply.headers[header::SET_COOKIE].to_str().unwrap().starts_with("jwt=loggedout"));

        let request = axum::http::Request::builder()
            .uri("/api/v1/users/me")
            .header(header::COOKIE, "jwt=loggedout")
            .body(axum::body::Body::empty())
            .unwrap();
        let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_forgot_and_reset_password() {
        let mailer = CapturingMailer::default();
        let app = app(state().await.with_mailer(mailer.clone()));
        signup(&app, "Laura Wilson", "laura@example.io").await;

        let reply = send(&app, Method::POST, "/api/v1/users/forgotPassword", None, Some(json!({ "email": "nobody@example.io" }))).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);

        let reply = send(&app, Method::POST, "/api/v1/users/forgotPassword", None, Some(json!({ "email": "laura@example.io" }))).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["message"], "Token sent to email!");

        let link = mailer.links.lock().unwrap().pop().unwrap();
        let plain = link.rsplit('/').next().unwrap().to_string();
        let path = format!("/api/v1/users/resetPassword/{}", plain);

        let reply = send(
            &app,
            Method::PATCH,
            &path,
            None,
            Some(json!({ "password": "newpass123", "passwordConfirm": "different1" })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);

        let reply = send(
            &app,
            Method::PATCH,
            &path,
            None,
            Some(json!({ "password": "newpass123", "passwordConfirm": "newpass123" })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::OK, "{:?}", reply.body);
        assert!(reply.body["token"].is_string());

        // The token is single use
        let reply = send(
            &app,
            Method::PATCH,
            &path,
            None,
            Some(json!({ "password": "newpass456", "passwordConfirm": "newpass456" })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(reply.body["message"], INVALID_RESET_TOKEN);

        let reply = send(&app, Method::POST, "/api/v1/users/login", None, credentials("laura@example.io", "newpass123")).await;
        assert_eq!(reply.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_expired_reset_token() {
        let mailer = CapturingMailer::default();
        let mut config = config();
        config.password.reset_expires_in_secs = 0;
        let state = AppState::new(config, MemoryStore::new()).unwrap().with_mailer(mailer.clone());
        let app = app(state);
        signup(&app, "Laura Wilson", "laura@example.io").await;

        send(&app, Method::POST, "/api/v1/users/forgotPassword", None, Some(json!({ "email": "laura@example.io" }))).await;
        let link = mailer.links.lock().unwrap().pop().unwrap();
        let plain = link.rsplit('/').next().unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let reply = send(
            &app,
            Method::PATCH,
            &format!("/api/v1/users/resetPassword/{}", plain),
            None,
            Some(json!({ "password": "newpass123", "passwordConfirm": "newpass123" })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_failed_reset_mail_clears_token() {
        let mailer = CapturingMailer {
            fail: true,
            ..Default::default()
        };
        let state = state().await.with_mailer(mailer);
        let app = app(state.clone());
        let (_, id) = signup(&app, "Laura Wilson", "laura@example.io").await;

        let reply = send(&app, Method::POST, "/api/v1/users/forgotPassword", None, Some(json!({ "email": "laura@example.io" }))).await;
        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);

        let stored = state.store().find_by_id("users", &id).await.unwrap().unwrap();
        assert!(!stored.contains_key("passwordResetToken"));
        assert!(!stored.contains_key("passwordResetExpires"));
    }

    #[tokio::test]
    async fn test_update_my_password() {
        let app = app(state().await);
        let (token, _) = signup(&app, "Laura Wilson", "laura@example.io").await;

        let reply = send(
            &app,
            Method::PATCH,
            "/api/v1/users/updateMyPassword",
            Some(&token),
            Some(json!({ "passwordCurrent": "wrongpass", "password": "newpass123", "passwordConfirm": "newpass123" })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
        assert_eq!(reply.body["message"], "Your current password is wrong.");

        let reply = send(
            &app,
            Method::PATCH,
            "/api/v1/users/updateMyPassword",
            Some(&token),
            Some(json!({ "passwordCurrent": "pass1234", "password": "newpass123", "passwordConfirm": "newpass123" })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::OK);
        let fresh = reply.body["token"].as_str().unwrap();

        let reply = send(&app, Method::GET, "/api/v1/users/me", Some(fresh), None).await;
        assert_eq!(reply.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_update_me_and_delete_me() {
        let app = app(state().await);
        let (token, _) = signup(&app, "Laura Wilson", "laura@example.io").await;

        let reply = send(
            &app,
            Method::PATCH,
            "/api/v1/users/updateMe",
            Some(&token),
            Some(json!({ "password": "newpass123" })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);

        let reply = send(
            &app,
            Method::PATCH,
            "/api/v1/users/updateMe",
            Some(&token),
            Some(json!({ "name": "Laura W", "role": "admin" })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["data"]["user"]["name"], "Laura W");
        assert_eq!(reply.body["data"]["user"]["role"], "user");

        let reply = send(&app, Method::DELETE, "/api/v1/users/deleteMe", Some(&token), None).await;
        assert_eq!(reply.status, StatusCode::NO_CONTENT);

        let reply = send(&app, Method::GET, "/api/v1/users/me", Some(&token), None).await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            reply.body["message"],
            "The user belonging to this token does no longer exist."
        );
        let reply = send(&app, Method::POST, "/api/v1/users/login", None, credentials("laura@example.io", "pass1234")).await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_routes() {
        let state = state().await;
        let app = app(state.clone());
        let (user, user_id) = signup(&app, "Laura Wilson", "laura@example.io").await;
        let (admin, _) = user_with_role(&app, &state, "admin@example.io", "admin").await;

        let reply = send(&app, Method::GET, "/api/v1/users", Some(&user), None).await;
        assert_eq!(reply.status, StatusCode::FORBIDDEN);

        let reply = send(&app, Method::GET, "/api/v1/users", Some(&admin), None).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["results"], 2);

        let path = format!("/api/v1/users/{}", user_id);
        let reply = send(&app, Method::PATCH, &path, Some(&admin), Some(json!({ "role": "guide" }))).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["data"]["user"]["role"], "guide");

        let reply = send(&app, Method::DELETE, &path, Some(&admin), None).await;
        assert_eq!(reply.status, StatusCode::NO_CONTENT);
        let reply = send(&app, Method::GET, &path, Some(&admin), None).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
    }
}
