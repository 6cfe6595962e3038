//! Users and roles

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{merge_changes, writable_fields, Resource, Validator, WriteContext};
use crate::error::{Error, Result};
use crate::ids::new_document_id;
use crate::repository::{Document, Filter, FilterCondition, ID_FIELD};

/// Access level of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// Customer; may book and review tours
    User,
    /// Leads tours
    Guide,
    /// Manages tours and bookings
    LeadGuide,
    /// Full access
    Admin,
}

impl Role {
    /// Every role, in ascending order of access
    pub const ALL: [Role; 4] = [Role::User, Role::Guide, Role::LeadGuide, Role::Admin];

    /// Stored representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Guide => "guide",
            Self::LeadGuide => "lead-guide",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| Error::ValidationFailed(format!("Unknown role: {}", s)))
    }
}

/// An account
#[derive(Debug, Clone, Copy, Default)]
pub struct User;

impl User {
    /// Fields accepted at signup
    pub const SIGNUP_FIELDS: &'static [&'static str] =
        &["name", "email", "photo", "password", "passwordConfirm"];

    /// Fields a user may change on their own profile
    pub const PROFILE_FIELDS: &'static [&'static str] = &["name", "email"];

    /// Password changes go through the dedicated flows
    pub fn reject_password_fields(payload: &Document) -> Result<()> {
        if payload.contains_key("password") || payload.contains_key("passwordConfirm") {
            return Err(Error::BadRequest(
                "This route is not for password updates. Please use /updateMyPassword.".to_string(),
            ));
        }
        Ok(())
    }

    /// Check a new password and its confirmation, returning the hash
    pub fn hash_new_password(
        password: Option<&Value>,
        confirm: Option<&Value>,
        ctx: &WriteContext<'_>,
    ) -> Result<String> {
        let password = password.and_then(Value::as_str).unwrap_or_default();
        let confirm = confirm.and_then(Value::as_str).unwrap_or_default();

        let mut v = Validator::new_detached();
        v.check(!password.is_empty(), "Please provide a password")
            .check(
                password.is_empty() || password.chars().count() >= ctx.hasher.min_length(),
                &format!(
                    "A password must have at least {} characters",
                    ctx.hasher.min_length()
                ),
            )
            .check(!confirm.is_empty(), "Please confirm your password")
            .check(confirm.is_empty() || confirm == password, "Passwords are not the same!")
            .finish()?;

        ctx.hasher.hash(password)
    }

    /// The stored role, falling back to the least privileged one
    pub fn role_of(doc: &Document) -> Role {
        doc.get("role")
            .and_then(Value::as_str)
            .and_then(|r| r.parse().ok())
            .unwrap_or(Role::User)
    }
}

impl Resource for User {
    const SINGULAR: &'static str = "user";
    const COLLECTION: &'static str = "users";
    const ID_PREFIX: &'static str = "user";
    const FIELDS: &'static [&'static str] = &["name", "email", "photo", "role"];
    const UNIQUE: &'static [&'static str] = &["email"];
    const HIDDEN: &'static [&'static str] = &[
        "password",
        "passwordConfirm",
        "passwordResetToken",
        "passwordResetExpires",
        "active",
    ];

    fn normalize(doc: &mut Document) {
        if let Some(Value::String(name)) = doc.get_mut("name") {
            *name = name.trim().to_string();
        }
        if let Some(Value::String(email)) = doc.get_mut("email") {
            *email = email.trim().to_lowercase();
        }
    }

    fn defaults(doc: &mut Document, _ctx: &WriteContext<'_>) {
        doc.entry("photo")
            .or_insert_with(|| Value::String("default.jpg".to_string()));
        doc.entry("role")
            .or_insert_with(|| Value::String(Role::User.as_str().to_string()));
        doc.insert("active".to_string(), Value::Bool(true));
    }

    fn validate(doc: &Document) -> Result<()> {
        let roles: Vec<&str> = Role::ALL.iter().map(Role::as_str).collect();
        Validator::new(doc)
            .required("name", "Please tell us your name!")
            .string("name")
            .length("name", 2, 20, "A name must have between 2 and 20 characters")
            .required("email", "Please provide your email")
            .email("email", "Please provide a valid email")
            .string("photo")
            .one_of("role", &roles, "Role is either: user, guide, lead-guide, admin")
            .finish()
    }

    /// Signup path: hashes the password and never stores the confirmation
    fn prepare_create(payload: Document, ctx: &WriteContext<'_>) -> Result<Document> {
        let password = payload.get("password").cloned();
        let confirm = payload.get("passwordConfirm").cloned();

        let mut doc = writable_fields(payload, Self::FIELDS);
        Self::normalize(&mut doc);
        Self::defaults(&mut doc, ctx);
        let checked = Self::validate(&doc);
        let hashed = Self::hash_new_password(password.as_ref(), confirm.as_ref(), ctx);
        let hash = match (checked, hashed) {
            (Ok(()), Ok(hash)) => hash,
            (Err(Error::ValidationFailed(a)), Err(Error::ValidationFailed(b))) => {
                return Err(Error::ValidationFailed(format!("{}. {}", a, b)))
            }
            (Err(e), _) | (_, Err(e)) => return Err(e),
        };

        doc.insert("password".to_string(), Value::String(hash));
        doc.insert(ID_FIELD.to_string(), Value::String(new_document_id(Self::ID_PREFIX)));
        Ok(doc)
    }

    fn prepare_update(
        current: &Document,
        changes: Document,
        _ctx: &WriteContext<'_>,
    ) -> Result<Document> {
        Self::reject_password_fields(&changes)?;
        let mut changes = writable_fields(changes, Self::FIELDS);
        Self::normalize(&mut changes);
        Self::validate(&merge_changes(current, &changes))?;
        Ok(changes)
    }

    fn decorate() -> Filter {
        FilterCondition::ne("active", false).into()
    }
}
