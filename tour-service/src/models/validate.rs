//! Field rule checks shared by the resource models
//!
//! A [`Validator`] walks one document, records every violated rule and turns
//! them into a single `ValidationFailed` error.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::repository::Document;

/// Regex for plausible email addresses
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("email regex is valid")
});

static EMPTY_DOCUMENT: LazyLock<Document> = LazyLock::new(Document::new);

/// Whether a string is shaped like an email address
pub fn is_email(candidate: &str) -> bool {
    EMAIL_REGEX.is_match(candidate)
}

/// Collects rule violations for one document
#[derive(Debug)]
pub struct Validator<'a> {
    doc: &'a Document,
    errors: Vec<String>,
}

impl<'a> Validator<'a> {
    /// Start checking a document
    pub fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            errors: Vec::new(),
        }
    }

    /// A validator used only for [`Validator::check`] rules
    pub fn new_detached() -> Validator<'static> {
        Validator::new(&EMPTY_DOCUMENT)
    }

    fn present(&self, field: &str) -> Option<&'a Value> {
        self.doc.get(field).filter(|v| !v.is_null())
    }

    fn fail(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// The field must be present and not an empty string
    pub fn required(&mut self, field: &str, message: &str) -> &mut Self {
        match self.present(field) {
            None => self.fail(message),
            Some(Value::String(s)) if s.trim().is_empty() => self.fail(message),
            Some(_) => {}
        }
        self
    }

    /// When present, the field must be a string
    pub fn string(&mut self, field: &str) -> &mut Self {
        if let Some(value) = self.present(field) {
            if !value.is_string() {
                self.fail(format!("{} must be a string", field));
            }
        }
        self
    }

    /// When present, the string's length in characters must lie within bounds
    pub fn length(&mut self, field: &str, min: usize, max: usize, message: &str) -> &mut Self {
        if let Some(Value::String(s)) = self.present(field) {
            let len = s.chars().count();
            if len < min || len > max {
                self.fail(message);
            }
        }
        self
    }

    /// When present, the field must be a number
    pub fn number(&mut self, field: &str) -> &mut Self {
        if let Some(value) = self.present(field) {
            if !value.is_number() {
                self.fail(format!("{} must be a number", field));
            }
        }
        self
    }

    /// When present and numeric, the value must lie within bounds
    pub fn range(&mut self, field: &str, min: f64, max: f64, message: &str) -> &mut Self {
        if let Some(n) = self.present(field).and_then(Value::as_f64) {
            if n < min || n > max {
                self.fail(message);
            }
        }
        self
    }

    /// When present, the field must be one of the allowed strings
    pub fn one_of(&mut self, field: &str, allowed: &[&str], message: &str) -> &mut Self {
        if let Some(value) = self.present(field) {
            if !value.as_str().is_some_and(|s| allowed.contains(&s)) {
                self.fail(message);
            }
        }
        self
    }

    /// When present, the field must be a boolean
    pub fn boolean(&mut self, field: &str) -> &mut Self {
        if let Some(value) = self.present(field) {
            if !value.is_boolean() {
                self.fail(format!("{} must be true or false", field));
            }
        }
        self
    }

    /// When present, the field must be an email address
    pub fn email(&mut self, field: &str, message: &str) -> &mut Self {
        if let Some(value) = self.present(field) {
            if !value.as_str().is_some_and(is_email) {
                self.fail(message);
            }
        }
        self
    }

    /// Record `message` unless `ok` holds
    pub fn check(&mut self, ok: bool, message: &str) -> &mut Self {
        if !ok {
            self.fail(message);
        }
        self
    }

    /// Number of violations so far
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Finish, failing with every recorded violation
    pub fn finish(&mut self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(Error::ValidationFailed(self.errors.join(". ")))
        }
    }
}
