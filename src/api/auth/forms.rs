//! Submitted forms and their validation.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use unicode_normalization::UnicodeNormalization;
use utoipa::{IntoParams, ToSchema};

pub const MAX_USERNAME_LENGTH: usize = 150;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_USERNAME: &str = "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.";
pub const PASSWORD_MISMATCH: &str = "Passwords do not match!";
pub const DUPLICATE_USERNAME: &str = "A user with that username already exists.";
pub const INVALID_CREDENTIALS: &str = "Invalid Credentials!";

pub fn valid_username(username: &str) -> bool {
    Regex::new(r"^[\w.@+-]+$").is_ok_and(|regex| regex.is_match(username))
}

/// Errors keyed by field name, plus the ones that belong to the whole form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FormErrors {
    pub fields: BTreeMap<&'static str, Vec<String>>,
    pub non_field: Vec<String>,
}

impl FormErrors {
    pub fn add_field(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.entry(field).or_default().push(message.into());
    }

    pub fn add_non_field(&mut self, message: impl Into<String>) {
        self.non_field.push(message.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.non_field.is_empty()
    }

    #[must_use]
    pub fn field(&self, field: &str) -> &[String] {
        self.fields.get(field).map_or(&[], Vec::as_slice)
    }
}

#[derive(Default, Deserialize, ToSchema)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirm: String,
}

impl std::fmt::Debug for RegisterForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterForm")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("password_confirm", &"[REDACTED]")
            .finish()
    }
}

impl RegisterForm {
    /// The username as it will be stored: NFKC-normalized, surrounding
    /// whitespace removed.
    #[must_use]
    pub fn cleaned_username(&self) -> String {
        self.username.nfkc().collect::<String>().trim().to_string()
    }

    /// The password as it will be hashed: surrounding whitespace removed.
    #[must_use]
    pub fn cleaned_password(&self) -> &str {
        self.password.trim()
    }

    /// Field checks first, then the password comparison.
    ///
    /// The comparison only runs when both passwords were supplied, so a
    /// missing confirmation reports "required" and not a mismatch. Both
    /// passwords are compared after trimming, so whitespace alone is missing.
    ///
    /// # Errors
    /// Returns every problem found, grouped by field.
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::default();

        let username = self.cleaned_username();
        if username.is_empty() {
            errors.add_field("username", REQUIRED);
        } else {
            let length = username.chars().count();
            if length > MAX_USERNAME_LENGTH {
                errors.add_field(
                    "username",
                    format!(
                        "Ensure this value has at most {MAX_USERNAME_LENGTH} characters (it has {length})."
                    ),
                );
            }
            if !valid_username(&username) {
                errors.add_field("username", INVALID_USERNAME);
            }
        }

        let password = self.cleaned_password();
        let password_confirm = self.password_confirm.trim();
        if password.is_empty() {
            errors.add_field("password", REQUIRED);
        }
        if password_confirm.is_empty() {
            errors.add_field("password_confirm", REQUIRED);
        }

        if !password.is_empty() && !password_confirm.is_empty() && password != password_confirm {
            errors.add_non_field(PASSWORD_MISMATCH);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Login form body. Missing fields are empty and never authenticate.
#[derive(Default, Deserialize, ToSchema)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

impl std::fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginForm")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("next", &self.next)
            .finish()
    }
}

/// Redirect-back parameters accepted by the login page.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NextQuery {
    /// Where to go after signing in.
    pub next: Option<String>,
    /// Same as `next`, set by views with a custom redirect field.
    pub redirect_to: Option<String>,
}

/// First non-empty candidate, or `fallback`.
#[must_use]
pub fn redirect_target<'a>(candidates: &[Option<&'a str>], fallback: &'a str) -> &'a str {
    candidates
        .iter()
        .flatten()
        .copied()
        .find(|candidate| !candidate.is_empty())
        .unwrap_or(fallback)
}
