//! Client-side form validation.
//!
//! Forms are checked before any request is built. A failed check produces
//! [`ValidationErrors`], which the console renders next to the offending
//! fields; it is never sent anywhere.

use std::fmt;

/// Minimum username length accepted by the login form.
pub const MIN_USERNAME_LENGTH: usize = 3;

/// Minimum password length accepted by the login form.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// All validation failures for one form, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Message for a single field, if that field failed
    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    /// Turn the collected errors into a result: `Ok` when nothing failed.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.errors.iter().map(|e| e.message.as_str()).collect();
        f.write_str(&messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Check the login form fields.
pub fn validate_login(username: &str, password: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let username = username.trim();
    if username.is_empty() {
        errors.add("username", "Tên đăng nhập không được để trống");
    } else if username.chars().count() < MIN_USERNAME_LENGTH {
        errors.add(
            "username",
            format!("Tên đăng nhập phải có ít nhất {} ký tự", MIN_USERNAME_LENGTH),
        );
    }

    if password.is_empty() {
        errors.add("password", "Mật khẩu không được để trống");
    } else if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.add(
            "password",
            format!("Mật khẩu phải có ít nhất {} ký tự", MIN_PASSWORD_LENGTH),
        );
    }

    errors.into_result()
}

/// Add an error for `field` when `value` is blank.
pub fn require(errors: &mut ValidationErrors, field: &'static str, value: &str, message: &str) {
    if value.trim().is_empty() {
        errors.add(field, message);
    }
}
