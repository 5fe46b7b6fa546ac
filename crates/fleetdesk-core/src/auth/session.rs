use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::validation::{validate_login, ValidationErrors};

/// Identity returned by the backend on login.
///
/// Only `username` and `role` are interpreted; every other field is carried
/// along untouched so the stored blob round-trips exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserIdentity {
    pub fn new(username: impl Into<String>, role: Option<&str>) -> Self {
        Self {
            username: username.into(),
            role: role.map(str::to_string),
            extra: Map::new(),
        }
    }
}

/// The authenticated identity plus the bearer token for this client.
#[derive(Clone, PartialEq)]
pub struct Session {
    pub user: UserIdentity,
    pub token: String,
}

impl Session {
    pub fn new(user: UserIdentity, token: String) -> Self {
        Self { user, token }
    }

    pub fn username(&self) -> &str {
        &self.user.username
    }
}

// Keep tokens out of debug output and logs
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Login form contents, the body of `POST /login`.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        validate_login(&self.username, &self.password)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// What a successful `POST /login` yields before it becomes a [`Session`].
#[derive(Clone)]
pub struct LoginGrant {
    pub user: UserIdentity,
    pub token: String,
}

impl fmt::Debug for LoginGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginGrant")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}
