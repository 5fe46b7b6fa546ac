use serde::Deserialize;
use thiserror::Error;

use super::Operation;
use crate::auth::StoreError;
use crate::validation::ValidationErrors;

/// Broad failure categories the console reacts to differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Client-side field checks failed; nothing was sent
    Validation,
    /// The backend could not be reached
    Network,
    /// 401/403; the session has been torn down
    Auth,
    /// The backend answered but refused or failed the operation
    Application,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unauthorized - session is no longer valid")]
    Unauthorized { message: Option<String> },

    #[error("Access denied")]
    Forbidden { message: Option<String> },

    #[error("{message}")]
    Application { message: String },

    #[error("Server returned status {status}")]
    Status { status: u16, message: Option<String> },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Credential storage failed: {0}")]
    Storage(#[from] StoreError),

    #[error("Stored token is not a valid header value")]
    InvalidToken(#[from] reqwest::header::InvalidHeaderValue),

    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    #[error("A login is already in progress")]
    LoginInProgress,
}

/// Maximum length for error response bodies in log messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Just the message of an error envelope
#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let cut: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
            format!("{}... (truncated, {} total bytes)", cut, body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.message)
            .filter(|m| !m.is_empty());
        match status.as_u16() {
            401 => ApiError::Unauthorized { message },
            403 => ApiError::Forbidden { message },
            code => ApiError::Status {
                status: code,
                message,
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Validation(_) => ErrorKind::Validation,
            ApiError::Network(_) => ErrorKind::Network,
            ApiError::Unauthorized { .. } | ApiError::Forbidden { .. } => ErrorKind::Auth,
            ApiError::Application { .. }
            | ApiError::Status { .. }
            | ApiError::InvalidResponse(_)
            | ApiError::Storage(_)
            | ApiError::InvalidToken(_)
            | ApiError::InvalidUrl(_)
            | ApiError::LoginInProgress => ErrorKind::Application,
        }
    }

    pub fn is_auth(&self) -> bool {
        self.kind() == ErrorKind::Auth
    }

    /// Text for a user-facing notification: the backend's own message when it
    /// sent one, otherwise the operation's fallback.
    pub fn user_message(&self, operation: Operation) -> String {
        match self {
            ApiError::Validation(errors) => errors.to_string(),
            ApiError::Application { message } => message.clone(),
            ApiError::Unauthorized { message: Some(m) }
            | ApiError::Forbidden { message: Some(m) }
            | ApiError::Status {
                message: Some(m), ..
            } => m.clone(),
            ApiError::Unauthorized { message: None }
            | ApiError::Forbidden { message: None }
            | ApiError::Status { message: None, .. } => operation.rejection_message().to_string(),
            _ => operation.fallback_message().to_string(),
        }
    }
}
