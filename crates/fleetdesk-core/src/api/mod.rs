//! REST client for the fleet backend.
//!
//! `ApiClient` wraps reqwest with the token handling the backend expects:
//! the token travels verbatim in the `Authorization` header in both
//! directions, and responses arrive in a `{success, data, message}` envelope
//! that is unwrapped into `Result<T, ApiError>`.

pub mod client;
mod devices;
pub mod envelope;
pub mod error;
pub mod operation;
mod users;

pub use client::ApiClient;
pub use envelope::Envelope;
pub use error::{ApiError, ErrorKind};
pub use operation::Operation;
