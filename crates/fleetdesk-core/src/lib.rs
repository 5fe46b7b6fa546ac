//! Core library for fleetdesk.
//!
//! Models, validation, credential storage, the session controller and the
//! REST client for the fleet administration backend. The terminal console in
//! `fleetdesk-tui` is a thin layer over this crate.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod validation;

pub use api::{ApiClient, ApiError, ErrorKind, Operation};
pub use auth::{
    AuthState, CredentialStore, Credentials, FileCredentialStore, Session, SessionController,
    SessionEvent, UserIdentity,
};
pub use config::Config;
