//! Authentication: credential persistence, the session signal and the
//! controller that owns the login state.
//!
//! - `CredentialStore`: token, user identity and remembered username on disk
//!   (or the token in the OS keychain)
//! - `SessionSignal`: one-shot invalidation per session, shared with the API client
//! - `SessionController`: Unauthenticated / Authenticating / Authenticated

pub mod controller;
pub mod credentials;
pub mod session;
pub mod signal;

pub use controller::{AuthState, SessionController};
pub use credentials::{CredentialStore, FileCredentialStore, KeyringCredentialStore, StoreError};
pub use session::{Credentials, LoginGrant, Session, UserIdentity};
pub use signal::{SessionEvent, SessionSignal};
