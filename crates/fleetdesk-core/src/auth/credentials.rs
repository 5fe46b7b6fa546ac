//! Durable storage for the session token, user identity and remembered username.
//!
//! Values live under fixed keys. The file backend keeps every key in one JSON
//! object on disk; the keyring backend moves the token into the OS keychain and
//! keeps the rest in the same file. Neither backend does any network I/O.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use keyring::Entry;
use thiserror::Error;
use tracing::{debug, warn};

use super::session::{Session, UserIdentity};

/// Storage file name inside the storage directory
const STORAGE_FILE: &str = "storage.json";

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";
pub const REMEMBERED_USERNAME_KEY: &str = "rememberedUsername";

/// Keychain account name for the session token
const KEYRING_TOKEN_ACCOUNT: &str = "session-token";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored data is malformed: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("Failed to encode stored value: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Persistence contract for the session.
///
/// `clear` removes the token and user identity; the remembered username is
/// independent of the session and survives it.
pub trait CredentialStore: Send + Sync {
    fn save(&self, session: &Session) -> Result<(), StoreError>;

    /// Load the stored session. Malformed data is cleared and reported as absent.
    fn load(&self) -> Result<Option<Session>, StoreError>;

    fn clear(&self) -> Result<(), StoreError>;

    fn token(&self) -> Result<Option<String>, StoreError>;

    /// Replace the stored token after the backend rotated it
    fn set_token(&self, token: &str) -> Result<(), StoreError>;

    fn remembered_username(&self) -> Result<Option<String>, StoreError>;

    fn set_remembered_username(&self, username: Option<&str>) -> Result<(), StoreError>;
}

type Entries = BTreeMap<String, String>;

/// Build a session from raw stored values.
/// `None` when either half is missing; `Some(Err)` when the user blob does not parse.
fn decode_session(
    token: Option<String>,
    user: Option<String>,
) -> Option<Result<Session, serde_json::Error>> {
    match (token, user) {
        (Some(token), Some(user)) if !token.is_empty() => Some(
            serde_json::from_str::<UserIdentity>(&user).map(|user| Session::new(user, token)),
        ),
        _ => None,
    }
}

fn encode_user(user: &UserIdentity) -> Result<String, StoreError> {
    serde_json::to_string(user).map_err(StoreError::Encode)
}

// ============================================================================
// File backend
// ============================================================================

/// Key/value credential storage in a single JSON file.
pub struct FileCredentialStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(STORAGE_FILE),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<Entries, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(StoreError::Malformed),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Entries::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Read entries, treating a malformed file as empty
    fn entries_or_empty(&self) -> Result<Entries, StoreError> {
        match self.read_entries() {
            Err(StoreError::Malformed(e)) => {
                warn!(error = %e, path = ?self.path, "Storage file is malformed, ignoring it");
                Ok(Entries::new())
            }
            other => other,
        }
    }

    fn write_entries(&self, entries: &Entries) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(entries).map_err(StoreError::Encode)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }

    fn update<F>(&self, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Entries),
    {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries = self.entries_or_empty()?;
        change(&mut entries);
        self.write_entries(&entries)
    }

    pub(crate) fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.entries_or_empty()?.remove(key))
    }

    pub(crate) fn put(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value);
        })
    }

    pub(crate) fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        self.update(|entries| {
            for key in keys {
                entries.remove(*key);
            }
        })
    }
}

impl CredentialStore for FileCredentialStore {
    fn save(&self, session: &Session) -> Result<(), StoreError> {
        let user = encode_user(&session.user)?;
        self.update(|entries| {
            entries.insert(TOKEN_KEY.to_string(), session.token.clone());
            entries.insert(USER_KEY.to_string(), user);
        })?;
        debug!(username = %session.username(), "Session saved");
        Ok(())
    }

    fn load(&self) -> Result<Option<Session>, StoreError> {
        let entries = {
            let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
            self.read_entries()
        };

        let mut entries = match entries {
            Ok(entries) => entries,
            Err(StoreError::Malformed(e)) => {
                warn!(error = %e, "Stored credentials are malformed, clearing");
                self.clear()?;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        match decode_session(entries.remove(TOKEN_KEY), entries.remove(USER_KEY)) {
            None => Ok(None),
            Some(Ok(session)) => Ok(Some(session)),
            Some(Err(e)) => {
                warn!(error = %e, "Stored user identity is malformed, clearing");
                self.clear()?;
                Ok(None)
            }
        }
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.remove(&[TOKEN_KEY, USER_KEY])?;
        debug!("Stored session cleared");
        Ok(())
    }

    fn token(&self) -> Result<Option<String>, StoreError> {
        Ok(self.get(TOKEN_KEY)?.filter(|t| !t.is_empty()))
    }

    fn set_token(&self, token: &str) -> Result<(), StoreError> {
        self.put(TOKEN_KEY, token.to_string())
    }

    fn remembered_username(&self) -> Result<Option<String>, StoreError> {
        self.get(REMEMBERED_USERNAME_KEY)
    }

    fn set_remembered_username(&self, username: Option<&str>) -> Result<(), StoreError> {
        match username {
            Some(name) => self.put(REMEMBERED_USERNAME_KEY, name.to_string()),
            None => self.remove(&[REMEMBERED_USERNAME_KEY]),
        }
    }
}

// ============================================================================
// Keyring backend
// ============================================================================

/// Token in the OS keychain, everything else in the storage file.
pub struct KeyringCredentialStore {
    token_entry: Entry,
    file: FileCredentialStore,
}

impl KeyringCredentialStore {
    pub fn new(dir: impl AsRef<Path>, service: &str) -> Result<Self, StoreError> {
        let token_entry = Entry::new(service, KEYRING_TOKEN_ACCOUNT)?;
        Ok(Self {
            token_entry,
            file: FileCredentialStore::new(dir),
        })
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn save(&self, session: &Session) -> Result<(), StoreError> {
        self.token_entry.set_password(&session.token)?;
        self.file.put(USER_KEY, encode_user(&session.user)?)?;
        debug!(username = %session.username(), "Session saved to keychain");
        Ok(())
    }

    fn load(&self) -> Result<Option<Session>, StoreError> {
        let token = self.token()?;
        let user = self.file.get(USER_KEY)?;

        match decode_session(token, user) {
            None => Ok(None),
            Some(Ok(session)) => Ok(Some(session)),
            Some(Err(e)) => {
                warn!(error = %e, "Stored user identity is malformed, clearing");
                self.clear()?;
                Ok(None)
            }
        }
    }

    fn clear(&self) -> Result<(), StoreError> {
        match self.token_entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => {}
            Err(e) => return Err(e.into()),
        }
        self.file.remove(&[TOKEN_KEY, USER_KEY])
    }

    fn token(&self) -> Result<Option<String>, StoreError> {
        match self.token_entry.get_password() {
            Ok(token) if !token.is_empty() => Ok(Some(token)),
            Ok(_) | Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_token(&self, token: &str) -> Result<(), StoreError> {
        self.token_entry.set_password(token)?;
        Ok(())
    }

    fn remembered_username(&self) -> Result<Option<String>, StoreError> {
        self.file.remembered_username()
    }

    fn set_remembered_username(&self, username: Option<&str>) -> Result<(), StoreError> {
        self.file.set_remembered_username(username)
    }
}
