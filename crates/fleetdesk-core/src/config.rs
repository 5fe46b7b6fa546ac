//! Application configuration management.
//!
//! Configuration is stored at `~/.config/fleetdesk/config.json` (platform
//! config dir). A missing file means defaults. `FLEETDESK_API_URL` and
//! `FLEETDESK_TIMEOUT_SECS` override the file.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::auth::{CredentialStore, FileCredentialStore, KeyringCredentialStore};

/// Application name used for config/data/cache directory paths
const APP_NAME: &str = "fleetdesk";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Keychain service name for the keyring credential backend
const KEYRING_SERVICE: &str = "fleetdesk";

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3002";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

pub const ENV_API_URL: &str = "FLEETDESK_API_URL";
pub const ENV_TIMEOUT_SECS: &str = "FLEETDESK_TIMEOUT_SECS";

/// Where the session token is kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    #[default]
    File,
    Keyring,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub credential_backend: CredentialBackend,
    /// Overrides the platform data dir for `storage.json`
    pub storage_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            credential_backend: CredentialBackend::File,
            storage_dir: None,
        }
    }
}

impl Config {
    /// Load from the default location and apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(env::var(ENV_API_URL).ok(), env::var(ENV_TIMEOUT_SECS).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn apply_overrides(&mut self, api_url: Option<String>, timeout_secs: Option<String>) {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
        if let Some(raw) = timeout_secs {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => self.request_timeout_secs = secs,
                _ => warn!(value = %raw, "Ignoring invalid {}", ENV_TIMEOUT_SECS),
            }
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn storage_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.storage_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn log_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Open the credential store selected by `credential_backend`
    pub fn open_store(&self) -> Result<Arc<dyn CredentialStore>> {
        let dir = self.storage_dir()?;
        let store: Arc<dyn CredentialStore> = match self.credential_backend {
            CredentialBackend::File => Arc::new(FileCredentialStore::new(dir)),
            CredentialBackend::Keyring => Arc::new(
                KeyringCredentialStore::new(dir, KEYRING_SERVICE)
                    .context("Failed to open keychain")?,
            ),
        };
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.api_base_url, "http://localhost:3002");
        assert_eq!(config.request_timeout_secs, 10);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"credential_backend":"keyring"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.credential_backend, CredentialBackend::Keyring);
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config.apply_overrides(Some("http://fleet.local:8080".into()), Some("30".into()));
        assert_eq!(config.api_base_url, "http://fleet.local:8080");
        assert_eq!(config.request_timeout_secs, 30);

        config.apply_overrides(Some("  ".into()), Some("zero".into()));
        assert_eq!(config.api_base_url, "http://fleet.local:8080");
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_explicit_storage_dir() {
        let config = Config {
            storage_dir: Some(PathBuf::from("/tmp/fleetdesk-test")),
            ..Config::default()
        };
        assert_eq!(config.storage_dir().unwrap(), PathBuf::from("/tmp/fleetdesk-test"));
    }
}
