use crate::domain::models::OAuthToken;
use crate::infrastructure::error::InfraError;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

pub const DEFAULT_TOKEN_PATH: &str = "token.json";

pub trait CredentialStore: Send + Sync {
    fn save_token(&self, token: &OAuthToken) -> Result<(), InfraError>;
    fn load_token(&self) -> Result<Option<OAuthToken>, InfraError>;
}

/// Token kept as JSON next to the config, readable only by the owner.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_for_write(&self) -> Result<fs::File, InfraError> {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        options.open(&self.path).map_err(|error| {
            InfraError::Credential(format!(
                "unable to cache oauth token at {}: {error}",
                self.path.display()
            ))
        })
    }
}

impl Default for FileCredentialStore {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_PATH)
    }
}

impl CredentialStore for FileCredentialStore {
    fn save_token(&self, token: &OAuthToken) -> Result<(), InfraError> {
        info!(path = %self.path.display(), "saving credential file");
        let payload = serde_json::to_string_pretty(token)?;
        let mut file = self.open_for_write()?;
        writeln!(file, "{payload}").map_err(|error| {
            InfraError::Credential(format!(
                "unable to write oauth token to {}: {error}",
                self.path.display()
            ))
        })
    }

    fn load_token(&self) -> Result<Option<OAuthToken>, InfraError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(InfraError::Credential(format!(
                    "unable to read {}: {error}",
                    self.path.display()
                )))
            }
        };

        match serde_json::from_str::<OAuthToken>(&raw) {
            Ok(token) => Ok(Some(token)),
            Err(error) => {
                warn!(path = %self.path.display(), %error, "ignoring unreadable token file");
                Ok(None)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service_name: String,
    account_name: String,
}

impl KeyringCredentialStore {
    pub fn new(service_name: impl Into<String>, account_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            account_name: account_name.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, InfraError> {
        keyring::Entry::new(&self.service_name, &self.account_name)
            .map_err(|error| InfraError::Credential(error.to_string()))
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new("cal-calc.oauth.google", "default")
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn save_token(&self, token: &OAuthToken) -> Result<(), InfraError> {
        info!(service = %self.service_name, "saving credential to the system keyring");
        let payload = serde_json::to_string(token)?;
        self.entry()?
            .set_password(&payload)
            .map_err(|error| InfraError::Credential(error.to_string()))
    }

    fn load_token(&self) -> Result<Option<OAuthToken>, InfraError> {
        let payload = match self.entry()?.get_password() {
            Ok(value) => value,
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(error) => return Err(InfraError::Credential(error.to_string())),
        };

        let token = serde_json::from_str::<OAuthToken>(&payload)
            .map_err(|error| InfraError::Credential(error.to_string()))?;
        Ok(Some(token))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    token: Mutex<Option<OAuthToken>>,
}

impl InMemoryCredentialStore {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<OAuthToken>>, InfraError> {
        self.token
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn save_token(&self, token: &OAuthToken) -> Result<(), InfraError> {
        *self.lock()? = Some(token.clone());
        Ok(())
    }

    fn load_token(&self) -> Result<Option<OAuthToken>, InfraError> {
        Ok(self.lock()?.clone())
    }
}

/// Selected at startup from the `credentialStore` config setting.
pub enum AnyCredentialStore {
    File(FileCredentialStore),
    Keyring(KeyringCredentialStore),
}

impl CredentialStore for AnyCredentialStore {
    fn save_token(&self, token: &OAuthToken) -> Result<(), InfraError> {
        match self {
            Self::File(store) => store.save_token(token),
            Self::Keyring(store) => store.save_token(token),
        }
    }

    fn load_token(&self) -> Result<Option<OAuthToken>, InfraError> {
        match self {
            Self::File(store) => store.load_token(),
            Self::Keyring(store) => store.load_token(),
        }
    }
}
