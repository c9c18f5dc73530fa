//! Credential storage.

use super::AuthError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Opaque bearer credential issued by the API after sign-in.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Credential").field(&"[REDACTED]").finish()
    }
}

/// Persistent slot for the one credential this client holds.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<Credential>, AuthError>;
    fn save(&self, credential: &Credential) -> Result<(), AuthError>;
    fn clear(&self) -> Result<(), AuthError>;
}

/// Storage file format.
#[derive(Debug, Default, Serialize, Deserialize)]
struct AuthFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    jwt_token: Option<String>,
}

/// Stores the credential in `auth.json`.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Store under the default config directory.
    pub fn new() -> Result<Self, AuthError> {
        Self::in_dir(&crate::config::shoplist_config_dir())
    }

    pub fn in_dir(dir: &Path) -> Result<Self, AuthError> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            path: dir.join("auth.json"),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&self) -> Result<AuthFile, AuthError> {
        if !self.path.exists() {
            return Ok(AuthFile::default());
        }

        let content = fs::read_to_string(&self.path)?;
        serde_json::from_str(&content).map_err(|e| {
            AuthError::Storage(format!("{} is corrupt: {e}", self.path.display()))
        })
    }

    fn write_file(&self, auth_file: &AuthFile) -> Result<(), AuthError> {
        let content = serde_json::to_string_pretty(auth_file)
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        fs::write(&self.path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<Credential>, AuthError> {
        Ok(self
            .read_file()?
            .jwt_token
            .filter(|t| !t.is_empty())
            .map(Credential))
    }

    fn save(&self, credential: &Credential) -> Result<(), AuthError> {
        self.write_file(&AuthFile {
            jwt_token: Some(credential.0.clone()),
        })
    }

    fn clear(&self) -> Result<(), AuthError> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// In-process store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<Credential>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            slot: Mutex::new(Some(credential)),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Credential>> {
        self.slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<Credential>, AuthError> {
        Ok(self.slot().clone())
    }

    fn save(&self, credential: &Credential) -> Result<(), AuthError> {
        *self.slot() = Some(credential.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), AuthError> {
        *self.slot() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_credential_debug_is_redacted() {
        let debug = format!("{:?}", Credential::new("secret-token"));
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileCredentialStore::in_dir(dir.path()).unwrap();
        assert!(store.load().unwrap().is_none());

        store.save(&Credential::new("abc123")).unwrap();
        let content = fs::read_to_string(store.path()).unwrap();
        assert!(content.contains("\"jwt_token\": \"abc123\""));

        // A fresh handle sees what the previous one wrote.
        let reopened = FileCredentialStore::in_dir(dir.path()).unwrap();
        assert_eq!(reopened.load().unwrap(), Some(Credential::new("abc123")));

        reopened.clear().unwrap();
        assert!(!store.path().exists());
        assert!(store.load().unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = FileCredentialStore::in_dir(dir.path()).unwrap();
        store.save(&Credential::new("abc123")).unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_file_store_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let store = FileCredentialStore::in_dir(dir.path()).unwrap();
        fs::write(store.path(), "not json").unwrap();
        assert!(matches!(store.load(), Err(AuthError::Storage(_))));
    }

    #[test]
    fn test_file_store_clear_without_file() {
        let dir = TempDir::new().unwrap();
        let store = FileCredentialStore::in_dir(dir.path()).unwrap();
        assert!(store.clear().is_ok());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryCredentialStore::default();
        assert!(store.load().unwrap().is_none());
        store.save(&Credential::new("x")).unwrap();
        assert_eq!(store.load().unwrap(), Some(Credential::new("x")));
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }
}
