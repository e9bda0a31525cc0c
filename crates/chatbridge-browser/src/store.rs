//! Durable storage of the bearer credential.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chatbridge_core::{Error, Result};
use parking_lot::Mutex;
use tracing::debug;

/// Key the credential is stored under.
pub const TOKEN_ACCESS_KEY: &str = "react_native_chatgpt_access_token";

/// Persists exactly one secret string across restarts.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self) -> Result<Option<String>>;
    async fn set(&self, value: &str) -> Result<()>;
}

/// JSON file store, readable only by the owner on unix.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self) -> Result<Option<String>> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entries: HashMap<String, String> = serde_json::from_str(&data)
            .map_err(|e| Error::Store(format!("{}: {}", self.path.display(), e)))?;
        Ok(entries.get(TOKEN_ACCESS_KEY).cloned())
    }

    async fn set(&self, value: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut entries = HashMap::new();
        entries.insert(TOKEN_ACCESS_KEY, value);
        let json = serde_json::to_string_pretty(&entries)?;
        tokio::fs::write(&self.path, json).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .await?;
        }

        debug!("Persisted credential to {}", self.path.display());
        Ok(())
    }
}

/// In-memory store; nothing survives the process.
#[derive(Default)]
pub struct MemoryCredentialStore {
    value: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Mutex::new(Some(value.into())),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self) -> Result<Option<String>> {
        Ok(self.value.lock().clone())
    }

    async fn set(&self, value: &str) -> Result<()> {
        *self.value.lock() = Some(value.to_string());
        Ok(())
    }
}
