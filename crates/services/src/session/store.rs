use super::ports::{User, UserStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// File-backed persisted-user store, the restart-continuity counterpart of
/// the provider library's web-storage user store.
pub struct FileUserStore {
    path: PathBuf,
}

impl FileUserStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl UserStore for FileUserStore {
    async fn load(&self) -> Result<Option<User>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                let user = serde_json::from_str(&content)
                    .with_context(|| format!("Malformed persisted user at {:?}", self.path))?;
                Ok(Some(user))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to read persisted user at {:?}", self.path))
            }
        }
    }

    async fn save(&self, user: &User) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create user store directory {parent:?}"))?;
            }
        }

        let content = serde_json::to_string(user)?;
        tokio::fs::write(&self.path, content)
            .await
            .with_context(|| format!("Failed to persist user at {:?}", self.path))
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to clear persisted user at {:?}", self.path))
            }
        }
    }
}
