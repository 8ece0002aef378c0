//! Boot image lookup.

use crate::error::StorageError;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

#[async_trait]
pub trait BootStorage: Send + Sync {
    /// Whole contents of `name`. A missing file is [`StorageError::NotFound`].
    async fn read(&self, name: &str) -> Result<Vec<u8>, StorageError>;
}

/// Serves files from a single flat directory (`bin/` by default).
pub struct DirStorage {
    root: PathBuf,
}

impl DirStorage {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(file)), None) => Ok(self.root.join(file)),
            _ => Err(StorageError::InvalidName(name.to_string())),
        }
    }
}

#[async_trait]
impl BootStorage for DirStorage {
    async fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.file_path(name)?;
        match fs::read(&path).await {
            Ok(data) => {
                tracing::debug!(path = %path.display(), len = data.len(), "Read boot file");
                Ok(data)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
