//! [`FileSystemAccess`] over `tokio::fs`.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::FileSystemAccess,
};
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

const APP_DIR_NAME: &str = "notes-sync";

/// Desktop file access. Relative paths resolve against the base directory,
/// by default `<platform data dir>/notes-sync`.
#[derive(Debug, Clone)]
pub struct TokioFileSystem {
    base_dir: PathBuf,
}

impl TokioFileSystem {
    pub fn new() -> Self {
        let platform_dir = dirs::data_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("share")))
            .unwrap_or_else(|| PathBuf::from("."));
        Self::with_base_dir(platform_dir.join(APP_DIR_NAME))
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

impl Default for TokioFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileSystemAccess for TokioFileSystem {
    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(fs::try_exists(self.resolve(path)).await?)
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        Ok(fs::create_dir_all(self.resolve(path)).await?)
    }

    async fn read_file(&self, path: &Path) -> Result<Bytes> {
        let path = self.resolve(path);
        let data = fs::read(&path).await?;
        debug!(path = %path.display(), bytes = data.len(), "Read local file");
        Ok(Bytes::from(data))
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()> {
        let path = self.resolve(path);
        fs::write(&path, &data).await?;
        debug!(path = %path.display(), bytes = data.len(), "Wrote local file");
        Ok(())
    }

    async fn remove_file(&self, path: &Path) -> Result<()> {
        match fs::remove_file(self.resolve(path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BridgeError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_relative_paths_resolve_against_base_dir() {
        let root = tempfile::tempdir().unwrap();
        let fs = TokioFileSystem::with_base_dir(root.path());

        fs.create_dir_all(Path::new("resources")).await.unwrap();
        fs.write_file(Path::new("resources/image.png"), Bytes::from_static(b"\x89PNG"))
            .await
            .unwrap();

        assert!(root.path().join("resources/image.png").exists());
        assert_eq!(
            fs.read_file(&root.path().join("resources/image.png"))
                .await
                .unwrap(),
            Bytes::from_static(b"\x89PNG")
        );
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let fs = TokioFileSystem::with_base_dir(root.path());
        let file = Path::new("note.md");

        fs.write_file(file, Bytes::from_static(b"# note")).await.unwrap();
        assert!(fs.exists(file).await.unwrap());

        fs.remove_file(file).await.unwrap();
        fs.remove_file(file).await.unwrap();
        assert!(!fs.exists(file).await.unwrap());
    }

    #[tokio::test]
    async fn test_write_into_missing_directory_fails() {
        let root = tempfile::tempdir().unwrap();
        let fs = TokioFileSystem::with_base_dir(root.path());

        let err = fs
            .write_file(Path::new("missing/note.md"), Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Io(_)));
    }

    #[test]
    fn test_default_base_dir_is_app_scoped() {
        assert!(TokioFileSystem::new().base_dir().ends_with(APP_DIR_NAME));
    }
}
