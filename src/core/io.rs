use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Replaces `path` with `content` in one step; readers never see a partial file.
    async fn write(&self, path: &str, content: &[u8]) -> Result<()>;
    async fn exists(&self, path: &str) -> Result<bool>;
}

pub struct NativeStorage;

impl NativeStorage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NativeStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for NativeStorage {
    async fn write(&self, path: &str, content: &[u8]) -> Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let staging = format!("{}.part", path);
        if let Err(e) = tokio::fs::write(&staging, content).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e).with_context(|| format!("Failed to write {}", staging));
        }
        if let Err(e) = tokio::fs::rename(&staging, path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e).with_context(|| format!("Failed to move {} into place", staging));
        }
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_creates_parents_and_leaves_no_staging_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let target = dir.path().join("nested").join("story.pdf");
        let target_str = target.to_string_lossy().to_string();

        let storage = NativeStorage::new();
        storage.write(&target_str, b"%PDF-1.4").await?;

        assert!(storage.exists(&target_str).await?);
        assert_eq!(std::fs::read(&target)?, b"%PDF-1.4");
        assert!(!storage.exists(&format!("{}.part", target_str)).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_write_into_unwritable_location_fails() -> Result<()> {
        let dir = tempfile::tempdir()?;
        // a regular file cannot act as a parent directory
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x")?;
        let target = blocker.join("story.pdf");

        let storage = NativeStorage::new();
        assert!(storage.write(&target.to_string_lossy(), b"data").await.is_err());
        assert!(!target.exists());
        Ok(())
    }
}
