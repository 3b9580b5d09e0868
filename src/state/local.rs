//! Local filesystem state backend.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::state::{DeploymentState, StateStore};

const STATE_FILE: &str = "state.json";

/// Keeps `state.json` in a directory.
#[derive(Debug, Clone)]
pub struct LocalStateStore {
    root_dir: PathBuf,
}

impl LocalStateStore {
    /// Create a store rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    fn path(&self) -> PathBuf {
        self.root_dir.join(STATE_FILE)
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        tokio::fs::create_dir_all(&self.root_dir).await?;

        let path = self.path();
        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for LocalStateStore {
    async fn load(&self) -> Result<Option<DeploymentState>> {
        match tokio::fs::read(self.path()).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn save(&self, state: &mut DeploymentState) -> Result<()> {
        state.serial += 1;
        state.updated_at = Utc::now();
        let bytes = serde_json::to_vec_pretty(state)?;
        self.write_bytes(&bytes).await?;
        log::debug!("State serial {} saved to {}", state.serial, self.location());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(self.path()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    fn location(&self) -> String {
        self.path().display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LogSinkRecord;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_without_state() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStateStore::new(tmp.path());
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_bumps_serial_and_roundtrips() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStateStore::new(tmp.path().join("nested"));

        let mut state = DeploymentState::new();
        state.log_sink = Some(LogSinkRecord {
            name: "/aws/lambda/upload-function".into(),
            arn: "arn:aws:logs:us-east-1:000000000000:log-group:/aws/lambda/upload-function"
                .into(),
            retention_days: Some(14),
        });
        store.save(&mut state).await.unwrap();
        store.save(&mut state).await.unwrap();
        assert_eq!(state.serial, 2);

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, state);
        assert!(!tmp.path().join("nested/state.tmp").exists());
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStateStore::new(tmp.path());
        store.save(&mut DeploymentState::new()).await.unwrap();
        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }
}
