//! YAML-file configuration store with hot reload.
//!
//! The file is re-read whenever its modification time changes. A file that
//! fails to parse or validate is logged and the previous settings stay in
//! effect, so an operator typo never stops the engine.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::Mutex;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{ConfigurationStore, DunningSettings};

#[derive(Debug)]
struct Loaded {
    modified: Option<SystemTime>,
    settings: Arc<DunningSettings>,
}

#[derive(Debug)]
pub struct FileConfigurationStore {
    path: PathBuf,
    loaded: Mutex<Loaded>,
}

impl FileConfigurationStore {
    /// Loads `path` once; fails if the initial file is missing or invalid.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, DomainError> {
        let path = path.into();
        let modified = modified_at(&path).await?;
        let settings = read_settings(&path).await?;
        tracing::info!(path = %path.display(), "dunning settings loaded");
        Ok(Self {
            path,
            loaded: Mutex::new(Loaded {
                modified: Some(modified),
                settings: Arc::new(settings),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn config_error(path: &Path, message: impl std::fmt::Display) -> DomainError {
    DomainError::new(
        ErrorCode::ConfigurationError,
        format!("{}: {}", path.display(), message),
    )
}

async fn modified_at(path: &Path) -> Result<SystemTime, DomainError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| config_error(path, e))?;
    metadata.modified().map_err(|e| config_error(path, e))
}

async fn read_settings(path: &Path) -> Result<DunningSettings, DomainError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| config_error(path, e))?;
    let settings: DunningSettings = serde_yaml::from_str(&raw).map_err(|e| config_error(path, e))?;
    settings.validate().map_err(|e| config_error(path, e))?;
    Ok(settings)
}

#[async_trait]
impl ConfigurationStore for FileConfigurationStore {
    async fn settings(&self) -> Result<Arc<DunningSettings>, DomainError> {
        let mut loaded = self.loaded.lock().await;

        let modified = match modified_at(&self.path).await {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(error = %e, "settings file unreadable, keeping previous settings");
                return Ok(loaded.settings.clone());
            }
        };
        if loaded.modified == Some(modified) {
            return Ok(loaded.settings.clone());
        }

        match read_settings(&self.path).await {
            Ok(settings) => {
                tracing::info!(path = %self.path.display(), "dunning settings reloaded");
                loaded.settings = Arc::new(settings);
            }
            Err(e) => {
                tracing::error!(error = %e, "invalid settings file, keeping previous settings");
            }
        }
        // Remember the bad version too, so it is not re-parsed on every call.
        loaded.modified = Some(modified);
        Ok(loaded.settings.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    fn write(file: &mut tempfile::NamedTempFile, body: &str) {
        let f = file.as_file_mut();
        f.set_len(0).unwrap();
        std::io::Seek::rewind(f).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f.sync_all().unwrap();
    }

    fn bump_mtime(file: &tempfile::NamedTempFile, secs: u64) {
        let at = SystemTime::now() + Duration::from_secs(secs);
        file.as_file().set_modified(at).unwrap();
    }

    #[tokio::test]
    async fn reloads_when_file_changes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write(&mut file, "default_max_attempts: 5\n");
        let store = FileConfigurationStore::open(file.path()).await.unwrap();
        assert_eq!(store.settings().await.unwrap().default_max_attempts, 5);

        write(&mut file, "default_max_attempts: 7\nretry_intervals_hours: [12]\n");
        bump_mtime(&file, 10);

        let settings = store.settings().await.unwrap();
        assert_eq!(settings.default_max_attempts, 7);
        assert_eq!(settings.retry_intervals_hours, vec![12]);
    }

    #[tokio::test]
    async fn invalid_update_keeps_previous_settings() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write(&mut file, "default_grace_period_days: 10\n");
        let store = FileConfigurationStore::open(file.path()).await.unwrap();

        write(&mut file, "default_grace_period_days: [not, a, number]\n");
        bump_mtime(&file, 10);

        assert_eq!(store.settings().await.unwrap().default_grace_period_days, 10);
    }

    #[tokio::test]
    async fn missing_file_fails_to_open() {
        let err = FileConfigurationStore::open("/nonexistent/dunning.yaml").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigurationError);
    }
}
