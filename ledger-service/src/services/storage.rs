//! Blob storage for deposit proof files.

use async_trait::async_trait;
use service_core::error::AppError;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Largest accepted proof file.
pub const MAX_PROOF_BYTES: usize = 20 * 1024 * 1024;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Store `data` under `key` and return the reference to record on the activity.
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<String, AppError>;
    async fn delete(&self, key: &str) -> Result<(), AppError>;
}

pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let base_path = base_path.into();
        if !base_path.exists() {
            fs::create_dir_all(&base_path).await?;
        }
        Ok(Self { base_path })
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, AppError> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Invalid storage key: {}",
                key
            )));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<String, AppError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, data).await?;
        Ok(key.to_string())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let path = self.resolve(key)?;
        if path.exists() {
            fs::remove_file(path).await?;
        }
        Ok(())
    }
}

/// Key for a proof file: `proofs/<account>/<uuid>-<filename>`.
pub fn proof_key(account_id: Uuid, filename: Option<&str>) -> String {
    let name = filename.map(sanitize_filename).unwrap_or_default();
    let name = if name.is_empty() {
        "proof".to_string()
    } else {
        name
    };
    format!("proofs/{}/{}-{}", account_id, Uuid::new_v4(), name)
}

fn sanitize_filename(raw: &str) -> String {
    // Browsers on Windows may send a full path
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    base.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_start_matches('.')
        .chars()
        .take(128)
        .collect()
}
