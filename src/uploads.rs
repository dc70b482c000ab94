use anyhow::{Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

use crate::config::UploadConfig;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("File exceeds the {max_mb} MB upload limit")]
    TooLarge { max_mb: u64 },

    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

/// Disk-backed storage for uploaded cover images. Files land in one flat
/// directory and are served read-only under `/uploads`.
#[derive(Clone)]
pub struct UploadStore {
    dir: PathBuf,
    max_mb: u64,
}

impl UploadStore {
    #[must_use]
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            dir: PathBuf::from(&config.upload_dir),
            max_mb: config.max_upload_size_mb,
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub const fn max_bytes(&self) -> usize {
        (self.max_mb * 1024 * 1024) as usize
    }

    pub async fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create upload dir {}", self.dir.display()))?;
        Ok(())
    }

    /// Write the payload under a fresh name and hand back its public path.
    pub async fn save(
        &self,
        original_name: Option<&str>,
        data: &[u8],
    ) -> Result<String, UploadError> {
        if data.len() > self.max_bytes() {
            return Err(UploadError::TooLarge {
                max_mb: self.max_mb,
            });
        }

        let filename = unique_filename(original_name);
        let path = self.dir.join(&filename);

        fs::write(&path, data)
            .await
            .with_context(|| format!("Failed to write upload to {}", path.display()))?;

        debug!(path = %path.display(), size = data.len(), "Stored upload");

        Ok(format!("/uploads/{filename}"))
    }
}

/// `<unix-millis>-<9-digit random>` plus the original extension. The
/// extension is kept only when it is short plain ASCII, so a hostile
/// filename cannot smuggle path characters into the stored name.
fn unique_filename(original_name: Option<&str>) -> String {
    use rand::Rng;

    let millis = Utc::now().timestamp_millis();
    let suffix: u32 = rand::rng().random_range(0..1_000_000_000);

    let extension = original_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()));

    match extension {
        Some(ext) => format!("{millis}-{suffix:09}.{ext}"),
        None => format!("{millis}-{suffix:09}"),
    }
}
