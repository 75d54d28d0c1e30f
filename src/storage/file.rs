//! File-backed store with atomic writes.
//!
//! Every key maps to `<dir>/<key>.json`. Writes go to a temporary file in the
//! same directory which is synced and then renamed over the target, so a
//! crash leaves either the old or the new payload, never a mix.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::Store;

pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty()
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            bail!("Invalid storage key '{}'", key);
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl Store for JsonFileStore {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path).await {
            Ok(payload) => Ok(Some(payload)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    async fn save(&self, key: &str, payload: &str) -> Result<()> {
        let path = self.path_for(key)?;

        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create directory {}", self.dir.display()))?;

        // Temp file must live in the same directory for the rename to be atomic
        let temp_path = path.with_extension("json.tmp");
        let mut file = fs::File::create(&temp_path)
            .await
            .with_context(|| format!("Failed to create {}", temp_path.display()))?;
        file.write_all(payload.as_bytes())
            .await
            .context("Failed to write payload")?;
        file.sync_all().await.context("Failed to sync payload")?;
        drop(file);

        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e).with_context(|| format!("Failed to replace {}", path.display()));
        }
        Ok(())
    }
}
