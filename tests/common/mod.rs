// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, bail};
use tally::application::LedgerService;
use tally::storage::{MemoryStore, SqliteStore, Store};
use tempfile::TempDir;

/// Helper to create a test service with a temporary SQLite database
pub async fn test_service() -> Result<(LedgerService<SqliteStore>, TempDir)> {
    let temp_dir = TempDir::new()?;
    let store = SqliteStore::open(&db_path(&temp_dir)).await?;
    let service = LedgerService::open(store).await?;
    Ok((service, temp_dir))
}

/// Reopen the SQLite database of a previous `test_service`.
pub async fn reopen(temp_dir: &TempDir) -> Result<LedgerService<SqliteStore>> {
    let store = SqliteStore::open(&db_path(temp_dir)).await?;
    Ok(LedgerService::open(store).await?)
}

pub fn db_path(temp_dir: &TempDir) -> String {
    temp_dir.path().join("test.db").to_str().unwrap().to_string()
}

/// Store whose reads and writes can be made to fail on demand.
#[derive(Clone, Default)]
pub struct FlakyStore {
    inner: Arc<MemoryStore>,
    fail_saves: Arc<AtomicBool>,
    fail_loads: Arc<AtomicBool>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(key: &str, payload: &str) -> Self {
        Self {
            inner: Arc::new(MemoryStore::with_value(key, payload)),
            ..Self::default()
        }
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn stored(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }
}

impl Store for FlakyStore {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        if self.fail_loads.load(Ordering::SeqCst) {
            bail!("disk unavailable");
        }
        self.inner.load(key).await
    }

    async fn save(&self, key: &str, payload: &str) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            bail!("disk full");
        }
        self.inner.save(key, payload).await
    }
}
