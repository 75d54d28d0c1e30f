use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use anyhow::Result;

use super::Store;

/// Process-local store, useful for embedding the ledger without a disk.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `payload` already stored under `key`.
    pub fn with_value(key: impl Into<String>, payload: impl Into<String>) -> Self {
        let store = Self::new();
        store.put(key.into(), payload.into());
        store
    }

    /// Current payload for `key`, without going through the async interface.
    pub fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn put(&self, key: String, payload: String) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, payload);
    }
}

impl Store for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get(key))
    }

    async fn save(&self, key: &str, payload: &str) -> Result<()> {
        self.put(key.to_string(), payload.to_string());
        Ok(())
    }
}
