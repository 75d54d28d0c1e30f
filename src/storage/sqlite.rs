use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use super::{MIGRATION_001_KEY_VALUES, Store};

/// Key/value store backed by a single SQLite table.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new store with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_KEY_VALUES)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Open the database file at `path`, creating and migrating it if needed.
    pub async fn open(path: &str) -> Result<Self> {
        let store = Self::connect(&format!("sqlite:{}?mode=rwc", path)).await?;
        store.migrate().await?;
        Ok(store)
    }
}

impl Store for SqliteStore {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM key_values WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to load '{}'", key))?;

        Ok(row.map(|row| row.get("value")))
    }

    async fn save(&self, key: &str, payload: &str) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO key_values (key, value, updated_at) VALUES (?, ?, ?)")
            .bind(key)
            .bind(payload)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to save '{}'", key))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    async fn temp_store() -> Result<(SqliteStore, TempDir)> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("store.db");
        let store = SqliteStore::open(db_path.to_str().unwrap()).await?;
        Ok((store, temp_dir))
    }

    #[tokio::test]
    async fn test_missing_key_loads_none() -> Result<()> {
        let (store, _temp) = temp_store().await?;
        assert_eq!(store.load("transactions").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_save_overwrites() -> Result<()> {
        let (store, _temp) = temp_store().await?;
        store.save("transactions", "[1]").await?;
        store.save("transactions", "[1,2]").await?;
        store.save("other", "x").await?;

        assert_eq!(store.load("transactions").await?.as_deref(), Some("[1,2]"));
        assert_eq!(store.load("other").await?.as_deref(), Some("x"));
        Ok(())
    }

    #[tokio::test]
    async fn test_reopen_keeps_data() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("store.db");
        let path = db_path.to_str().unwrap();

        SqliteStore::open(path).await?.save("transactions", "[]").await?;
        let reopened = SqliteStore::open(path).await?;
        assert_eq!(reopened.load("transactions").await?.as_deref(), Some("[]"));
        Ok(())
    }
}
