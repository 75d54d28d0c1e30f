use std::future::Future;

use anyhow::Result;

/// Key under which the transaction ledger is stored by default.
pub const DEFAULT_STORAGE_KEY: &str = "transactions";

/// Persistence adapter: loads and saves one opaque serialized payload per key.
///
/// A `save` replaces the whole payload for the key or leaves the previous one
/// in place; implementations never expose a partially written value.
pub trait Store: Send + Sync + 'static {
    /// Return the payload stored under `key`, or `None` if it was never written.
    fn load(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Replace the payload stored under `key`.
    fn save(&self, key: &str, payload: &str) -> impl Future<Output = Result<()>> + Send;
}
