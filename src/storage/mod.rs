mod file;
mod memory;
mod sqlite;
mod store;

pub use file::*;
pub use memory::*;
pub use sqlite::*;
pub use store::*;

/// SQL migration for the key/value table
pub const MIGRATION_001_KEY_VALUES: &str = include_str!("migrations/001_key_values.sql");
