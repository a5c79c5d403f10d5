use std::sync::Arc;

use crate::{config::DatabaseConfig, error};

#[cfg(feature = "sqlite")]
pub(crate) mod sqlite;

type Result<T, E = error::Database> = std::result::Result<T, E>;

/// A key-value pair as stored in a [`KvTree`]
pub(crate) type Entry = (Vec<u8>, Vec<u8>);

pub(crate) trait KeyValueDatabaseEngine: Send + Sync {
    fn open(config: &DatabaseConfig) -> Result<Self>
    where
        Self: Sized;
    fn open_tree(&self, name: &'static str) -> Result<Arc<dyn KvTree>>;
    fn flush(&self) -> Result<()>;
}

/// An ordered map from byte strings to byte strings
///
/// Every individual operation is atomic. Iteration is in ascending key order.
pub(crate) trait KvTree: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn insert(&self, key: &[u8], value: &[u8]) -> Result<()>;

    fn remove(&self, key: &[u8]) -> Result<()>;

    fn iter(&self) -> Result<Vec<Entry>>;

    /// All entries whose key starts with `prefix`
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<Entry>>;

    /// Atomically increments the big-endian `u64` stored at `key`, treating
    /// a missing value as zero, and returns the new value
    fn increment(&self, key: &[u8]) -> Result<Vec<u8>>;

    fn count(&self) -> Result<u64>;
}
