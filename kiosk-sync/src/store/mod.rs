//! Local persistent store
//!
//! A synchronous, namespaced key/value store. Each concern owns a key
//! prefix and stores one serialized record per key:
//!
//! | Key | Value |
//! |-----|-------|
//! | `audit.log` | `Vec<AuditEntry>` |
//! | `audit.retry_queue` | `Vec<QueuedEntry>` |
//! | `audit.dead_letter` | `Vec<QueuedEntry>` |
//! | `settings.<key>` | `SettingValue` |
//! | `mru.operators` | `Vec<String>` |
//! | `mru.recipients` | `Vec<String>` |
//!
//! The store enforces a hard capacity ceiling; callers keep within it
//! through their own eviction policies.

mod redb_store;

pub use redb_store::RedbStore;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub const AUDIT_LOG_KEY: &str = "audit.log";
pub const RETRY_QUEUE_KEY: &str = "audit.retry_queue";
pub const DEAD_LETTER_KEY: &str = "audit.dead_letter";
pub const SETTINGS_PREFIX: &str = "settings.";
pub const MRU_OPERATORS_KEY: &str = "mru.operators";
pub const MRU_RECIPIENTS_KEY: &str = "mru.recipients";

/// Default capacity ceiling (bytes of keys + values)
pub const DEFAULT_CAPACITY_BYTES: usize = 4 * 1024 * 1024;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Capacity exceeded: need {needed} bytes, ceiling is {capacity}")]
    CapacityExceeded { needed: usize, capacity: usize },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Synchronous local key/value store
pub trait LocalStore: Send + Sync {
    /// Read a raw value. Read failures are reported as a missing value.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a raw value, replacing any previous one
    fn put(&self, key: &str, value: &str) -> StoreResult<()>;

    fn remove(&self, key: &str) -> StoreResult<()>;

    /// All keys starting with `prefix`, in key order
    fn keys_with_prefix(&self, prefix: &str) -> Vec<String>;
}

/// Load a JSON record, treating missing or corrupt data as empty
pub fn load_json<T: DeserializeOwned + Default>(store: &dyn LocalStore, key: &str) -> T {
    let Some(raw) = store.get(key) else {
        return T::default();
    };
    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key, error = %e, "Corrupt record in local store, treating as empty");
            T::default()
        }
    }
}

/// Serialize and write a JSON record
pub fn save_json<T: Serialize + ?Sized>(
    store: &dyn LocalStore,
    key: &str,
    value: &T,
) -> StoreResult<()> {
    let raw = serde_json::to_string(value)?;
    store.put(key, &raw)
}
