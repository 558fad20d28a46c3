//! redb-backed local store
//!
//! # Durability
//!
//! redb commits are persistent as soon as `commit()` returns (copy-on-write
//! with an atomic pointer swap), so a kiosk that loses power mid-shift comes
//! back with every acknowledged write.

use parking_lot::Mutex;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;
use std::sync::Arc;

use super::{DEFAULT_CAPACITY_BYTES, LocalStore, StoreError, StoreResult};

/// Single table: key = namespaced key, value = serialized record
const KV_TABLE: TableDefinition<&str, &str> = TableDefinition::new("kv");

/// Local store backed by redb
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
    capacity: usize,
    /// Bytes of keys + values, counted once at open and kept current by
    /// every write. Held for the whole write so the count matches the table.
    used: Arc<Mutex<usize>>,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create the database at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> StoreResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StoreResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(KV_TABLE)?;
        }
        write_txn.commit()?;

        let used = Self::scan_used(&db)?;
        Ok(Self {
            db: Arc::new(db),
            capacity: DEFAULT_CAPACITY_BYTES,
            used: Arc::new(Mutex::new(used)),
        })
    }

    fn scan_used(db: &Database) -> StoreResult<usize> {
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(KV_TABLE)?;
        let mut total = 0;
        for result in table.iter()? {
            let (key, value) = result?;
            total += key.value().len() + value.value().len();
        }
        Ok(total)
    }

    /// Override the capacity ceiling
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Bytes currently used by keys and values
    pub fn used_bytes(&self) -> usize {
        *self.used.lock()
    }

    fn try_get(&self, key: &str) -> StoreResult<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(KV_TABLE)?;
        Ok(table.get(key)?.map(|guard| guard.value().to_string()))
    }

    fn try_keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(KV_TABLE)?;
        let mut keys = Vec::new();
        for result in table.range(prefix..)? {
            let (key, _value) = result?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            keys.push(key.to_string());
        }
        Ok(keys)
    }
}

impl LocalStore for RedbStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.try_get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(key, error = %e, "Local store read failed");
                None
            }
        }
    }

    fn put(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut used = self.used.lock();
        let txn = self.db.begin_write()?;
        let needed = {
            let mut table = txn.open_table(KV_TABLE)?;

            let replaced = table
                .get(key)?
                .map_or(0, |old| key.len() + old.value().len());
            let needed = used.saturating_sub(replaced) + key.len() + value.len();
            if needed > self.capacity {
                drop(table);
                txn.abort()?;
                return Err(StoreError::CapacityExceeded {
                    needed,
                    capacity: self.capacity,
                });
            }

            table.insert(key, value)?;
            needed
        };
        txn.commit()?;
        *used = needed;
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let mut used = self.used.lock();
        let txn = self.db.begin_write()?;
        let freed = {
            let mut table = txn.open_table(KV_TABLE)?;
            table
                .remove(key)?
                .map_or(0, |old| key.len() + old.value().len())
        };
        txn.commit()?;
        *used = used.saturating_sub(freed);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.try_keys_with_prefix(prefix).unwrap_or_else(|e| {
            tracing::error!(prefix, error = %e, "Local store scan failed");
            Vec::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_remove() {
        let store = RedbStore::open_in_memory().unwrap();

        assert_eq!(store.get("settings.station_name"), None);
        store.put("settings.station_name", "\"Line 1\"").unwrap();
        assert_eq!(
            store.get("settings.station_name").as_deref(),
            Some("\"Line 1\"")
        );

        store.remove("settings.station_name").unwrap();
        assert_eq!(store.get("settings.station_name"), None);
    }

    #[test]
    fn test_keys_with_prefix() {
        let store = RedbStore::open_in_memory().unwrap();
        store.put("audit.log", "[]").unwrap();
        store.put("settings.b", "1").unwrap();
        store.put("settings.a", "2").unwrap();
        store.put("sync", "x").unwrap();

        assert_eq!(
            store.keys_with_prefix("settings."),
            vec!["settings.a".to_string(), "settings.b".to_string()]
        );
    }

    #[test]
    fn test_capacity_ceiling_keeps_previous_value() {
        let store = RedbStore::open_in_memory().unwrap().with_capacity(64);

        store.put("audit.log", "short").unwrap();
        let err = store.put("audit.log", &"x".repeat(100)).unwrap_err();
        assert!(matches!(err, StoreError::CapacityExceeded { capacity: 64, .. }));

        // Failed write must not clobber what was there
        assert_eq!(store.get("audit.log").as_deref(), Some("short"));
        assert_eq!(store.used_bytes(), "audit.log".len() + "short".len());
    }

    #[test]
    fn test_replacing_value_does_not_double_count() {
        let store = RedbStore::open_in_memory().unwrap().with_capacity(40);
        let value = "y".repeat(25);

        store.put("k", &value).unwrap();
        store.put("k", &value).unwrap();
    }

    #[test]
    fn test_used_bytes_tracks_writes() {
        let store = RedbStore::open_in_memory().unwrap();

        store.put("audit.log", "[1,2,3]").unwrap();
        store.put("settings.a", "true").unwrap();
        store.put("audit.log", "[1]").unwrap();
        store.remove("settings.a").unwrap();
        store.remove("settings.missing").unwrap();

        assert_eq!(store.used_bytes(), "audit.log".len() + "[1]".len());
        assert_eq!(RedbStore::scan_used(&store.db).unwrap(), store.used_bytes());
    }

    #[test]
    fn test_reopen_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kiosk.redb");

        {
            let store = RedbStore::open(&path).unwrap();
            store.put("mru.operators", "[\"ana\"]").unwrap();
        }

        let store = RedbStore::open(&path).unwrap();
        assert_eq!(store.get("mru.operators").as_deref(), Some("[\"ana\"]"));
        assert_eq!(store.used_bytes(), "mru.operators".len() + "[\"ana\"]".len());
    }
}
