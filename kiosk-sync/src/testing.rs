//! In-process fake of the remote store for unit tests

use async_trait::async_trait;
use parking_lot::Mutex;
use shared::{AuditEntry, SettingsRecord, Snapshot};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::remote::{AuditRemote, BackupRemote, RemoteError, RemoteResult, SettingsRemote};
use crate::store::RedbStore;

pub(crate) fn memory_store() -> Arc<RedbStore> {
    Arc::new(RedbStore::open_in_memory().unwrap())
}

#[derive(Default)]
pub(crate) struct FakeRemote {
    offline: AtomicBool,
    delay: Mutex<Option<Duration>>,
    rejected_ids: Mutex<HashSet<String>>,
    pub audit: Mutex<Vec<AuditEntry>>,
    pub audit_calls: AtomicUsize,
    pub settings: Mutex<Option<SettingsRecord>>,
    pub settings_writes: AtomicUsize,
    pub backups: Mutex<Vec<Snapshot>>,
}

impl FakeRemote {
    pub fn online() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn offline() -> Arc<Self> {
        let remote = Self::default();
        remote.offline.store(true, Ordering::SeqCst);
        Arc::new(remote)
    }

    pub fn set_online(&self, online: bool) {
        self.offline.store(!online, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Reject this entry id with a 422 until told otherwise
    pub fn reject(&self, id: &str) {
        self.rejected_ids.lock().insert(id.to_string());
    }

    pub fn delivered_payloads(&self) -> Vec<serde_json::Value> {
        self.audit.lock().iter().map(|e| e.payload.clone()).collect()
    }

    async fn call(&self) -> RemoteResult<()> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Network("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AuditRemote for FakeRemote {
    async fn append(&self, entry: &AuditEntry) -> RemoteResult<()> {
        self.audit_calls.fetch_add(1, Ordering::SeqCst);
        self.call().await?;
        if self.rejected_ids.lock().contains(&entry.id) {
            return Err(RemoteError::Rejected {
                status: 422,
                message: "malformed entry".to_string(),
            });
        }
        self.audit.lock().push(entry.clone());
        Ok(())
    }
}

#[async_trait]
impl SettingsRemote for FakeRemote {
    async fn fetch(&self) -> RemoteResult<Option<SettingsRecord>> {
        self.call().await?;
        Ok(self.settings.lock().clone())
    }

    async fn replace(&self, record: &SettingsRecord) -> RemoteResult<()> {
        self.call().await?;
        self.settings_writes.fetch_add(1, Ordering::SeqCst);
        *self.settings.lock() = Some(record.clone());
        Ok(())
    }
}

#[async_trait]
impl BackupRemote for FakeRemote {
    async fn push(&self, snapshot: &Snapshot) -> RemoteResult<()> {
        self.call().await?;
        self.backups.lock().push(snapshot.clone());
        Ok(())
    }
}
