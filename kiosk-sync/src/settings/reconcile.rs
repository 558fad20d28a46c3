//! Two-tier settings store: local is authoritative, remote only fills gaps

use parking_lot::Mutex;
use shared::{SettingValue, SettingsRecord};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

use super::keys::SettingKey;
use crate::remote::{SettingsRemote, with_timeout};
use crate::store::{LocalStore, MRU_OPERATORS_KEY, MRU_RECIPIENTS_KEY, load_json, save_json};

/// Most-recently-used list length
pub const MRU_CAP: usize = 10;

/// What a gap-fill pass would adopt from the remote record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GapFill {
    pub values: Vec<(SettingKey, SettingValue)>,
    pub recent_operators: Option<Vec<String>>,
    pub recent_recipients: Option<Vec<String>>,
}

impl GapFill {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
            && self.recent_operators.is_none()
            && self.recent_recipients.is_none()
    }
}

/// Precedence rule for reconciliation.
///
/// A remote value is adopted only for a known key the local record lacks.
/// A key with any local value keeps it, whatever the remote holds. MRU lists
/// follow the same rule: the remote list is adopted only when the local one
/// is empty. Unknown remote keys are ignored.
pub fn gap_fill(local: &SettingsRecord, remote: &SettingsRecord) -> GapFill {
    let values = SettingKey::ALL
        .into_iter()
        .filter(|key| !local.values.contains_key(key.as_str()))
        .filter_map(|key| {
            remote
                .values
                .get(key.as_str())
                .map(|value| (key, value.clone()))
        })
        .collect();

    GapFill {
        values,
        recent_operators: adopt(&local.recent_operators, &remote.recent_operators),
        recent_recipients: adopt(&local.recent_recipients, &remote.recent_recipients),
    }
}

fn adopt(local: &[String], remote: &[String]) -> Option<Vec<String>> {
    (local.is_empty() && !remote.is_empty()).then(|| remote.to_vec())
}

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    /// Remote answered (with or without a record)
    pub remote_reachable: bool,
    /// Keys adopted from the remote record
    pub adopted: Vec<SettingKey>,
}

/// Settings store composed of a local and a remote tier
///
/// Reads never touch the network. Every write lands locally first, then the
/// full record is pushed to the remote store, fire-and-forget.
///
/// Until one reconciliation has reached the remote store, the device
/// identity is held in memory only and every push first retries the
/// reconciliation. A wiped device that boots offline therefore still adopts
/// its remote identity later, and never overwrites the remote record with
/// a record that has not been gap-filled.
#[derive(Clone)]
pub struct ReconcilingStore {
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn SettingsRemote>,
    push_timeout: Duration,
    reconciled: Arc<AtomicBool>,
    provisional_id: Arc<Mutex<Option<String>>>,
}

impl std::fmt::Debug for ReconcilingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcilingStore")
            .field("push_timeout", &self.push_timeout)
            .finish_non_exhaustive()
    }
}

impl ReconcilingStore {
    pub fn new(local: Arc<dyn LocalStore>, remote: Arc<dyn SettingsRemote>) -> Self {
        Self {
            local,
            remote,
            push_timeout: Duration::from_secs(5),
            reconciled: Arc::new(AtomicBool::new(false)),
            provisional_id: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_push_timeout(mut self, timeout: Duration) -> Self {
        self.push_timeout = timeout;
        self
    }

    // ========== Reads ==========

    /// Raw local value, if one is stored and readable
    pub fn local_value(&self, key: SettingKey) -> Option<SettingValue> {
        let raw = self.local.get(&key.storage_key())?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Corrupt setting, using default");
                None
            }
        }
    }

    /// Local value or the compiled-in default
    pub fn get(&self, key: SettingKey) -> SettingValue {
        self.local_value(key)
            .unwrap_or_else(|| key.default_value())
    }

    pub fn get_bool(&self, key: SettingKey) -> bool {
        let coerced = match self.get(key) {
            SettingValue::Bool(b) => Some(b),
            SettingValue::Text(s) => s.trim().parse().ok(),
            SettingValue::Number(_) => None,
        };
        coerced
            .or_else(|| key.default_value().as_bool())
            .unwrap_or(false)
    }

    pub fn get_number(&self, key: SettingKey) -> f64 {
        let coerced = match self.get(key) {
            SettingValue::Number(n) if n.is_finite() => Some(n),
            SettingValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        };
        coerced
            .or_else(|| key.default_value().as_number())
            .unwrap_or(0.0)
    }

    pub fn get_text(&self, key: SettingKey) -> String {
        match self.get(key) {
            SettingValue::Text(s) => s,
            SettingValue::Number(n) => n.to_string(),
            SettingValue::Bool(b) => b.to_string(),
        }
    }

    /// Persisted device identity, if one has been assigned
    pub fn device_id(&self) -> Option<String> {
        self.local_value(SettingKey::DeviceId)
            .and_then(|v| v.as_text().map(str::to_string))
            .filter(|id| !id.is_empty())
    }

    pub fn recent_operators(&self) -> Vec<String> {
        load_json(self.local.as_ref(), MRU_OPERATORS_KEY)
    }

    pub fn recent_recipients(&self) -> Vec<String> {
        load_json(self.local.as_ref(), MRU_RECIPIENTS_KEY)
    }

    /// Everything persisted locally: stored keys plus the MRU lists
    pub fn record(&self) -> SettingsRecord {
        let values: BTreeMap<String, SettingValue> = SettingKey::ALL
            .into_iter()
            .filter_map(|key| {
                self.local_value(key)
                    .map(|value| (key.as_str().to_string(), value))
            })
            .collect();

        SettingsRecord {
            values,
            recent_operators: self.recent_operators(),
            recent_recipients: self.recent_recipients(),
        }
    }

    // ========== Writes ==========

    /// Write locally, then push the whole record to the remote store
    pub fn set(&self, key: SettingKey, value: impl Into<SettingValue>) -> JoinHandle<()> {
        self.write_local(key, &value.into());
        self.push()
    }

    /// Move `name` to the front of the recent-operator list
    pub fn remember_operator(&self, name: &str) -> JoinHandle<()> {
        self.remember(MRU_OPERATORS_KEY, name);
        self.push()
    }

    /// Move `address` to the front of the recent-recipient list
    pub fn remember_recipient(&self, address: &str) -> JoinHandle<()> {
        self.remember(MRU_RECIPIENTS_KEY, address);
        self.push()
    }

    /// Clear every persisted key except the device identity, then push the
    /// cleared state. Getters fall back to compiled-in defaults afterwards.
    pub fn reset_to_defaults(&self) -> JoinHandle<()> {
        let identity = SettingKey::DeviceId.storage_key();
        let mut cleared = 0;
        for key in SettingKey::ALL.iter().map(SettingKey::storage_key) {
            if key != identity && self.local.get(&key).is_some() {
                self.remove_local(&key);
                cleared += 1;
            }
        }
        self.remove_local(MRU_OPERATORS_KEY);
        self.remove_local(MRU_RECIPIENTS_KEY);
        tracing::info!(cleared, "Settings reset to defaults");

        self.push()
    }

    // ========== Reconciliation ==========

    /// Whether a reconciliation has reached the remote store
    pub fn is_reconciled(&self) -> bool {
        self.reconciled.load(Ordering::SeqCst)
    }

    /// Identity to report right now: the persisted one, or a provisional
    /// in-memory one while the remote store has not been consulted yet
    pub fn identity(&self) -> String {
        if let Some(id) = self.device_id() {
            return id;
        }
        self.provisional_id
            .lock()
            .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
            .clone()
    }

    /// Heal local gaps from the remote snapshot.
    ///
    /// Only keys with no local value are written. Never fails: an unreachable
    /// remote leaves the local store as it was. Once the remote store has
    /// answered, a device identity is persisted if neither tier had one.
    pub async fn reconcile(&self) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        match with_timeout(self.push_timeout, self.remote.fetch()).await {
            Ok(remote) => {
                report.remote_reachable = true;
                if let Some(remote) = remote {
                    let fill = gap_fill(&self.record(), &remote);
                    for (key, value) in &fill.values {
                        self.write_local(*key, value);
                        report.adopted.push(*key);
                    }
                    if let Some(list) = &fill.recent_operators {
                        self.write_mru(MRU_OPERATORS_KEY, list);
                    }
                    if let Some(list) = &fill.recent_recipients {
                        self.write_mru(MRU_RECIPIENTS_KEY, list);
                    }
                }
            }
            Err(e) => {
                tracing::info!(error = %e, "Remote settings unavailable, keeping local values");
            }
        }

        if report.remote_reachable {
            self.ensure_device_id();
            self.reconciled.store(true, Ordering::SeqCst);
        }
        tracing::info!(
            adopted = report.adopted.len(),
            remote_reachable = report.remote_reachable,
            "Settings reconciled"
        );
        report
    }

    /// Persist a device identity if none is stored, reusing the provisional
    /// one handed out so far
    pub fn ensure_device_id(&self) -> String {
        if let Some(id) = self.device_id() {
            return id;
        }
        let id = self
            .provisional_id
            .lock()
            .take()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        self.write_local(SettingKey::DeviceId, &SettingValue::from(id.as_str()));
        tracing::info!(device_id = %id, "Assigned new device identity");
        id
    }

    // ========== Internals ==========

    fn write_local(&self, key: SettingKey, value: &SettingValue) {
        if let Err(e) = save_json(self.local.as_ref(), &key.storage_key(), value) {
            tracing::error!(key = %key, error = %e, "Failed to write setting locally");
        }
    }

    fn remove_local(&self, key: &str) {
        if let Err(e) = self.local.remove(key) {
            tracing::error!(key, error = %e, "Failed to remove setting locally");
        }
    }

    fn write_mru(&self, key: &str, list: &[String]) {
        if let Err(e) = save_json(self.local.as_ref(), key, list) {
            tracing::error!(key, error = %e, "Failed to write recent list locally");
        }
    }

    fn remember(&self, key: &str, item: &str) {
        let item = item.trim();
        if item.is_empty() {
            return;
        }
        let mut list: Vec<String> = load_json(self.local.as_ref(), key);
        list.retain(|existing| existing != item);
        list.insert(0, item.to_string());
        list.truncate(MRU_CAP);
        self.write_mru(key, &list);
    }

    /// Fire-and-forget wholesale push.
    ///
    /// Yields once so the local write settles, then sends whatever the local
    /// record holds at that point. Failures are logged and dropped. An
    /// unreconciled store reconciles first and skips the push if the remote
    /// store is still unreachable.
    fn push(&self) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            if !store.is_reconciled() && !store.reconcile().await.remote_reachable {
                tracing::debug!("Settings push skipped, remote not reconciled yet");
                return;
            }
            let record = store.record();
            match with_timeout(store.push_timeout, store.remote.replace(&record)).await {
                Ok(()) => tracing::debug!(keys = record.values.len(), "Settings pushed to remote"),
                Err(e) => tracing::debug!(error = %e, "Settings push failed, will resend on next change"),
            }
        })
    }
}
