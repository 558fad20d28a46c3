//! Snapshot backup lane
//!
//! Whole-state overwrite backups, independent of the audit log:
//! - pushed every 15s
//! - pushed right after high-value changes (package recorded, box closed)
//!
//! The remote keeps only the latest snapshot. Failures are dropped; the next
//! periodic push carries the full state anyway.

use parking_lot::Mutex;
use shared::Snapshot;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::audit::EventLog;
use crate::remote::{BackupRemote, with_timeout};
use crate::settings::ReconcilingStore;

/// Supplies the current whole-state aggregate
pub trait SnapshotSource: Send + Sync {
    fn snapshot(&self) -> Snapshot;
}

/// Why a backup was pushed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupReason {
    Periodic,
    PackageRecorded,
    BoxClosed,
    Manual,
}

impl BackupReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Periodic => "periodic",
            Self::PackageRecorded => "package_recorded",
            Self::BoxClosed => "box_closed",
            Self::Manual => "manual",
        }
    }
}

/// Result of a single push attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupOutcome {
    Pushed,
    /// Aggregate was empty; the remote snapshot was left alone
    SkippedEmpty,
    /// Remote call failed; dropped until the next tick
    Failed,
}

/// Requests an out-of-band backup from a running [`Backupper`]
#[derive(Debug, Clone)]
pub struct BackupHandle {
    notify: Arc<Notify>,
    reason: Arc<Mutex<Option<BackupReason>>>,
}

impl BackupHandle {
    /// Ask for an immediate push.
    ///
    /// Triggers arriving before the lane wakes collapse into one push carrying
    /// the latest reason.
    pub fn trigger(&self, reason: BackupReason) {
        *self.reason.lock() = Some(reason);
        self.notify.notify_one();
    }
}

/// Periodic and on-demand snapshot pusher
pub struct Backupper {
    source: Arc<dyn SnapshotSource>,
    remote: Arc<dyn BackupRemote>,
    period: Duration,
    timeout: Duration,
    notify: Arc<Notify>,
    reason: Arc<Mutex<Option<BackupReason>>>,
}

impl Backupper {
    pub fn new(source: Arc<dyn SnapshotSource>, remote: Arc<dyn BackupRemote>) -> Self {
        Self {
            source,
            remote,
            period: Duration::from_secs(15),
            timeout: Duration::from_secs(5),
            notify: Arc::new(Notify::new()),
            reason: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn handle(&self) -> BackupHandle {
        BackupHandle {
            notify: self.notify.clone(),
            reason: self.reason.clone(),
        }
    }

    /// Push the current aggregate once. Never fails.
    pub async fn push_now(&self, reason: BackupReason) -> BackupOutcome {
        let snapshot = self.source.snapshot();
        if snapshot.is_empty() {
            tracing::debug!(reason = reason.as_str(), "Snapshot empty, skipping backup");
            return BackupOutcome::SkippedEmpty;
        }

        match with_timeout(self.timeout, self.remote.push(&snapshot)).await {
            Ok(()) => {
                tracing::debug!(
                    reason = reason.as_str(),
                    collections = snapshot.collections.len(),
                    "Snapshot backed up"
                );
                BackupOutcome::Pushed
            }
            Err(e) => {
                tracing::debug!(reason = reason.as_str(), error = %e, "Snapshot backup failed");
                BackupOutcome::Failed
            }
        }
    }

    /// Run the backup loop until `shutdown` fires
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(period_secs = self.period.as_secs(), "Snapshot backupper started");

        let mut ticker = tokio::time::interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Snapshot backupper shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.push_now(BackupReason::Periodic).await;
                }
                _ = self.notify.notified() => {
                    let reason = self.reason.lock().take().unwrap_or(BackupReason::Manual);
                    self.push_now(reason).await;
                }
            }
        }
    }
}

/// Station aggregate: audit trail, undelivered entries and settings
///
/// Empty until the audit trail holds at least one operator entry. Settings,
/// the device identity and the kiosk's own lifecycle entries exist on a
/// freshly wiped station too, so they never make a snapshot worth pushing
/// over the last good one.
#[derive(Debug, Clone)]
pub struct StationSource {
    log: EventLog,
    settings: ReconcilingStore,
}

impl StationSource {
    pub fn new(log: EventLog, settings: ReconcilingStore) -> Self {
        Self { log, settings }
    }
}

impl SnapshotSource for StationSource {
    fn snapshot(&self) -> Snapshot {
        let entries = self.log.entries();
        let pending = self.log.pending();
        let operational = entries
            .iter()
            .chain(pending.iter())
            .any(|e| !e.event_type.is_lifecycle());
        if !operational {
            return Snapshot::new(std::collections::BTreeMap::new());
        }

        let mut collections = std::collections::BTreeMap::new();
        collections.insert(
            "auditLog".to_string(),
            serde_json::to_value(entries).unwrap_or_default(),
        );
        collections.insert(
            "pendingAudit".to_string(),
            serde_json::to_value(pending).unwrap_or_default(),
        );
        collections.insert(
            "settings".to_string(),
            serde_json::to_value(self.settings.record().values).unwrap_or_default(),
        );
        Snapshot::new(collections)
    }
}
