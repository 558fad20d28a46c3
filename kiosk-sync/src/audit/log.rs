//! Event log: local-first audit trail with remote delivery
//!
//! Every `log_event` call goes through these steps:
//!
//! 1. Append to the local audit log synchronously, evicting the oldest entry
//!    past the cap. Always happens, whatever the network does.
//! 2. A background task calls the remote append (5s timeout).
//! 3. On success, drain the retry queue in order unless a drain is in flight.
//! 4. On failure, queue the entry (cap 200, oldest evicted) and mark the log
//!    as unsynced.
//!
//! Remote delivery is head-of-line: nothing behind the queue head is sent
//! until the head is delivered or dead-lettered.

use parking_lot::Mutex;
use serde::Serialize;
use shared::{AuditEntry, EventType};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::queue::{QueuedEntry, RetryQueue, push_bounded, trim_front};
use crate::remote::{AuditRemote, with_timeout};
use crate::store::{
    AUDIT_LOG_KEY, DEAD_LETTER_KEY, LocalStore, RETRY_QUEUE_KEY, load_json, save_json,
};

/// Event log limits and budgets
#[derive(Debug, Clone)]
pub struct EventLogConfig {
    /// Local audit log cap (oldest evicted first)
    pub max_local_entries: usize,
    /// Retry queue cap (oldest evicted first)
    pub retry_queue_cap: usize,
    /// Dead-letter list cap (oldest evicted first)
    pub dead_letter_cap: usize,
    /// Rejections of the queue head before it is dead-lettered
    pub max_delivery_attempts: u32,
    /// Budget for a single remote append
    pub delivery_timeout: Duration,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            max_local_entries: 5_000,
            retry_queue_cap: 200,
            dead_letter_cap: 200,
            max_delivery_attempts: 5,
            delivery_timeout: Duration::from_secs(5),
        }
    }
}

/// Sync indicator surfaced to the interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    /// Retry queue is empty and the last delivery succeeded
    pub synced: bool,
    /// Last local write succeeded
    pub local_persisted: bool,
    /// Entries waiting in the retry queue
    pub pending: usize,
    /// Entries parked after repeated rejections
    pub dead_lettered: usize,
}

/// Result of one drain pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub delivered: usize,
    pub dead_lettered: usize,
    pub remaining: usize,
    /// Drain stopped on a failure with entries still queued
    pub stopped_on_failure: bool,
}

struct LogState {
    local: VecDeque<AuditEntry>,
    queue: RetryQueue,
    dead: VecDeque<QueuedEntry>,
    synced: bool,
    local_persisted: bool,
}

impl LogState {
    fn status(&self) -> SyncStatus {
        SyncStatus {
            synced: self.synced,
            local_persisted: self.local_persisted,
            pending: self.queue.len(),
            dead_lettered: self.dead.len(),
        }
    }
}

/// Single-drain-in-flight guard, released on drop
struct DrainGuard<'a>(&'a AtomicBool);

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct Inner {
    store: Arc<dyn LocalStore>,
    remote: Arc<dyn AuditRemote>,
    config: EventLogConfig,
    state: Mutex<LogState>,
    draining: AtomicBool,
    status_tx: watch::Sender<SyncStatus>,
}

/// Durable, ordered record of operator actions
///
/// Cheap to clone; all clones share the same log.
#[derive(Clone)]
pub struct EventLog {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl EventLog {
    /// Open the log, restoring the local log, retry queue and dead letters
    /// from the local store. Corrupt records load as empty.
    pub fn open(
        store: Arc<dyn LocalStore>,
        remote: Arc<dyn AuditRemote>,
        config: EventLogConfig,
    ) -> Self {
        let mut local: VecDeque<AuditEntry> = load_json(store.as_ref(), AUDIT_LOG_KEY);
        trim_front(&mut local, config.max_local_entries);
        let queue = RetryQueue::from_items(
            load_json(store.as_ref(), RETRY_QUEUE_KEY),
            config.retry_queue_cap,
        );
        let mut dead: VecDeque<QueuedEntry> = load_json(store.as_ref(), DEAD_LETTER_KEY);
        trim_front(&mut dead, config.dead_letter_cap);

        let state = LogState {
            synced: queue.is_empty(),
            local_persisted: true,
            local,
            queue,
            dead,
        };
        tracing::info!(
            local = state.local.len(),
            pending = state.queue.len(),
            dead_lettered = state.dead.len(),
            "Event log opened"
        );

        let (status_tx, _) = watch::channel(state.status());
        Self {
            inner: Arc::new(Inner {
                store,
                remote,
                config,
                state: Mutex::new(state),
                draining: AtomicBool::new(false),
                status_tx,
            }),
        }
    }

    /// Record an operator action.
    ///
    /// The local append happens before this returns; remote delivery runs in
    /// a spawned task whose handle is returned. Dropping the handle does not
    /// cancel delivery. Must be called within a Tokio runtime.
    pub fn log_event(&self, event_type: EventType, payload: serde_json::Value) -> JoinHandle<()> {
        self.inner.log_event(event_type, payload)
    }

    /// Attempt to deliver the retry queue in order.
    ///
    /// Returns `None` when another drain is already in flight.
    pub async fn drain(&self) -> Option<DrainReport> {
        self.inner.drain().await
    }

    /// Erase the local audit log and the retry queue.
    ///
    /// Queued entries are dropped too, so cleared events never reach the
    /// backend later. The clear itself is recorded as a new entry.
    pub fn clear(&self) -> JoinHandle<()> {
        let (cleared_local, cleared_pending) = {
            let mut state = self.inner.state.lock();
            let cleared_local = state.local.len();
            state.local.clear();
            let cleared_pending = state.queue.clear();
            state.synced = true;
            self.inner.persist_local(&mut state);
            self.inner.persist_queue(&mut state);
            self.inner.publish(&state);
            (cleared_local, cleared_pending)
        };
        tracing::info!(cleared_local, cleared_pending, "Audit log cleared");

        self.log_event(
            EventType::AuditLogCleared,
            serde_json::json!({
                "cleared_local": cleared_local,
                "cleared_pending": cleared_pending,
            }),
        )
    }

    /// Move every dead-lettered entry back to the head of the retry queue
    pub fn requeue_dead_letters(&self) -> usize {
        let mut state = self.inner.state.lock();
        let dead: Vec<QueuedEntry> = state
            .dead
            .drain(..)
            .map(|q| QueuedEntry::new(q.entry))
            .collect();
        let count = dead.len();
        if count == 0 {
            return 0;
        }

        let evicted = state.queue.push_front_all(dead.into_iter());
        if evicted > 0 {
            tracing::warn!(evicted, "Retry queue overflow while requeueing dead letters");
        }
        state.synced = false;
        self.inner.persist_queue(&mut state);
        self.inner.persist_dead(&mut state);
        self.inner.publish(&state);
        tracing::info!(count, "Dead-lettered audit entries requeued");
        count
    }

    /// Local audit log, oldest first
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.inner.state.lock().local.iter().cloned().collect()
    }

    /// Entries awaiting delivery, in delivery order
    pub fn pending(&self) -> Vec<AuditEntry> {
        let state = self.inner.state.lock();
        state.queue.items().iter().map(|q| q.entry.clone()).collect()
    }

    pub fn dead_letters(&self) -> Vec<QueuedEntry> {
        self.inner.state.lock().dead.iter().cloned().collect()
    }

    pub fn status(&self) -> SyncStatus {
        self.inner.state.lock().status()
    }

    /// Watch the sync indicator
    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.inner.status_tx.subscribe()
    }
}

impl Inner {
    fn log_event(
        self: &Arc<Self>,
        event_type: EventType,
        payload: serde_json::Value,
    ) -> JoinHandle<()> {
        let entry = AuditEntry::new(event_type, payload);
        self.append_local(&entry);

        let inner = Arc::clone(self);
        tokio::spawn(async move { inner.deliver(entry).await })
    }

    fn append_local(&self, entry: &AuditEntry) {
        let mut state = self.state.lock();
        let evicted = push_bounded(&mut state.local, entry.clone(), self.config.max_local_entries);
        if evicted > 0 {
            tracing::trace!(evicted, "Local audit log at capacity, evicted oldest");
        }
        self.persist_local(&mut state);
        self.publish(&state);
    }

    async fn deliver(self: Arc<Self>, entry: AuditEntry) {
        let result = with_timeout(self.config.delivery_timeout, self.remote.append(&entry)).await;

        match result {
            Ok(()) => {
                tracing::debug!(entry_id = %entry.id, event_type = %entry.event_type, "Audit entry delivered");
                let queue_empty = self.state.lock().queue.is_empty();
                if queue_empty {
                    self.mark_synced();
                } else {
                    // A drain already in flight will pick the queue up
                    let _ = self.drain().await;
                }
            }
            Err(e) => {
                tracing::warn!(
                    entry_id = %entry.id,
                    event_type = %entry.event_type,
                    error = %e,
                    "Audit delivery failed, queued for retry"
                );
                self.enqueue(entry);
            }
        }
    }

    fn enqueue(&self, entry: AuditEntry) {
        let mut state = self.state.lock();
        let evicted = state.queue.push(QueuedEntry::new(entry));
        if evicted > 0 {
            tracing::warn!(evicted, "Retry queue full, oldest undelivered entries dropped");
        }
        state.synced = false;
        self.persist_queue(&mut state);
        self.publish(&state);
    }

    fn mark_synced(&self) {
        let mut state = self.state.lock();
        if state.queue.is_empty() && !state.synced {
            state.synced = true;
            self.publish(&state);
        }
    }

    async fn drain(self: &Arc<Self>) -> Option<DrainReport> {
        let guard = DrainGuard::acquire(&self.draining)?;
        let mut report = DrainReport::default();
        let was_synced = self.state.lock().synced;

        loop {
            let head = self.state.lock().queue.front().cloned();
            let Some(head) = head else {
                break;
            };
            let id = head.entry.id.as_str();

            match with_timeout(self.config.delivery_timeout, self.remote.append(&head.entry)).await
            {
                Ok(()) => {
                    let mut state = self.state.lock();
                    if state.queue.pop_front_if(id).is_some() {
                        report.delivered += 1;
                        self.persist_queue(&mut state);
                        self.publish(&state);
                    }
                }
                Err(e) if e.is_rejection() => {
                    let mut state = self.state.lock();
                    let attempts = state.queue.record_rejection(id).unwrap_or(0);
                    if attempts >= self.config.max_delivery_attempts {
                        if let Some(parked) = state.queue.pop_front_if(id) {
                            tracing::error!(
                                entry_id = %id,
                                attempts,
                                error = %e,
                                "Audit entry repeatedly rejected, moved to dead letter"
                            );
                            push_bounded(&mut state.dead, parked, self.config.dead_letter_cap);
                            report.dead_lettered += 1;
                            self.persist_dead(&mut state);
                        }
                        self.persist_queue(&mut state);
                        self.publish(&state);
                        continue;
                    }
                    tracing::warn!(entry_id = %id, attempts, error = %e, "Queue head rejected");
                    state.synced = false;
                    self.persist_queue(&mut state);
                    self.publish(&state);
                    report.stopped_on_failure = true;
                    break;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Drain stopped, backend unreachable");
                    let mut state = self.state.lock();
                    state.synced = false;
                    self.publish(&state);
                    report.stopped_on_failure = true;
                    break;
                }
            }
        }

        {
            let mut state = self.state.lock();
            report.remaining = state.queue.len();
            if state.queue.is_empty() {
                state.synced = true;
                self.publish(&state);
            }
        }

        if report.delivered > 0 || report.dead_lettered > 0 {
            tracing::info!(
                delivered = report.delivered,
                dead_lettered = report.dead_lettered,
                remaining = report.remaining,
                "Retry queue drained"
            );
        }
        if !was_synced && report.remaining == 0 && report.delivered > 0 {
            drop(guard);
            self.log_event(
                EventType::SyncRecovered,
                serde_json::json!({ "delivered": report.delivered }),
            );
        }

        Some(report)
    }

    fn persist_local(&self, state: &mut LogState) {
        let result = save_json(self.store.as_ref(), AUDIT_LOG_KEY, &state.local);
        self.record_persist(state, AUDIT_LOG_KEY, result);
    }

    fn persist_queue(&self, state: &mut LogState) {
        let result = save_json(self.store.as_ref(), RETRY_QUEUE_KEY, state.queue.items());
        self.record_persist(state, RETRY_QUEUE_KEY, result);
    }

    fn persist_dead(&self, state: &mut LogState) {
        let result = save_json(self.store.as_ref(), DEAD_LETTER_KEY, &state.dead);
        self.record_persist(state, DEAD_LETTER_KEY, result);
    }

    fn record_persist(
        &self,
        state: &mut LogState,
        key: &str,
        result: crate::store::StoreResult<()>,
    ) {
        match result {
            Ok(()) => state.local_persisted = true,
            Err(e) => {
                tracing::error!(key, error = %e, "Local audit write failed, entry held in memory only");
                state.local_persisted = false;
            }
        }
    }

    fn publish(&self, state: &LogState) {
        self.status_tx.send_replace(state.status());
    }
}
