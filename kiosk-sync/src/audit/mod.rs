//! Event (audit) log
//!
//! ```text
//! operator action
//!   └─ EventLog::log_event()
//!        ├─ local audit log (sync, bounded, persisted)
//!        └─ spawned delivery ─ ok ──→ drain retry queue (head-of-line)
//!                            └ fail ─→ retry queue (bounded, FIFO eviction)
//!
//! DrainWorker ── every 30s ──→ drain (same in-flight guard)
//! ```
//!
//! A queue head the backend keeps rejecting is parked in a dead-letter list
//! after `max_delivery_attempts`, so one malformed entry cannot stall the
//! queue forever. Timeouts and network errors never count as rejections.

mod log;
pub mod queue;
mod worker;

pub use log::{DrainReport, EventLog, EventLogConfig, SyncStatus};
pub use queue::QueuedEntry;
pub use worker::{DrainWorker, SyncWatcher};
