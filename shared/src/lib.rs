//! Shared types for the kiosk workspace
//!
//! Wire and data types used by both the remote client and the sync core:
//! audit entries, the settings record, backup snapshots and the response
//! envelope returned by the remote store.

pub mod audit;
pub mod response;
pub mod settings;
pub mod snapshot;
pub mod util;

// Re-exports
pub use audit::{AuditEntry, EventType};
pub use response::ApiResponse;
pub use serde::{Deserialize, Serialize};
pub use settings::{SettingValue, SettingsRecord};
pub use snapshot::Snapshot;
