//! Audit entry types
//!
//! One entry per operator action. Entries are immutable once created; the
//! event log owns them and the retry queue only holds copies.

use serde::{Deserialize, Serialize};

/// Audit event type (closed enum, never free text)
///
/// Grouped by domain so every operator-visible action has an explicit tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    // ═══ Lifecycle ═══
    /// Kiosk application started
    AppStarted,
    /// Kiosk application stopped normally
    AppStopped,

    // ═══ Operator ═══
    OperatorLogin,
    OperatorLogout,
    /// Operator switched without a full logout
    OperatorChanged,

    // ═══ Label workflow ═══
    ProductSelected,
    ProductCleared,
    WeightCaptured,
    /// Weight typed in by hand instead of read from the scale
    WeightManualEntry,
    TareSet,
    ScaleZeroed,
    ScaleError,
    LabelPrinted,
    LabelReprinted,
    PrintFailed,
    WorkflowCancelled,

    // ═══ Packages and boxes ═══
    PackageRecorded,
    PackageVoided,
    BoxOpened,
    BoxClosed,
    BoxReopened,

    // ═══ Scanner ═══
    ScanReceived,
    ScanRejected,

    // ═══ Configuration ═══
    SettingsChanged,
    SettingsReset,

    // ═══ Reports ═══
    ReportGenerated,
    ReportEmailed,

    // ═══ Durability ═══
    BackupRestored,
    AuditLogCleared,
    /// Remote delivery resumed after an outage
    SyncRecovered,
}

impl EventType {
    /// Emitted by the kiosk itself rather than by an operator action
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::AppStarted | Self::AppStopped | Self::AuditLogCleared | Self::SyncRecovered
        )
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Audit entry (immutable)
///
/// Serialized as `{ id, timestamp, eventType, payload }`. The `id` identifies
/// the entry while it waits in the retry queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// UUID v4
    pub id: String,
    /// ISO-8601 timestamp (UTC, millisecond precision)
    pub timestamp: String,
    pub event_type: EventType,
    /// Structured key/value record specific to the event type
    pub payload: serde_json::Value,
}

impl AuditEntry {
    /// Create a new entry stamped with the current time
    pub fn new(event_type: EventType, payload: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: crate::util::now_iso8601(),
            event_type,
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_wire_format() {
        let entry = AuditEntry::new(
            EventType::LabelPrinted,
            serde_json::json!({ "barcode": "01234567890123" }),
        );
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["eventType"], "label_printed");
        assert_eq!(json["payload"]["barcode"], "01234567890123");
        assert!(json["timestamp"].as_str().unwrap().ends_with('Z'));
        assert_eq!(json["id"].as_str().unwrap().len(), 36);
    }

    #[test]
    fn test_entries_get_distinct_ids() {
        let a = AuditEntry::new(EventType::AppStarted, serde_json::Value::Null);
        let b = AuditEntry::new(EventType::AppStarted, serde_json::Value::Null);
        assert_ne!(a.id, b.id);
    }
}
