//! Kiosk Client - HTTP client for the remote store
//!
//! Provides the network calls the sync layer makes against the backend:
//! audit append, settings fetch/replace, snapshot backup and a health check.

pub mod config;
pub mod error;
pub mod http;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use http::HttpClient;

// Re-export shared types for convenience
pub use shared::{ApiResponse, AuditEntry, SettingsRecord, Snapshot};
