//! Remote store seams
//!
//! Each lane depends only on the calls it makes, so tests can swap in a
//! fake for one lane without stubbing the others.

mod http;

use async_trait::async_trait;
use shared::{AuditEntry, SettingsRecord, Snapshot};
use thiserror::Error;

/// Remote failure, classified by what it says about the request
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// Call exceeded its time budget
    #[error("remote call timed out")]
    Timeout,

    /// Backend unreachable or unavailable; says nothing about the payload
    #[error("network error: {0}")]
    Network(String),

    /// Backend answered and refused this request
    #[error("rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl RemoteError {
    /// True for failures caused by the request itself rather than an outage
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Remote audit append endpoint
#[async_trait]
pub trait AuditRemote: Send + Sync {
    async fn append(&self, entry: &AuditEntry) -> RemoteResult<()>;
}

/// Remote settings endpoint (wholesale GET / replace)
#[async_trait]
pub trait SettingsRemote: Send + Sync {
    async fn fetch(&self) -> RemoteResult<Option<SettingsRecord>>;
    async fn replace(&self, record: &SettingsRecord) -> RemoteResult<()>;
}

/// Remote snapshot backup endpoint
#[async_trait]
pub trait BackupRemote: Send + Sync {
    async fn push(&self, snapshot: &Snapshot) -> RemoteResult<()>;
}

/// Run a remote call under an explicit time budget.
///
/// A timeout is reported like any other failure.
pub async fn with_timeout<T, F>(budget: std::time::Duration, call: F) -> RemoteResult<T>
where
    F: std::future::Future<Output = RemoteResult<T>>,
{
    match tokio::time::timeout(budget, call).await {
        Ok(result) => result,
        Err(_) => Err(RemoteError::Timeout),
    }
}
