//! Remote traits over the HTTP client

use async_trait::async_trait;
use kiosk_client::{ClientError, HttpClient};
use shared::{AuditEntry, SettingsRecord, Snapshot};

use super::{AuditRemote, BackupRemote, RemoteError, RemoteResult, SettingsRemote};

/// Statuses that say the backend as a whole is refusing work right now
/// (request timeout, rate limiting). Treated like an outage.
fn is_backend_wide(status: u16) -> bool {
    matches!(status, 408 | 429)
}

impl From<ClientError> for RemoteError {
    fn from(e: ClientError) -> Self {
        if matches!(e, ClientError::Timeout) {
            return RemoteError::Timeout;
        }
        if e.is_transient() {
            return RemoteError::Network(e.to_string());
        }
        match e {
            ClientError::Rejected { status, message } if is_backend_wide(status) => {
                RemoteError::Network(format!("{status}: {message}"))
            }
            ClientError::Rejected { status, message } => RemoteError::Rejected { status, message },
            // Bad or expired credentials fail every request, not this one
            ClientError::Unauthorized => RemoteError::Network("unauthorized".to_string()),
            ClientError::NotFound(message) => RemoteError::Rejected {
                status: 404,
                message,
            },
            other => RemoteError::Network(other.to_string()),
        }
    }
}

#[async_trait]
impl AuditRemote for HttpClient {
    async fn append(&self, entry: &AuditEntry) -> RemoteResult<()> {
        Ok(self.append_audit(entry).await?)
    }
}

#[async_trait]
impl SettingsRemote for HttpClient {
    async fn fetch(&self) -> RemoteResult<Option<SettingsRecord>> {
        Ok(self.fetch_settings().await?)
    }

    async fn replace(&self, record: &SettingsRecord) -> RemoteResult<()> {
        Ok(self.replace_settings(record).await?)
    }
}

#[async_trait]
impl BackupRemote for HttpClient {
    async fn push(&self, snapshot: &Snapshot) -> RemoteResult<()> {
        Ok(self.push_backup(snapshot).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        let rejected: RemoteError = ClientError::Rejected {
            status: 422,
            message: "bad entry".to_string(),
        }
        .into();
        assert!(rejected.is_rejection());

        let unavailable: RemoteError = ClientError::Rejected {
            status: 503,
            message: "maintenance".to_string(),
        }
        .into();
        assert!(matches!(unavailable, RemoteError::Network(_)));

        let timeout: RemoteError = ClientError::Timeout.into();
        assert!(matches!(timeout, RemoteError::Timeout));
    }

    #[test]
    fn test_backend_wide_refusals_are_outages() {
        let unauthorized: RemoteError = ClientError::Unauthorized.into();
        assert!(!unauthorized.is_rejection());

        for status in [408, 429] {
            let refused: RemoteError = ClientError::Rejected {
                status,
                message: "slow down".to_string(),
            }
            .into();
            assert!(matches!(refused, RemoteError::Network(_)), "status {status}");
        }

        let not_found: RemoteError = ClientError::NotFound("no such route".to_string()).into();
        assert!(not_found.is_rejection());
    }
}
