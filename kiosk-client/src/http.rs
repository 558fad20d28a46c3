//! HTTP client for the remote store API

use crate::{ClientConfig, ClientError, ClientResult};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use shared::{ApiResponse, AuditEntry, SettingsRecord, Snapshot};
use std::time::Duration;

/// HTTP client for making requests to the remote store
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    health_timeout: Duration,
}

impl HttpClient {
    /// Create a new HTTP client from configuration
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            token: config.token.clone(),
            health_timeout: Duration::from_millis(config.health_timeout_ms),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<ApiResponse<T>> {
        let request = self.authorize(self.client.get(self.url(path)));
        let response = request.send().await.map_err(map_send_error)?;
        Self::handle_response(response).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<ApiResponse<T>> {
        let request = self.authorize(self.client.post(self.url(path)).json(body));
        let response = request.send().await.map_err(map_send_error)?;
        Self::handle_response(response).await
    }

    /// Handle the HTTP response
    ///
    /// Non-2xx statuses and envelopes with a non-success code both become errors.
    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> ClientResult<ApiResponse<T>> {
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return match status {
                StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized),
                StatusCode::NOT_FOUND => Err(ClientError::NotFound(text)),
                _ => Err(ClientError::Rejected {
                    status: status.as_u16(),
                    message: text,
                }),
            };
        }

        let body = response.bytes().await.map_err(map_send_error)?;
        let envelope: ApiResponse<T> = serde_json::from_slice(&body)
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

        if !envelope.is_success() {
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                message: format!("{}: {}", envelope.code, envelope.message),
            });
        }

        Ok(envelope)
    }

    // ========== Audit API ==========

    /// Append one audit entry. No batch mode.
    pub async fn append_audit(&self, entry: &AuditEntry) -> ClientResult<()> {
        self.post::<serde_json::Value, _>("/api/audit", entry).await?;
        tracing::trace!(entry_id = %entry.id, "Audit entry appended remotely");
        Ok(())
    }

    // ========== Settings API ==========

    /// Fetch the last-known settings record.
    ///
    /// Returns `None` when the backend has never stored one for this device.
    pub async fn fetch_settings(&self) -> ClientResult<Option<SettingsRecord>> {
        match self.get::<SettingsRecord>("/api/settings").await {
            Ok(envelope) => Ok(envelope.data),
            Err(ClientError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Replace the remote settings record wholesale
    pub async fn replace_settings(&self, record: &SettingsRecord) -> ClientResult<()> {
        self.post::<serde_json::Value, _>("/api/settings", record)
            .await?;
        Ok(())
    }

    // ========== Backup API ==========

    /// Overwrite the remote snapshot
    pub async fn push_backup(&self, snapshot: &Snapshot) -> ClientResult<()> {
        self.post::<serde_json::Value, _>("/api/backup", snapshot)
            .await?;
        Ok(())
    }

    // ========== Health ==========

    /// Probe backend reachability with the short health budget
    pub async fn health(&self) -> ClientResult<()> {
        let request = self
            .authorize(self.client.get(self.url("/api/health")))
            .timeout(self.health_timeout);
        let response = request.send().await.map_err(map_send_error)?;
        Self::handle_response::<serde_json::Value>(response).await?;
        Ok(())
    }
}

fn map_send_error(e: reqwest::Error) -> ClientError {
    if e.is_timeout() {
        ClientError::Timeout
    } else {
        ClientError::Http(e)
    }
}
