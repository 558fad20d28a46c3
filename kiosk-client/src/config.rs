//! Client configuration

/// Client configuration for connecting to the remote store
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server base URL (e.g., "https://backend.example.com")
    pub base_url: String,

    /// Device API token sent as a bearer token
    pub token: Option<String>,

    /// Default request timeout in milliseconds
    pub timeout_ms: u64,

    /// Timeout for the health check in milliseconds
    pub health_timeout_ms: u64,
}

impl ClientConfig {
    /// Create a new client configuration
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            timeout_ms: 5_000,
            health_timeout_ms: 3_000,
        }
    }

    /// Set the device token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the default request timeout
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Create an HTTP client from this configuration
    pub fn build_http_client(&self) -> crate::ClientResult<crate::HttpClient> {
        crate::HttpClient::new(self)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("http://localhost:8080")
    }
}
