//! Remote response envelope
//!
//! Every remote endpoint answers with the same envelope:
//! ```json
//! {
//!     "code": "E0000",
//!     "message": "Success",
//!     "data": { ... }
//! }
//! ```
//! `code == E0000` is the success indicator the sync layer relies on.

use serde::{Deserialize, Serialize};

/// Success code
pub const API_CODE_SUCCESS: &str = "E0000";

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Response code (E0000 = success, others = error codes)
    pub code: String,
    /// Human-readable message
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response
    pub fn ok(data: T) -> Self {
        Self {
            code: API_CODE_SUCCESS.to_string(),
            message: "Success".to_string(),
            data: Some(data),
        }
    }

    /// Create a successful response without data
    pub fn ack() -> Self {
        Self {
            code: API_CODE_SUCCESS.to_string(),
            message: "Success".to_string(),
            data: None,
        }
    }

    /// Create an error response
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            data: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == API_CODE_SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_without_data() {
        let resp: ApiResponse<()> = serde_json::from_str(r#"{"code":"E0000","message":"ok"}"#).unwrap();
        assert!(resp.is_success());
        assert!(resp.data.is_none());

        let resp: ApiResponse<()> =
            serde_json::from_str(r#"{"code":"E0002","message":"bad payload"}"#).unwrap();
        assert!(!resp.is_success());
    }
}
