//! Control-plane HTTP client: start/stop/restart and server lookup.
//!
//! Thin request/response wrappers over the hosting REST API. Responses are
//! passed through as status plus raw JSON; callers pick out the fields they
//! display.

use serde_json::{Value, json};
use tracing::debug;

use crate::error::ControlError;

pub const API_BASE: &str = "https://api.exaroton.com/v1";

/// Status code and body of one control-plane response. Non-2xx responses are
/// not errors at this layer; the API reports failures in the body.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub data: Option<Value>,
}

impl ApiResponse {
    /// User-facing message: the API's `error` or `message` field, else the
    /// fallback.
    pub fn message(&self, fallback: &str) -> String {
        if let Some(data) = &self.data {
            if let Some(error) = data.get("error").and_then(Value::as_str) {
                return format!("Error: {error}");
            }
            if let Some(message) = data.get("message").and_then(Value::as_str) {
                return message.to_string();
            }
        }
        fallback.to_string()
    }

    pub fn is_error(&self) -> bool {
        self.data
            .as_ref()
            .is_some_and(|data| data.get("error").is_some())
    }

    /// The `data` object nested inside the response body.
    pub fn server_data(&self) -> Option<&Value> {
        self.data.as_ref()?.get("data")
    }
}

#[derive(Debug, Clone)]
pub struct ControlClient {
    http: reqwest::Client,
    base: String,
    token: String,
    server_id: String,
}

impl ControlClient {
    pub fn new(
        token: impl Into<String>,
        server_id: impl Into<String>,
    ) -> Result<Self, ControlError> {
        Self::with_base(API_BASE, token, server_id)
    }

    pub fn with_base(
        base: impl Into<String>,
        token: impl Into<String>,
        server_id: impl Into<String>,
    ) -> Result<Self, ControlError> {
        let token = token.into();
        let server_id = server_id.into();
        if token.trim().is_empty() || server_id.trim().is_empty() {
            return Err(ControlError::MissingCredentials);
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base: base.into(),
            token,
            server_id,
        })
    }

    pub async fn get_server(&self) -> Result<ApiResponse, ControlError> {
        self.get(&format!("/servers/{}", self.server_id)).await
    }

    pub async fn start_server(&self, use_own_credits: bool) -> Result<ApiResponse, ControlError> {
        let path = format!("/servers/{}/start/", self.server_id);
        if use_own_credits {
            self.post(&path, json!({ "useOwnCredits": true })).await
        } else {
            self.get(&path).await
        }
    }

    pub async fn stop_server(&self) -> Result<ApiResponse, ControlError> {
        self.get(&format!("/servers/{}/stop/", self.server_id)).await
    }

    pub async fn restart_server(&self) -> Result<ApiResponse, ControlError> {
        self.get(&format!("/servers/{}/restart/", self.server_id))
            .await
    }

    async fn get(&self, path: &str) -> Result<ApiResponse, ControlError> {
        let request = self.http.get(format!("{}{path}", self.base));
        self.execute(request).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<ApiResponse, ControlError> {
        let request = self.http.post(format!("{}{path}", self.base)).json(&body);
        self.execute(request).await
    }

    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<ApiResponse, ControlError> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status().as_u16();
        // Empty or malformed bodies are tolerated; the caller falls back to
        // a generic message.
        let data = response.json::<Value>().await.ok();
        debug!(status, "control-plane response");
        Ok(ApiResponse { status, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_prefers_error_field() {
        let response = ApiResponse {
            status: 402,
            data: Some(json!({ "error": "Not enough credits.", "message": "ignored" })),
        };
        assert_eq!(response.message("fallback"), "Error: Not enough credits.");
        assert!(response.is_error());
    }

    #[test]
    fn test_message_falls_back_through_fields() {
        let response = ApiResponse {
            status: 200,
            data: Some(json!({ "message": "Server is starting." })),
        };
        assert_eq!(response.message("fallback"), "Server is starting.");
        assert!(!response.is_error());

        let empty = ApiResponse {
            status: 200,
            data: None,
        };
        assert_eq!(empty.message("Start request sent."), "Start request sent.");
    }

    #[test]
    fn test_server_data_extraction() {
        let response = ApiResponse {
            status: 200,
            data: Some(json!({ "success": true, "data": { "status": 1 } })),
        };
        assert_eq!(
            response.server_data().and_then(|d| d.get("status")).and_then(Value::as_i64),
            Some(1)
        );
    }

    #[test]
    fn test_missing_credentials_rejected() {
        assert!(matches!(
            ControlClient::new("", "srv"),
            Err(ControlError::MissingCredentials)
        ));
        assert!(matches!(
            ControlClient::new("token", "  "),
            Err(ControlError::MissingCredentials)
        ));
        assert!(ControlClient::new("token", "srv").is_ok());
    }
}
