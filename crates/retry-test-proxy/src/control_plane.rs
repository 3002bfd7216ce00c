//! Client for the backend's retry-test registration endpoint.
//!
//! A retry test is created by POSTing an instruction map to
//! `{host}/retry_test`. The backend answers with an opaque `id` which, sent
//! back as `x-retry-test-id` on a later request, makes the backend apply the
//! scripted misbehavior to that request.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Transport the retry test applies to.
pub const RETRY_TEST_TRANSPORT: &str = "http";

/// Instruction map keyed by backend operation name.
pub type InstructionMap = HashMap<String, Vec<String>>;

/// Errors that can occur when registering a retry test
#[derive(Error, Debug)]
pub enum ControlPlaneError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("control plane returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("control plane response did not contain a test id")]
    MissingId,
    #[error("no instructions to register")]
    EmptyInstructions,
}

#[derive(Debug, Serialize)]
struct CreateRetryTestRequest<'a> {
    instructions: &'a InstructionMap,
    transport: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateRetryTestResponse {
    #[serde(default)]
    id: String,
}

/// Registers retry tests and hands back session tokens.
#[async_trait]
pub trait RetryTestRegistry: Send + Sync {
    async fn create_retry_test(
        &self,
        instructions: &InstructionMap,
    ) -> Result<String, ControlPlaneError>;
}

/// [`RetryTestRegistry`] backed by a storage emulator's `retry_test` resource.
pub struct EmulatorClient {
    client: Client,
    base_url: String,
}

impl EmulatorClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ControlPlaneError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Remove a retry test from the backend.
    pub async fn delete_retry_test(&self, id: &str) -> Result<(), ControlPlaneError> {
        let url = format!("{}/retry_test/{}", self.base_url, id);
        let resp = self.client.delete(&url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ControlPlaneError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RetryTestRegistry for EmulatorClient {
    async fn create_retry_test(
        &self,
        instructions: &InstructionMap,
    ) -> Result<String, ControlPlaneError> {
        if instructions.is_empty() {
            return Err(ControlPlaneError::EmptyInstructions);
        }

        let url = format!("{}/retry_test", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&CreateRetryTestRequest {
                instructions,
                transport: RETRY_TEST_TRANSPORT,
            })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ControlPlaneError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let created: CreateRetryTestResponse = resp.json().await?;
        if created.id.is_empty() {
            return Err(ControlPlaneError::MissingId);
        }
        Ok(created.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let mut instructions = InstructionMap::new();
        instructions.insert(
            "storage.objects.get".to_string(),
            vec!["return-503".to_string()],
        );
        let body = serde_json::to_value(CreateRetryTestRequest {
            instructions: &instructions,
            transport: RETRY_TEST_TRANSPORT,
        })
        .unwrap();

        assert_eq!(
            body,
            serde_json::json!({
                "instructions": {"storage.objects.get": ["return-503"]},
                "transport": "http"
            })
        );
    }

    #[test]
    fn test_response_parsing_ignores_extra_fields() {
        let resp: CreateRetryTestResponse = serde_json::from_str(
            r#"{"id": "abc123", "instructions": {}, "completed": false}"#,
        )
        .unwrap();
        assert_eq!(resp.id, "abc123");

        let missing: CreateRetryTestResponse = serde_json::from_str("{}").unwrap();
        assert!(missing.id.is_empty());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = EmulatorClient::new("http://localhost:9000/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:9000");
    }

    #[tokio::test]
    async fn test_empty_instructions_short_circuit() {
        let client = EmulatorClient::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
        let err = client
            .create_retry_test(&InstructionMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ControlPlaneError::EmptyInstructions));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_request_error() {
        // Port 1 is reserved and refuses connections
        let client = EmulatorClient::new("http://127.0.0.1:1", Duration::from_secs(2)).unwrap();
        let mut instructions = InstructionMap::new();
        instructions.insert("storage.objects.get".to_string(), vec!["x".to_string()]);
        let err = client.create_retry_test(&instructions).await.unwrap_err();
        assert!(matches!(err, ControlPlaneError::Request(_)));

        let err = client.delete_retry_test("abc123").await.unwrap_err();
        assert!(matches!(err, ControlPlaneError::Request(_)));
    }
}
