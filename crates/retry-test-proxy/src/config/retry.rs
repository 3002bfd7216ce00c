//! Retry-test rule configuration.

use crate::request_type::RequestType;
use serde::{Deserialize, Serialize};

/// One scripted rule: skip `skip_count` matching requests, then inject
/// `retry_instruction` into the next `retry_count` ones.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    pub method: RequestType,
    /// Informational only; carried over from existing config files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default)]
    pub retry_instruction: String,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub skip_count: u32,
}

impl RetryConfig {
    pub fn validate(&self, index: usize) -> Result<(), String> {
        if self.method == RequestType::Unknown {
            return Err(format!(
                "retryConfig[{index}]: method 'Unknown' cannot carry retry instructions"
            ));
        }
        if self.retry_count > 0 && self.retry_instruction.trim().is_empty() {
            return Err(format!(
                "retryConfig[{index}]: retryInstruction is required when retryCount > 0"
            ));
        }
        Ok(())
    }
}
