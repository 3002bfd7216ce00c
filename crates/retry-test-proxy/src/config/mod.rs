//! Configuration types for the retry test proxy.

mod listen;
mod protocol;
mod retry;
mod upstream;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use listen::{ListenConfig, MetricsConfig};
pub use protocol::{parse_host_url, Protocol};
pub use retry::RetryConfig;
pub use upstream::{ConnectionPoolConfig, ControlPlaneConfig};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,

    /// Backend every request is forwarded to, e.g. `http://localhost:9000`.
    pub target_host: String,

    #[serde(default)]
    pub control_plane: ControlPlaneConfig,

    #[serde(default)]
    pub connection_pool: ConnectionPoolConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsConfig>,

    /// Upper bound on draining in-flight requests at shutdown.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Ordered retry rules. Order within a request type is consumption order.
    #[serde(default)]
    pub retry_config: Vec<RetryConfig>,
}

fn default_shutdown_timeout() -> u64 {
    10
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {e}", path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        parse_host_url(&self.target_host)
            .map_err(|e| anyhow::anyhow!("Invalid targetHost: {e}"))?;

        if let Some(ref host) = self.control_plane.host {
            parse_host_url(host).map_err(|e| anyhow::anyhow!("Invalid controlPlane.host: {e}"))?;
        }

        if let Some(ref metrics) = self.metrics {
            if metrics.port == self.listen.port {
                anyhow::bail!(
                    "metrics.port ({}) must differ from listen.port",
                    metrics.port
                );
            }
        }

        for (index, rule) in self.retry_config.iter().enumerate() {
            rule.validate(index).map_err(|e| anyhow::anyhow!(e))?;
        }

        Ok(())
    }

    /// Target host without a trailing slash, ready for the request URI to be
    /// appended.
    pub fn target_base(&self) -> &str {
        self.target_host.trim_end_matches('/')
    }

    /// Host serving the retry-test resource.
    pub fn control_plane_host(&self) -> &str {
        self.control_plane
            .host
            .as_deref()
            .unwrap_or(&self.target_host)
            .trim_end_matches('/')
    }
}
