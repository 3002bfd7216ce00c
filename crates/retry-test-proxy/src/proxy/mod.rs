//! Proxy server module.
//!
//! # Module Structure
//!
//! - `server` - ProxyServer struct, accept loop and graceful drain
//! - `handler` - Per-request classification, injection and forwarding
//! - `injector` - Retry test registration and header tagging
//! - `forwarding` - Request rewriting and streaming to the target
//! - `client` - HTTP client creation and configuration
//! - `metrics_server` - `/metrics` and `/health` listener

mod client;
mod forwarding;
mod handler;
mod headers;
mod injector;
mod metrics_server;
mod response_ext;
mod server;

pub use forwarding::error_response;
pub use headers::X_RETRY_TEST_ID;
pub use injector::{FaultInjector, InjectionOutcome};
pub use metrics_server::MetricsServer;
pub use server::{shutdown_signal, ProxyServer};
