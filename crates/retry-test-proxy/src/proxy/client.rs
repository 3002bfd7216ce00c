//! HTTP client creation and configuration.
//!
//! One pooled client is shared by every forwarded request.

use super::response_ext::ProxyBody;
use crate::config::ConnectionPoolConfig;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use tracing::{info, warn};

/// Type alias for the HTTP client used by the proxy.
pub type HttpClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, ProxyBody>;

/// Create a shared HTTP/1.1 client with connection pooling.
///
/// Plain `http` and `https` backends are both supported. Native root
/// certificates are preferred; the bundled webpki roots are used when the
/// platform store is unavailable.
pub fn create_http_client(pool: &ConnectionPoolConfig) -> HttpClient {
    // Either provider may already be installed by another client in-process
    let _ = rustls::crypto::ring::default_provider().install_default();

    let mut http_connector = HttpConnector::new();
    http_connector.set_keepalive(Some(Duration::from_secs(pool.keepalive_timeout_secs)));
    http_connector.set_connect_timeout(Some(Duration::from_secs(pool.connect_timeout_secs)));
    http_connector.enforce_http(false); // Allow both HTTP and HTTPS

    let https_connector = match hyper_rustls::HttpsConnectorBuilder::new().with_native_roots() {
        Ok(builder) => builder
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector),
        Err(e) => {
            warn!("Native root certificates unavailable ({}), using webpki roots", e);
            hyper_rustls::HttpsConnectorBuilder::new()
                .with_webpki_roots()
                .https_or_http()
                .enable_http1()
                .wrap_connector(http_connector)
        }
    };

    let http_client = Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(pool.idle_timeout_secs))
        .pool_max_idle_per_host(pool.max_idle_per_host)
        .build(https_connector);

    info!(
        "Connection pool configured (HTTP/1.1): max_idle={}, idle_timeout={}s, keepalive={}s",
        pool.max_idle_per_host, pool.idle_timeout_secs, pool.keepalive_timeout_secs
    );

    http_client
}
