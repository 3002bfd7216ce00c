//! Request handling logic for the proxy server.
//!
//! Every inbound request is classified, rebuilt for the target, optionally
//! tagged with a retry test id, and streamed upstream.

use super::client::HttpClient;
use super::forwarding::{build_upstream_request, error_response, forward_request_streaming};
use super::injector::{FaultInjector, InjectionOutcome};
use super::response_ext::{ProxyBody, ResponseExt};
use crate::metrics;
use crate::request_type::RequestType;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use std::convert::Infallible;
use std::time::Instant;
use tracing::{debug, error};

/// Context for request handling, borrowed from the server for one request.
pub struct RequestHandlerContext<'a> {
    pub http_client: &'a HttpClient,
    pub injector: &'a FaultInjector,
    pub target_base: &'a str,
}

/// Main request handler.
pub async fn handle_request(
    ctx: RequestHandlerContext<'_>,
    req: Request<Incoming>,
) -> Result<Response<ProxyBody>, Infallible> {
    let start_time = Instant::now();
    let method = req.method().clone();
    let request_type = RequestType::classify(&method, req.uri().path());

    debug!(
        "Received request: {} {} ({})",
        method,
        req.uri(),
        request_type
    );

    let mut upstream_req = match build_upstream_request(req, ctx.target_base) {
        Ok(upstream_req) => upstream_req,
        Err(e) => {
            error!("Failed to build upstream request: {}", e);
            let response =
                error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()).into_boxed();
            record_completion(request_type, response.status(), false, start_time);
            return Ok(response);
        }
    };

    let outcome = ctx
        .injector
        .maybe_inject(request_type, &mut upstream_req)
        .await;
    match &outcome {
        InjectionOutcome::Injected { .. } => metrics::record_injection(request_type.as_str()),
        InjectionOutcome::Failed => metrics::record_injection_failure(request_type.as_str()),
        InjectionOutcome::Passthrough => {}
    }

    let response = forward_request_streaming(ctx.http_client, upstream_req).await;
    record_completion(
        request_type,
        response.status(),
        outcome.is_injected(),
        start_time,
    );
    Ok(response)
}

fn record_completion(
    request_type: RequestType,
    status: StatusCode,
    injected: bool,
    start_time: Instant,
) {
    let duration_ms = start_time.elapsed().as_secs_f64() * 1000.0;
    metrics::record_request(request_type.as_str(), status.as_u16());
    metrics::record_request_duration(request_type.as_str(), injected, duration_ms);
    debug!(
        "Completed {} with status {} in {:.2}ms (injected={})",
        request_type, status, duration_ms, injected
    );
}
