//! Request forwarding to the target backend.
//!
//! Requests and responses are streamed end to end; neither body is ever
//! collected in memory.

use super::client::HttpClient;
use super::response_ext::{ProxyBody, ResponseExt};
use http_body_util::combinators::BoxBody;
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, CONTENT_TYPE, HOST};
use hyper::{Request, Response, StatusCode};
use std::error::Error as StdError;
use tracing::{debug, error};

/// Plain-text error response carrying `message` as its body.
pub fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(message.to_string())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// Render an error together with its source chain.
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Rebuild an inbound request so it targets `target_base`.
///
/// The raw path and query are appended to the target, method and body are
/// kept, and every header except `host` is copied (the client derives `host`
/// from the new URI).
pub fn build_upstream_request<B>(
    req: Request<B>,
    target_base: &str,
) -> Result<Request<ProxyBody>, hyper::http::Error>
where
    B: Body<Data = Bytes, Error = hyper::Error> + Send + Sync + 'static,
{
    let (parts, body) = req.into_parts();
    let upstream_path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let full_uri = format!("{target_base}{upstream_path}");

    debug!("Forwarding to: {}", full_uri);

    let mut upstream_req = Request::builder().method(parts.method).uri(full_uri);
    if let Some(headers) = upstream_req.headers_mut() {
        for (key, value) in parts.headers.iter() {
            if key != HOST {
                headers.append(key.clone(), value.clone());
            }
        }
    }

    // Pass request body through directly without buffering
    upstream_req.body(BoxBody::new(body))
}

/// Send a prepared request upstream and relay the response verbatim.
///
/// Any failure becomes a 500 whose body is the error text.
pub async fn forward_request_streaming(
    http_client: &HttpClient,
    upstream_req: Request<ProxyBody>,
) -> Response<ProxyBody> {
    match http_client.request(upstream_req).await {
        Ok(upstream_response) => upstream_response.map(BoxBody::new),
        Err(e) => {
            let message = error_chain(&e);
            error!("Failed to forward request to upstream: {}", message);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &message).into_boxed()
        }
    }
}
