// SPDX-License-Identifier: MIT OR Apache-2.0
//! Request correlation and request ID propagation.
//!
//! Every request is tagged with an `x-request-id`. A caller-supplied value is
//! kept; otherwise a UUID v4 is generated. The id names the request's tracing
//! span and is echoed on the response.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{Instrument, Span};
use uuid::Uuid;

/// Header carrying the request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Read the request id from headers or generate a new one.
pub fn extract_or_generate(request: &Request) -> String {
    request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map_or_else(|| Uuid::new_v4().to_string(), ToString::to_string)
}

/// Create a tracing span for one request.
pub fn request_span(request_id: &str, method: &str, path: &str) -> Span {
    tracing::info_span!(
        "http_request",
        request_id = %request_id,
        method = %method,
        path = %path,
    )
}

/// Middleware running each request inside its span and echoing the id.
pub async fn propagate_request_id(request: Request, next: Next) -> Response {
    let request_id = extract_or_generate(&request);
    let span = request_span(
        &request_id,
        request.method().as_str(),
        request.uri().path(),
    );

    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
