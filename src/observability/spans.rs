//! Request spans.
//!
//! Every request runs inside a span carrying its method, URI and
//! `x-request-id`, so events from dispatch and entity handling correlate.

use axum::body::Body;
use axum::http::Request;
use tracing::Span;

use crate::http::request_id::RequestIdExt;

/// Span factory for the HTTP trace layer.
pub fn make_request_span(request: &Request<Body>) -> Span {
    let request_id = request.request_id().unwrap_or("unknown");

    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id,
    )
}
