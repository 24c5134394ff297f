//! Response transformation.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers before a response is cached or returned
//! - Stamp `X-Cache` and `X-Cache-Key`
//! - Turn a [`ProxyResponse`] into an axum response

use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};

use crate::proxy::ProxyResponse;

pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");
pub const X_CACHE_KEY: HeaderName = HeaderName::from_static("x-cache-key");

/// Response headers that never leave the proxy.
pub const HOP_BY_HOP_RESPONSE_HEADERS: &[HeaderName] = &[
    header::CONNECTION,
    header::TRANSFER_ENCODING,
    header::TE,
    header::TRAILER,
    header::PROXY_AUTHORIZATION,
    header::PROXY_AUTHENTICATE,
    header::CONTENT_ENCODING,
];

pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    crate::http::request::remove_connection_listed(headers);
    for name in HOP_BY_HOP_RESPONSE_HEADERS {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}

/// Set `X-Cache` and, when known, `X-Cache-Key`.
pub fn stamp_cache_headers(headers: &mut HeaderMap, outcome: &'static str, key: Option<&str>) {
    headers.insert(X_CACHE, HeaderValue::from_static(outcome));
    if let Some(value) = key.and_then(|k| HeaderValue::from_str(k).ok()) {
        headers.insert(X_CACHE_KEY, value);
    }
}

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
