//! Request preparation for forwarding.
//!
//! # Design Decisions
//! - The body is re-sent as one buffer on a fresh upstream connection, so
//!   framing and connection headers from the client are dropped
//! - `Host` is rebuilt by the client from the backend URL
//! - `Accept-Encoding` is left to the outbound client, which decodes what it
//!   negotiates

use axum::http::header::{self, HeaderMap, HeaderName};

/// Request headers never forwarded to a backend.
pub const DROPPED_REQUEST_HEADERS: &[HeaderName] = &[
    header::HOST,
    header::CONNECTION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::CONTENT_LENGTH,
    header::ACCEPT_ENCODING,
    header::PROXY_AUTHORIZATION,
];

/// Non-standard hop-by-hop names not covered by `http::header` constants.
const LEGACY_HOP_BY_HOP: &[&str] = &["keep-alive", "proxy-connection"];

/// Copy `headers`, leaving out everything scoped to the client connection.
pub fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = headers.clone();
    remove_connection_listed(&mut forwarded);
    for name in DROPPED_REQUEST_HEADERS {
        forwarded.remove(name);
    }
    for name in LEGACY_HOP_BY_HOP {
        forwarded.remove(*name);
    }
    forwarded
}

/// Remove headers nominated by the `Connection` header itself.
pub(crate) fn remove_connection_listed(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in listed {
        headers.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_drops_connection_scoped_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("proxy.local"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-session"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-session", HeaderValue::from_static("abc"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert("x-request-id", HeaderValue::from_static("r-1"));

        let forwarded = forwardable_headers(&headers);
        assert_eq!(forwarded.len(), 2);
        assert_eq!(forwarded[header::ACCEPT], "application/json");
        assert_eq!(forwarded["x-request-id"], "r-1");
    }

    #[test]
    fn test_repeated_headers_survive() {
        let mut headers = HeaderMap::new();
        headers.append("x-tag", HeaderValue::from_static("a"));
        headers.append("x-tag", HeaderValue::from_static("b"));
        let forwarded = forwardable_headers(&headers);
        assert_eq!(forwarded.get_all("x-tag").iter().count(), 2);
    }
}
