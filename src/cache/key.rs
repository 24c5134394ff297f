//! Cache key derivation.
//!
//! A key is the BLAKE3 digest of the method, the path and query, a canonical
//! subset of the request headers and the body. Each field is length-prefixed
//! so that moving bytes across a field boundary always changes the digest.

use std::collections::HashSet;
use std::fmt;

use axum::http::{HeaderMap, Method};

/// Headers that never take part in key derivation by default.
pub const DEFAULT_IGNORED_HEADERS: &[&str] = &[
    "host",
    "connection",
    "date",
    "cookie",
    "authorization",
    "user-agent",
    "keep-alive",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "proxy-authorization",
    "proxy-connection",
    "x-request-id",
    "x-forwarded-for",
    "x-forwarded-host",
    "x-forwarded-proto",
    "forwarded",
    "x-real-ip",
];

/// Opaque cache key: 64 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Turns a request descriptor into a [`CacheKey`].
#[derive(Debug, Clone)]
pub struct CacheKeyDeriver {
    ignored: HashSet<String>,
}

impl Default for CacheKeyDeriver {
    fn default() -> Self {
        Self::new(DEFAULT_IGNORED_HEADERS.iter().copied())
    }
}

impl CacheKeyDeriver {
    /// Create a deriver that skips the given header names (case-insensitive).
    pub fn new<I, S>(ignored: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            ignored: ignored
                .into_iter()
                .map(|h| h.as_ref().trim().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn derive(
        &self,
        method: &Method,
        path_and_query: &str,
        headers: &HeaderMap,
        body: Option<&[u8]>,
    ) -> CacheKey {
        let mut hasher = blake3::Hasher::new();
        write_field(&mut hasher, method.as_str().as_bytes());
        write_field(&mut hasher, path_and_query.as_bytes());

        let canonical = self.canonical_headers(headers);
        hasher.update(&(canonical.len() as u64).to_le_bytes());
        for (name, value) in &canonical {
            write_field(&mut hasher, name.as_bytes());
            write_field(&mut hasher, value);
        }

        write_field(&mut hasher, body.unwrap_or_default());

        CacheKey(hasher.finalize().to_hex().to_string())
    }

    /// Lowercased `(name, value)` pairs, minus ignored names, sorted.
    fn canonical_headers<'a>(&self, headers: &'a HeaderMap) -> Vec<(&'a str, &'a [u8])> {
        // HeaderName is always lowercase.
        let mut pairs: Vec<_> = headers
            .iter()
            .filter(|(name, _)| !self.ignored.contains(name.as_str()))
            .map(|(name, value)| (name.as_str(), value.as_bytes()))
            .collect();
        pairs.sort_unstable();
        pairs
    }
}

fn write_field(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(*value));
        }
        map
    }

    #[test]
    fn test_key_is_deterministic_hex() {
        let deriver = CacheKeyDeriver::default();
        let h = headers(&[("accept", "application/json")]);
        let k1 = deriver.derive(&Method::GET, "/items?page=1", &h, None);
        let k2 = deriver.derive(&Method::GET, "/items?page=1", &h, None);
        assert_eq!(k1, k2);
        assert_eq!(k1.as_str().len(), 64);
        assert!(k1.as_str().bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
    }

    #[test]
    fn test_every_field_changes_key() {
        let deriver = CacheKeyDeriver::default();
        let h = headers(&[("accept", "text/html")]);
        let base = deriver.derive(&Method::GET, "/a?x=1", &h, Some(b"body".as_slice()));

        assert_ne!(base, deriver.derive(&Method::HEAD, "/a?x=1", &h, Some(b"body".as_slice())));
        assert_ne!(base, deriver.derive(&Method::GET, "/a?x=2", &h, Some(b"body".as_slice())));
        assert_ne!(
            base,
            deriver.derive(&Method::GET, "/a?x=1", &headers(&[("accept", "text/plain")]), Some(b"body".as_slice()))
        );
        assert_ne!(base, deriver.derive(&Method::GET, "/a?x=1", &h, Some(b"other".as_slice())));
    }

    #[test]
    fn test_absent_body_equals_empty_body() {
        let deriver = CacheKeyDeriver::default();
        let h = HeaderMap::new();
        assert_eq!(
            deriver.derive(&Method::GET, "/", &h, None),
            deriver.derive(&Method::GET, "/", &h, Some(b"".as_slice()))
        );
    }

    #[test]
    fn test_volatile_headers_ignored() {
        let deriver = CacheKeyDeriver::default();
        let plain = headers(&[("accept", "*/*")]);
        let noisy = headers(&[
            ("accept", "*/*"),
            ("user-agent", "curl/8.0"),
            ("cookie", "session=abc"),
            ("x-request-id", "7f1c"),
            ("host", "proxy.local"),
            ("date", "Mon, 01 Jan 2024 00:00:00 GMT"),
        ]);
        assert_eq!(
            deriver.derive(&Method::GET, "/", &plain, None),
            deriver.derive(&Method::GET, "/", &noisy, None)
        );
    }

    #[test]
    fn test_header_order_does_not_matter() {
        let deriver = CacheKeyDeriver::default();
        let a = headers(&[("accept", "*/*"), ("accept-language", "en")]);
        let b = headers(&[("accept-language", "en"), ("accept", "*/*")]);
        assert_eq!(
            deriver.derive(&Method::GET, "/", &a, None),
            deriver.derive(&Method::GET, "/", &b, None)
        );
    }

    #[test]
    fn test_field_boundaries_are_unambiguous() {
        let deriver = CacheKeyDeriver::default();
        let h = HeaderMap::new();
        assert_ne!(
            deriver.derive(&Method::GET, "/ab", &h, Some(b"c".as_slice())),
            deriver.derive(&Method::GET, "/a", &h, Some(b"bc".as_slice()))
        );
    }

    #[test]
    fn test_custom_ignore_list() {
        let deriver = CacheKeyDeriver::new(["Accept-Language"]);
        let a = headers(&[("accept-language", "en")]);
        let b = headers(&[("accept-language", "fr")]);
        assert_eq!(
            deriver.derive(&Method::GET, "/", &a, None),
            deriver.derive(&Method::GET, "/", &b, None)
        );

        let c = headers(&[("user-agent", "a")]);
        let d = headers(&[("user-agent", "b")]);
        assert_ne!(
            deriver.derive(&Method::GET, "/", &c, None),
            deriver.derive(&Method::GET, "/", &d, None)
        );
    }
}
