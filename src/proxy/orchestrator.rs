//! Per-request cache lookup, backend selection and forwarding.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use bytes::Bytes;

use crate::cache::{CacheEntry, CacheKey, CacheKeyDeriver, CacheStore};
use crate::http::request::forwardable_headers;
use crate::http::response::{stamp_cache_headers, strip_hop_by_hop};
use crate::load_balancer::LoadBalancer;
use crate::observability::metrics;
use crate::proxy::stats::ProxyStats;
use crate::proxy::upstream::{Upstream, UpstreamError, UpstreamRequest};
use crate::resilience::timeouts::with_timeout;

const UPSTREAM_FAILURE_BODY: &str = "upstream request failed";
const UNREADABLE_BODY: &str = "request body could not be read";

/// Inbound request, body already buffered.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// How a response was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    Error,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Error => "ERROR",
        }
    }
}

/// Outbound response with cache headers already stamped.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub cache: CacheStatus,
}

impl ProxyResponse {
    fn new(
        status: StatusCode,
        mut headers: HeaderMap,
        body: Bytes,
        cache: CacheStatus,
        key: Option<&CacheKey>,
    ) -> Self {
        stamp_cache_headers(&mut headers, cache.as_str(), key.map(CacheKey::as_str));
        Self {
            status,
            headers,
            body,
            cache,
        }
    }

    fn error(status: StatusCode, message: &'static str, key: Option<&CacheKey>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        Self::new(status, headers, Bytes::from_static(message.as_bytes()), CacheStatus::Error, key)
    }
}

/// Only GET and HEAD responses are ever stored or served from cache.
pub fn is_cacheable(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD
}

/// The caching reverse proxy.
///
/// Shared by every connection; all mutable state lives in atomics.
pub struct CachingProxy {
    cache: CacheStore,
    deriver: CacheKeyDeriver,
    balancer: Option<Arc<LoadBalancer>>,
    origin: String,
    upstream: Arc<dyn Upstream>,
    timeout: Duration,
    stats: ProxyStats,
}

impl CachingProxy {
    /// `origin` is used whenever no pool is configured or no backend is healthy.
    pub fn new(
        cache: CacheStore,
        deriver: CacheKeyDeriver,
        balancer: Option<Arc<LoadBalancer>>,
        origin: impl Into<String>,
        upstream: Arc<dyn Upstream>,
        timeout: Duration,
    ) -> Self {
        Self {
            cache,
            deriver,
            balancer,
            origin: origin.into().trim_end_matches('/').to_string(),
            upstream,
            timeout,
            stats: ProxyStats::new(),
        }
    }

    pub fn stats(&self) -> &ProxyStats {
        &self.stats
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn balancer(&self) -> Option<&Arc<LoadBalancer>> {
        self.balancer.as_ref()
    }

    pub async fn handle(&self, request: ProxyRequest) -> ProxyResponse {
        let start = Instant::now();
        self.stats.record_request();

        let key = self.deriver.derive(
            &request.method,
            &request.path_and_query,
            &request.headers,
            Some(&request.body[..]),
        );
        let cacheable = is_cacheable(&request.method);

        if cacheable {
            match self.cache.get(&key).await {
                Ok(Some(entry)) => {
                    self.stats.record_hit();
                    let response = ProxyResponse::new(
                        entry.status_code(),
                        entry.header_map(),
                        Bytes::from(entry.body),
                        CacheStatus::Hit,
                        Some(&key),
                    );
                    self.finish(&request, &response, start);
                    return response;
                }
                Ok(None) => {}
                Err(e) => {
                    metrics::record_cache_error("get");
                    tracing::warn!(key = %key, error = %e, "Cache lookup failed, treating as miss");
                }
            }
        }

        self.stats.record_miss();
        let response = match self.forward(&request).await {
            Ok((status, headers, body)) => {
                if cacheable && status.is_success() {
                    let entry = CacheEntry::new(key.as_str(), status, &headers, &body, self.cache.ttl_secs());
                    if let Err(e) = self.cache.set(&key, &entry).await {
                        metrics::record_cache_error("set");
                        tracing::warn!(key = %key, error = %e, "Cache store failed");
                    }
                }
                ProxyResponse::new(status, headers, body, CacheStatus::Miss, Some(&key))
            }
            Err(e) => {
                self.stats.record_error();
                metrics::record_upstream_error(e.kind());
                tracing::warn!(
                    method = %request.method,
                    path = %request.path_and_query,
                    error = %e,
                    "Upstream request failed"
                );
                ProxyResponse::error(StatusCode::BAD_GATEWAY, UPSTREAM_FAILURE_BODY, Some(&key))
            }
        };

        self.finish(&request, &response, start);
        response
    }

    /// Answer a request whose body could not be read.
    pub fn reject_unreadable_body(&self, method: &Method, path_and_query: &str) -> ProxyResponse {
        self.stats.record_request();
        self.stats.record_miss();
        self.stats.record_error();
        tracing::warn!(method = %method, path = %path_and_query, "Rejecting unreadable request body");

        let response = ProxyResponse::error(StatusCode::BAD_REQUEST, UNREADABLE_BODY, None);
        metrics::record_request(method, response.cache.as_str(), response.status.as_u16(), Instant::now());
        response
    }

    /// Send the request to a pool backend or the origin.
    ///
    /// The connection slot is held for the whole call and released when
    /// this future completes or is dropped.
    async fn forward(
        &self,
        request: &ProxyRequest,
    ) -> Result<(StatusCode, HeaderMap, Bytes), UpstreamError> {
        let guard = self.balancer.as_ref().and_then(|lb| lb.acquire());
        let base = match &guard {
            Some(server) => {
                metrics::record_active_connections(server.name(), server.active_connections());
                server.base_url()
            }
            None => self.origin.clone(),
        };

        let upstream_request = UpstreamRequest {
            method: request.method.clone(),
            url: format!("{base}{}", request.path_and_query),
            headers: forwardable_headers(&request.headers),
            body: request.body.clone(),
        };
        tracing::debug!(url = %upstream_request.url, "Forwarding request");

        let result = match with_timeout(self.timeout, self.upstream.send(upstream_request)).await {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::Timeout),
        };

        if let Some(guard) = guard {
            let server = guard.server().clone();
            drop(guard);
            metrics::record_active_connections(server.name(), server.active_connections());
        }

        let response = result?;
        let mut headers = response.headers;
        strip_hop_by_hop(&mut headers);
        Ok((response.status, headers, response.body))
    }

    fn finish(&self, request: &ProxyRequest, response: &ProxyResponse, start: Instant) {
        metrics::record_request(
            &request.method,
            response.cache.as_str(),
            response.status.as_u16(),
            start,
        );
        tracing::info!(
            method = %request.method,
            path = %request.path_and_query,
            cache = response.cache.as_str(),
            status = response.status.as_u16(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Request completed"
        );
    }
}
