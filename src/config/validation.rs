//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, origin URL, timeouts and weights
//! - Check that enabled features have what they need
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_socket_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.listener.max_in_flight == 0 {
        errors.push(ValidationError::new("listener.max_in_flight", "must be greater than 0"));
    }

    match Url::parse(&config.upstream.origin) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
        Ok(_) => errors.push(ValidationError::new(
            "upstream.origin",
            "must be an absolute http or https URL",
        )),
        Err(e) => errors.push(ValidationError::new("upstream.origin", e.to_string())),
    }
    if config.upstream.timeout_secs == 0 {
        errors.push(ValidationError::new("upstream.timeout_secs", "must be greater than 0"));
    }
    if config.upstream.connect_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "upstream.connect_timeout_secs",
            "must be greater than 0",
        ));
    }

    if config.cache.operation_timeout_ms == 0 {
        errors.push(ValidationError::new("cache.operation_timeout_ms", "must be greater than 0"));
    }
    if config.cache.redis_host.trim().is_empty() {
        errors.push(ValidationError::new("cache.redis_host", "must not be empty"));
    }

    let lb = &config.load_balancer;
    if lb.enabled && lb.servers.is_empty() {
        errors.push(ValidationError::new(
            "load_balancer.servers",
            "at least one server is required when load balancing is enabled",
        ));
    }
    for server in &lb.servers {
        if server.address.trim().is_empty() {
            errors.push(ValidationError::new("load_balancer.servers", "address must not be empty"));
        }
        if server.weight == 0 {
            errors.push(ValidationError::new(
                "load_balancer.servers",
                format!("weight of {} must be at least 1", server.address),
            ));
        }
    }

    let hc = &config.health_check;
    if hc.enabled {
        if hc.interval_secs == 0 || hc.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "health_check",
                "interval_secs and timeout_secs must be greater than 0",
            ));
        }
        if hc.healthy_threshold == 0 || hc.unhealthy_threshold == 0 {
            errors.push(ValidationError::new("health_check", "thresholds must be at least 1"));
        }
        if !hc.path.starts_with('/') {
            errors.push(ValidationError::new("health_check.path", "must start with '/'"));
        }
    }

    if config.observability.metrics_enabled {
        check_socket_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if config.admin.enabled {
        check_socket_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.trim().is_empty() {
            errors.push(ValidationError::new(
                "admin.api_key",
                "must be set when the admin API is enabled",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_socket_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(field, format!("'{value}' is not a socket address")));
    }
}
