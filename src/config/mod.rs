//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → command-line overrides (main.rs)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → consumed once at startup by each subsystem
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the pool and strategy are fixed for
//!   the process lifetime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, read_config, ConfigError};
pub use schema::{
    AdminConfig, BackendConfig, CacheBackendKind, CacheConfig, HealthCheckConfig,
    InvalidDescriptor, ListenerConfig, LoadBalancerConfig, ObservabilityConfig, ProxyConfig,
    UpstreamConfig,
};
pub use validation::{validate_config, ValidationError};
