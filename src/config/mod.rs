//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML/JSON)
//!     → loader.rs (parse & deserialize)
//!     → env.rs (BROKER_PROXY_* overrides), then CLI flags
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → consumed once at startup to build the broker registry
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the broker topology is static
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod env;
pub mod loader;
pub mod schema;
pub mod validation;

pub use env::{apply_env_overrides, ENV_PREFIX};
pub use loader::{load_config, parse_config, ConfigError, ConfigFormat};
pub use schema::BrokerConfig;
pub use schema::LoadBalancingKind;
pub use schema::LogFormat;
pub use schema::ObservabilityConfig;
pub use schema::ProxyConfig;
pub use validation::{validate_config, ValidationError};
