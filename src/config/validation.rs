//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid, weights >= 1)
//! - Reject configurations with no brokers
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::IpAddr;

use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no brokers configured")]
    NoBrokers,

    #[error("broker #{index} has an empty host")]
    EmptyHost { index: usize },

    #[error("broker {broker} has port 0")]
    InvalidPort { broker: String },

    #[error("broker {broker} has weight 0 (must be >= 1)")]
    ZeroWeight { broker: String },

    #[error("listen address {0:?} is not an IP address")]
    InvalidListenAddress(String),

    #[error("connection_timeout_ms must be greater than 0")]
    ZeroConnectionTimeout,

    #[error("health_check_interval_ms must be greater than 0")]
    ZeroHealthCheckInterval,
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.brokers.is_empty() {
        errors.push(ValidationError::NoBrokers);
    }

    for (index, broker) in config.brokers.iter().enumerate() {
        if broker.host.trim().is_empty() {
            errors.push(ValidationError::EmptyHost { index });
            continue;
        }
        if broker.port == 0 {
            errors.push(ValidationError::InvalidPort { broker: broker.to_string() });
        }
        if broker.weight == 0 {
            errors.push(ValidationError::ZeroWeight { broker: broker.to_string() });
        }
    }

    if config.listen_address.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::InvalidListenAddress(config.listen_address.clone()));
    }
    if config.connection_timeout_ms == 0 {
        errors.push(ValidationError::ZeroConnectionTimeout);
    }
    if config.health_check_interval_ms == 0 {
        errors.push(ValidationError::ZeroHealthCheckInterval);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
