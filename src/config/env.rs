//! Environment variable overrides.
//!
//! Variables follow the pattern `BROKER_PROXY_<FIELD>`, for example
//! `BROKER_PROXY_LISTEN_PORT=19092`. They apply on top of the config file and
//! below command-line flags.

use std::str::FromStr;

use crate::config::loader::ConfigError;
use crate::config::schema::{LogFormat, ProxyConfig};

pub const ENV_PREFIX: &str = "BROKER_PROXY_";

/// Apply overrides from the process environment.
pub fn apply_env_overrides(config: &mut ProxyConfig) -> Result<(), ConfigError> {
    apply_overrides_from(config, |name| std::env::var(name).ok())
}

/// Apply overrides read through `lookup`, which maps a full variable name to its value.
pub fn apply_overrides_from<F>(config: &mut ProxyConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |field: &str| lookup(&format!("{ENV_PREFIX}{field}"));

    if let Some(address) = var("LISTEN_ADDRESS") {
        config.listen_address = address;
    }
    if let Some(port) = var("LISTEN_PORT") {
        config.listen_port = parse("LISTEN_PORT", &port)?;
    }
    if let Some(strategy) = var("LOAD_BALANCING") {
        config.load_balancing = parse("LOAD_BALANCING", &strategy)?;
    }
    if let Some(timeout) = var("CONNECTION_TIMEOUT_MS") {
        config.connection_timeout_ms = parse("CONNECTION_TIMEOUT_MS", &timeout)?;
    }
    if let Some(interval) = var("HEALTH_CHECK_INTERVAL_MS") {
        config.health_check_interval_ms = parse("HEALTH_CHECK_INTERVAL_MS", &interval)?;
    }

    if let Some(level) = var("LOG_LEVEL") {
        config.observability.log_level = level;
    }
    if let Some(format) = var("LOG_FORMAT") {
        config.observability.log_format = match format.to_ascii_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            "compact" => LogFormat::Compact,
            "json" => LogFormat::Json,
            _ => return Err(invalid("LOG_FORMAT", &format, "expected pretty, compact or json")),
        };
    }
    if let Some(enabled) = var("METRICS_ENABLED") {
        config.observability.metrics_enabled = parse("METRICS_ENABLED", &enabled)?;
    }
    if let Some(address) = var("METRICS_ADDRESS") {
        config.observability.metrics_address = address;
    }

    Ok(())
}

fn parse<T>(field: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| invalid(field, value, &e.to_string()))
}

fn invalid(field: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Env {
        var: format!("{ENV_PREFIX}{field}"),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LoadBalancingKind;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn overrides_apply_on_top_of_file_values() {
        let mut config = ProxyConfig::default();
        config.listen_port = 19092;
        config.observability.log_level = "debug".into();

        apply_overrides_from(
            &mut config,
            env(&[
                ("BROKER_PROXY_LISTEN_ADDRESS", "127.0.0.1"),
                ("BROKER_PROXY_LISTEN_PORT", "29092"),
                ("BROKER_PROXY_LOAD_BALANCING", "LeastConnections"),
                ("BROKER_PROXY_CONNECTION_TIMEOUT_MS", "1500"),
                ("BROKER_PROXY_LOG_FORMAT", "JSON"),
                ("BROKER_PROXY_METRICS_ENABLED", "false"),
            ]),
        )
        .unwrap();

        assert_eq!(config.listen_endpoint(), "127.0.0.1:29092");
        assert_eq!(config.load_balancing, LoadBalancingKind::LeastConnections);
        assert_eq!(config.connection_timeout_ms, 1500);
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert!(!config.observability.metrics_enabled);
        // Untouched fields keep their previous values.
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.health_check_interval_ms, 10_000);
    }

    #[test]
    fn unset_environment_changes_nothing() {
        let mut config = ProxyConfig::default();
        apply_overrides_from(&mut config, |_| None).unwrap();
        assert_eq!(config.listen_endpoint(), ProxyConfig::default().listen_endpoint());
    }

    #[test]
    fn malformed_value_names_the_variable() {
        let mut config = ProxyConfig::default();
        let err = apply_overrides_from(&mut config, env(&[("BROKER_PROXY_LISTEN_PORT", "ninety")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { ref var, .. } if var == "BROKER_PROXY_LISTEN_PORT"));
        assert_eq!(config.listen_port, 9092);

        let err = apply_overrides_from(&mut config, env(&[("BROKER_PROXY_LOG_FORMAT", "xml")])).unwrap_err();
        assert!(err.to_string().contains("BROKER_PROXY_LOG_FORMAT"));
    }
}
