//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the broker proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Address the client listener binds to (e.g., "0.0.0.0").
    pub listen_address: String,

    /// Port the client listener binds to.
    pub listen_port: u16,

    /// Broker definitions, in selection order.
    pub brokers: Vec<BrokerConfig>,

    /// Strategy used to pick a broker for each client.
    pub load_balancing: LoadBalancingKind,

    /// Outbound connect timeout in milliseconds.
    pub connection_timeout_ms: u64,

    /// Interval between health check rounds in milliseconds.
    pub health_check_interval_ms: u64,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0".to_string(),
            listen_port: 9092,
            brokers: Vec::new(),
            load_balancing: LoadBalancingKind::RoundRobin,
            connection_timeout_ms: 30_000,
            health_check_interval_ms: 10_000,
            observability: ObservabilityConfig::default(),
        }
    }
}

impl ProxyConfig {
    /// `listen_address:listen_port`, bracketing IPv6 literals.
    pub fn listen_endpoint(&self) -> String {
        if self.listen_address.contains(':') && !self.listen_address.starts_with('[') {
            format!("[{}]:{}", self.listen_address, self.listen_port)
        } else {
            format!("{}:{}", self.listen_address, self.listen_port)
        }
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }
}

/// Broker node definition. Identity is `(host, port)`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BrokerConfig {
    /// Hostname or IP address.
    pub host: String,

    /// Broker port (default: 9092).
    #[serde(default = "default_broker_port")]
    pub port: u16,

    /// Weight for weighted load balancing (default: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,

    /// Disabled brokers are never selected nor health checked.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl BrokerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            weight: default_weight(),
            enabled: default_enabled(),
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl fmt::Display for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') && !self.host.starts_with('[') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

fn default_broker_port() -> u16 {
    9092
}

fn default_weight() -> u32 {
    1
}

fn default_enabled() -> bool {
    true
}

/// Broker selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancingKind {
    #[default]
    #[serde(alias = "RoundRobin")]
    RoundRobin,
    #[serde(alias = "Random")]
    Random,
    #[serde(alias = "Weighted")]
    Weighted,
    #[serde(alias = "LeastConnections")]
    LeastConnections,
}

impl LoadBalancingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadBalancingKind::RoundRobin => "round_robin",
            LoadBalancingKind::Random => "random",
            LoadBalancingKind::Weighted => "weighted",
            LoadBalancingKind::LeastConnections => "least_connections",
        }
    }
}

impl fmt::Display for LoadBalancingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoadBalancingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "roundrobin" => Ok(LoadBalancingKind::RoundRobin),
            "random" => Ok(LoadBalancingKind::Random),
            "weighted" => Ok(LoadBalancingKind::Weighted),
            "leastconnections" | "leastconn" => Ok(LoadBalancingKind::LeastConnections),
            _ => Err(format!("unknown load balancing strategy: {}", s)),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
