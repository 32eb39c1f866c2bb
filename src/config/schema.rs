//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from a TOML file;
//! environment variables are layered on top by the loader.

use serde::{Deserialize, Serialize};

use crate::observability::record::{LogLevel, ServiceMeta};

/// Root configuration for the inference service.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address, body limits).
    pub listener: ListenerConfig,

    /// Log record stamping and metrics settings.
    pub observability: ObservabilityConfig,

    /// Training hyperparameters for the startup model.
    pub model: ModelConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,

    /// Largest accepted request body in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            max_body_bytes: 64 * 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// `service` field of every log record.
    pub service_name: String,

    /// `env` field of every log record.
    pub environment: String,

    /// `version` field of every log record.
    pub version: String,

    /// Minimum log level (debug, info, warning, error, critical).
    /// Unknown values fall back to info.
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "mlops-quickstart".to_string(),
            environment: "local".to_string(),
            version: "dev".to_string(),
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

impl ObservabilityConfig {
    pub fn min_level(&self) -> LogLevel {
        LogLevel::parse_or_default(&self.log_level)
    }

    pub fn service_meta(&self) -> ServiceMeta {
        ServiceMeta {
            service: self.service_name.clone(),
            env: self.environment.clone(),
            version: self.version.clone(),
        }
    }
}

/// Training hyperparameters.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    /// Full-batch gradient descent iterations.
    pub epochs: usize,

    /// Gradient descent step size.
    pub learning_rate: f64,

    /// L2 penalty on the weights (bias is not penalised).
    pub l2: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            epochs: 1000,
            learning_rate: 0.5,
            l2: 1.0,
        }
    }
}
