//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (body limits, training hyperparameters)
//! - Check that addresses parse before anything binds
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Log level is deliberately not validated here: unknown levels fall back to info

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServiceConfig;

/// A single rejected setting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct InvalidSetting {
    pub field: &'static str,
    pub reason: String,
}

impl InvalidSetting {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Check `config` for semantic errors.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<InvalidSetting>> {
    let mut errors = Vec::new();

    if let Err(e) = config.listener.bind_address.parse::<SocketAddr>() {
        errors.push(InvalidSetting::new("listener.bind_address", e.to_string()));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(InvalidSetting::new("listener.max_body_bytes", "must be greater than 0"));
    }
    if config.observability.metrics_enabled {
        if let Err(e) = config.observability.metrics_address.parse::<SocketAddr>() {
            errors.push(InvalidSetting::new("observability.metrics_address", e.to_string()));
        }
    }
    if config.model.epochs == 0 {
        errors.push(InvalidSetting::new("model.epochs", "must be greater than 0"));
    }
    if !(config.model.learning_rate.is_finite() && config.model.learning_rate > 0.0) {
        errors.push(InvalidSetting::new("model.learning_rate", "must be a positive finite number"));
    }
    if !(config.model.l2.is_finite() && config.model.l2 >= 0.0) {
        errors.push(InvalidSetting::new("model.l2", "must be a non-negative finite number"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
