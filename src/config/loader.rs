//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, InvalidSetting};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<InvalidSetting>),
}

fn join(errors: &[InvalidSetting]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Settings given on the command line; they win over every other source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub bind_address: Option<String>,
}

/// Load configuration from an optional TOML file, the process environment
/// and command-line overrides.
pub fn load_config(
    path: Option<&Path>,
    overrides: &Overrides,
) -> Result<ServiceConfig, ConfigError> {
    load_config_with(path, overrides, |key| std::env::var(key).ok())
}

/// Load configuration with an explicit environment lookup.
///
/// Precedence, later wins: defaults, file, environment, overrides. The
/// merged result is validated as a whole.
pub fn load_config_with<F>(
    path: Option<&Path>,
    overrides: &Overrides,
    env: F,
) -> Result<ServiceConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => ServiceConfig::default(),
    };

    apply_env(&mut config, env);
    if let Some(bind) = &overrides.bind_address {
        config.listener.bind_address = bind.clone();
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay recognised environment variables onto `config`.
///
/// | Variable          | Field                              |
/// |-------------------|------------------------------------|
/// | `SERVICE_NAME`    | `observability.service_name`       |
/// | `APP_ENV`, `ENV`  | `observability.environment`        |
/// | `APP_VERSION`     | `observability.version`            |
/// | `LOG_LEVEL`       | `observability.log_level`          |
/// | `BIND_ADDRESS`    | `listener.bind_address`            |
/// | `METRICS_ADDRESS` | `observability.metrics_address` (enables metrics) |
pub fn apply_env<F>(config: &mut ServiceConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    let obs = &mut config.observability;
    if let Some(v) = env("SERVICE_NAME") {
        obs.service_name = v;
    }
    if let Some(v) = env("APP_ENV").or_else(|| env("ENV")) {
        obs.environment = v;
    }
    if let Some(v) = env("APP_VERSION") {
        obs.version = v;
    }
    if let Some(v) = env("LOG_LEVEL") {
        obs.log_level = v;
    }
    if let Some(v) = env("METRICS_ADDRESS") {
        obs.metrics_address = v;
        obs.metrics_enabled = true;
    }
    if let Some(v) = env("BIND_ADDRESS") {
        config.listener.bind_address = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::LogLevel;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_file_or_env() {
        let config = load_config_with(None, &Overrides::default(), env_from(&[])).unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.observability.service_name, "mlops-quickstart");
        assert_eq!(config.observability.environment, "local");
        assert_eq!(config.observability.version, "dev");
    }

    #[test]
    fn test_env_overrides() {
        let config = load_config_with(
            None,
            &Overrides::default(),
            env_from(&[
                ("SERVICE_NAME", "iris-api"),
                ("ENV", "staging"),
                ("APP_VERSION", "1.4.0"),
                ("LOG_LEVEL", "debug"),
                ("BIND_ADDRESS", "127.0.0.1:9000"),
            ]),
        )
        .unwrap();

        assert_eq!(config.observability.service_name, "iris-api");
        assert_eq!(config.observability.environment, "staging");
        assert_eq!(config.observability.version, "1.4.0");
        assert_eq!(config.observability.min_level(), LogLevel::Debug);
        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
    }

    #[test]
    fn test_app_env_wins_over_env() {
        let env = env_from(&[("APP_ENV", "prod"), ("ENV", "staging")]);
        let config = load_config_with(None, &Overrides::default(), env).unwrap();
        assert_eq!(config.observability.environment, "prod");
    }

    #[test]
    fn test_invalid_log_level_falls_back_to_info() {
        let env = env_from(&[("LOG_LEVEL", "not-a-level")]);
        let config = load_config_with(None, &Overrides::default(), env).unwrap();
        assert_eq!(config.observability.min_level(), LogLevel::Info);
    }

    #[test]
    fn test_file_then_env() {
        let path = std::env::temp_dir().join(format!("inference-config-{}.toml", std::process::id()));
        fs::write(
            &path,
            r#"
            [listener]
            bind_address = "127.0.0.1:7000"

            [observability]
            service_name = "from-file"
            version = "0.9.0"

            [model]
            epochs = 250
            "#,
        )
        .unwrap();

        let env = env_from(&[("APP_VERSION", "1.0.0")]);
        let config = load_config_with(Some(&path), &Overrides::default(), env).unwrap();
        fs::remove_file(&path).unwrap_or_default();

        assert_eq!(config.listener.bind_address, "127.0.0.1:7000");
        assert_eq!(config.observability.service_name, "from-file");
        assert_eq!(config.observability.version, "1.0.0");
        assert_eq!(config.model.epochs, 250);
        assert_eq!(config.model.learning_rate, 0.5);
    }

    #[test]
    fn test_validation_errors_surface() {
        let env = env_from(&[("BIND_ADDRESS", "nowhere")]);
        let err = load_config_with(None, &Overrides::default(), env).unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert_eq!(errors[0].field, "listener.bind_address"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bind_override_wins_over_env() {
        let overrides = Overrides {
            bind_address: Some("127.0.0.1:7777".to_string()),
        };
        let config =
            load_config_with(None, &overrides, env_from(&[("BIND_ADDRESS", "127.0.0.1:9000")]))
                .unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:7777");
    }

    #[test]
    fn test_bind_override_is_validated() {
        for bad in ["localhost:8000", "not-an-address"] {
            let overrides = Overrides {
                bind_address: Some(bad.to_string()),
            };
            match load_config_with(None, &overrides, env_from(&[])).unwrap_err() {
                ConfigError::Validation(errors) => {
                    assert_eq!(errors[0].field, "listener.bind_address")
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config_with(
            Some(Path::new("/definitely/not/here.toml")),
            &Overrides::default(),
            env_from(&[]),
        )
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
