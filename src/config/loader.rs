//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file, apply environment
/// overrides and validate the result.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Environment variable carrying a service's base URL, e.g. `AUTH_SERVICE_URL`.
pub fn service_url_var(service: &str) -> String {
    format!("{}_SERVICE_URL", service.to_uppercase().replace('-', "_"))
}

/// Overlay environment values on top of file/default configuration.
///
/// `lookup` abstracts `std::env::var` so overrides can be tested without
/// touching the process environment.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    for service in &mut config.services {
        if let Some(url) = lookup(&service_url_var(&service.name)) {
            service.url = url;
        }
    }

    if let Some(secret) = lookup("JWT_SECRET") {
        config.auth.jwt_secret = secret;
    }

    if let Some(url) = lookup("REDIS_URL") {
        config.cache.url = url;
    }

    if let Some(addr) = lookup("GATEWAY_BIND_ADDRESS") {
        config.listener.bind_address = addr;
    } else if let Some(port) = lookup("PORT") {
        config.listener.bind_address = format!("0.0.0.0:{}", port);
    }

    if let Some(env) = lookup("GATEWAY_ENV") {
        config.security.expose_error_details = env.eq_ignore_ascii_case("development");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn service_url_variables() {
        assert_eq!(service_url_var("auth"), "AUTH_SERVICE_URL");
        assert_eq!(service_url_var("work-place"), "WORK_PLACE_SERVICE_URL");
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("AUTH_SERVICE_URL", "http://auth:4000"),
            ("JWT_SECRET", "s3cret"),
            ("REDIS_URL", "redis://cache:6380"),
            ("PORT", "9999"),
            ("GATEWAY_ENV", "development"),
        ]);

        let mut config = GatewayConfig::default();
        apply_env_overrides(&mut config, |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.service("auth").unwrap().url, "http://auth:4000");
        assert_eq!(config.service("todo").unwrap().url, "http://localhost:3005");
        assert_eq!(config.auth.jwt_secret, "s3cret");
        assert_eq!(config.cache.url, "redis://cache:6380");
        assert_eq!(config.listener.bind_address, "0.0.0.0:9999");
        assert!(config.security.expose_error_details);
    }

    #[test]
    fn bind_address_wins_over_port() {
        let env: HashMap<&str, &str> =
            HashMap::from([("GATEWAY_BIND_ADDRESS", "127.0.0.1:7000"), ("PORT", "9999")]);
        let mut config = GatewayConfig::default();
        apply_env_overrides(&mut config, |k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.listener.bind_address, "127.0.0.1:7000");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn validation_errors_are_joined() {
        let err = ConfigError::Validation(vec![
            ValidationError::MissingJwtSecret,
            ValidationError::DuplicatePrefix("/api".into()),
        ]);
        let text = err.to_string();
        assert!(text.starts_with("Validation failed: "));
        assert!(text.contains("jwt_secret"));
        assert!(text.contains(", duplicate route prefix '/api'"));
    }
}
