//! Configuration management for the `mirror` binary.

use std::env;
use std::time::Duration;

/// Settings loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Namespace to sync (`MIRROR_NAMESPACE`)
    pub namespace: String,
    /// Field holding each item's key (`MIRROR_KEY_FIELD`)
    pub key_field: String,
    /// How long to wait for a snapshot to land (`MIRROR_READY_TIMEOUT_MS`)
    pub ready_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let namespace = lookup("MIRROR_NAMESPACE").unwrap_or_else(|| "items".to_string());
        if namespace.trim().is_empty() {
            return Err(ConfigError::EmptyNamespace);
        }

        let key_field = lookup("MIRROR_KEY_FIELD").unwrap_or_else(|| "id".to_string());
        if key_field.trim().is_empty() {
            return Err(ConfigError::EmptyKeyField);
        }

        let ready_timeout = lookup("MIRROR_READY_TIMEOUT_MS")
            .unwrap_or_else(|| "5000".to_string())
            .parse()
            .map(Duration::from_millis)
            .map_err(|_| ConfigError::InvalidReadyTimeout)?;

        Ok(Self {
            namespace,
            key_field,
            ready_timeout,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("MIRROR_NAMESPACE must not be empty")]
    EmptyNamespace,

    #[error("MIRROR_KEY_FIELD must not be empty")]
    EmptyKeyField,

    #[error("Invalid MIRROR_READY_TIMEOUT_MS value")]
    InvalidReadyTimeout,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.namespace, "items");
        assert_eq!(config.key_field, "id");
        assert_eq!(config.ready_timeout, Duration::from_millis(5000));
    }

    #[test]
    fn overrides() {
        let config = Config::from_lookup(lookup(&[
            ("MIRROR_NAMESPACE", "todos"),
            ("MIRROR_KEY_FIELD", "uuid"),
            ("MIRROR_READY_TIMEOUT_MS", "250"),
        ]))
        .unwrap();

        assert_eq!(config.namespace, "todos");
        assert_eq!(config.key_field, "uuid");
        assert_eq!(config.ready_timeout, Duration::from_millis(250));
    }

    #[test]
    fn invalid_timeout() {
        let result = Config::from_lookup(lookup(&[("MIRROR_READY_TIMEOUT_MS", "soon")]));
        assert!(matches!(result, Err(ConfigError::InvalidReadyTimeout)));
    }

    #[test]
    fn empty_namespace() {
        let result = Config::from_lookup(lookup(&[("MIRROR_NAMESPACE", " ")]));
        assert!(matches!(result, Err(ConfigError::EmptyNamespace)));
    }
}
