//! Configuration for enforcement instances
//!
//! Values come from defaults, then an optional TOML or JSON file, then
//! `KEYGUARD_*` environment variables, and are validated last.

use crate::errors::{KeyguardError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Core trait for Keyguard configuration types
pub trait KeyguardConfig: Clone + Default + Send + Sync + 'static {
    /// Get default configuration values
    fn defaults() -> Self {
        Self::default()
    }

    /// Load configuration from a `.toml` or `.json` file
    fn load_from_file(path: &Path) -> Result<Self>;

    /// Merge with environment variables
    fn merge_with_env(&mut self) -> Result<()>;

    /// Validate the configuration
    fn validate(&self) -> Result<()>;

    /// Defaults, then file, then environment, then validation.
    fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::defaults(),
        };
        config.merge_with_env()?;
        config.validate()?;
        Ok(config)
    }
}

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "KEYGUARD_";

/// Tunables of one enforcement engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnforcementConfig {
    /// Capacity of the last-access-time tracker
    pub max_access_time_map_size: usize,
    /// Capacity of the per-boot use-count tracker
    pub max_access_count_map_size: usize,
    /// How far a peer's timestamp may run ahead of the local clock
    pub max_timestamp_skew_ms: u64,
    /// Whether software-enforced tags are enforced alongside hardware-enforced ones
    pub enforce_software_enforced_tags: bool,
}

impl Default for EnforcementConfig {
    fn default() -> Self {
        Self {
            max_access_time_map_size: 32,
            max_access_count_map_size: 32,
            max_timestamp_skew_ms: 1000,
            enforce_software_enforced_tags: true,
        }
    }
}

impl EnforcementConfig {
    /// Apply `KEYGUARD_*` overrides from an explicit variable list.
    pub fn merge_with_vars<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.as_ref();
            match name {
                "MAX_ACCESS_TIME_MAP_SIZE" => {
                    self.max_access_time_map_size = parse_var(name, value)?;
                }
                "MAX_ACCESS_COUNT_MAP_SIZE" => {
                    self.max_access_count_map_size = parse_var(name, value)?;
                }
                "MAX_TIMESTAMP_SKEW_MS" => {
                    self.max_timestamp_skew_ms = parse_var(name, value)?;
                }
                "ENFORCE_SOFTWARE_ENFORCED_TAGS" => {
                    self.enforce_software_enforced_tags = parse_var(name, value)?;
                }
                _ => {
                    tracing::debug!(variable = name, "ignoring unknown keyguard variable");
                }
            }
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        KeyguardError::invalid(format!("Invalid value for {ENV_PREFIX}{name}: {value}"))
    })
}

impl KeyguardConfig for EnforcementConfig {
    fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| KeyguardError::config(format!("Failed to read config file: {e}")))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&content)
                .map_err(|e| KeyguardError::invalid(format!("Invalid TOML: {e}"))),
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| KeyguardError::invalid(format!("Invalid JSON: {e}"))),
            _ => Err(KeyguardError::invalid("Unsupported file format")),
        }
    }

    fn merge_with_env(&mut self) -> Result<()> {
        self.merge_with_vars(std::env::vars())
    }

    fn validate(&self) -> Result<()> {
        if self.max_access_time_map_size == 0 {
            return Err(KeyguardError::invalid(
                "max_access_time_map_size must be at least 1",
            ));
        }
        if self.max_access_count_map_size == 0 {
            return Err(KeyguardError::invalid(
                "max_access_count_map_size must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = EnforcementConfig::defaults();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_access_time_map_size, 32);
        assert!(config.enforce_software_enforced_tags);
    }

    #[test]
    fn test_load_partial_toml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "max_access_count_map_size = 4").unwrap();
        writeln!(file, "max_timestamp_skew_ms = 250").unwrap();

        let config = EnforcementConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.max_access_count_map_size, 4);
        assert_eq!(config.max_timestamp_skew_ms, 250);
        assert_eq!(config.max_access_time_map_size, 32);
    }

    #[test]
    fn test_load_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"enforce_software_enforced_tags": false}}"#).unwrap();

        let config = EnforcementConfig::load_from_file(file.path()).unwrap();
        assert!(!config.enforce_software_enforced_tags);
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        assert_matches!(
            EnforcementConfig::load_from_file(file.path()),
            Err(KeyguardError::Invalid { .. })
        );
    }

    #[test]
    fn test_var_overrides() {
        let mut config = EnforcementConfig::default();
        config
            .merge_with_vars([
                ("KEYGUARD_MAX_ACCESS_TIME_MAP_SIZE", "8"),
                ("KEYGUARD_ENFORCE_SOFTWARE_ENFORCED_TAGS", "false"),
                ("UNRELATED", "x"),
            ])
            .unwrap();
        assert_eq!(config.max_access_time_map_size, 8);
        assert!(!config.enforce_software_enforced_tags);

        assert!(config
            .merge_with_vars([("KEYGUARD_MAX_TIMESTAMP_SKEW_MS", "soon")])
            .is_err());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = EnforcementConfig {
            max_access_count_map_size: 0,
            ..EnforcementConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
