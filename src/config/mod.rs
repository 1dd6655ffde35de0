//! Configuration module for the metrics hub.
//!
//! The hub is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax.
//!
//! # Example
//!
//! ```toml
//! [database]
//! path = "trajan.db"
//!
//! [github]
//! orgs = ["acme-corp", "acme-labs"]
//! token_secret = "GHCP_TOKEN"
//! ```

mod database;
mod github;
mod observability;
mod scheduler;
mod secrets;

use std::path::Path;

pub use database::*;
pub use github::*;
pub use observability::*;
pub use scheduler::*;
pub use secrets::*;
use serde::{Deserialize, Serialize};

/// Root configuration for the metrics hub.
///
/// All sections are optional with sensible defaults, allowing minimal
/// configuration for simple deployments; only the organization list has
/// no useful default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HubConfig {
    /// SQLite storage for imported snapshots.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Remote metrics API configuration.
    #[serde(default)]
    pub github: GithubConfig,

    /// Secrets backend supplying the API bearer token.
    #[serde(default)]
    pub secrets: SecretsConfig,

    /// Periodic auto-import configuration.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Observability configuration (logging).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl HubConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing required variables will cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;

        let config: HubConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration for consistency and completeness.
    fn validate(&self) -> Result<(), ConfigError> {
        self.database.validate()?;
        self.github.validate()?;
        self.scheduler.validate()?;
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// Expand environment variables in the format `${VAR_NAME}`.
/// Skips commented lines (variables that appear after a `#` are left as-is).
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');

        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in re.captures_iter(line) {
            let whole = cap.get(0).unwrap();

            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            line_result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            line_result.push_str(&value);

            last_end = whole.end();
        }

        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = HubConfig::from_str("").expect("empty config");
        assert_eq!(config.database.path, "trajan.db");
        assert_eq!(config.github.api_base, "https://api.github.com");
        assert!(!config.scheduler.enabled);
    }

    #[test]
    fn expands_env_vars() {
        temp_env::with_var("TRAJAN_TEST_DB", Some("/tmp/metrics.db"), || {
            let config = HubConfig::from_str(
                r#"
                [database]
                path = "${TRAJAN_TEST_DB}"
                "#,
            )
            .expect("config with env var");
            assert_eq!(config.database.path, "/tmp/metrics.db");
        });
    }

    #[test]
    fn missing_env_var_is_an_error() {
        let err = HubConfig::from_str(r#"path = "${TRAJAN_DOES_NOT_EXIST}""#).unwrap_err();
        assert!(matches!(err, ConfigError::EnvVarNotFound(name) if name == "TRAJAN_DOES_NOT_EXIST"));
    }

    #[test]
    fn commented_vars_are_not_expanded() {
        let expanded =
            expand_env_vars("orgs = []  # set via ${TRAJAN_ORG_LIST} later").expect("expansion");
        assert!(expanded.contains("${TRAJAN_ORG_LIST}"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(HubConfig::from_str("[databse]\npath = \"x\"").is_err());
    }
}
