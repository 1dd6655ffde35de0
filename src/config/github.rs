use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Remote metrics API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GithubConfig {
    /// Base URL of the metrics API.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Value sent in the `X-GitHub-Api-Version` header.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Organizations to import snapshots for.
    #[serde(default)]
    pub orgs: Vec<String>,

    /// Secret key the bearer token is resolved under.
    /// With the default `env` secrets backend this is an environment
    /// variable name.
    #[serde(default = "default_token_secret")]
    pub token_secret: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl GithubConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base.is_empty() {
            return Err(ConfigError::Validation(
                "github.api_base cannot be empty".into(),
            ));
        }
        if self.token_secret.is_empty() {
            return Err(ConfigError::Validation(
                "github.token_secret cannot be empty".into(),
            ));
        }
        if self.orgs.iter().any(|org| org.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "github.orgs entries cannot be blank".into(),
            ));
        }
        Ok(())
    }
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_version: default_api_version(),
            orgs: Vec::new(),
            token_secret: default_token_secret(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_api_version() -> String {
    "2022-11-28".to_string()
}

fn default_token_secret() -> String {
    "GHCP_TOKEN".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}
