use serde::{Deserialize, Serialize};

/// Configuration for the secrets backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SecretsConfig {
    /// Environment variable-based secrets.
    /// Keys are looked up directly as environment variable names.
    #[default]
    Env,

    /// In-memory secrets, seeded from config. Intended for testing.
    Memory {
        #[serde(default)]
        values: std::collections::HashMap<String, String>,
    },
}
