//! Secrets management for the metrics API bearer token.
//!
//! Supports two backends:
//! - Environment variables (default)
//! - In-memory (for testing)

use async_trait::async_trait;
use thiserror::Error;

use crate::config::SecretsConfig;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("Secret not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type SecretResult<T> = Result<T, SecretError>;

/// Trait for resolving secrets (API tokens, etc.)
#[async_trait]
pub trait SecretManager: Send + Sync {
    /// Get a secret by key. Returns None if not found.
    async fn get(&self, key: &str) -> SecretResult<Option<String>>;

    /// Set a secret. Not all backends support this.
    async fn set(&self, key: &str, value: &str) -> SecretResult<()>;
}

/// Build a secret manager from configuration.
pub fn from_config(config: &SecretsConfig) -> Box<dyn SecretManager> {
    match config {
        SecretsConfig::Env => Box::new(EnvSecretManager::new()),
        SecretsConfig::Memory { values } => {
            let manager = MemorySecretManager::new();
            for (key, value) in values {
                manager.secrets.insert(key.clone(), value.clone());
            }
            Box::new(manager)
        }
    }
}

/// In-memory secret manager (for testing only)
pub struct MemorySecretManager {
    secrets: std::sync::Arc<dashmap::DashMap<String, String>>,
}

impl MemorySecretManager {
    pub fn new() -> Self {
        Self {
            secrets: std::sync::Arc::new(dashmap::DashMap::new()),
        }
    }
}

impl Default for MemorySecretManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretManager for MemorySecretManager {
    async fn get(&self, key: &str) -> SecretResult<Option<String>> {
        Ok(self.secrets.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: &str) -> SecretResult<()> {
        self.secrets.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Environment-based secret manager (reads from env vars)
pub struct EnvSecretManager;

impl EnvSecretManager {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EnvSecretManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretManager for EnvSecretManager {
    async fn get(&self, key: &str) -> SecretResult<Option<String>> {
        Ok(std::env::var(key).ok())
    }

    async fn set(&self, _key: &str, _value: &str) -> SecretResult<()> {
        Err(SecretError::Internal(
            "Cannot set secrets in environment manager".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_manager_round_trips() {
        let manager = MemorySecretManager::new();
        assert_eq!(manager.get("GHCP_TOKEN").await.unwrap(), None);

        manager.set("GHCP_TOKEN", "ghp_test").await.unwrap();
        assert_eq!(
            manager.get("GHCP_TOKEN").await.unwrap().as_deref(),
            Some("ghp_test")
        );
    }

    #[tokio::test]
    async fn env_manager_reads_variables() {
        temp_env::async_with_vars([("TRAJAN_SECRET_TEST", Some("value"))], async {
            let manager = EnvSecretManager::new();
            assert_eq!(
                manager.get("TRAJAN_SECRET_TEST").await.unwrap().as_deref(),
                Some("value")
            );
        })
        .await;
    }

    #[tokio::test]
    async fn env_manager_rejects_writes() {
        let manager = EnvSecretManager::new();
        assert!(manager.set("KEY", "value").await.is_err());
    }
}
