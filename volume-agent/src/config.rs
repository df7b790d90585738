//! Configuration management for the volume agent.
//!
//! Loads configuration from a TOML file with environment variable overrides.

use crate::utils::errors::{AgentError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub health: HealthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Node this agent instance serves
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// Namespace holding volume backup and restore records
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Host directory with one subdirectory per pod scheduled on this node
    #[serde(default = "default_host_pods_dir")]
    pub host_pods_dir: PathBuf,

    /// Check the host pods directory against running pods at startup
    #[serde(default)]
    pub validate_host_path: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Base URL of the record store API
    #[serde(default = "default_store_url")]
    pub url: String,

    /// Bearer token; takes precedence over `token_file`
    #[serde(default)]
    pub token: Option<String>,

    /// File holding the bearer token
    #[serde(default = "default_token_file")]
    pub token_file: Option<PathBuf>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Port of the health endpoint
    #[serde(default = "default_health_port")]
    pub port: u16,
}

// Default values
fn default_node_name() -> String {
    std::env::var("NODE_NAME")
        .ok()
        .filter(|name| !name.is_empty())
        .or_else(|| hostname::get().ok().and_then(|h| h.into_string().ok()))
        .unwrap_or_default()
}

fn default_namespace() -> String {
    "backup-system".to_string()
}

fn default_host_pods_dir() -> PathBuf {
    PathBuf::from("/host_pods")
}

fn default_store_url() -> String {
    "https://kubernetes.default.svc".to_string()
}

fn default_token_file() -> Option<PathBuf> {
    Some(PathBuf::from(
        "/var/run/secrets/kubernetes.io/serviceaccount/token",
    ))
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_health_port() -> u16 {
    8085
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            node_name: default_node_name(),
            namespace: default_namespace(),
            host_pods_dir: default_host_pods_dir(),
            validate_host_path: false,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            token: None,
            token_file: default_token_file(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            port: default_health_port(),
        }
    }
}

impl StoreConfig {
    /// The configured token, or the contents of `token_file` if it exists.
    pub fn resolve_token(&self) -> Result<Option<String>> {
        if let Some(token) = self.token.as_ref().filter(|t| !t.is_empty()) {
            return Ok(Some(token.clone()));
        }

        let Some(path) = &self.token_file else {
            return Ok(None);
        };
        if !path.exists() {
            tracing::debug!(path = %path.display(), "token file not present, using anonymous access");
            return Ok(None);
        }

        let token = std::fs::read_to_string(path).map_err(|e| {
            AgentError::Config(format!("failed to read token file {}: {e}", path.display()))
        })?;
        Ok(Some(token.trim().to_string()))
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply `NODE_NAME`, `AGENT_NAMESPACE`, `STORE_URL` and `STORE_TOKEN`.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(node_name) = lookup("NODE_NAME") {
            self.agent.node_name = node_name;
        }
        if let Some(namespace) = lookup("AGENT_NAMESPACE") {
            self.agent.namespace = namespace;
        }
        if let Some(url) = lookup("STORE_URL") {
            self.store.url = url;
        }
        if let Some(token) = lookup("STORE_TOKEN") {
            self.store.token = Some(token);
        }
    }

    /// Reject configurations the agent cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.agent.node_name.is_empty() {
            return Err(AgentError::Config(
                "node name is empty; set NODE_NAME or agent.node_name".to_string(),
            ));
        }
        if self.agent.namespace.is_empty() {
            return Err(AgentError::Config("agent.namespace is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_partial_file_uses_defaults() -> anyhow::Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(
            file,
            r#"
[agent]
node_name = "node-1"
validate_host_path = true

[store]
url = "https://10.0.0.1:6443"
"#
        )?;

        let config = Config::from_file(file.path())?;
        assert_eq!(config.agent.node_name, "node-1");
        assert_eq!(config.agent.namespace, "backup-system");
        assert!(config.agent.validate_host_path);
        assert_eq!(config.store.url, "https://10.0.0.1:6443");
        assert_eq!(config.store.timeout_secs, 30);
        assert_eq!(config.log.level, "info");
        assert_eq!(config.health.port, 8085);
        Ok(())
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("NODE_NAME", "node-7"),
            ("AGENT_NAMESPACE", "backups"),
            ("STORE_TOKEN", "abc"),
            ("STORE_URL", ""),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        let url = config.store.url.clone();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.agent.node_name, "node-7");
        assert_eq!(config.agent.namespace, "backups");
        assert_eq!(config.store.token.as_deref(), Some("abc"));
        assert_eq!(config.store.url, url);
    }

    #[test]
    fn test_token_file() -> anyhow::Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "token-from-file")?;

        let config = StoreConfig {
            token: None,
            token_file: Some(file.path().to_path_buf()),
            ..StoreConfig::default()
        };
        assert_eq!(config.resolve_token()?.as_deref(), Some("token-from-file"));

        let missing = StoreConfig {
            token: None,
            token_file: Some(PathBuf::from("/nonexistent/token")),
            ..StoreConfig::default()
        };
        assert_eq!(missing.resolve_token()?, None);
        Ok(())
    }

    #[test]
    fn test_validate_requires_node_name() {
        let mut config = Config::default();
        config.agent.node_name.clear();
        assert!(matches!(config.validate(), Err(AgentError::Config(_))));
    }
}
