//! Configuration loading for the Tenant Guard CLI.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tg_connectors::{
    AuthConfig, ConnectorConfig, GraphConfig, SecureString, DEFAULT_TOKEN_URL, GRAPH_BETA_URL,
    GRAPH_DEFAULT_SCOPE,
};

/// Environment variable that overrides `graph.client_secret`.
pub const CLIENT_SECRET_ENV: &str = "TENANT_GUARD_CLIENT_SECRET";

const REDACTED: &str = "***REDACTED***";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Microsoft Graph access.
    #[serde(default)]
    pub graph: GraphSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl AppConfig {
    /// Loads configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Replaces the client secret with the environment override, if set.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(secret) = std::env::var(CLIENT_SECRET_ENV) {
            self = self.with_client_secret(&secret);
        }
        self
    }

    fn with_client_secret(mut self, secret: &str) -> Self {
        if !secret.is_empty() {
            self.graph.client_secret = SecureString::from(secret);
        }
        self
    }

    /// Creates a copy with secrets redacted.
    pub fn redact_secrets(&self) -> Self {
        let mut config = self.clone();
        if !config.graph.client_secret.is_empty() {
            config.graph.client_secret = SecureString::from(REDACTED);
        }
        config
    }

    /// Builds the Graph connector configuration. `tenant` is used for the
    /// connector's health check when no `tenant_id` is configured.
    pub fn graph_config(&self, tenant: &str) -> GraphConfig {
        let graph = &self.graph;
        GraphConfig {
            connector: ConnectorConfig {
                name: "graph".to_string(),
                base_url: graph.base_url.clone(),
                auth: AuthConfig::OAuth2 {
                    client_id: graph.client_id.clone(),
                    client_secret: graph.client_secret.clone(),
                    token_url: graph.token_url.clone(),
                    scopes: graph.scopes.clone(),
                },
                timeout_secs: graph.timeout_secs,
                headers: HashMap::new(),
            },
            tenant_id: if graph.tenant_id.is_empty() {
                tenant.to_string()
            } else {
                graph.tenant_id.clone()
            },
            requests_per_minute: graph.requests_per_minute,
        }
    }
}

/// Graph application registration and endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSettings {
    /// Graph API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Application (client) id.
    #[serde(default)]
    pub client_id: String,

    /// Client secret.
    #[serde(default)]
    pub client_secret: SecureString,

    /// Token endpoint; `{tenant}` is replaced per tenant.
    #[serde(default = "default_token_url")]
    pub token_url: String,

    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    /// Tenant used for health checks.
    #[serde(default)]
    pub tenant_id: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Requests per minute per tenant.
    #[serde(default)]
    pub requests_per_minute: Option<u32>,
}

fn default_base_url() -> String {
    GRAPH_BETA_URL.to_string()
}

fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

fn default_scopes() -> Vec<String> {
    vec![GRAPH_DEFAULT_SCOPE.to_string()]
}

fn default_timeout() -> u64 {
    30
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            client_id: String::new(),
            client_secret: SecureString::default(),
            token_url: default_token_url(),
            scopes: default_scopes(),
            tenant_id: String::new(),
            timeout_secs: default_timeout(),
            requests_per_minute: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to use JSON format.
    #[serde(default)]
    pub json_format: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.graph.base_url, GRAPH_BETA_URL);
        assert_eq!(config.graph.scopes, vec![GRAPH_DEFAULT_SCOPE]);
        assert_eq!(config.graph.timeout_secs, 30);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_redact_secrets() {
        let config = AppConfig::default().with_client_secret("s3cret");
        let redacted = config.redact_secrets();
        assert_eq!(redacted.graph.client_secret.expose_secret(), REDACTED);
        assert_eq!(config.graph.client_secret.expose_secret(), "s3cret");

        let yaml = serde_yaml::to_string(&redacted).unwrap();
        assert!(!yaml.contains("s3cret"));
    }

    #[test]
    fn test_empty_override_keeps_secret() {
        let config = AppConfig::default()
            .with_client_secret("from-file")
            .with_client_secret("");
        assert_eq!(config.graph.client_secret.expose_secret(), "from-file");
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
graph:
  client_id: 11111111-2222-3333-4444-555555555555
  client_secret: from-yaml
  requests_per_minute: 120

logging:
  level: debug
  json_format: true
"#;

        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.graph.client_id, "11111111-2222-3333-4444-555555555555");
        assert_eq!(config.graph.client_secret.expose_secret(), "from-yaml");
        assert_eq!(config.graph.token_url, DEFAULT_TOKEN_URL);
        assert_eq!(config.graph.requests_per_minute, Some(120));
        assert!(config.logging.json_format);
    }

    #[test]
    fn test_graph_config_uses_run_tenant() {
        let config = AppConfig::default();
        let graph = config.graph_config("fabrikam.onmicrosoft.com");
        assert_eq!(graph.tenant_id, "fabrikam.onmicrosoft.com");
        assert!(matches!(graph.connector.auth, AuthConfig::OAuth2 { .. }));

        let mut pinned = AppConfig::default();
        pinned.graph.tenant_id = "contoso.onmicrosoft.com".to_string();
        assert_eq!(
            pinned.graph_config("fabrikam.onmicrosoft.com").tenant_id,
            "contoso.onmicrosoft.com"
        );
    }
}
