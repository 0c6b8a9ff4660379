//! Configuration validation for Tenant Guard.
//!
//! Checks that the Graph application registration and logging settings are
//! usable before any tenant is contacted.

use crate::config::{AppConfig, CLIENT_SECRET_ENV};
use colored::Colorize;
use tg_connectors::{normalize_error, ConnectorHealth, ConnectorResult, GRAPH_BETA_URL};

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Errors that make runs against live tenants impossible.
    pub errors: Vec<String>,
    /// Warnings that should be addressed.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Prints the validation result to the console.
    pub fn print(&self) {
        if !self.warnings.is_empty() {
            println!();
            println!("{}", "Configuration Warnings:".yellow().bold());
            for warning in &self.warnings {
                println!("  {} {}", "⚠".yellow(), warning);
            }
        }

        if !self.errors.is_empty() {
            println!();
            println!("{}", "Configuration Errors:".red().bold());
            for error in &self.errors {
                println!("  {} {}", "✗".red(), error);
            }
        }

        if self.errors.is_empty() && self.warnings.is_empty() {
            println!("  {} Configuration OK", "✓".green());
        }
    }
}

/// Validates application configuration.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates the application configuration.
    pub fn validate(config: &AppConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        Self::validate_credentials(config, &mut result);
        Self::validate_endpoints(config, &mut result);
        Self::validate_limits(config, &mut result);
        Self::validate_logging(config, &mut result);

        result
    }

    /// Folds a Graph health check into the result.
    pub fn record_connection(
        result: &mut ValidationResult,
        health: ConnectorResult<ConnectorHealth>,
    ) {
        match health {
            Ok(ConnectorHealth::Healthy) => {}
            Ok(ConnectorHealth::Degraded(reason)) => {
                result.add_warning(format!("Graph connection is degraded: {}", reason))
            }
            Ok(ConnectorHealth::Unhealthy(reason)) => {
                result.add_error(format!("Graph connection failed: {}", reason))
            }
            Err(e) => result.add_error(format!(
                "Could not check the Graph connection: {}",
                normalize_error(&e)
            )),
        }
    }

    fn validate_credentials(config: &AppConfig, result: &mut ValidationResult) {
        let graph = &config.graph;

        if graph.client_id.is_empty() {
            result.add_error(
                "Missing required config: graph.client_id. \
                 Set it to the application (client) id of the Entra ID app registration.",
            );
        } else if !looks_like_guid(&graph.client_id) {
            result.add_warning(format!(
                "graph.client_id '{}' does not look like an application id (GUID)",
                graph.client_id
            ));
        }

        if graph.client_secret.is_empty() {
            result.add_error(format!(
                "Missing required config: graph.client_secret. \
                 Set it in the config file or the {} environment variable.",
                CLIENT_SECRET_ENV
            ));
        }

        if !graph.tenant_id.is_empty() && !valid_tenant(&graph.tenant_id) {
            result.add_error(format!(
                "Invalid graph.tenant_id '{}'. Use a tenant GUID or domain name.",
                graph.tenant_id
            ));
        }
    }

    fn validate_endpoints(config: &AppConfig, result: &mut ValidationResult) {
        let graph = &config.graph;

        if !graph.base_url.starts_with("https://") {
            result.add_error(format!(
                "Invalid graph.base_url '{}'. Must start with https://",
                graph.base_url
            ));
        } else if graph.base_url.trim_end_matches('/') != GRAPH_BETA_URL {
            result.add_warning(format!(
                "graph.base_url '{}' is not the Graph beta endpoint. \
                 The SharePoint settings resource is only served from {}.",
                graph.base_url, GRAPH_BETA_URL
            ));
        }

        if !graph.token_url.starts_with("https://") {
            result.add_error(format!(
                "Invalid graph.token_url '{}'. Must start with https://",
                graph.token_url
            ));
        }
        if !graph.token_url.contains("{tenant}") {
            result.add_warning(
                "graph.token_url has no {tenant} placeholder. \
                 Every tenant will request tokens from the same authority.",
            );
        }

        if graph.scopes.is_empty() {
            result.add_error("graph.scopes must contain at least one scope");
        }
    }

    fn validate_limits(config: &AppConfig, result: &mut ValidationResult) {
        let graph = &config.graph;

        if graph.timeout_secs == 0 {
            result.add_error("graph.timeout_secs must be greater than zero");
        } else if graph.timeout_secs > 300 {
            result.add_warning(format!(
                "graph.timeout_secs is {}. Requests may hang for a long time.",
                graph.timeout_secs
            ));
        }

        if graph.requests_per_minute == Some(0) {
            result.add_error("graph.requests_per_minute must be greater than zero when set");
        }
    }

    fn validate_logging(config: &AppConfig, result: &mut ValidationResult) {
        if config.logging.level.parse::<tracing::Level>().is_err() {
            result.add_error(format!(
                "Invalid logging.level '{}'. Must be one of: trace, debug, info, warn, error",
                config.logging.level
            ));
        }
    }
}

fn looks_like_guid(value: &str) -> bool {
    let groups: Vec<&str> = value.split('-').collect();
    groups.len() == 5
        && groups
            .iter()
            .zip([8, 4, 4, 4, 12])
            .all(|(g, len)| g.len() == len && g.chars().all(|c| c.is_ascii_hexdigit()))
}

fn valid_tenant(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tg_connectors::{Connector, ConnectorError, MockGraphConnector, SecureString};

    fn valid_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.graph.client_id = "11111111-2222-3333-4444-555555555555".to_string();
        config.graph.client_secret = SecureString::from("secret");
        config
    }

    #[test]
    fn test_validation_result_operations() {
        let mut result = ValidationResult::new();
        assert!(!result.has_errors());
        assert!(!result.has_warnings());

        result.add_error("Test error");
        result.add_warning("Test warning");
        assert!(result.has_errors());
        assert!(result.has_warnings());
    }

    #[test]
    fn test_valid_config() {
        let result = ConfigValidator::validate(&valid_config());
        assert!(!result.has_errors(), "{:?}", result.errors);
        assert!(!result.has_warnings(), "{:?}", result.warnings);
    }

    #[test]
    fn test_default_config_lacks_credentials() {
        let result = ConfigValidator::validate(&AppConfig::default());
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[1].contains(CLIENT_SECRET_ENV));
    }

    #[test]
    fn test_client_id_format_warning() {
        let mut config = valid_config();
        config.graph.client_id = "my-app".to_string();

        let mut result = ValidationResult::new();
        ConfigValidator::validate_credentials(&config, &mut result);
        assert!(!result.has_errors());
        assert!(result.has_warnings());
    }

    #[test]
    fn test_plain_http_rejected() {
        let mut config = valid_config();
        config.graph.base_url = "http://graph.microsoft.com/beta".to_string();

        let mut result = ValidationResult::new();
        ConfigValidator::validate_endpoints(&config, &mut result);
        assert!(result.has_errors());
    }

    #[test]
    fn test_v1_endpoint_warns() {
        let mut config = valid_config();
        config.graph.base_url = "https://graph.microsoft.com/v1.0".to_string();

        let mut result = ValidationResult::new();
        ConfigValidator::validate_endpoints(&config, &mut result);
        assert!(!result.has_errors());
        assert!(result.warnings[0].contains("beta"));
    }

    #[test]
    fn test_zero_limits_rejected() {
        let mut config = valid_config();
        config.graph.timeout_secs = 0;
        config.graph.requests_per_minute = Some(0);

        let mut result = ValidationResult::new();
        ConfigValidator::validate_limits(&config, &mut result);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = valid_config();
        config.logging.level = "verbose".to_string();

        let mut result = ValidationResult::new();
        ConfigValidator::validate_logging(&config, &mut result);
        assert!(result.has_errors());
    }

    #[test]
    fn test_record_connection() {
        let mut result = ValidationResult::new();
        ConfigValidator::record_connection(&mut result, Ok(ConnectorHealth::Healthy));
        assert!(!result.has_errors());
        assert!(!result.has_warnings());

        ConfigValidator::record_connection(
            &mut result,
            Ok(ConnectorHealth::Degraded("Rate limited".to_string())),
        );
        assert_eq!(result.warnings, vec!["Graph connection is degraded: Rate limited"]);
        assert!(!result.has_errors());

        ConfigValidator::record_connection(
            &mut result,
            Ok(ConnectorHealth::Unhealthy("Authentication failed".to_string())),
        );
        assert_eq!(result.errors, vec!["Graph connection failed: Authentication failed"]);
    }

    #[test]
    fn test_record_connection_error_is_normalized() {
        let mut result = ValidationResult::new();
        ConfigValidator::record_connection(
            &mut result,
            Err(ConnectorError::InvalidRequest("Invalid tenant: evil/..".to_string())),
        );
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("Could not check the Graph connection: "));
        assert!(result.errors[0].contains("Invalid tenant"));
    }

    #[tokio::test]
    async fn test_record_connection_from_mock() {
        let mock = MockGraphConnector::new("mock");
        mock.fail_reads(Some(ConnectorError::AuthenticationFailed(
            "AADSTS7000215: Invalid client secret provided.".to_string(),
        )))
        .await;

        let mut result = ValidationResult::new();
        ConfigValidator::record_connection(&mut result, mock.health_check().await);
        assert!(result.has_errors());
    }

    #[test]
    fn test_guid_check() {
        assert!(looks_like_guid("11111111-2222-3333-4444-555555555555"));
        assert!(!looks_like_guid("11111111-2222-3333-4444"));
        assert!(!looks_like_guid("zzzzzzzz-2222-3333-4444-555555555555"));
    }
}
