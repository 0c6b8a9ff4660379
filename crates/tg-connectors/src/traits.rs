//! Connector trait definitions for Tenant Guard.
//!
//! Standards never talk HTTP themselves. They receive a [`GraphApi`] for
//! reading and writing tenant resources and a [`LicenseChecker`] for
//! capability lookups, so the same standard runs against Graph or a mock.

use crate::secure_string::SecureString;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Errors that can occur in connectors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectorError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u64),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConnectorError {
    /// Short machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            ConnectorError::AuthenticationFailed(_) => "authentication_failed",
            ConnectorError::AuthorizationDenied(_) => "authorization_denied",
            ConnectorError::ConnectionFailed(_) => "connection_failed",
            ConnectorError::RequestFailed(_) => "request_failed",
            ConnectorError::InvalidRequest(_) => "invalid_request",
            ConnectorError::RateLimited(_) => "rate_limited",
            ConnectorError::NotFound(_) => "not_found",
            ConnectorError::InvalidResponse(_) => "invalid_response",
            ConnectorError::ConfigError(_) => "config_error",
            ConnectorError::Timeout(_) => "timeout",
            ConnectorError::Internal(_) => "internal",
        }
    }
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Health status of a connector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorHealth {
    /// Connector is healthy and operational.
    Healthy,
    /// Connector is degraded but still functional.
    Degraded(String),
    /// Connector is unhealthy and not operational.
    Unhealthy(String),
}

/// Configuration for a connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Connector name/identifier.
    pub name: String,
    /// Base URL for the API.
    #[serde(default)]
    pub base_url: String,
    /// Authentication configuration.
    pub auth: AuthConfig,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Additional headers to include.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_timeout_secs() -> u64 {
    30
}

/// Authentication configuration.
///
/// Credential fields use `SecureString` so they are zeroized when dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    /// No authentication.
    None,
    /// Static bearer token.
    BearerToken {
        token: SecureString,
    },
    /// OAuth2 client credentials. `token_url` may contain a `{tenant}`
    /// placeholder that is replaced per tenant.
    #[serde(rename = "oauth2")]
    OAuth2 {
        client_id: String,
        client_secret: SecureString,
        token_url: String,
        scopes: Vec<String>,
    },
}

/// Base trait for all connectors.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Returns the connector name.
    fn name(&self) -> &str;

    /// Checks the health of the connector. Failures a caller can act on
    /// (bad credentials, missing consent) are reported as `Unhealthy`; only
    /// local problems such as an invalid tenant are returned as errors.
    async fn health_check(&self) -> ConnectorResult<ConnectorHealth>;
}

/// Tenant-scoped access to Microsoft Graph resources.
///
/// Paths are relative to the connector's base URL, e.g.
/// `/admin/sharepoint/settings`.
#[async_trait]
pub trait GraphApi: Send + Sync {
    /// Reads a resource as JSON.
    async fn get_json(&self, tenant: &str, path: &str) -> ConnectorResult<Value>;

    /// Patches a resource with a JSON body. Returns the response body, or
    /// `Value::Null` when Graph answers with no content.
    async fn patch_json(&self, tenant: &str, path: &str, body: &Value) -> ConnectorResult<Value>;
}

/// Looks up which service plan capabilities a tenant is licensed for.
#[async_trait]
pub trait LicenseChecker: Send + Sync {
    /// Returns the names of the tenant's active service plans.
    async fn tenant_capabilities(&self, tenant: &str) -> ConnectorResult<BTreeSet<String>>;

    /// Returns true if the tenant holds at least one of `required`. Lookup
    /// errors are passed through so callers can record them.
    async fn has_any_capability(&self, tenant: &str, required: &[&str]) -> ConnectorResult<bool> {
        let capabilities = self.tenant_capabilities(tenant).await?;
        Ok(required.iter().any(|c| capabilities.contains(*c)))
    }
}
