//! Testing helpers for connectors and standards.

use crate::graph::{GraphConfig, DEFAULT_TOKEN_URL, GRAPH_BETA_URL, GRAPH_DEFAULT_SCOPE};
use crate::traits::{AuthConfig, ConnectorConfig, ConnectorHealth, ConnectorResult};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Creates a test connector config with no authentication.
pub fn test_connector_config(name: &str, base_url: &str) -> ConnectorConfig {
    ConnectorConfig {
        name: name.to_string(),
        base_url: base_url.to_string(),
        auth: AuthConfig::None,
        timeout_secs: 30,
        headers: HashMap::new(),
    }
}

/// Creates a Graph config with placeholder client credentials.
pub fn test_graph_config() -> GraphConfig {
    GraphConfig {
        connector: ConnectorConfig {
            name: "graph".to_string(),
            base_url: GRAPH_BETA_URL.to_string(),
            auth: AuthConfig::OAuth2 {
                client_id: "00000000-0000-0000-0000-000000000000".to_string(),
                client_secret: crate::SecureString::from("test-secret"),
                token_url: DEFAULT_TOKEN_URL.to_string(),
                scopes: vec![GRAPH_DEFAULT_SCOPE.to_string()],
            },
            timeout_secs: 30,
            headers: HashMap::new(),
        },
        tenant_id: "contoso.onmicrosoft.com".to_string(),
        requests_per_minute: None,
    }
}

/// A SharePoint settings body shaped like Graph's response.
pub fn sample_sharepoint_settings(mode: &str, allowed: &[&str], blocked: &[&str]) -> Value {
    json!({
        "@odata.context": "https://graph.microsoft.com/beta/$metadata#admin/sharepoint/settings/$entity",
        "sharingCapability": "externalUserAndGuestSharing",
        "sharingDomainRestrictionMode": mode,
        "sharingAllowedDomainList": allowed,
        "sharingBlockedDomainList": blocked,
        "isResharingByExternalUsersEnabled": false
    })
}

/// Asserts that a connector health check returns healthy.
pub fn assert_healthy(result: &ConnectorResult<ConnectorHealth>) {
    match result {
        Ok(ConnectorHealth::Healthy) => {}
        other => panic!("Expected Healthy, got {:?}", other),
    }
}
