//! Mock Graph connector for testing and dry runs.
//!
//! Serves the SharePoint settings resource and tenant capabilities from
//! memory and records every call so tests can assert on exactly what a
//! standard touched.

use crate::graph::{SHAREPOINT_SETTINGS_PATH, SUBSCRIBED_SKUS_PATH};
use crate::traits::{
    Connector, ConnectorError, ConnectorHealth, ConnectorResult, GraphApi, LicenseChecker,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tg_core::{SharePointSettings, SharingSettingsPatch};
use tokio::sync::RwLock;

/// Kind of call made against the mock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphMethod {
    Get,
    Patch,
    LicenseLookup,
}

/// A recorded call.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphCall {
    pub method: GraphMethod,
    pub tenant: String,
    pub path: String,
    pub body: Option<Value>,
}

pub struct MockGraphConnector {
    name: String,
    sharepoint: Arc<RwLock<SharePointSettings>>,
    capabilities: Arc<RwLock<BTreeSet<String>>>,
    read_error: Arc<RwLock<Option<ConnectorError>>>,
    license_error: Arc<RwLock<Option<ConnectorError>>>,
    write_error: Arc<RwLock<Option<ConnectorError>>>,
    calls: Arc<RwLock<Vec<GraphCall>>>,
}

impl MockGraphConnector {
    /// Creates a mock with default settings and no licenses.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            sharepoint: Arc::new(RwLock::new(SharePointSettings::default())),
            capabilities: Arc::new(RwLock::new(BTreeSet::new())),
            read_error: Arc::new(RwLock::new(None)),
            license_error: Arc::new(RwLock::new(None)),
            write_error: Arc::new(RwLock::new(None)),
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Creates a licensed mock serving the given settings.
    pub fn with_settings(name: &str, settings: SharePointSettings) -> Self {
        let mut mock = Self::new(name);
        mock.sharepoint = Arc::new(RwLock::new(settings));
        mock.capabilities = Arc::new(RwLock::new(
            ["SHAREPOINTENTERPRISE".to_string()].into_iter().collect(),
        ));
        mock
    }

    /// Replaces the stored SharePoint settings.
    pub async fn set_settings(&self, settings: SharePointSettings) {
        *self.sharepoint.write().await = settings;
    }

    /// Returns the stored SharePoint settings.
    pub async fn settings(&self) -> SharePointSettings {
        self.sharepoint.read().await.clone()
    }

    /// Replaces the tenant's capabilities.
    pub async fn set_capabilities(&self, capabilities: &[&str]) {
        *self.capabilities.write().await = capabilities.iter().map(|c| c.to_string()).collect();
    }

    /// Makes reads fail with `error`, or succeed again with `None`.
    pub async fn fail_reads(&self, error: Option<ConnectorError>) {
        *self.read_error.write().await = error;
    }

    /// Makes capability lookups fail with `error`, or succeed again with `None`.
    pub async fn fail_license_lookups(&self, error: Option<ConnectorError>) {
        *self.license_error.write().await = error;
    }

    /// Makes writes fail with `error`, or succeed again with `None`.
    pub async fn fail_writes(&self, error: Option<ConnectorError>) {
        *self.write_error.write().await = error;
    }

    /// Returns all recorded calls.
    pub async fn calls(&self) -> Vec<GraphCall> {
        self.calls.read().await.clone()
    }

    /// Returns the recorded calls of one kind.
    pub async fn calls_of(&self, method: GraphMethod) -> Vec<GraphCall> {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    /// Forgets recorded calls.
    pub async fn clear_calls(&self) {
        self.calls.write().await.clear();
    }

    async fn record(&self, method: GraphMethod, tenant: &str, path: &str, body: Option<Value>) {
        self.calls.write().await.push(GraphCall {
            method,
            tenant: tenant.to_string(),
            path: path.to_string(),
            body,
        });
    }
}

#[async_trait]
impl Connector for MockGraphConnector {
    fn name(&self) -> &str {
        &self.name
    }

    /// Unhealthy while reads are failing.
    async fn health_check(&self) -> ConnectorResult<ConnectorHealth> {
        Ok(match self.read_error.read().await.as_ref() {
            Some(ConnectorError::RateLimited(_)) => {
                ConnectorHealth::Degraded("Rate limited".to_string())
            }
            Some(e) => ConnectorHealth::Unhealthy(e.to_string()),
            None => ConnectorHealth::Healthy,
        })
    }
}

#[async_trait]
impl GraphApi for MockGraphConnector {
    async fn get_json(&self, tenant: &str, path: &str) -> ConnectorResult<Value> {
        self.record(GraphMethod::Get, tenant, path, None).await;
        if let Some(error) = self.read_error.read().await.clone() {
            return Err(error);
        }
        match path {
            SHAREPOINT_SETTINGS_PATH => serde_json::to_value(&*self.sharepoint.read().await)
                .map_err(|e| ConnectorError::Internal(e.to_string())),
            _ => Err(ConnectorError::NotFound(format!("Unknown resource: {}", path))),
        }
    }

    async fn patch_json(&self, tenant: &str, path: &str, body: &Value) -> ConnectorResult<Value> {
        self.record(GraphMethod::Patch, tenant, path, Some(body.clone()))
            .await;
        if let Some(error) = self.write_error.read().await.clone() {
            return Err(error);
        }
        match path {
            SHAREPOINT_SETTINGS_PATH => {
                let patch: SharingSettingsPatch = serde_json::from_value(body.clone())
                    .map_err(|e| ConnectorError::RequestFailed(format!("Bad request: {}", e)))?;
                self.sharepoint.write().await.apply_patch(&patch);
                Ok(Value::Null)
            }
            _ => Err(ConnectorError::NotFound(format!("Unknown resource: {}", path))),
        }
    }
}

#[async_trait]
impl LicenseChecker for MockGraphConnector {
    async fn tenant_capabilities(&self, tenant: &str) -> ConnectorResult<BTreeSet<String>> {
        self.record(GraphMethod::LicenseLookup, tenant, SUBSCRIBED_SKUS_PATH, None)
            .await;
        if let Some(error) = self.license_error.read().await.clone() {
            return Err(error);
        }
        Ok(self.capabilities.read().await.clone())
    }
}
