//! Alert and compliance report collaborators.
//!
//! Standards hand their findings to two sinks: an [`AlertSink`] for drift
//! that needs a human, and a [`ComplianceStore`] that keeps per-tenant
//! fields for dashboards. Compliance fields hold a typed value (usually the
//! boolean verdict); comparison fields hold either `true` or the drifted
//! part of the remote state for a side-by-side view.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::RwLock;
use thiserror::Error;
use tracing::warn;

/// Errors raised by alert and report sinks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReportError {
    #[error("Invalid value for field '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Sink unavailable: {0}")]
    Unavailable(String),
}

/// How a compliance field value is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStoreKind {
    Bool,
    String,
    Json,
}

impl FieldStoreKind {
    /// Checks that `value` fits this kind.
    pub fn check(&self, field: &str, value: &Value) -> Result<(), ReportError> {
        let ok = match self {
            FieldStoreKind::Bool => value.is_boolean(),
            FieldStoreKind::String => value.is_string(),
            FieldStoreKind::Json => true,
        };
        if ok {
            Ok(())
        } else {
            Err(ReportError::InvalidValue {
                field: field.to_string(),
                reason: format!("expected {:?}, got {}", self, value),
            })
        }
    }
}

/// An alert raised by a standard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardAlert {
    pub message: String,
    /// State attached for the reader, usually the remote snapshot.
    pub object: Value,
    pub tenant: String,
    pub standard_name: String,
    pub standard_id: Option<String>,
    pub raised_at: DateTime<Utc>,
}

impl StandardAlert {
    pub fn new(
        message: &str,
        object: Value,
        tenant: &str,
        standard_name: &str,
        standard_id: Option<&str>,
    ) -> Self {
        Self {
            message: message.to_string(),
            object,
            tenant: tenant.to_string(),
            standard_name: standard_name.to_string(),
            standard_id: standard_id.map(String::from),
            raised_at: Utc::now(),
        }
    }
}

/// Destination for alerts.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn raise_alert(&self, alert: StandardAlert) -> Result<(), ReportError>;
}

/// Destination for compliance and comparison fields.
#[async_trait]
pub trait ComplianceStore: Send + Sync {
    /// Stores a compliance field for the tenant.
    async fn record_compliance_field(
        &self,
        tenant: &str,
        field_name: &str,
        value: Value,
        store_as: FieldStoreKind,
    ) -> Result<(), ReportError>;

    /// Stores a comparison field for the tenant.
    async fn record_comparison_field(
        &self,
        tenant: &str,
        field_name: &str,
        value: Value,
    ) -> Result<(), ReportError>;
}

/// Writes alerts to the log.
#[derive(Debug, Clone, Default)]
pub struct TracingAlertSink;

#[async_trait]
impl AlertSink for TracingAlertSink {
    async fn raise_alert(&self, alert: StandardAlert) -> Result<(), ReportError> {
        warn!(
            tenant = %alert.tenant,
            standard = %alert.standard_name,
            standard_id = alert.standard_id.as_deref().unwrap_or(""),
            object = %alert.object,
            "{}",
            alert.message
        );
        Ok(())
    }
}

/// Keeps alerts in memory.
#[derive(Debug, Default)]
pub struct MemoryAlertSink {
    alerts: RwLock<Vec<StandardAlert>>,
}

impl MemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<StandardAlert> {
        self.alerts
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl AlertSink for MemoryAlertSink {
    async fn raise_alert(&self, alert: StandardAlert) -> Result<(), ReportError> {
        self.alerts
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(alert);
        Ok(())
    }
}

/// Which store a field was written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field_kind", rename_all = "snake_case")]
pub enum FieldKind {
    Compliance { store_as: FieldStoreKind },
    Comparison,
}

/// A recorded field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceField {
    pub tenant: String,
    pub field_name: String,
    pub value: Value,
    #[serde(flatten)]
    pub kind: FieldKind,
    pub recorded_at: DateTime<Utc>,
}

/// Keeps fields in memory. A later write to the same tenant, field and
/// kind replaces the earlier one.
#[derive(Debug, Default)]
pub struct MemoryComplianceStore {
    fields: RwLock<Vec<ComplianceField>>,
}

impl MemoryComplianceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded fields.
    pub fn fields(&self) -> Vec<ComplianceField> {
        self.fields
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Returns the compliance field value for a tenant.
    pub fn compliance_field(&self, tenant: &str, field_name: &str) -> Option<Value> {
        self.find(tenant, field_name, |k| matches!(k, FieldKind::Compliance { .. }))
    }

    /// Returns the comparison field value for a tenant.
    pub fn comparison_field(&self, tenant: &str, field_name: &str) -> Option<Value> {
        self.find(tenant, field_name, |k| matches!(k, FieldKind::Comparison))
    }

    fn find(
        &self,
        tenant: &str,
        field_name: &str,
        kind: impl Fn(&FieldKind) -> bool,
    ) -> Option<Value> {
        self.fields()
            .into_iter()
            .find(|f| f.tenant == tenant && f.field_name == field_name && kind(&f.kind))
            .map(|f| f.value)
    }

    fn upsert(&self, field: ComplianceField) {
        let mut fields = self
            .fields
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        fields.retain(|f| {
            !(f.tenant == field.tenant && f.field_name == field.field_name && f.kind == field.kind)
        });
        fields.push(field);
    }
}

#[async_trait]
impl ComplianceStore for MemoryComplianceStore {
    async fn record_compliance_field(
        &self,
        tenant: &str,
        field_name: &str,
        value: Value,
        store_as: FieldStoreKind,
    ) -> Result<(), ReportError> {
        store_as.check(field_name, &value)?;
        self.upsert(ComplianceField {
            tenant: tenant.to_string(),
            field_name: field_name.to_string(),
            value,
            kind: FieldKind::Compliance { store_as },
            recorded_at: Utc::now(),
        });
        Ok(())
    }

    async fn record_comparison_field(
        &self,
        tenant: &str,
        field_name: &str,
        value: Value,
    ) -> Result<(), ReportError> {
        self.upsert(ComplianceField {
            tenant: tenant.to_string(),
            field_name: field_name.to_string(),
            value,
            kind: FieldKind::Comparison,
            recorded_at: Utc::now(),
        });
        Ok(())
    }
}
