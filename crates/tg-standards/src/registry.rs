//! Standard registry for Tenant Guard.
//!
//! This module provides the standard trait, the context a standard runs
//! with, and the registry the CLI and runners look standards up in.

use crate::reporting::{AlertSink, ComplianceStore};
use crate::sharing_domain_restriction::SharingDomainRestrictionStandard;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tg_connectors::{GraphApi, LicenseChecker};
use tg_core::{SettingsError, StandardSettings};
use tg_observability::StandardLogger;
use tracing::{info, Instrument};
use uuid::Uuid;

/// Errors surfaced by the registry.
#[derive(Error, Debug)]
pub enum StandardError {
    #[error("Standard not found: {0}")]
    NotFound(String),

    #[error("Invalid settings: {0}")]
    InvalidSettings(#[from] SettingsError),
}

/// What a remediation attempt did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Remediation {
    /// Remediate was not requested.
    NotRequested,
    /// Nothing to change.
    AlreadyCompliant,
    /// The desired configuration was written.
    Applied,
    /// The write failed; `error` is the normalized message.
    Failed { error: String },
}

/// Result of evaluating a licensed tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Compliance before any remediation.
    pub compliant: bool,
    pub remediation: Remediation,
    pub alerted: bool,
    pub reported: bool,
}

/// Outcome of one standard run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StandardOutcome {
    /// The tenant lacks the required license. Counts as success.
    LicenseMissing,
    /// The run stopped before evaluating.
    Aborted { reason: String },
    /// The tenant was evaluated.
    Evaluated(Evaluation),
}

impl StandardOutcome {
    /// Returns true unless the run aborted.
    pub fn is_success(&self) -> bool {
        !matches!(self, StandardOutcome::Aborted { .. })
    }

    /// Returns the compliance verdict, if the tenant was evaluated.
    pub fn compliant(&self) -> Option<bool> {
        match self {
            StandardOutcome::Evaluated(evaluation) => Some(evaluation.compliant),
            _ => None,
        }
    }
}

/// A standard run with timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardResult {
    pub run_id: Uuid,
    pub standard_name: String,
    pub tenant: String,
    pub outcome: StandardOutcome,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// External services a standard talks to. Cheap to clone and safe to share
/// between runs for different tenants.
#[derive(Clone)]
pub struct Collaborators {
    pub graph: Arc<dyn GraphApi>,
    pub licenses: Arc<dyn LicenseChecker>,
    pub logger: Arc<dyn StandardLogger>,
    pub alerts: Arc<dyn AlertSink>,
    pub reports: Arc<dyn ComplianceStore>,
}

/// Everything a standard needs for one tenant.
#[derive(Clone)]
pub struct StandardContext {
    pub run_id: Uuid,
    pub tenant: String,
    pub settings: StandardSettings,
    pub collaborators: Collaborators,
}

impl StandardContext {
    pub fn new(tenant: &str, settings: StandardSettings, collaborators: Collaborators) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            tenant: tenant.to_string(),
            settings,
            collaborators,
        }
    }

    pub fn graph(&self) -> &dyn GraphApi {
        self.collaborators.graph.as_ref()
    }

    pub fn licenses(&self) -> &dyn LicenseChecker {
        self.collaborators.licenses.as_ref()
    }

    pub fn logger(&self) -> &dyn StandardLogger {
        self.collaborators.logger.as_ref()
    }

    pub fn alerts(&self) -> &dyn AlertSink {
        self.collaborators.alerts.as_ref()
    }

    pub fn reports(&self) -> &dyn ComplianceStore {
        self.collaborators.reports.as_ref()
    }
}

/// Trait for standard implementations.
#[async_trait]
pub trait Standard: Send + Sync {
    /// Returns the standard name.
    fn name(&self) -> &str;

    /// Returns the standard description.
    fn description(&self) -> &str;

    /// Service plans of which the tenant needs at least one.
    fn required_capabilities(&self) -> &[&'static str] {
        &[]
    }

    /// Standard-specific parameters.
    fn parameters(&self) -> Vec<ParameterDef>;

    /// Checks settings before a run.
    fn validate(&self, settings: &StandardSettings) -> Result<(), StandardError> {
        for param in self.parameters() {
            if param.required && settings.get_param(&param.name).is_none() {
                return Err(SettingsError::Missing(param.name).into());
            }
        }
        Ok(())
    }

    /// Runs the standard for the context's tenant. Never fails; problems
    /// are logged and reflected in the outcome.
    async fn run(&self, context: &StandardContext) -> StandardOutcome;
}

/// Definition of a standard parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDef {
    pub name: String,
    pub description: String,
    pub param_type: ParameterType,
    pub required: bool,
    pub default: Option<serde_json::Value>,
}

impl ParameterDef {
    /// Creates a new optional parameter definition.
    pub fn optional(
        name: &str,
        description: &str,
        param_type: ParameterType,
        default: serde_json::Value,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            param_type,
            required: false,
            default: Some(default),
        }
    }
}

/// Types of standard parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    /// A select box value, raw or wrapped in `{ value }`.
    Choice(Vec<String>),
    /// Comma separated list.
    List,
}

/// Registry of available standards.
pub struct StandardRegistry {
    standards: HashMap<String, Arc<dyn Standard>>,
}

impl StandardRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            standards: HashMap::new(),
        }
    }

    /// Creates a registry with the built-in standards.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SharingDomainRestrictionStandard::new()));
        registry
    }

    /// Registers a standard, replacing one with the same name.
    pub fn register(&mut self, standard: Arc<dyn Standard>) {
        self.standards.insert(standard.name().to_string(), standard);
    }

    /// Looks a standard up by name, case-insensitively.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Standard>> {
        self.standards
            .get(name)
            .or_else(|| {
                self.standards
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(name))
                    .map(|(_, v)| v)
            })
            .cloned()
    }

    /// Returns the registered standards sorted by name.
    pub fn list(&self) -> Vec<Arc<dyn Standard>> {
        let mut standards: Vec<_> = self.standards.values().cloned().collect();
        standards.sort_by(|a, b| a.name().cmp(b.name()));
        standards
    }

    /// Validates the settings and runs a standard.
    pub async fn run(
        &self,
        name: &str,
        context: &StandardContext,
    ) -> Result<StandardResult, StandardError> {
        let standard = self
            .get(name)
            .ok_or_else(|| StandardError::NotFound(name.to_string()))?;
        standard.validate(&context.settings)?;

        let span = tg_observability::standard_span!(standard.name(), context.tenant);
        let started_at = Utc::now();
        let outcome = standard.run(context).instrument(span).await;
        let completed_at = Utc::now();

        info!(
            run_id = %context.run_id,
            standard = standard.name(),
            tenant = %context.tenant,
            success = outcome.is_success(),
            compliant = ?outcome.compliant(),
            "Standard run completed"
        );

        Ok(StandardResult {
            run_id: context.run_id,
            standard_name: standard.name().to_string(),
            tenant: context.tenant.clone(),
            outcome,
            started_at,
            completed_at,
            duration_ms: (completed_at - started_at).num_milliseconds().max(0) as u64,
        })
    }
}

impl Default for StandardRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
