//! Sharing domain restriction standard.
//!
//! Keeps a tenant's SharePoint / OneDrive external sharing domain
//! restriction in line with the desired mode (`none`, `allowList` or
//! `blockList`) and domain list.
//!
//! A run reads the current settings once and computes compliance once. The
//! remediate, alert and report steps all use that verdict: a failed write is
//! logged and the alert and report still describe the state as it was read.

use crate::registry::{
    Evaluation, ParameterDef, ParameterType, Remediation, Standard, StandardContext,
    StandardOutcome,
};
use crate::reporting::{FieldStoreKind, StandardAlert};
use async_trait::async_trait;
use serde_json::Value;
use tg_connectors::{error_details, normalize_error, SHAREPOINT_SETTINGS_PATH};
use tg_core::{evaluate_compliance, DesiredSharingPolicy, SharePointSettings};
use tg_observability::LogSeverity;
use tracing::{debug, info, instrument, warn};

/// Registry name of the standard.
pub const STANDARD_NAME: &str = "SharingDomainRestriction";

/// Service plans that include SharePoint or OneDrive.
pub const REQUIRED_CAPABILITIES: [&str; 5] = [
    "SHAREPOINTWAC",
    "SHAREPOINTSTANDARD",
    "SHAREPOINTENTERPRISE",
    "ONEDRIVE_BASIC",
    "ONEDRIVE_ENTERPRISE",
];

/// Boolean compliance field.
pub const COMPLIANCE_FIELD: &str = "sharingDomainRestriction";

/// Comparison field, `true` or the drifted snapshot.
pub const COMPARISON_FIELD: &str = "standards.SharingDomainRestriction";

/// Standard enforcing the external sharing domain restriction.
#[derive(Debug, Clone, Default)]
pub struct SharingDomainRestrictionStandard;

impl SharingDomainRestrictionStandard {
    pub fn new() -> Self {
        Self
    }

    async fn read_current(&self, context: &StandardContext) -> Result<SharePointSettings, String> {
        let tenant = context.tenant.as_str();
        let body = context
            .graph()
            .get_json(tenant, SHAREPOINT_SETTINGS_PATH)
            .await
            .map_err(|e| normalize_error(&e))?;
        SharePointSettings::from_json(body)
            .map_err(|e| format!("Unexpected settings response: {}", e))
    }

    async fn remediate(
        &self,
        context: &StandardContext,
        desired: &DesiredSharingPolicy,
        compliant: bool,
    ) -> Remediation {
        let tenant = context.tenant.as_str();
        let logger = context.logger();

        if compliant {
            logger.info(tenant, "Sharing Domain Restriction is already correctly configured");
            return Remediation::AlreadyCompliant;
        }

        let body = match serde_json::to_value(desired.to_patch()) {
            Ok(body) => body,
            Err(e) => {
                let error = format!("Could not build settings update: {}", e);
                logger.error(tenant, &error, None);
                return Remediation::Failed { error };
            }
        };
        debug!(tenant, %body, "Updating sharing domain restriction");

        match context
            .graph()
            .patch_json(tenant, SHAREPOINT_SETTINGS_PATH, &body)
            .await
        {
            Ok(_) => {
                logger.info(tenant, "Successfully updated Sharing Domain Restriction settings");
                Remediation::Applied
            }
            Err(e) => {
                let error = normalize_error(&e);
                logger.error(
                    tenant,
                    &format!(
                        "Failed to update Sharing Domain Restriction settings. Error: {}",
                        error
                    ),
                    Some(error_details(&e)),
                );
                Remediation::Failed { error }
            }
        }
    }

    async fn alert(
        &self,
        context: &StandardContext,
        current: &SharePointSettings,
        compliant: bool,
    ) -> bool {
        let tenant = context.tenant.as_str();
        let logger = context.logger();

        if compliant {
            logger.info(tenant, "Sharing Domain Restriction is correctly configured");
            return false;
        }

        let object = serde_json::to_value(current).unwrap_or(Value::Null);
        let alert = StandardAlert::new(
            "Sharing Domain Restriction is not correctly configured",
            object,
            tenant,
            STANDARD_NAME,
            context.settings.standard_id.as_deref(),
        );
        logger.info(tenant, "Sharing Domain Restriction is not correctly configured");
        match context.alerts().raise_alert(alert).await {
            Ok(()) => true,
            Err(e) => {
                logger.log(
                    LogSeverity::Warning,
                    tenant,
                    &format!("Could not raise Sharing Domain Restriction alert: {}", e),
                    None,
                );
                false
            }
        }
    }

    async fn report(
        &self,
        context: &StandardContext,
        current: &SharePointSettings,
        compliant: bool,
    ) -> bool {
        let tenant = context.tenant.as_str();
        let reports = context.reports();

        let comparison = if compliant {
            Value::Bool(true)
        } else {
            current.comparison_snapshot()
        };

        let stored = reports
            .record_compliance_field(
                tenant,
                COMPLIANCE_FIELD,
                Value::Bool(compliant),
                FieldStoreKind::Bool,
            )
            .await
            .and(
                reports
                    .record_comparison_field(tenant, COMPARISON_FIELD, comparison)
                    .await,
            );

        match stored {
            Ok(()) => true,
            Err(e) => {
                context.logger().log(
                    LogSeverity::Warning,
                    tenant,
                    &format!("Could not record Sharing Domain Restriction report: {}", e),
                    None,
                );
                false
            }
        }
    }
}

#[async_trait]
impl Standard for SharingDomainRestrictionStandard {
    fn name(&self) -> &str {
        STANDARD_NAME
    }

    fn description(&self) -> &str {
        "Restricts external sharing in SharePoint and OneDrive to an allow or block list of domains"
    }

    fn required_capabilities(&self) -> &[&'static str] {
        &REQUIRED_CAPABILITIES
    }

    fn parameters(&self) -> Vec<ParameterDef> {
        vec![
            ParameterDef::optional(
                "Mode",
                "Restriction mode; a missing mode means none",
                ParameterType::Choice(vec![
                    "none".to_string(),
                    "allowList".to_string(),
                    "blockList".to_string(),
                ]),
                serde_json::json!("none"),
            ),
            ParameterDef::optional(
                "Domains",
                "Comma separated domains for allowList or blockList",
                ParameterType::List,
                serde_json::json!(""),
            ),
        ]
    }

    #[instrument(skip(self, context), fields(tenant = %context.tenant))]
    async fn run(&self, context: &StandardContext) -> StandardOutcome {
        let tenant = context.tenant.as_str();
        let settings = &context.settings;

        match context
            .licenses()
            .has_any_capability(tenant, self.required_capabilities())
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                info!(
                    tenant,
                    "Required SharePoint or OneDrive license not present, skipping standard"
                );
                return StandardOutcome::LicenseMissing;
            }
            Err(e) => {
                // Treated as unlicensed; the entry keeps the skip visible.
                context.logger().log(
                    LogSeverity::Warning,
                    tenant,
                    &format!(
                        "Could not check SharePoint or OneDrive licenses for {}, skipping standard. Error: {}",
                        tenant,
                        normalize_error(&e)
                    ),
                    Some(error_details(&e)),
                );
                return StandardOutcome::LicenseMissing;
            }
        }

        let current = match self.read_current(context).await {
            Ok(current) => current,
            Err(error) => {
                context.logger().error(
                    tenant,
                    &format!(
                        "Could not get the SharingDomainRestriction state for {}. Error: {}",
                        tenant, error
                    ),
                    None,
                );
                return StandardOutcome::Aborted { reason: error };
            }
        };

        let desired = match DesiredSharingPolicy::from_settings(settings) {
            Ok(desired) => desired,
            Err(e) => {
                warn!(tenant, error = %e, "Invalid SharingDomainRestriction settings");
                context.logger().error(
                    tenant,
                    &format!("Invalid SharingDomainRestriction settings: {}", e),
                    None,
                );
                return StandardOutcome::Aborted {
                    reason: e.to_string(),
                };
            }
        };

        let compliant = evaluate_compliance(&current, &desired);
        debug!(tenant, mode = %desired.mode, compliant, "Evaluated sharing domain restriction");

        let remediation = if settings.remediate {
            self.remediate(context, &desired, compliant).await
        } else {
            Remediation::NotRequested
        };

        let alerted = settings.alert && self.alert(context, &current, compliant).await;
        let reported = settings.report && self.report(context, &current, compliant).await;

        StandardOutcome::Evaluated(Evaluation {
            compliant,
            remediation,
            alerted,
            reported,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Collaborators;
    use crate::reporting::{MemoryAlertSink, MemoryComplianceStore};
    use std::sync::Arc;
    use tg_connectors::MockGraphConnector;
    use tg_core::{SharingDomainRestrictionMode, StandardSettings};
    use tg_observability::MemoryStandardLogger;

    fn context(graph: Arc<MockGraphConnector>, settings: StandardSettings) -> StandardContext {
        StandardContext::new(
            "contoso.onmicrosoft.com",
            settings,
            Collaborators {
                graph: graph.clone(),
                licenses: graph,
                logger: Arc::new(MemoryStandardLogger::new()),
                alerts: Arc::new(MemoryAlertSink::new()),
                reports: Arc::new(MemoryComplianceStore::new()),
            },
        )
    }

    #[test]
    fn test_metadata() {
        let standard = SharingDomainRestrictionStandard::new();
        assert_eq!(standard.name(), "SharingDomainRestriction");
        assert_eq!(standard.required_capabilities().len(), 5);
        assert!(standard.parameters().iter().all(|p| !p.required));
        assert!(standard.validate(&StandardSettings::new()).is_ok());
    }

    #[tokio::test]
    async fn test_check_only_run_has_no_side_effects() {
        let graph = Arc::new(MockGraphConnector::with_settings(
            "mock",
            SharePointSettings::new(SharingDomainRestrictionMode::None, &[], &[]),
        ));
        let settings = StandardSettings::new().with_param("Mode", serde_json::json!("allowList"));
        let outcome = SharingDomainRestrictionStandard::new()
            .run(&context(graph.clone(), settings))
            .await;

        assert_eq!(
            outcome,
            StandardOutcome::Evaluated(Evaluation {
                compliant: false,
                remediation: Remediation::NotRequested,
                alerted: false,
                reported: false,
            })
        );
        assert_eq!(graph.calls().await.len(), 2);
    }
}
