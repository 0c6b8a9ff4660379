//! End-to-end tests for the sharing domain restriction standard against the
//! mock Graph connector.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tg_connectors::{ConnectorError, GraphMethod, MockGraphConnector, SHAREPOINT_SETTINGS_PATH};
use tg_core::{SharePointSettings, SharingDomainRestrictionMode, StandardSettings};
use tg_observability::{LogSeverity, MemoryStandardLogger};
use tg_standards::{
    AlertSink, Collaborators, ComplianceStore, Evaluation, FieldStoreKind, MemoryAlertSink,
    MemoryComplianceStore, Remediation, ReportError, SharingDomainRestrictionStandard, Standard,
    StandardAlert, StandardContext, StandardOutcome, StandardRegistry,
};

const TENANT: &str = "contoso.onmicrosoft.com";
const COMPLIANCE_FIELD: &str = "sharingDomainRestriction";
const COMPARISON_FIELD: &str = "standards.SharingDomainRestriction";

struct Harness {
    graph: Arc<MockGraphConnector>,
    logger: Arc<MemoryStandardLogger>,
    alerts: Arc<MemoryAlertSink>,
    reports: Arc<MemoryComplianceStore>,
}

impl Harness {
    fn new(current: SharePointSettings) -> Self {
        Self {
            graph: Arc::new(MockGraphConnector::with_settings("mock", current)),
            logger: Arc::new(MemoryStandardLogger::new()),
            alerts: Arc::new(MemoryAlertSink::new()),
            reports: Arc::new(MemoryComplianceStore::new()),
        }
    }

    fn context(&self, settings: StandardSettings) -> StandardContext {
        self.context_with(settings, self.alerts.clone(), self.reports.clone())
    }

    fn context_with(
        &self,
        settings: StandardSettings,
        alerts: Arc<dyn AlertSink>,
        reports: Arc<dyn ComplianceStore>,
    ) -> StandardContext {
        StandardContext::new(
            TENANT,
            settings,
            Collaborators {
                graph: self.graph.clone(),
                licenses: self.graph.clone(),
                logger: self.logger.clone(),
                alerts,
                reports,
            },
        )
    }

    async fn run(&self, settings: StandardSettings) -> StandardOutcome {
        SharingDomainRestrictionStandard::new()
            .run(&self.context(settings))
            .await
    }
}

/// Alert sink whose backend is down.
struct UnavailableAlertSink;

#[async_trait]
impl AlertSink for UnavailableAlertSink {
    async fn raise_alert(&self, _alert: StandardAlert) -> Result<(), ReportError> {
        Err(ReportError::Unavailable("alert queue offline".to_string()))
    }
}

/// Compliance store whose backend is down.
struct UnavailableComplianceStore;

#[async_trait]
impl ComplianceStore for UnavailableComplianceStore {
    async fn record_compliance_field(
        &self,
        _tenant: &str,
        _field_name: &str,
        _value: Value,
        _store_as: FieldStoreKind,
    ) -> Result<(), ReportError> {
        Err(ReportError::Unavailable("reporting database offline".to_string()))
    }

    async fn record_comparison_field(
        &self,
        _tenant: &str,
        _field_name: &str,
        _value: Value,
    ) -> Result<(), ReportError> {
        Err(ReportError::Unavailable("reporting database offline".to_string()))
    }
}

fn all_modes(mode: serde_json::Value, domains: &str) -> StandardSettings {
    StandardSettings::new()
        .with_remediate(true)
        .with_alert(true)
        .with_report(true)
        .with_standard_id("standards.SharingDomainRestriction.1")
        .with_param("Mode", mode)
        .with_param("Domains", json!(domains))
}

fn evaluation(outcome: StandardOutcome) -> Evaluation {
    match outcome {
        StandardOutcome::Evaluated(evaluation) => evaluation,
        other => panic!("Expected evaluation, got {:?}", other),
    }
}

#[tokio::test]
async fn test_none_mode_ignores_domain_lists() {
    let harness = Harness::new(SharePointSettings::new(
        SharingDomainRestrictionMode::None,
        &["a.com"],
        &["b.com"],
    ));
    let settings = StandardSettings::new()
        .with_report(true)
        .with_param("Mode", json!("none"))
        .with_param("Domains", json!("c.com, d.com"));

    let evaluation = evaluation(harness.run(settings).await);
    assert!(evaluation.compliant);
    assert_eq!(
        harness.reports.comparison_field(TENANT, COMPARISON_FIELD),
        Some(json!(true))
    );
}

#[tokio::test]
async fn test_missing_mode_behaves_like_none() {
    let harness = Harness::new(SharePointSettings::new(
        SharingDomainRestrictionMode::AllowList,
        &["a.com"],
        &[],
    ));
    let settings = StandardSettings::new().with_remediate(true);

    let evaluation = evaluation(harness.run(settings).await);
    assert!(!evaluation.compliant);
    assert_eq!(evaluation.remediation, Remediation::Applied);

    let patches = harness.graph.calls_of(GraphMethod::Patch).await;
    assert_eq!(
        patches[0].body,
        Some(json!({"sharingDomainRestrictionMode": "none"}))
    );
}

#[tokio::test]
async fn test_allow_list_compliance() {
    let harness = Harness::new(SharePointSettings::new(
        SharingDomainRestrictionMode::AllowList,
        &["a.com", "b.com"],
        &[],
    ));

    let matching = StandardSettings::new()
        .with_param("Mode", json!("allowList"))
        .with_param("Domains", json!("a.com,b.com"));
    assert_eq!(harness.run(matching).await.compliant(), Some(true));

    let extra = StandardSettings::new()
        .with_param("Mode", json!("allowList"))
        .with_param("Domains", json!("a.com,b.com,c.com"));
    assert_eq!(harness.run(extra).await.compliant(), Some(false));

    let wrong_mode = StandardSettings::new()
        .with_param("Mode", json!("blockList"))
        .with_param("Domains", json!("a.com,b.com"));
    assert_eq!(harness.run(wrong_mode).await.compliant(), Some(false));
}

#[tokio::test]
async fn test_domain_order_does_not_matter() {
    let harness = Harness::new(SharePointSettings::new(
        SharingDomainRestrictionMode::AllowList,
        &["b.com", "a.com"],
        &[],
    ));
    let settings = StandardSettings::new()
        .with_remediate(true)
        .with_param("Mode", json!("allowList"))
        .with_param("Domains", json!("a.com, b.com"));

    let evaluation = evaluation(harness.run(settings).await);
    assert!(evaluation.compliant);
    assert_eq!(evaluation.remediation, Remediation::AlreadyCompliant);
    assert!(harness.graph.calls_of(GraphMethod::Patch).await.is_empty());
    assert!(harness
        .logger
        .contains("Sharing Domain Restriction is already correctly configured"));
}

#[tokio::test]
async fn test_remediation_round_trip() {
    let harness = Harness::new(SharePointSettings::new(
        SharingDomainRestrictionMode::None,
        &[],
        &[],
    ));
    let settings = all_modes(json!({"label": "Allow list", "value": "allowList"}), "a.com,b.com");

    let first = evaluation(harness.run(settings.clone()).await);
    assert!(!first.compliant);
    assert_eq!(first.remediation, Remediation::Applied);

    let patches = harness.graph.calls_of(GraphMethod::Patch).await;
    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0].path, SHAREPOINT_SETTINGS_PATH);
    assert_eq!(
        patches[0].body,
        Some(json!({
            "sharingDomainRestrictionMode": "allowList",
            "sharingAllowedDomainList": ["a.com", "b.com"]
        }))
    );

    harness.graph.clear_calls().await;
    let second = evaluation(harness.run(settings).await);
    assert!(second.compliant);
    assert_eq!(second.remediation, Remediation::AlreadyCompliant);
    assert!(!second.alerted);
    assert!(harness.graph.calls_of(GraphMethod::Patch).await.is_empty());
    assert_eq!(
        harness.reports.compliance_field(TENANT, COMPLIANCE_FIELD),
        Some(json!(true))
    );
}

#[tokio::test]
async fn test_block_list_remediation_writes_blocked_domains() {
    let harness = Harness::new(SharePointSettings::new(
        SharingDomainRestrictionMode::AllowList,
        &["partner.com"],
        &[],
    ));
    let settings = StandardSettings::new()
        .with_remediate(true)
        .with_param("Mode", json!("BlockList"))
        .with_param("Domains", json!("evil.com"));

    let evaluation = evaluation(harness.run(settings).await);
    assert_eq!(evaluation.remediation, Remediation::Applied);

    let patches = harness.graph.calls_of(GraphMethod::Patch).await;
    assert_eq!(
        patches[0].body,
        Some(json!({
            "sharingDomainRestrictionMode": "blockList",
            "sharingBlockedDomainList": ["evil.com"]
        }))
    );
    let stored = harness.graph.settings().await;
    assert_eq!(stored.sharing_blocked_domain_list, vec!["evil.com"]);
    assert_eq!(stored.sharing_allowed_domain_list, vec!["partner.com"]);
}

#[tokio::test]
async fn test_missing_license_makes_no_other_calls() {
    let harness = Harness::new(SharePointSettings::new(
        SharingDomainRestrictionMode::None,
        &[],
        &[],
    ));
    harness.graph.set_capabilities(&["EXCHANGE_S_STANDARD"]).await;

    let outcome = harness.run(all_modes(json!("allowList"), "a.com")).await;
    assert_eq!(outcome, StandardOutcome::LicenseMissing);
    assert!(outcome.is_success());

    let calls = harness.graph.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, GraphMethod::LicenseLookup);
    assert!(harness.alerts.alerts().is_empty());
    assert!(harness.reports.fields().is_empty());
    assert!(harness.logger.entries().is_empty());
}

#[tokio::test]
async fn test_license_lookup_failure_is_logged_and_skips() {
    let harness = Harness::new(SharePointSettings::new(
        SharingDomainRestrictionMode::None,
        &[],
        &[],
    ));
    harness
        .graph
        .fail_license_lookups(Some(ConnectorError::AuthorizationDenied(
            r#"{"error":{"code":"Authorization_RequestDenied","message":"Insufficient privileges to complete the operation."}}"#
                .to_string(),
        )))
        .await;

    let outcome = harness.run(all_modes(json!("allowList"), "a.com")).await;
    assert_eq!(outcome, StandardOutcome::LicenseMissing);

    let calls = harness.graph.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, GraphMethod::LicenseLookup);
    assert!(harness.alerts.alerts().is_empty());
    assert!(harness.reports.fields().is_empty());

    let warnings = harness.logger.entries_at(LogSeverity::Warning);
    assert_eq!(warnings.len(), 1);
    assert_eq!(
        warnings[0].message,
        "Could not check SharePoint or OneDrive licenses for contoso.onmicrosoft.com, \
         skipping standard. Error: Insufficient privileges to complete the operation."
    );
    assert_eq!(
        warnings[0].data.as_ref().map(|d| d["kind"].clone()),
        Some(json!("authorization_denied"))
    );
}

#[tokio::test]
async fn test_any_required_capability_is_enough() {
    let harness = Harness::new(SharePointSettings::new(
        SharingDomainRestrictionMode::None,
        &[],
        &[],
    ));
    harness.graph.set_capabilities(&["ONEDRIVE_BASIC"]).await;

    let outcome = harness.run(StandardSettings::new()).await;
    assert_eq!(outcome.compliant(), Some(true));
}

#[tokio::test]
async fn test_read_failure_aborts_everything() {
    let harness = Harness::new(SharePointSettings::default());
    harness
        .graph
        .fail_reads(Some(ConnectorError::AuthorizationDenied(
            r#"{"error":{"code":"accessDenied","message":"Access denied."}}"#.to_string(),
        )))
        .await;

    let outcome = harness.run(all_modes(json!("allowList"), "a.com")).await;
    assert_eq!(
        outcome,
        StandardOutcome::Aborted {
            reason: "Access denied.".to_string()
        }
    );
    assert!(harness.graph.calls_of(GraphMethod::Patch).await.is_empty());
    assert!(harness.alerts.alerts().is_empty());
    assert!(harness.reports.fields().is_empty());

    let errors = harness.logger.entries_at(LogSeverity::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0]
        .message
        .contains("Could not get the SharingDomainRestriction state for contoso.onmicrosoft.com"));
}

#[tokio::test]
async fn test_write_failure_still_alerts_and_reports() {
    let harness = Harness::new(SharePointSettings::new(
        SharingDomainRestrictionMode::None,
        &[],
        &[],
    ));
    harness
        .graph
        .fail_writes(Some(ConnectorError::RequestFailed(
            r#"Bad request: {"error":{"code":"invalidRequest","message":"Invalid domain."}}"#
                .to_string(),
        )))
        .await;

    let evaluation = evaluation(harness.run(all_modes(json!("allowList"), "a.com")).await);
    assert!(!evaluation.compliant);
    assert_eq!(
        evaluation.remediation,
        Remediation::Failed {
            error: "Invalid domain.".to_string()
        }
    );
    assert!(evaluation.alerted);
    assert!(evaluation.reported);

    let errors = harness.logger.entries_at(LogSeverity::Error);
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].message,
        "Failed to update Sharing Domain Restriction settings. Error: Invalid domain."
    );
    assert!(errors[0].data.is_some());

    assert_eq!(
        harness.reports.compliance_field(TENANT, COMPLIANCE_FIELD),
        Some(json!(false))
    );
    assert_eq!(
        harness.reports.comparison_field(TENANT, COMPARISON_FIELD),
        Some(json!({
            "sharingAllowedDomainList": [],
            "sharingDomainRestrictionMode": "none"
        }))
    );
}

#[tokio::test]
async fn test_alert_carries_snapshot_and_standard_id() {
    let mut current =
        SharePointSettings::new(SharingDomainRestrictionMode::BlockList, &[], &["x.com"]);
    current
        .other
        .insert("sharingCapability".to_string(), json!("externalUserSharingOnly"));
    let harness = Harness::new(current);

    let settings = StandardSettings::new()
        .with_alert(true)
        .with_standard_id("std-7")
        .with_param("Mode", json!("blockList"))
        .with_param("Domains", json!("y.com"));
    let evaluation = evaluation(harness.run(settings).await);
    assert!(evaluation.alerted);
    assert_eq!(evaluation.remediation, Remediation::NotRequested);

    let alerts = harness.alerts.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].tenant, TENANT);
    assert_eq!(alerts[0].standard_name, "SharingDomainRestriction");
    assert_eq!(alerts[0].standard_id.as_deref(), Some("std-7"));
    assert_eq!(alerts[0].object["sharingBlockedDomainList"], json!(["x.com"]));
    assert_eq!(alerts[0].object["sharingCapability"], "externalUserSharingOnly");
}

#[tokio::test]
async fn test_compliant_alert_only_logs() {
    let harness = Harness::new(SharePointSettings::new(
        SharingDomainRestrictionMode::None,
        &[],
        &[],
    ));
    let evaluation = evaluation(harness.run(StandardSettings::new().with_alert(true)).await);
    assert!(!evaluation.alerted);
    assert!(harness.alerts.alerts().is_empty());
    assert!(harness
        .logger
        .contains("Sharing Domain Restriction is correctly configured"));
}

#[tokio::test]
async fn test_invalid_mode_aborts_after_read() {
    let harness = Harness::new(SharePointSettings::default());
    let outcome = harness.run(all_modes(json!("denyList"), "a.com")).await;

    assert!(matches!(outcome, StandardOutcome::Aborted { .. }));
    assert_eq!(harness.graph.calls_of(GraphMethod::Get).await.len(), 1);
    assert!(harness.graph.calls_of(GraphMethod::Patch).await.is_empty());
    assert!(harness.reports.fields().is_empty());
}

#[tokio::test]
async fn test_registry_runs_by_name() {
    let harness = Harness::new(SharePointSettings::new(
        SharingDomainRestrictionMode::None,
        &[],
        &[],
    ));
    let registry = StandardRegistry::with_defaults();
    let context = harness.context(StandardSettings::new().with_report(true));

    let result = registry
        .run("SharingDomainRestriction", &context)
        .await
        .unwrap();
    assert_eq!(result.tenant, TENANT);
    assert_eq!(result.run_id, context.run_id);
    assert_eq!(result.outcome.compliant(), Some(true));
    assert!(registry.run("NoSuchStandard", &context).await.is_err());
}

#[tokio::test]
async fn test_alert_sink_failure_still_reports() {
    let harness = Harness::new(SharePointSettings::new(
        SharingDomainRestrictionMode::None,
        &[],
        &[],
    ));
    let settings = StandardSettings::new()
        .with_alert(true)
        .with_report(true)
        .with_param("Mode", json!("allowList"))
        .with_param("Domains", json!("a.com"));
    let context = harness.context_with(
        settings,
        Arc::new(UnavailableAlertSink),
        harness.reports.clone(),
    );

    let evaluation = evaluation(SharingDomainRestrictionStandard::new().run(&context).await);
    assert!(!evaluation.compliant);
    assert!(!evaluation.alerted);
    assert!(evaluation.reported);

    let warnings = harness.logger.entries_at(LogSeverity::Warning);
    assert_eq!(warnings.len(), 1);
    assert_eq!(
        warnings[0].message,
        "Could not raise Sharing Domain Restriction alert: Sink unavailable: alert queue offline"
    );
    assert_eq!(
        harness.reports.compliance_field(TENANT, COMPLIANCE_FIELD),
        Some(json!(false))
    );
    assert!(harness
        .reports
        .comparison_field(TENANT, COMPARISON_FIELD)
        .is_some());
}

#[tokio::test]
async fn test_compliance_store_failure_still_alerts() {
    let harness = Harness::new(SharePointSettings::new(
        SharingDomainRestrictionMode::None,
        &[],
        &[],
    ));
    let settings = StandardSettings::new()
        .with_alert(true)
        .with_report(true)
        .with_param("Mode", json!("allowList"))
        .with_param("Domains", json!("a.com"));
    let context = harness.context_with(
        settings,
        harness.alerts.clone(),
        Arc::new(UnavailableComplianceStore),
    );

    let evaluation = evaluation(SharingDomainRestrictionStandard::new().run(&context).await);
    assert!(!evaluation.compliant);
    assert!(evaluation.alerted);
    assert!(!evaluation.reported);

    let warnings = harness.logger.entries_at(LogSeverity::Warning);
    assert_eq!(warnings.len(), 1);
    assert_eq!(
        warnings[0].message,
        "Could not record Sharing Domain Restriction report: \
         Sink unavailable: reporting database offline"
    );
    let alerts = harness.alerts.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].tenant, TENANT);
}
