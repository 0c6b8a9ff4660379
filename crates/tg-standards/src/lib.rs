//! # tg-standards
//!
//! Compliance standards for Tenant Guard.
//!
//! A standard checks one tenant setting against a desired policy and,
//! depending on the caller's flags, remediates drift, raises an alert and
//! records compliance fields. This crate provides the standard trait and
//! registry, the alert and report collaborators, and the standards
//! themselves.

pub mod registry;
pub mod reporting;
pub mod sharing_domain_restriction;

pub use registry::{
    Collaborators, Evaluation, ParameterDef, ParameterType, Remediation, Standard,
    StandardContext, StandardError, StandardOutcome, StandardRegistry, StandardResult,
};
pub use reporting::{
    AlertSink, ComplianceField, ComplianceStore, FieldKind, FieldStoreKind, MemoryAlertSink,
    MemoryComplianceStore, ReportError, StandardAlert, TracingAlertSink,
};
pub use sharing_domain_restriction::SharingDomainRestrictionStandard;
