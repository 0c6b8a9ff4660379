//! # tg-core
//!
//! Core domain types for Tenant Guard.
//!
//! This crate holds the tenant-level settings model shared by the connectors
//! and the standards: the SharePoint sharing snapshot read from Graph, the
//! desired policy supplied by the caller, and the pure compliance evaluation
//! that compares the two.

pub mod error;
pub mod settings;
pub mod sharing;

pub use error::SettingsError;
pub use settings::{SettingValue, StandardSettings};
pub use sharing::{
    evaluate_compliance, parse_domain_list, DesiredSharingPolicy, SharePointSettings,
    SharingDomainRestrictionMode, SharingSettingsPatch,
};
