//! External sharing domain restriction model.
//!
//! SharePoint and OneDrive expose one tenant-wide switch that limits which
//! external domains content may be shared with. The switch lives on the Graph
//! resource `admin/sharepoint/settings` as `sharingDomainRestrictionMode`,
//! with the domains held in `sharingAllowedDomainList` or
//! `sharingBlockedDomainList` depending on the mode.

use crate::error::SettingsError;
use crate::settings::StandardSettings;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;

/// Sharing domain restriction mode as stored by Graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SharingDomainRestrictionMode {
    /// No restriction on external sharing domains.
    #[default]
    None,
    /// Sharing is limited to the listed domains.
    AllowList,
    /// Sharing is allowed to everything except the listed domains.
    BlockList,
    /// A value this crate does not know about. Never matches a desired mode.
    #[serde(rename = "unknownFutureValue", other)]
    Unknown,
}

impl SharingDomainRestrictionMode {
    /// Returns the Graph wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SharingDomainRestrictionMode::None => "none",
            SharingDomainRestrictionMode::AllowList => "allowList",
            SharingDomainRestrictionMode::BlockList => "blockList",
            SharingDomainRestrictionMode::Unknown => "unknownFutureValue",
        }
    }

    /// Returns true if the mode carries a domain list.
    pub fn uses_domains(&self) -> bool {
        matches!(
            self,
            SharingDomainRestrictionMode::AllowList | SharingDomainRestrictionMode::BlockList
        )
    }
}

impl fmt::Display for SharingDomainRestrictionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SharingDomainRestrictionMode {
    type Err = SettingsError;

    /// Parses a desired mode. Names match case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(SharingDomainRestrictionMode::None),
            "allowlist" => Ok(SharingDomainRestrictionMode::AllowList),
            "blocklist" => Ok(SharingDomainRestrictionMode::BlockList),
            other => Err(SettingsError::invalid(
                "Mode",
                format!("unknown sharing domain restriction mode '{}'", other),
            )),
        }
    }
}

/// Snapshot of the tenant's SharePoint settings resource.
///
/// Only the sharing fields are typed; everything else Graph returns is kept
/// in `other` so alerts can carry the complete resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharePointSettings {
    /// Current restriction mode, `None` if Graph omitted it.
    #[serde(default)]
    pub sharing_domain_restriction_mode: Option<SharingDomainRestrictionMode>,
    /// Domains sharing is limited to.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub sharing_allowed_domain_list: Vec<String>,
    /// Domains sharing is blocked for.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub sharing_blocked_domain_list: Vec<String>,
    /// Remaining fields of the resource.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl SharePointSettings {
    /// Creates a snapshot with the given mode and lists.
    pub fn new(
        mode: SharingDomainRestrictionMode,
        allowed: &[&str],
        blocked: &[&str],
    ) -> Self {
        Self {
            sharing_domain_restriction_mode: Some(mode),
            sharing_allowed_domain_list: allowed.iter().map(|d| d.to_string()).collect(),
            sharing_blocked_domain_list: blocked.iter().map(|d| d.to_string()).collect(),
            other: Map::new(),
        }
    }

    /// Parses a Graph response body.
    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// The reduced view stored as the comparison field when drifted.
    pub fn comparison_snapshot(&self) -> Value {
        json!({
            "sharingAllowedDomainList": self.sharing_allowed_domain_list,
            "sharingDomainRestrictionMode": self.sharing_domain_restriction_mode,
        })
    }

    /// Applies a patch the way Graph would, for in-memory backends.
    pub fn apply_patch(&mut self, patch: &SharingSettingsPatch) {
        self.sharing_domain_restriction_mode = Some(patch.sharing_domain_restriction_mode);
        if let Some(allowed) = &patch.sharing_allowed_domain_list {
            self.sharing_allowed_domain_list = allowed.clone();
        }
        if let Some(blocked) = &patch.sharing_blocked_domain_list {
            self.sharing_blocked_domain_list = blocked.clone();
        }
    }
}

/// Body of the PATCH sent to remediate the setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharingSettingsPatch {
    pub sharing_domain_restriction_mode: SharingDomainRestrictionMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharing_allowed_domain_list: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharing_blocked_domain_list: Option<Vec<String>>,
}

/// The configuration a tenant should have.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredSharingPolicy {
    pub mode: SharingDomainRestrictionMode,
    /// Domains in the order they were supplied.
    pub domains: Vec<String>,
}

impl DesiredSharingPolicy {
    /// Creates a policy from a mode and domains.
    pub fn new(mode: SharingDomainRestrictionMode, domains: &[&str]) -> Self {
        Self {
            mode,
            domains: domains.iter().map(|d| d.to_string()).collect(),
        }
    }

    /// Reads the policy from the `Mode` and `Domains` settings.
    ///
    /// A missing or empty mode means `none`. `Domains` is only read when the
    /// mode needs it.
    pub fn from_settings(settings: &StandardSettings) -> Result<Self, SettingsError> {
        let mode = match settings.get_string("Mode")? {
            Some(raw) if !raw.trim().is_empty() => raw.parse()?,
            _ => SharingDomainRestrictionMode::None,
        };

        let domains = if mode.uses_domains() {
            parse_domain_list(&settings.get_string("Domains")?.unwrap_or_default())
        } else {
            Vec::new()
        };

        Ok(Self { mode, domains })
    }

    /// Builds the PATCH body. Only the list matching the mode is included.
    pub fn to_patch(&self) -> SharingSettingsPatch {
        let (allowed, blocked) = match self.mode {
            SharingDomainRestrictionMode::AllowList => (Some(self.domains.clone()), None),
            SharingDomainRestrictionMode::BlockList => (None, Some(self.domains.clone())),
            _ => (None, None),
        };
        SharingSettingsPatch {
            sharing_domain_restriction_mode: self.mode,
            sharing_allowed_domain_list: allowed,
            sharing_blocked_domain_list: blocked,
        }
    }
}

/// Splits a comma separated domain string. Entries are trimmed, blanks dropped.
pub fn parse_domain_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(String::from)
        .collect()
}

fn sorted_join(domains: &[String]) -> String {
    let mut sorted: Vec<&str> = domains.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.join(",")
}

/// Returns true if the current settings satisfy the desired policy.
///
/// Lists are compared after sorting and joining, so order does not matter
/// but case and duplicates do. With mode `none` the lists are not looked at.
pub fn evaluate_compliance(current: &SharePointSettings, desired: &DesiredSharingPolicy) -> bool {
    let current_mode = current.sharing_domain_restriction_mode;
    match desired.mode {
        SharingDomainRestrictionMode::None => {
            current_mode == Some(SharingDomainRestrictionMode::None)
        }
        SharingDomainRestrictionMode::AllowList => {
            current_mode == Some(SharingDomainRestrictionMode::AllowList)
                && sorted_join(&current.sharing_allowed_domain_list)
                    == sorted_join(&desired.domains)
        }
        SharingDomainRestrictionMode::BlockList => {
            current_mode == Some(SharingDomainRestrictionMode::BlockList)
                && sorted_join(&current.sharing_blocked_domain_list)
                    == sorted_join(&desired.domains)
        }
        SharingDomainRestrictionMode::Unknown => false,
    }
}
