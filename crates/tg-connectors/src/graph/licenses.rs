//! Tenant capability lookup from `subscribedSkus`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A license SKU the tenant has subscribed to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribedSku {
    #[serde(default)]
    pub sku_part_number: String,
    /// `Enabled`, `Warning`, `Suspended`, `Deleted` or `LockedOut`.
    #[serde(default)]
    pub capability_status: String,
    #[serde(default)]
    pub service_plans: Vec<ServicePlanInfo>,
}

/// A service plan inside a SKU.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePlanInfo {
    #[serde(default)]
    pub service_plan_name: String,
    #[serde(default)]
    pub provisioning_status: String,
}

/// Collects service plan names from enabled SKUs, skipping disabled plans.
pub fn collect_capabilities(skus: &[SubscribedSku]) -> BTreeSet<String> {
    skus.iter()
        .filter(|sku| sku.capability_status.eq_ignore_ascii_case("Enabled"))
        .flat_map(|sku| sku.service_plans.iter())
        .filter(|plan| !plan.provisioning_status.eq_ignore_ascii_case("Disabled"))
        .filter(|plan| !plan.service_plan_name.is_empty())
        .map(|plan| plan.service_plan_name.clone())
        .collect()
}
