//! Impact and risk scoring of findings.
//!
//! Impact comes from data-classification labels found on a resource group or
//! its ancestors, the nearest label winning. Risk is the finding's severity
//! shifted one step up for high impact and one step down for low impact.

use std::collections::{BTreeMap, HashMap, HashSet};

use posture_model::{Impact, Resource, Severity};
use tracing::{debug, warn};

/// Label marking a resource group that holds customer data.
pub const LABEL_CUSTOMER_DATA: &str = "customer_data";
/// Label marking a resource group that holds employee data.
pub const LABEL_EMPLOYEE_DATA: &str = "employee_data";

const IMPACT_CUSTOMER_DATA: Impact = Impact::High;
const IMPACT_EMPLOYEE_DATA: Impact = Impact::Medium;

/// Severity weighted by `impact`.
pub fn risk_score(impact: Impact, severity: Severity) -> Severity {
    match impact {
        Impact::High => match severity {
            Severity::Critical | Severity::High => Severity::Critical,
            Severity::Medium => Severity::High,
            Severity::Low => Severity::Medium,
            Severity::Info => Severity::Low,
        },
        Impact::Medium => severity,
        Impact::Low => match severity {
            Severity::Critical => Severity::High,
            Severity::High => Severity::Medium,
            Severity::Medium => Severity::Low,
            Severity::Low | Severity::Info => Severity::Info,
        },
    }
}

/// Labels of `group` merged with those of its ancestors in `hierarchy`.
/// A label set closer to the group hides the same label further up.
fn merged_labels<'a>(
    hierarchy: &HashMap<&str, &'a Resource>,
    group: &str,
) -> BTreeMap<&'a str, &'a str> {
    let mut merged = BTreeMap::new();
    let mut seen = HashSet::new();
    let mut current = group;
    while !current.is_empty() && seen.insert(current) {
        let Some(resource) = hierarchy.get(current) else {
            break;
        };
        for (key, value) in &resource.labels {
            merged.entry(key.as_str()).or_insert(value.as_str());
        }
        current = resource.parent.as_str();
    }
    merged
}

fn flagged(group: &str, label: &str, value: Option<&str>) -> bool {
    match value.map(|v| v.trim().to_ascii_lowercase()) {
        None => false,
        Some(v) if v == "yes" || v == "true" => true,
        Some(v) if v == "no" || v == "false" || v.is_empty() => false,
        Some(v) => {
            warn!(group = %group, label = %label, value = %v, "unknown data classification value");
            false
        }
    }
}

/// Impact of a finding on `group`, and the label that decided it. Groups
/// without classification labels are of medium impact.
pub fn impact(hierarchy: &HashMap<&str, &Resource>, group: &str) -> (Impact, Option<String>) {
    let labels = merged_labels(hierarchy, group);
    let mut found: Option<(Impact, String)> = None;
    for (label, impact) in [
        (LABEL_EMPLOYEE_DATA, IMPACT_EMPLOYEE_DATA),
        (LABEL_CUSTOMER_DATA, IMPACT_CUSTOMER_DATA),
    ] {
        let value = labels.get(label).copied();
        if flagged(group, label, value) && found.as_ref().is_none_or(|(best, _)| impact > *best) {
            found = Some((impact, format!("{label}={}", value.unwrap_or_default())));
        }
    }
    match found {
        Some((impact, reason)) => (impact, Some(reason)),
        None => {
            debug!(group = %group, "no classification labels, medium impact");
            (Impact::Medium, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hierarchy(resources: &[Resource]) -> HashMap<&str, &Resource> {
        resources.iter().map(|r| (r.name.as_str(), r)).collect()
    }

    #[test]
    fn high_impact_raises_risk() {
        assert_eq!(risk_score(Impact::High, Severity::High), Severity::Critical);
        assert_eq!(risk_score(Impact::High, Severity::Info), Severity::Low);
        assert_eq!(risk_score(Impact::Medium, Severity::Low), Severity::Low);
        assert_eq!(risk_score(Impact::Low, Severity::Critical), Severity::High);
        assert_eq!(risk_score(Impact::Low, Severity::Info), Severity::Info);
    }

    #[test]
    fn customer_data_outranks_employee_data() {
        let resources = vec![
            Resource::resource_group("rg")
                .with_label(LABEL_EMPLOYEE_DATA, "yes")
                .with_label(LABEL_CUSTOMER_DATA, "true"),
        ];
        let (impact, reason) = impact(&hierarchy(&resources), "rg");
        assert_eq!(impact, Impact::High);
        assert_eq!(reason.as_deref(), Some("customer_data=true"));
    }

    #[test]
    fn nearest_label_wins_over_ancestors() {
        let mut child = Resource::resource_group("projects/child").with_label(LABEL_CUSTOMER_DATA, "no");
        child.parent = "folders/parent".into();
        let mut parent = Resource::resource_group("folders/parent").with_label(LABEL_CUSTOMER_DATA, "yes");
        parent.parent = "projects/child".into();
        let resources = vec![child, parent];
        let tree = hierarchy(&resources);

        assert_eq!(impact(&tree, "projects/child").0, Impact::Medium);
        assert_eq!(impact(&tree, "folders/parent").0, Impact::High);
        assert_eq!(impact(&tree, "unknown").0, Impact::Medium);
    }
}
