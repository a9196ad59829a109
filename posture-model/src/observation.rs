use std::fmt;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum Severity {
    #[default]
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "INFO",
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        };
        f.write_str(label)
    }
}

/// Business impact of a resource group being compromised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum Impact {
    Low,
    #[default]
    Medium,
    High,
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Impact::Low => "LOW",
            Impact::Medium => "MEDIUM",
            Impact::High => "HIGH",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Remediation {
    pub description: String,
    pub recommendation: String,
}

/// Pointer from an observation to the resource it is about.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceRef {
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub resource_group_name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub uid: Option<String>,
}

/// A single rule finding about a resource.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Observation {
    #[cfg_attr(feature = "serde", serde(default))]
    pub uid: String,
    /// Name of the rule that produced the finding.
    pub name: String,
    pub resource_ref: ResourceRef,
    #[cfg_attr(feature = "serde", serde(default))]
    pub collection_id: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub scan_id: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub timestamp: Option<DateTime<Utc>>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub expected_value: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub observed_value: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub remediation: Remediation,
    #[cfg_attr(feature = "serde", serde(default))]
    pub severity: Severity,
    #[cfg_attr(feature = "serde", serde(default))]
    pub impact: Impact,
    /// Severity weighted by impact.
    #[cfg_attr(feature = "serde", serde(default))]
    pub risk_score: Severity,
}

impl Observation {
    pub fn resource_group_name(&self) -> &str {
        &self.resource_ref.resource_group_name
    }
}
