//! Request and response payloads of the service surface.

use crate::ids::{CollectId, ScanId};
use crate::observation::Observation;
use crate::resource::ResourceKind;
use crate::status::RequestStatus;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CollectAndScanRequest {
    #[cfg_attr(feature = "serde", serde(default))]
    pub resource_group_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CollectAndScanResponse {
    pub collect_id: CollectId,
    pub scan_id: ScanId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatusResponse {
    pub collect_status: RequestStatus,
    pub scan_status: RequestStatus,
}

/// Rule metadata exposed by a rule engine.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RuleInfo {
    pub name: String,
    /// Resource kinds the rule evaluates.
    pub accepted_kinds: Vec<ResourceKind>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RuleObservations {
    pub rule: String,
    pub observations: Vec<Observation>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceGroupObservations {
    pub resource_group_name: String,
    pub rules_observations: Vec<RuleObservations>,
}
