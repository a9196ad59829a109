//! Rule evaluation over collected resources.

mod local;
pub mod risk;
pub mod rules;

pub use local::LocalRuleEngine;
pub use rules::Rule;

use async_trait::async_trait;
use posture_model::{CollectId, Observation, Resource, RuleInfo, ScanId};

use crate::error::CoreError;

/// Runs rules over a collection and stores what they find.
#[async_trait]
pub trait RuleEngine: Send + Sync {
    /// Evaluates every rule against the resources of `groups` and stores the
    /// resulting observations. Rule failures are returned next to the
    /// observations that were produced.
    async fn check_rules(
        &self,
        scan_id: &ScanId,
        collect_id: &CollectId,
        groups: &[String],
        pre_collected: &[Resource],
    ) -> (Vec<Observation>, Vec<CoreError>);

    /// Name and accepted kinds of every rule the engine runs.
    fn rules(&self) -> Vec<RuleInfo>;
}
