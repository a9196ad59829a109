//! Caller authorization over resource groups.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::collector::Collector;
use crate::error::{CoreError, Result};

/// Decides which resource groups a caller may act on, and who the caller is.
#[async_trait]
pub trait AccessChecker: Send + Sync {
    /// Resource groups the current caller may collect, scan and read.
    async fn list_resource_group_names_owned(&self) -> Result<BTreeSet<String>>;

    /// Email of the caller behind `presented`, the identity the transport
    /// carried. Anything that is not an email address is `Unauthenticated`.
    async fn authenticated_user(&self, presented: Option<&str>) -> Result<String> {
        match presented.map(str::trim) {
            Some(email) if is_email(email) => Ok(email.to_string()),
            Some(_) => Err(CoreError::Unauthenticated("malformed caller identity".into())),
            None => Err(CoreError::Unauthenticated("no caller identity".into())),
        }
    }
}

fn is_email(candidate: &str) -> bool {
    candidate
        .split_once('@')
        .is_some_and(|(user, domain)| !user.is_empty() && domain.contains('.'))
}

/// Checker granting a fixed set of groups. With no configured groups every
/// group the collector knows is granted.
pub struct StaticAccessChecker {
    owned: BTreeSet<String>,
    collector: Arc<dyn Collector>,
}

impl std::fmt::Debug for StaticAccessChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticAccessChecker")
            .field("owned", &self.owned)
            .finish_non_exhaustive()
    }
}

impl StaticAccessChecker {
    /// Grants `owned`, or every group `collector` knows when `owned` is empty.
    pub fn new(
        owned: impl IntoIterator<Item = String>,
        collector: Arc<dyn Collector>,
    ) -> Self {
        Self {
            owned: owned.into_iter().collect(),
            collector,
        }
    }
}

#[async_trait]
impl AccessChecker for StaticAccessChecker {
    async fn list_resource_group_names_owned(&self) -> Result<BTreeSet<String>> {
        if !self.owned.is_empty() {
            return Ok(self.owned.clone());
        }
        Ok(self
            .collector
            .list_resource_group_names()
            .await?
            .into_iter()
            .collect())
    }
}
