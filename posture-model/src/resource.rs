use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

/// Label keys that name additional contacts for a resource group.
pub const CONTACT_LABELS: [&str; 2] = ["contact1", "contact2"];

/// Kind of a collected cloud resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ResourceKind {
    ResourceGroup,
    ServiceAccount,
    Bucket,
    Network,
    Database,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResourceKind::ResourceGroup => "ResourceGroup",
            ResourceKind::ServiceAccount => "ServiceAccount",
            ResourceKind::Bucket => "Bucket",
            ResourceKind::Network => "Network",
            ResourceKind::Database => "Database",
        };
        f.write_str(label)
    }
}

/// One role binding: `role` granted to every principal listed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Permission {
    /// Fully qualified role, e.g. `roles/owner`.
    pub role: String,
    /// Principals with their account-type prefix, e.g. `user:alice@org.com`.
    #[cfg_attr(feature = "serde", serde(default))]
    pub principals: Vec<String>,
}

impl Permission {
    pub fn new(
        role: impl Into<String>,
        principals: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            role: role.into(),
            principals: principals.into_iter().map(Into::into).collect(),
        }
    }

    /// Role name without the `roles/` prefix.
    pub fn role_name(&self) -> &str {
        self.role.strip_prefix("roles/").unwrap_or(&self.role)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IamPolicy {
    #[cfg_attr(feature = "serde", serde(default))]
    pub permissions: Vec<Permission>,
}

/// Snapshot of a cloud resource as persisted by a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Resource {
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub uid: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub display_name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub parent: String,
    /// Name of the resource group this resource belongs to. For a resource
    /// group this is its own name.
    pub resource_group_name: String,
    pub kind: ResourceKind,
    /// Collect request that produced this snapshot.
    #[cfg_attr(feature = "serde", serde(default))]
    pub collection_uid: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub timestamp: Option<DateTime<Utc>>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub labels: BTreeMap<String, String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub iam_policy: Option<IamPolicy>,
}

impl Resource {
    /// Resource group record with no labels or policy.
    pub fn resource_group(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            uid: name.clone(),
            display_name: name.clone(),
            resource_group_name: name.clone(),
            name,
            parent: String::new(),
            kind: ResourceKind::ResourceGroup,
            collection_uid: None,
            timestamp: None,
            labels: BTreeMap::new(),
            iam_policy: None,
        }
    }

    /// Resource of `kind` inside `group`.
    pub fn member(
        name: impl Into<String>,
        group: impl Into<String>,
        kind: ResourceKind,
    ) -> Self {
        let name = name.into();
        let group = group.into();
        Self {
            uid: name.clone(),
            display_name: name.clone(),
            name,
            parent: group.clone(),
            resource_group_name: group,
            kind,
            collection_uid: None,
            timestamp: None,
            labels: BTreeMap::new(),
            iam_policy: None,
        }
    }

    pub fn with_label(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.iam_policy
            .get_or_insert_with(IamPolicy::default)
            .permissions
            .push(permission);
        self
    }

    pub fn is_resource_group(&self) -> bool {
        self.kind == ResourceKind::ResourceGroup
    }
}
