//! Built-in posture rules.

use chrono::Utc;
use posture_model::{
    CONTACT_LABELS, Impact, Observation, Remediation, Resource, ResourceKind,
    ResourceRef, RuleInfo, Severity,
};
use uuid::Uuid;

use crate::error::Result;

/// A check run against single resources of the accepted kinds.
pub trait Rule: Send + Sync {
    /// Name and accepted resource kinds.
    fn info(&self) -> RuleInfo;

    /// Findings for `resource`, empty when it complies.
    fn check(&self, resource: &Resource) -> Result<Vec<Observation>>;
}

/// Rules shipped with the engine.
pub fn builtin() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(HumanWithOverprivilegedBasicRole),
        Box::new(MissingContactLabels),
        Box::new(PublicBucket),
    ]
}

fn observation(
    rule: &str,
    resource: &Resource,
    observed: String,
    expected: &str,
    remediation: Remediation,
    severity: Severity,
) -> Observation {
    Observation {
        uid: Uuid::now_v7().to_string(),
        name: rule.to_string(),
        resource_ref: ResourceRef {
            name: resource.name.clone(),
            resource_group_name: resource.resource_group_name.clone(),
            uid: Some(resource.uid.clone()),
        },
        collection_id: resource.collection_uid.clone(),
        scan_id: None,
        timestamp: Some(Utc::now()),
        expected_value: Some(expected.to_string()),
        observed_value: Some(observed),
        remediation,
        severity,
        impact: Impact::Medium,
        risk_score: severity,
    }
}

/// Human accounts holding owner or editor on a resource group.
#[derive(Debug)]
pub struct HumanWithOverprivilegedBasicRole;

impl HumanWithOverprivilegedBasicRole {
    /// Rule name.
    pub const NAME: &'static str = "HUMAN_WITH_OVERPRIVILEGED_BASIC_ROLE";
}

impl Rule for HumanWithOverprivilegedBasicRole {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            name: Self::NAME.to_string(),
            accepted_kinds: vec![ResourceKind::ResourceGroup],
        }
    }

    fn check(&self, resource: &Resource) -> Result<Vec<Observation>> {
        let Some(policy) = &resource.iam_policy else {
            return Ok(Vec::new());
        };
        let mut found = Vec::new();
        for permission in &policy.permissions {
            if !matches!(permission.role_name(), "owner" | "editor") {
                continue;
            }
            for principal in permission.principals.iter().filter(|p| p.starts_with("user:")) {
                found.push(observation(
                    Self::NAME,
                    resource,
                    format!("{principal} has {}", permission.role),
                    "no basic roles for human accounts",
                    Remediation {
                        description: format!(
                            "{principal} holds the basic role {} on {}.",
                            permission.role, resource.name
                        ),
                        recommendation: format!(
                            "Replace {} for {principal} with a predefined role granting only the permissions needed.",
                            permission.role
                        ),
                    },
                    Severity::High,
                ));
            }
        }
        Ok(found)
    }
}

/// Resource groups without any contact label.
#[derive(Debug)]
pub struct MissingContactLabels;

impl MissingContactLabels {
    /// Rule name.
    pub const NAME: &'static str = "MISSING_CONTACT_LABELS";
}

impl Rule for MissingContactLabels {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            name: Self::NAME.to_string(),
            accepted_kinds: vec![ResourceKind::ResourceGroup],
        }
    }

    fn check(&self, resource: &Resource) -> Result<Vec<Observation>> {
        let has_contact = CONTACT_LABELS.iter().any(|key| {
            resource.labels.get(*key).is_some_and(|v| !v.is_empty())
        });
        if has_contact {
            return Ok(Vec::new());
        }
        Ok(vec![observation(
            Self::NAME,
            resource,
            "no contact labels".to_string(),
            "contact1 or contact2 label set",
            Remediation {
                description: format!("{} has no contact labels.", resource.name),
                recommendation: "Set the contact1 label to the owner of this resource group."
                    .to_string(),
            },
            Severity::Low,
        )])
    }
}

/// Buckets readable by anyone.
#[derive(Debug)]
pub struct PublicBucket;

impl PublicBucket {
    /// Rule name.
    pub const NAME: &'static str = "BUCKET_IS_PUBLIC";
}

impl Rule for PublicBucket {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            name: Self::NAME.to_string(),
            accepted_kinds: vec![ResourceKind::Bucket],
        }
    }

    fn check(&self, resource: &Resource) -> Result<Vec<Observation>> {
        let public = resource.iam_policy.iter().flat_map(|p| &p.permissions).any(|perm| {
            perm.principals
                .iter()
                .any(|p| p == "allUsers" || p == "allAuthenticatedUsers")
        });
        if !public {
            return Ok(Vec::new());
        }
        Ok(vec![observation(
            Self::NAME,
            resource,
            "public".to_string(),
            "private",
            Remediation {
                description: format!("Bucket {} is accessible to anyone.", resource.name),
                recommendation: "Remove allUsers and allAuthenticatedUsers from the bucket policy."
                    .to_string(),
            },
            Severity::Critical,
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use posture_model::Permission;

    #[test]
    fn flags_each_human_with_basic_role() {
        let rg = Resource::resource_group("projects/a")
            .with_permission(Permission::new(
                "roles/owner",
                ["user:alice@org.com", "serviceAccount:bot@org.com"],
            ))
            .with_permission(Permission::new("roles/editor", ["user:bob@org.com"]))
            .with_permission(Permission::new("roles/viewer", ["user:carol@org.com"]));

        let found = HumanWithOverprivilegedBasicRole.check(&rg).expect("check");
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|o| o.resource_group_name() == "projects/a"));
    }

    #[test]
    fn contact_label_silences_missing_contact_rule() {
        let bare = Resource::resource_group("projects/a");
        assert_eq!(MissingContactLabels.check(&bare).expect("check").len(), 1);

        let empty = Resource::resource_group("projects/a").with_label("contact1", "");
        assert_eq!(MissingContactLabels.check(&empty).expect("check").len(), 1);

        let labelled = Resource::resource_group("projects/a").with_label("contact2", "bob_org_com");
        assert!(MissingContactLabels.check(&labelled).expect("check").is_empty());
    }

    #[test]
    fn public_bucket_is_flagged() {
        let bucket = Resource::member("b", "projects/a", ResourceKind::Bucket)
            .with_permission(Permission::new("roles/storage.objectViewer", ["allUsers"]));
        assert_eq!(PublicBucket.check(&bucket).expect("check").len(), 1);
    }
}
