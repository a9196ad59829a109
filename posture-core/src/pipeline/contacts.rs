use std::collections::{BTreeSet, HashSet};

use posture_model::{CONTACT_LABELS, Resource};
use regex::Regex;

use crate::config::NotificationConfig;
use crate::error::{CoreError, Result};

/// Roles whose holders are contacted about findings on a resource group.
pub const ADMIN_ROLES: [&str; 3] = ["owner", "editor", "iam.securityAdmin"];

/// Derives the people responsible for a resource group from its IAM policy
/// and contact labels.
#[derive(Debug, Clone)]
pub struct ContactResolver {
    org_suffix: String,
    admin_roles: HashSet<String>,
    label_pattern: Regex,
    label_subst: String,
}

impl ContactResolver {
    /// Resolver for `config`. Fails on an invalid label pattern.
    pub fn new(config: &NotificationConfig) -> Result<Self> {
        let label_pattern = Regex::new(&config.label_to_email_regexp)
            .map_err(|err| CoreError::Config(format!("label to email pattern: {err}")))?;
        let admin_roles = ADMIN_ROLES
            .iter()
            .map(|r| r.to_string())
            .chain(config.additional_admin_roles.iter().map(|r| {
                r.trim().strip_prefix("roles/").unwrap_or(r.trim()).to_string()
            }))
            .filter(|r| !r.is_empty())
            .collect();
        Ok(Self {
            org_suffix: config.org_suffix.clone(),
            admin_roles,
            label_pattern,
            label_subst: config.label_to_email_subst.clone(),
        })
    }

    /// Rewrites an underscore-delimited label value into an email address.
    pub fn label_to_email(&self, label: &str) -> String {
        self.label_pattern
            .replace_all(label, self.label_subst.as_str())
            .replace('_', ".")
    }

    /// Deduplicated contacts for `group`. Empty when nobody qualifies.
    pub fn contacts(&self, group: &Resource) -> BTreeSet<String> {
        let mut contacts = BTreeSet::new();

        if let Some(policy) = &group.iam_policy {
            for permission in &policy.permissions {
                if !self.admin_roles.contains(permission.role_name()) {
                    continue;
                }
                for principal in &permission.principals {
                    if !principal.ends_with(&self.org_suffix) {
                        continue;
                    }
                    let email = principal
                        .split_once(':')
                        .map_or(principal.as_str(), |(_, rest)| rest);
                    contacts.insert(email.to_string());
                }
            }
        }

        for key in CONTACT_LABELS {
            if let Some(value) = group.labels.get(key).filter(|v| !v.is_empty()) {
                contacts.insert(self.label_to_email(value));
            }
        }

        contacts.retain(|c| !c.is_empty());
        contacts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use posture_model::Permission;

    fn resolver(additional: &[&str]) -> ContactResolver {
        let config = NotificationConfig {
            org_suffix: "@org.com".into(),
            additional_admin_roles: additional.iter().map(|r| r.to_string()).collect(),
            ..NotificationConfig::default()
        };
        ContactResolver::new(&config).expect("resolver")
    }

    #[test]
    fn owner_and_contact_label_resolve_to_emails() {
        let rg = Resource::resource_group("projects/a")
            .with_permission(Permission::new("roles/owner", ["user:alice@org.com"]))
            .with_label("contact1", "bob_org_com");

        let contacts: Vec<String> = resolver(&[]).contacts(&rg).into_iter().collect();
        assert_eq!(contacts, vec!["alice@org.com".to_string(), "bob@org.com".to_string()]);
    }

    #[test]
    fn label_local_part_underscores_become_dots() {
        assert_eq!(
            resolver(&[]).label_to_email("first_last_org_com"),
            "first.last@org.com"
        );
    }

    #[test]
    fn outside_principals_and_plain_roles_are_ignored() {
        let rg = Resource::resource_group("projects/a")
            .with_permission(Permission::new("roles/owner", ["user:eve@elsewhere.com"]))
            .with_permission(Permission::new("roles/viewer", ["user:vic@org.com"]))
            .with_permission(Permission::new(
                "roles/iam.securityAdmin",
                ["group:sec@org.com"],
            ));

        let contacts: Vec<String> = resolver(&[]).contacts(&rg).into_iter().collect();
        assert_eq!(contacts, vec!["sec@org.com".to_string()]);
    }

    #[test]
    fn additional_admin_roles_extend_the_set() {
        let rg = Resource::resource_group("projects/a")
            .with_permission(Permission::new("roles/custom.auditor", ["user:aud@org.com"]));

        assert!(resolver(&[]).contacts(&rg).is_empty());
        assert_eq!(resolver(&["roles/custom.auditor"]).contacts(&rg).len(), 1);
        assert_eq!(resolver(&["custom.auditor"]).contacts(&rg).len(), 1);
    }

    #[test]
    fn duplicates_and_empty_labels_collapse() {
        let rg = Resource::resource_group("projects/a")
            .with_permission(Permission::new("roles/owner", ["user:bob@org.com"]))
            .with_permission(Permission::new("roles/editor", ["user:bob@org.com"]))
            .with_label("contact1", "bob_org_com")
            .with_label("contact2", "");

        let contacts = resolver(&[]).contacts(&rg);
        assert_eq!(contacts.len(), 1);
    }
}
