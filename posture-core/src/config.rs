use std::time::Duration;

use crate::error::{CoreError, Result};

/// Contact resolution and notification settings.
#[derive(Clone, Debug)]
pub struct NotificationConfig {
    /// Email domain suffix identifying organization principals, e.g.
    /// `@example.com`. Required.
    pub org_suffix: String,
    /// Roles treated as admin in addition to owner, editor and
    /// iam.securityAdmin. Accepted with or without the `roles/` prefix.
    pub additional_admin_roles: Vec<String>,
    /// Pattern applied to contact labels before substitution.
    pub label_to_email_regexp: String,
    /// Replacement template for `label_to_email_regexp`.
    pub label_to_email_subst: String,
    /// Minimum delay between two deliveries of the same notification.
    pub notification_interval: Duration,
    /// Source system stamped on every notification.
    pub source_system: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            org_suffix: String::new(),
            additional_admin_roles: Vec::new(),
            label_to_email_regexp: "(.*)_(.*?)_(.*?)$".to_string(),
            label_to_email_subst: "$1@$2.$3".to_string(),
            notification_interval: Duration::from_secs(24 * 60 * 60),
            source_system: "posture".to_string(),
        }
    }
}

/// Scheduling knobs of the collect-and-scan pipeline.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Delay between two self-driven full runs.
    pub collect_and_scan_interval: Duration,
    /// Whether the scheduled runner is started at all.
    pub run_automated_scans: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            collect_and_scan_interval: Duration::from_secs(6 * 60 * 60),
            run_automated_scans: true,
        }
    }
}

/// Every setting the core needs to run.
#[derive(Clone, Debug, Default)]
pub struct PostureConfig {
    /// Scheduling of full runs.
    pub pipeline: PipelineConfig,
    /// Contact resolution and notification delivery.
    pub notifications: NotificationConfig,
}

impl PostureConfig {
    /// Rejects settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.notifications.org_suffix.trim().is_empty() {
            return Err(CoreError::Config("org suffix must be set".into()));
        }
        if let Err(err) = regex::Regex::new(&self.notifications.label_to_email_regexp) {
            return Err(CoreError::Config(format!(
                "invalid label to email pattern: {err}"
            )));
        }
        if self.pipeline.collect_and_scan_interval.is_zero() {
            return Err(CoreError::Config(
                "collect and scan interval must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_require_an_org_suffix() {
        let mut config = PostureConfig::default();
        assert!(config.validate().is_err());
        config.notifications.org_suffix = "@example.com".into();
        config.validate().expect("valid");
    }

    #[test]
    fn bad_label_pattern_is_rejected() {
        let mut config = PostureConfig::default();
        config.notifications.org_suffix = "@example.com".into();
        config.notifications.label_to_email_regexp = "(".into();
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    }
}
