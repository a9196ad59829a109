use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub server: FileServerConfig,
    #[serde(default)]
    pub pipeline: FilePipelineConfig,
    #[serde(default)]
    pub notifications: FileNotificationConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owned_groups: Option<Vec<String>>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FilePipelineConfig {
    /// Humantime duration, e.g. `6h`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collect_and_scan_interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_automated_scans: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileNotificationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_suffix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_admin_roles: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_to_email_regexp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_to_email_subst: Option<String>,
    /// Humantime duration, e.g. `24h`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
}

/// Values read from the process environment.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub bind: Option<String>,
    pub inventory: Option<PathBuf>,
    pub owned_groups: Option<Vec<String>>,
    pub org_suffix: Option<String>,
    pub additional_admin_roles: Option<Vec<String>>,
    pub label_to_email_regexp: Option<String>,
    pub label_to_email_subst: Option<String>,
    pub notification_interval: Option<String>,
    pub collect_and_scan_interval: Option<String>,
    pub run_automated_scans: Option<bool>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the environment layer from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Self {
            config_path: text("POSTURE_CONFIG").map(PathBuf::from),
            bind: text("POSTURE_BIND"),
            inventory: text("POSTURE_INVENTORY").map(PathBuf::from),
            owned_groups: text("POSTURE_OWNED_GROUPS").map(|raw| parse_csv(&raw)),
            org_suffix: text("POSTURE_ORG_SUFFIX"),
            additional_admin_roles: text("POSTURE_ADDITIONAL_ADMIN_ROLES")
                .map(|raw| parse_csv(&raw)),
            label_to_email_regexp: text("POSTURE_LABEL_TO_EMAIL_REGEXP"),
            label_to_email_subst: text("POSTURE_LABEL_TO_EMAIL_SUBST"),
            notification_interval: text("POSTURE_NOTIFICATION_INTERVAL"),
            collect_and_scan_interval: text("POSTURE_COLLECT_AND_SCAN_INTERVAL"),
            run_automated_scans: text("POSTURE_RUN_AUTOMATED_SCANS")
                .and_then(|raw| parse_bool(&raw)),
        }
    }
}

fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(|part| {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn csv_and_bool_values_are_parsed() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("POSTURE_ADDITIONAL_ADMIN_ROLES", "roles/a, b ,,"),
            ("POSTURE_RUN_AUTOMATED_SCANS", "off"),
            ("POSTURE_ORG_SUFFIX", "   "),
        ]);
        let env = EnvConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(
            env.additional_admin_roles,
            Some(vec!["roles/a".to_string(), "b".to_string()])
        );
        assert_eq!(env.run_automated_scans, Some(false));
        assert_eq!(env.org_suffix, None);
    }
}
