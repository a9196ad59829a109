use once_cell::sync::Lazy;
use std::{
    fmt, fs,
    net::SocketAddr,
    path::PathBuf,
    time::Duration,
};
use thiserror::Error;

use posture_core::{NotificationConfig, PipelineConfig, PostureConfig};

use super::sources::{EnvConfig, FileConfig};

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("posture.toml"),
        PathBuf::from("config/posture.toml"),
    ]
});

const DEFAULT_BIND: &str = "0.0.0.0:8080";

/// HTTP listener and collaborator wiring.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// JSON inventory served by the fixture collector. Empty inventory when
    /// unset.
    pub inventory: Option<PathBuf>,
    /// Groups granted to callers. Empty grants every inventory group.
    pub owned_groups: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub posture: PostureConfig,
    pub metadata: ConfigMetadata,
}

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.hint {
            Some(hint) => write!(f, "{} ({hint})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigWarnings {
    items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push(&mut self, message: impl Into<String>) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint(
        &mut self,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.items.iter()
    }
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Loads `.env`, then layers environment over file over defaults.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };

        let mut load = self.load_with_env(EnvConfig::gather())?;
        load.config.metadata.env_file_loaded = env_file_loaded;
        Ok(load)
    }

    /// Same as [`ConfigLoader::load`] with an explicit environment layer and
    /// no `.env` handling.
    pub fn load_with_env(
        &self,
        env: EnvConfig,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env)?;
        self.compose_config(file_config, env, config_path)
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let (path, explicit) = match (&self.options.config_path, &env.config_path)
        {
            (Some(path), _) | (None, Some(path)) => (Some(path.clone()), true),
            (None, None) => (
                DEFAULT_CONFIG_LOCATIONS
                    .iter()
                    .find(|candidate| candidate.exists())
                    .cloned(),
                false,
            ),
        };

        let Some(path) = path else {
            return Ok((None, None));
        };
        if !path.exists() {
            if explicit {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        let contents =
            fs::read_to_string(&path).map_err(|err| ConfigLoadError::Io {
                path: path.clone(),
                source: err,
            })?;
        let file_config: FileConfig =
            toml::from_str(&contents).map_err(|err| ConfigLoadError::Parse {
                path: path.clone(),
                source: err,
            })?;

        Ok((Some(file_config), Some(path)))
    }

    fn compose_config(
        &self,
        file_config: Option<FileConfig>,
        env: EnvConfig,
        config_path: Option<PathBuf>,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let mut warnings = ConfigWarnings::default();

        if config_path.is_none() {
            warnings.push_with_hint(
                "No posture.toml detected; falling back to environment variables",
                "Pass --config or set POSTURE_CONFIG to use a configuration file",
            );
        }

        let FileConfig {
            server: file_server,
            pipeline: file_pipeline,
            notifications: file_notifications,
        } = file_config.unwrap_or_default();

        let bind_raw = env
            .bind
            .or(file_server.bind)
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw.parse::<SocketAddr>().map_err(|err| {
            ConfigLoadError::Invalid {
                key: "bind",
                message: format!("{bind_raw}: {err}"),
            }
        })?;

        let inventory = env.inventory.or(file_server.inventory);
        if inventory.is_none() {
            warnings.push_with_hint(
                "No inventory configured; the collector will report no resource groups",
                "Set POSTURE_INVENTORY to a JSON inventory file",
            );
        }

        let server = ServerConfig {
            bind,
            inventory,
            owned_groups: env
                .owned_groups
                .or(file_server.owned_groups)
                .unwrap_or_default(),
        };

        let pipeline_defaults = PipelineConfig::default();
        let pipeline = PipelineConfig {
            collect_and_scan_interval: parse_interval(
                "collect_and_scan_interval",
                env.collect_and_scan_interval
                    .or(file_pipeline.collect_and_scan_interval),
            )?
            .unwrap_or(pipeline_defaults.collect_and_scan_interval),
            run_automated_scans: env
                .run_automated_scans
                .or(file_pipeline.run_automated_scans)
                .unwrap_or(pipeline_defaults.run_automated_scans),
        };

        let notification_defaults = NotificationConfig::default();
        let org_suffix = env
            .org_suffix
            .or(file_notifications.org_suffix)
            .ok_or_else(|| ConfigLoadError::Invalid {
                key: "org_suffix",
                message: "must be set (POSTURE_ORG_SUFFIX)".to_string(),
            })?;
        let notifications = NotificationConfig {
            org_suffix,
            additional_admin_roles: env
                .additional_admin_roles
                .or(file_notifications.additional_admin_roles)
                .unwrap_or_default(),
            label_to_email_regexp: env
                .label_to_email_regexp
                .or(file_notifications.label_to_email_regexp)
                .unwrap_or(notification_defaults.label_to_email_regexp),
            label_to_email_subst: env
                .label_to_email_subst
                .or(file_notifications.label_to_email_subst)
                .unwrap_or(notification_defaults.label_to_email_subst),
            notification_interval: parse_interval(
                "notification_interval",
                env.notification_interval.or(file_notifications.interval),
            )?
            .unwrap_or(notification_defaults.notification_interval),
            source_system: notification_defaults.source_system,
        };

        let posture = PostureConfig {
            pipeline,
            notifications,
        };
        posture.validate().map_err(|err| ConfigLoadError::Invalid {
            key: "posture",
            message: err.to_string(),
        })?;

        if !posture.pipeline.run_automated_scans {
            warnings.push("Automated scans are disabled");
        }

        Ok(ConfigLoad {
            config: Config {
                server,
                posture,
                metadata: ConfigMetadata {
                    config_path,
                    env_file_loaded: false,
                },
            },
            warnings,
        })
    }
}

fn parse_interval(
    key: &'static str,
    raw: Option<String>,
) -> Result<Option<Duration>, ConfigLoadError> {
    raw.map(|value| {
        humantime::parse_duration(value.trim()).map_err(|err| {
            ConfigLoadError::Invalid {
                key,
                message: format!("{value}: {err}"),
            }
        })
    })
    .transpose()
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}
