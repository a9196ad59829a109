//! Layered configuration: `.env`, environment variables, TOML file, defaults.

pub mod loader;
pub mod sources;

pub use loader::{
    Config, ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions,
    ConfigMetadata, ConfigWarning, ConfigWarnings, ServerConfig,
};
