use thiserror::Error;

/// Errors raised by the core library.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Filesystem failure, e.g. reading an inventory.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The collector could not enumerate or snapshot resources.
    #[error("Collector error: {0}")]
    Collector(String),

    /// A rule could not be evaluated.
    #[error("Rule engine error: {0}")]
    RuleEngine(String),

    /// The storage backend failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The notification service rejected a call.
    #[error("Notification error: {0}")]
    Notification(String),

    /// The caller does not own a requested resource group.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// The caller could not be identified.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// A request is malformed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A looked-up record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A resource group has nobody to notify.
    #[error("No contacts found for {0}")]
    NoContacts(String),

    /// Settings the pipeline cannot run with.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result alias over [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;
