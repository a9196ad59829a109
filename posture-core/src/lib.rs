//! Request deduplication, collect/scan pipeline and notification fan-out for
//! the Posture cloud security scanner.

pub mod acl;
pub mod collector;
/// Core settings.
pub mod config;
pub mod engine;
/// Error type.
pub mod error;
pub mod notify;
pub mod pipeline;
pub mod service;
pub mod state;
pub mod storage;

pub use config::{NotificationConfig, PipelineConfig, PostureConfig};
pub use error::{CoreError, Result};
pub use service::{Collaborators, PostureService};
