//! Collect/scan pipeline and notification fan-out.

/// Resolution of resource group contacts.
pub mod contacts;
mod fanout;
mod orchestrator;
mod scheduler;

pub use contacts::{ADMIN_ROLES, ContactResolver};
pub use fanout::NotificationFanout;
pub use orchestrator::ScanOrchestrator;
pub use scheduler::ScheduledRunner;
