//! Core data model definitions shared across Posture crates.
#![allow(missing_docs)]

pub use ::chrono;

pub mod api;
pub mod filter;
pub mod ids;
pub mod notification;
pub mod observation;
pub mod operation;
pub mod resource;
pub mod status;

pub use api::{
    CollectAndScanRequest, CollectAndScanResponse, ResourceGroupObservations,
    RuleInfo, RuleObservations, StatusResponse,
};
pub use filter::StorageFilter;
pub use ids::{CollectId, ScanId};
pub use notification::{Notification, NotificationException};
pub use observation::{
    Impact, Observation, Remediation, ResourceRef, Severity,
};
pub use operation::{Operation, OperationKind, OperationStatus};
pub use resource::{
    CONTACT_LABELS, IamPolicy, Permission, Resource, ResourceKind,
};
pub use status::{RequestStatus, ScanType};
