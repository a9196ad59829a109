use std::fmt;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum OperationKind {
    Collect,
    Scan,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Collect => f.write_str("collect"),
            OperationKind::Scan => f.write_str("scan"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum OperationStatus {
    Started,
    Cancelled,
    Completed,
    Failed,
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OperationStatus::Started => "STARTED",
            OperationStatus::Cancelled => "CANCELLED",
            OperationStatus::Completed => "COMPLETED",
            OperationStatus::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

/// Operation log entry: one status change of a collect or scan for one
/// resource group.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Operation {
    pub id: String,
    pub resource_group: String,
    pub kind: OperationKind,
    pub status_time: DateTime<Utc>,
    pub status: OperationStatus,
}

impl Operation {
    /// Entry stamped with the current time.
    pub fn now(
        id: impl Into<String>,
        resource_group: impl Into<String>,
        kind: OperationKind,
        status: OperationStatus,
    ) -> Self {
        Self {
            id: id.into(),
            resource_group: resource_group.into(),
            kind,
            status_time: Utc::now(),
            status,
        }
    }
}
