use std::fmt;

/// Completion state of a collect or scan request as seen by callers.
///
/// `AlreadyRunning` is transient: it marks a request that claimed no
/// resource group of its own, and is promoted to `Done` the first time the
/// request is queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum RequestStatus {
    #[default]
    Unknown,
    Running,
    AlreadyRunning,
    Done,
    Cancelled,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Done | RequestStatus::Cancelled)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RequestStatus::Unknown => "UNKNOWN",
            RequestStatus::Running => "RUNNING",
            RequestStatus::AlreadyRunning => "ALREADY_RUNNING",
            RequestStatus::Done => "DONE",
            RequestStatus::Cancelled => "CANCELLED",
        };
        f.write_str(label)
    }
}

/// Whether a run covers every known resource group or a caller-supplied list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum ScanType {
    Full,
    Partial,
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanType::Full => f.write_str("FULL"),
            ScanType::Partial => f.write_str("PARTIAL"),
        }
    }
}
