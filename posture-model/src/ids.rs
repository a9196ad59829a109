use std::fmt;

use uuid::Uuid;

/// Identifier of one collect request. Minted per invocation, never reused.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct CollectId(pub String);

impl Default for CollectId {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectId {
    pub fn new() -> Self {
        CollectId(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CollectId {
    fn from(value: &str) -> Self {
        CollectId(value.to_string())
    }
}

impl From<String> for CollectId {
    fn from(value: String) -> Self {
        CollectId(value)
    }
}

impl fmt::Display for CollectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one scan request. Lives in a namespace disjoint from
/// [`CollectId`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ScanId(pub String);

impl Default for ScanId {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanId {
    pub fn new() -> Self {
        ScanId(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ScanId {
    fn from(value: &str) -> Self {
        ScanId(value.to_string())
    }
}

impl From<String> for ScanId {
    fn from(value: String) -> Self {
        ScanId(value)
    }
}

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
