use chrono::{DateTime, Duration, Utc};

use crate::resource::ResourceKind;

/// Selection criteria for storage reads. Every field is optional; an unset
/// field does not constrain the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageFilter {
    pub resource_group_names: Option<Vec<String>>,
    pub resource_names: Option<Vec<String>>,
    pub resource_kinds: Option<Vec<ResourceKind>>,
    /// Collect or scan id the record was produced under.
    pub operation_id: Option<String>,
    pub limit: Option<usize>,
    /// Start of the time window. Must be set together with `time_offset`.
    pub start_time: Option<DateTime<Utc>>,
    pub time_offset: Option<Duration>,
}

impl StorageFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resource_group_names =
            Some(groups.into_iter().map(Into::into).collect());
        self
    }

    pub fn names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resource_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn kinds(mut self, kinds: impl IntoIterator<Item = ResourceKind>) -> Self {
        self.resource_kinds = Some(kinds.into_iter().collect());
        self
    }

    pub fn operation(mut self, id: impl Into<String>) -> Self {
        self.operation_id = Some(id.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn window(mut self, start: DateTime<Utc>, offset: Duration) -> Self {
        self.start_time = Some(start);
        self.time_offset = Some(offset);
        self
    }

    /// Only records produced in the last `age`.
    pub fn since(self, age: Duration) -> Self {
        let start = Utc::now() - age;
        self.window(start, age)
    }
}
