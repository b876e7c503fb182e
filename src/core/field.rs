//! Accessor table for task fields.
//!
//! Field names are resolved to a [`Field`] once per statement; per-row work is
//! then a plain `match` in [`Field::get`].

use super::task::Task;
use super::value::FieldValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    ObjectId,
    DagId,
    Id,
    Name,
    Status,
    Payload,
    Dependencies,
    Duration,
    Retries,
}

impl Field {
    /// Column order produced by `SELECT *`.
    pub const STAR: [Self; 9] = [
        Self::Id,
        Self::Name,
        Self::Status,
        Self::Payload,
        Self::Dependencies,
        Self::DagId,
        Self::Duration,
        Self::Retries,
        Self::ObjectId,
    ];

    /// Columns an INSERT must provide.
    pub const INSERT_REQUIRED: [Self; 8] = [
        Self::Id,
        Self::Name,
        Self::Status,
        Self::Payload,
        Self::Dependencies,
        Self::DagId,
        Self::Duration,
        Self::Retries,
    ];

    /// Case-insensitive lookup. `dag_id` is accepted as an alias of `dagid`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "_id" => Some(Self::ObjectId),
            "dagid" | "dag_id" => Some(Self::DagId),
            "id" => Some(Self::Id),
            "name" => Some(Self::Name),
            "status" => Some(Self::Status),
            "payload" => Some(Self::Payload),
            "dependencies" => Some(Self::Dependencies),
            "duration" => Some(Self::Duration),
            "retries" => Some(Self::Retries),
            _ => None,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ObjectId => "_id",
            Self::DagId => "dagid",
            Self::Id => "id",
            Self::Name => "name",
            Self::Status => "status",
            Self::Payload => "payload",
            Self::Dependencies => "dependencies",
            Self::Duration => "duration",
            Self::Retries => "retries",
        }
    }

    /// Fields that carry an integer and take part in numeric aggregation.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Duration | Self::Retries)
    }

    /// Fields that make up the primary key.
    #[must_use]
    pub const fn is_key(self) -> bool {
        matches!(self, Self::DagId | Self::Id)
    }

    #[must_use]
    pub fn get(self, task: &Task) -> FieldValue {
        match self {
            Self::ObjectId => FieldValue::Text(task.object_id.clone()),
            Self::DagId => FieldValue::Text(task.dag_id.clone()),
            Self::Id => FieldValue::Text(task.id.clone()),
            Self::Name => FieldValue::Text(task.name.clone()),
            Self::Status => FieldValue::Text(task.status.clone()),
            Self::Payload => FieldValue::Text(task.payload.clone()),
            Self::Dependencies => FieldValue::Text(task.dependencies_json()),
            Self::Duration => FieldValue::Integer(task.duration),
            Self::Retries => FieldValue::Integer(task.retries),
        }
    }

    /// Integer value of a numeric field, `None` for text fields.
    #[must_use]
    pub const fn numeric(self, task: &Task) -> Option<i64> {
        match self {
            Self::Duration => Some(task.duration),
            Self::Retries => Some(task.retries),
            _ => None,
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
