use serde::{Deserialize, Serialize};

/// Primary storage address of a task: `(dag_id, id)`.
///
/// Ordering is by `dag_id` first, so all tasks of one DAG are contiguous in a
/// `BTreeMap<TaskKey, _>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskKey {
    pub dag_id: String,
    pub id: String,
}

impl TaskKey {
    pub fn new(dag_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            dag_id: dag_id.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for TaskKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.dag_id, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub object_id: String,
    pub dag_id: String,
    pub id: String,
    pub name: String,
    /// JSON text, validated on write and otherwise opaque
    pub payload: String,
    pub status: String,
    pub duration: i64,
    pub retries: i64,
    /// Ids of tasks in the same DAG this task depends on
    pub dependencies: Vec<String>,
}

impl Task {
    #[must_use]
    pub fn key(&self) -> TaskKey {
        TaskKey::new(self.dag_id.clone(), self.id.clone())
    }

    /// JSON array text of the dependency list, as shown by SELECT.
    #[must_use]
    pub fn dependencies_json(&self) -> String {
        serde_json::to_string(&self.dependencies).unwrap_or_else(|_| "[]".to_string())
    }
}
