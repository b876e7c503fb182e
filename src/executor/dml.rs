//! DML (Data Manipulation Language) operations
//!
//! INSERT, UPDATE, DELETE against a namespace's task store. Values are
//! validated and typed before any record is touched.

use super::conditions::{filter_tasks, ConditionEvaluator};
use super::queries::{check_table, load_candidates};
use super::result::{DeleteSummary, QueryResult};
use crate::core::{DqlError, Field, ObjectIdGenerator, Task};
use crate::parser::{DeleteStatement, InsertStatement, UpdateStatement};
use crate::storage::TaskStore;
use std::collections::HashMap;

/// Validated value for one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate {
    Text(String),
    Int(i64),
    List(Vec<String>),
}

pub struct DmlExecutor;

impl DmlExecutor {
    /// Check `raw` against the rules of `field` and convert it.
    pub fn validate_value(field: Field, raw: &str) -> Result<FieldUpdate, DqlError> {
        match field {
            Field::ObjectId => Err(DqlError::Validation("_id is assigned by the store and cannot be set".to_string())),
            Field::DagId | Field::Name if raw.chars().any(char::is_whitespace) => Err(DqlError::Validation(
                format!("{field} must not contain whitespace: '{raw}'"),
            )),
            Field::DagId | Field::Id if raw.is_empty() => {
                Err(DqlError::Validation(format!("{field} must not be empty")))
            }
            Field::DagId | Field::Id | Field::Name | Field::Status => Ok(FieldUpdate::Text(raw.to_string())),
            Field::Payload => serde_json::from_str::<serde_json::Value>(raw)
                .map(|_| FieldUpdate::Text(raw.to_string()))
                .map_err(|e| DqlError::Validation(format!("payload is not valid JSON: {e}"))),
            Field::Duration | Field::Retries => raw
                .trim()
                .parse::<i64>()
                .map(FieldUpdate::Int)
                .map_err(|_| DqlError::Validation(format!("{field} must be an integer, got '{raw}'"))),
            Field::Dependencies => serde_json::from_str::<Vec<String>>(raw)
                .map(FieldUpdate::List)
                .map_err(|_| {
                    DqlError::Validation(format!("dependencies must be a JSON array of strings, got '{raw}'"))
                }),
        }
    }

    /// Write `value` into `task`. Returns whether the field changed.
    fn assign(task: &mut Task, field: Field, value: &FieldUpdate) -> bool {
        fn set<T: PartialEq + Clone>(slot: &mut T, value: &T) -> bool {
            if slot == value {
                false
            } else {
                *slot = value.clone();
                true
            }
        }

        match (field, value) {
            (Field::DagId, FieldUpdate::Text(v)) => set(&mut task.dag_id, v),
            (Field::Id, FieldUpdate::Text(v)) => set(&mut task.id, v),
            (Field::Name, FieldUpdate::Text(v)) => set(&mut task.name, v),
            (Field::Status, FieldUpdate::Text(v)) => set(&mut task.status, v),
            (Field::Payload, FieldUpdate::Text(v)) => set(&mut task.payload, v),
            (Field::Duration, FieldUpdate::Int(v)) => set(&mut task.duration, v),
            (Field::Retries, FieldUpdate::Int(v)) => set(&mut task.retries, v),
            (Field::Dependencies, FieldUpdate::List(v)) => set(&mut task.dependencies, v),
            _ => false,
        }
    }

    fn resolve_assignable(name: &str) -> Result<Field, DqlError> {
        match Field::from_name(name) {
            Some(Field::ObjectId) => Err(DqlError::Validation("_id cannot be set".to_string())),
            Some(field) => Ok(field),
            None => Err(DqlError::Validation(format!("unknown field '{name}'"))),
        }
    }

    /// Execute INSERT: every field except `_id` must be given exactly once.
    pub fn insert(store: &TaskStore, stmt: &InsertStatement) -> Result<QueryResult, DqlError> {
        check_table(&stmt.table)?;

        let mut values: HashMap<Field, FieldUpdate> = HashMap::new();
        for (column, raw) in stmt.columns.iter().zip(&stmt.values) {
            let field = Self::resolve_assignable(column)?;
            let value = Self::validate_value(field, raw)?;
            if values.insert(field, value).is_some() {
                return Err(DqlError::Validation(format!("column '{field}' given more than once")));
            }
        }
        if let Some(missing) = Field::INSERT_REQUIRED.iter().find(|f| !values.contains_key(*f)) {
            return Err(DqlError::Validation(format!("missing required field '{missing}'")));
        }

        let mut task = Task {
            object_id: ObjectIdGenerator::next(),
            dag_id: String::new(),
            id: String::new(),
            name: String::new(),
            payload: String::new(),
            status: String::new(),
            duration: 0,
            retries: 0,
            dependencies: Vec::new(),
        };
        for (field, value) in &values {
            Self::assign(&mut task, *field, value);
        }

        store.insert(task.clone())?;
        tracing::info!(dag_id = %task.dag_id, id = %task.id, object_id = %task.object_id, "task inserted");

        Ok(QueryResult::Inserted {
            object_id: task.object_id,
            id: task.id,
            dag_id: task.dag_id,
        })
    }

    /// Execute UPDATE. Only records whose fields actually change are written
    /// and counted. A change of `id` or `dag_id` moves the record.
    pub fn update(store: &TaskStore, stmt: &UpdateStatement) -> Result<QueryResult, DqlError> {
        check_table(&stmt.table)?;

        let assignments = stmt
            .set_fields
            .iter()
            .map(|(name, raw)| {
                let field = Self::resolve_assignable(name)?;
                Ok((field, Self::validate_value(field, raw)?))
            })
            .collect::<Result<Vec<_>, DqlError>>()?;
        let predicate = ConditionEvaluator::compile_filter(stmt.filter.as_ref())?;

        let matched = filter_tasks(store.list_all()?, predicate.as_ref());
        let mut updated = 0;

        for original in matched {
            let mut task = original.clone();
            let mut changed = false;
            for (field, value) in &assignments {
                changed |= Self::assign(&mut task, *field, value);
            }
            if !changed {
                continue;
            }

            if task.key() != original.key() {
                let to = task.key();
                store.migrate_key(&original, task)?;
                tracing::info!(from = %original.key(), %to, "task key migrated");
            } else if task.dependencies != original.dependencies {
                store.save_cycle_checked(task)?;
            } else {
                store.save(task)?;
            }
            updated += 1;
        }

        tracing::debug!(updated, "update finished");
        Ok(QueryResult::Updated(updated))
    }

    /// Execute DELETE. One failed delete does not stop the others.
    pub fn delete(store: &TaskStore, stmt: &DeleteStatement) -> Result<QueryResult, DqlError> {
        check_table(&stmt.table)?;

        let predicate = ConditionEvaluator::compile_filter(stmt.filter.as_ref())?;
        let hint = ConditionEvaluator::candidate_hint(stmt.filter.as_ref());
        let matched = filter_tasks(load_candidates(store, &hint)?, predicate.as_ref());

        Ok(QueryResult::Deleted(Self::delete_tasks(store, &matched)))
    }

    pub(crate) fn delete_tasks(store: &TaskStore, tasks: &[Task]) -> DeleteSummary {
        let mut summary = DeleteSummary {
            matched: tasks.len(),
            ..DeleteSummary::default()
        };

        for task in tasks {
            match store.delete(&task.dag_id, &task.id) {
                Ok(()) => summary.deleted += 1,
                Err(e) => {
                    tracing::warn!(key = %task.key(), error = %e, "failed to delete task");
                    summary.failures.push((task.key().to_string(), e.to_string()));
                }
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_delete, parse_insert, parse_update};
    use tempfile::TempDir;

    const COLUMNS: &str = "(id, name, status, payload, dependencies, dagid, duration, retries)";

    fn insert(store: &TaskStore, id: &str, deps: &str) -> Result<QueryResult, DqlError> {
        let query = format!(
            "INSERT INTO dag {COLUMNS} VALUES ('{id}', 'n{id}', 'pending', '{{}}', '{deps}', 'd1', '5', '0')"
        );
        DmlExecutor::insert(store, &parse_insert(&query).unwrap())
    }

    #[test]
    fn test_insert_mints_object_id() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::open(dir.path()).unwrap();

        let QueryResult::Inserted { object_id, id, dag_id } = insert(&store, "t1", "[]").unwrap() else {
            panic!("expected insert result");
        };
        assert_eq!((id.as_str(), dag_id.as_str()), ("t1", "d1"));
        assert_eq!(object_id.len(), 24);

        let stored = store.get("d1", "t1").unwrap().unwrap();
        assert_eq!(stored.object_id, object_id);
        assert_eq!(stored.duration, 5);
        assert_eq!(store.graph().depth_first("d1", "t1").len(), 1);
    }

    #[test]
    fn test_insert_validation() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::open(dir.path()).unwrap();

        let missing = parse_insert("INSERT INTO dag (id, name) VALUES ('t1', 'n')").unwrap();
        assert!(matches!(DmlExecutor::insert(&store, &missing), Err(DqlError::Validation(_))));

        let bad_deps = insert(&store, "t1", "not json");
        assert!(matches!(bad_deps, Err(DqlError::Validation(_))));

        let spaced = format!(
            "INSERT INTO dag {COLUMNS} VALUES ('t1', 'two words', 'p', '{{}}', '[]', 'd1', '1', '0')"
        );
        assert!(DmlExecutor::insert(&store, &parse_insert(&spaced).unwrap()).is_err());

        let bad_int = format!(
            "INSERT INTO dag {COLUMNS} VALUES ('t1', 'n', 'p', '{{}}', '[]', 'd1', 'soon', '0')"
        );
        assert!(DmlExecutor::insert(&store, &parse_insert(&bad_int).unwrap()).is_err());

        let bad_payload = format!(
            "INSERT INTO dag {COLUMNS} VALUES ('t1', 'n', 'p', '{{oops', '[]', 'd1', '1', '0')"
        );
        assert!(DmlExecutor::insert(&store, &parse_insert(&bad_payload).unwrap()).is_err());

        assert!(store.is_empty());
    }

    #[test]
    fn test_insert_cycle_detected() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::open(dir.path()).unwrap();
        insert(&store, "a", r#"["c"]"#).unwrap();
        insert(&store, "b", r#"["a"]"#).unwrap();

        let err = insert(&store, "c", r#"["b"]"#).unwrap_err();
        assert!(matches!(err, DqlError::CycleDetected { .. }));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_update_counts_only_changes() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::open(dir.path()).unwrap();
        insert(&store, "a", "[]").unwrap();
        insert(&store, "b", "[]").unwrap();
        store.save(Task { status: "done".to_string(), ..store.get("d1", "b").unwrap().unwrap() }).unwrap();

        let stmt = parse_update("UPDATE dag SET status = 'done' WHERE dagid = 'd1'").unwrap();
        assert_eq!(DmlExecutor::update(&store, &stmt).unwrap(), QueryResult::Updated(1));

        let none = parse_update("UPDATE dag SET status = 'x' WHERE id = 'zz'").unwrap();
        assert_eq!(DmlExecutor::update(&store, &none).unwrap(), QueryResult::Updated(0));
    }

    #[test]
    fn test_update_migrates_key() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::open(dir.path()).unwrap();
        insert(&store, "y", "[]").unwrap();
        let before = store.get("d1", "y").unwrap().unwrap();

        let stmt = parse_update("UPDATE dag SET id = 'x' WHERE id = 'y'").unwrap();
        assert_eq!(DmlExecutor::update(&store, &stmt).unwrap(), QueryResult::Updated(1));

        assert!(store.get("d1", "y").unwrap().is_none());
        let after = store.get("d1", "x").unwrap().unwrap();
        assert_eq!(Task { id: "y".to_string(), ..after }, before);
        assert_eq!(store.len(), 1);
        assert!(store.graph().depth_first("d1", "y").is_empty());
        assert_eq!(store.graph().depth_first("d1", "x").len(), 1);
    }

    #[test]
    fn test_update_dependencies_cycle_checked() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::open(dir.path()).unwrap();
        insert(&store, "a", "[]").unwrap();
        insert(&store, "b", r#"["a"]"#).unwrap();

        let stmt = parse_update(r#"UPDATE dag SET dependencies = '["b"]' WHERE id = 'a'"#).unwrap();
        assert!(matches!(DmlExecutor::update(&store, &stmt), Err(DqlError::CycleDetected { .. })));
        assert!(store.get("d1", "a").unwrap().unwrap().dependencies.is_empty());
    }

    #[test]
    fn test_update_rejects_object_id() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::open(dir.path()).unwrap();
        let stmt = parse_update("UPDATE dag SET _id = 'abc'").unwrap();
        assert!(matches!(DmlExecutor::update(&store, &stmt), Err(DqlError::Validation(_))));
    }

    #[test]
    fn test_delete_zero_and_partial() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::open(dir.path()).unwrap();
        insert(&store, "a", "[]").unwrap();
        insert(&store, "b", "[]").unwrap();

        let none = parse_delete("DELETE FROM dag WHERE id = 'zz'").unwrap();
        assert_eq!(
            DmlExecutor::delete(&store, &none).unwrap(),
            QueryResult::Deleted(DeleteSummary::default())
        );

        // A record that vanished between matching and deleting
        let mut ghost = store.get("d1", "a").unwrap().unwrap();
        ghost.id = "ghost".to_string();
        let mut tasks = store.list_all().unwrap();
        tasks.insert(1, ghost);

        let summary = DmlExecutor::delete_tasks(&store, &tasks);
        assert_eq!(summary.matched, 3);
        assert_eq!(summary.deleted, 2);
        assert_eq!(summary.failures.len(), 1);
        assert!(store.is_empty());
    }
}
