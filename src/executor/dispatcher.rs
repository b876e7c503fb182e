use super::dml::DmlExecutor;
use super::queries::QueryExecutor;
use super::result::QueryResult;
use crate::core::DqlError;
use crate::parser::{self, Statement};
use crate::storage::{NamespaceRegistry, TaskStore};
use std::sync::Arc;

/// What a statement produced, plus the namespace the session should switch to
/// (set by `USE`).
pub struct DispatchOutcome {
    pub result: QueryResult,
    pub switch_to: Option<(String, Arc<TaskStore>)>,
}

impl From<QueryResult> for DispatchOutcome {
    fn from(result: QueryResult) -> Self {
        Self {
            result,
            switch_to: None,
        }
    }
}

pub struct Dispatcher;

impl Dispatcher {
    /// Parse and run one query against the session's active store.
    ///
    /// Namespace commands go to the registry; everything else runs on `active`.
    pub fn execute(
        registry: &NamespaceRegistry,
        active: &Arc<TaskStore>,
        query: &str,
    ) -> Result<DispatchOutcome, DqlError> {
        let stmt = parser::parse_statement(query)?;
        tracing::debug!(query = query.trim(), "dispatching statement");

        let outcome = match stmt {
            Statement::Select(select) => QueryExecutor::select(active, &select)?.into(),
            Statement::Insert(insert) => DmlExecutor::insert(active, &insert)?.into(),
            Statement::Update(update) => DmlExecutor::update(active, &update)?.into(),
            Statement::Delete(delete) => DmlExecutor::delete(active, &delete)?.into(),
            Statement::CreateDatabase { name } => {
                registry.create(&name)?;
                QueryResult::Message(format!("Database '{name}' created")).into()
            }
            Statement::UseDatabase { name } => {
                let store = registry.open(&name)?;
                DispatchOutcome {
                    result: QueryResult::Message(format!("Switched to database '{name}'")),
                    switch_to: Some((name, store)),
                }
            }
            Statement::ShowDatabases => QueryResult::Databases(registry.list()?).into(),
            Statement::DropDatabase { name } => {
                registry.drop_namespace(&name)?;
                QueryResult::Message(format!("Database '{name}' dropped")).into()
            }
        };
        Ok(outcome)
    }
}
