/// Executor module - runs parsed DQL statements against a task store
///
/// Structure:
/// - conditions: WHERE clause compilation and evaluation
/// - queries: SELECT (rows, COUNT(*))
/// - aggregates: global and grouped aggregation
/// - dml: INSERT/UPDATE/DELETE
/// - dispatcher: statement routing and namespace commands
/// - result: structured results handed to the transport
pub mod aggregates;
pub mod conditions;
pub mod dispatcher;
pub mod dml;
pub mod queries;
pub mod result;

pub use aggregates::AggregateExecutor;
pub use conditions::{ConditionEvaluator, Predicate};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use dml::DmlExecutor;
pub use queries::QueryExecutor;
pub use result::{AggregateValue, DeleteSummary, GroupRow, QueryResult};
