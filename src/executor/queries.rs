//! Query (SELECT) operations

use super::aggregates::AggregateExecutor;
use super::conditions::{filter_tasks, CandidateHint, ConditionEvaluator};
use super::result::QueryResult;
use crate::core::{DqlError, Field, FieldValue, Task};
use crate::parser::{Aggregate, AggregateFunc, SelectStatement, SortOrder};
use crate::storage::TaskStore;
use std::cmp::Ordering;

pub const TABLE_NAME: &str = "dag";

pub fn check_table(table: &str) -> Result<(), DqlError> {
    if table.eq_ignore_ascii_case(TABLE_NAME) {
        Ok(())
    } else {
        Err(DqlError::UnsupportedStatement(format!("unknown table '{table}'")))
    }
}

pub fn resolve_field(name: &str) -> Result<Field, DqlError> {
    Field::from_name(name).ok_or_else(|| DqlError::Validation(format!("unknown field '{name}'")))
}

/// Load the candidate set for a WHERE clause using the lookup hint.
pub fn load_candidates(store: &TaskStore, hint: &CandidateHint) -> Result<Vec<Task>, DqlError> {
    match hint {
        CandidateHint::ObjectId(object_id) => store.get_by_object_id(object_id),
        CandidateHint::Dag(dag_id) => store.get_by_namespace(dag_id),
        CandidateHint::FullScan => store.list_all(),
    }
}

pub struct QueryExecutor;

impl QueryExecutor {
    /// Main SELECT entry
    ///
    /// - lone COUNT(*) → `Count`
    /// - GROUP BY → `Groups`
    /// - aggregates without GROUP BY → `Aggregates`
    /// - otherwise → `Rows`
    pub fn select(store: &TaskStore, stmt: &SelectStatement) -> Result<QueryResult, DqlError> {
        check_table(&stmt.table)?;

        // Resolve every name up front so bad queries fail before touching the store
        let columns = Self::expand_columns(&stmt.fields)?;
        let group_by = stmt
            .group_by
            .iter()
            .map(|f| resolve_field(f))
            .collect::<Result<Vec<_>, _>>()?;
        for aggregate in stmt.aggregates.iter().chain(stmt.order_by_agg.iter().map(|o| &o.aggregate)) {
            Self::check_aggregate(aggregate)?;
        }
        if !stmt.order_by_agg.is_empty() && group_by.is_empty() {
            return Err(DqlError::Validation(
                "ORDER BY on an aggregate requires GROUP BY".to_string(),
            ));
        }
        let predicate = ConditionEvaluator::compile_filter(stmt.filter.as_ref())?;

        let hint = ConditionEvaluator::candidate_hint(stmt.filter.as_ref());
        tracing::debug!(?hint, "loading candidates");
        let candidates = load_candidates(store, &hint)?;
        let filtered = filter_tasks(candidates, predicate.as_ref());

        if stmt.is_count && stmt.aggregates.is_empty() {
            return Ok(QueryResult::Count(filtered.len()));
        }
        if !group_by.is_empty() {
            return AggregateExecutor::grouped(
                &filtered,
                &stmt.aggregates,
                &group_by,
                &stmt.order_by,
                &stmt.order_by_agg,
                stmt.limit,
            );
        }
        if !stmt.aggregates.is_empty() {
            return Ok(AggregateExecutor::global(&filtered, &stmt.aggregates));
        }

        Self::select_rows(filtered, &columns, stmt)
    }

    /// Select-list field names to fields, with `*` expanded in place.
    fn expand_columns(fields: &[String]) -> Result<Vec<Field>, DqlError> {
        let mut columns = Vec::new();
        for name in fields {
            if name == "*" {
                columns.extend(Field::STAR);
            } else {
                columns.push(resolve_field(name)?);
            }
        }
        Ok(columns)
    }

    /// Aggregate arguments are not checked against the field table: an
    /// unknown field contributes no values. `*` is only accepted by COUNT.
    fn check_aggregate(aggregate: &Aggregate) -> Result<(), DqlError> {
        match aggregate.func {
            AggregateFunc::Count => Ok(()),
            _ if aggregate.field == "*" => Err(DqlError::Validation(format!("{aggregate} is not supported"))),
            _ => Ok(()),
        }
    }

    fn select_rows(
        tasks: Vec<Task>,
        columns: &[Field],
        stmt: &SelectStatement,
    ) -> Result<QueryResult, DqlError> {
        let sort_keys = stmt
            .order_by
            .iter()
            .map(|o| resolve_field(&o.field).map(|f| (f, o.order)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut tasks = tasks;
        if !sort_keys.is_empty() {
            // Extract keys once; the sort itself is stable
            let mut keyed: Vec<(Vec<FieldValue>, Task)> = tasks
                .into_iter()
                .map(|t| (sort_keys.iter().map(|(f, _)| f.get(&t)).collect(), t))
                .collect();
            keyed.sort_by(|(a, _), (b, _)| {
                a.iter()
                    .zip(b)
                    .zip(&sort_keys)
                    .map(|((x, y), (_, order))| match order {
                        SortOrder::Asc => x.sort_cmp(y),
                        SortOrder::Desc => y.sort_cmp(x),
                    })
                    .find(|o| o.is_ne())
                    .unwrap_or(Ordering::Equal)
            });
            tasks = keyed.into_iter().map(|(_, t)| t).collect();
        }

        if let Some(n) = stmt.limit {
            tasks.truncate(n);
        }

        Ok(QueryResult::Rows {
            columns: columns.iter().map(|f| f.name().to_string()).collect(),
            rows: tasks
                .iter()
                .map(|t| columns.iter().map(|f| f.get(t)).collect())
                .collect(),
        })
    }
}
