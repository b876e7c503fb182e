//! Aggregate functions and GROUP BY
//!
//! Numeric aggregates only see `duration` and `retries`; any other field
//! contributes no values. COUNT is always the size of the set.

use super::result::{AggregateValue, GroupRow, QueryResult};
use crate::core::{DqlError, Field, Task};
use crate::parser::{Aggregate, AggregateFunc, AggregateOrder, OrderByField, SortOrder};
use std::cmp::Ordering;
use std::collections::HashMap;

pub struct AggregateExecutor;

struct Group<'a> {
    key: Vec<String>,
    tasks: Vec<&'a Task>,
}

impl AggregateExecutor {
    /// Evaluate one aggregate over a set of tasks.
    #[must_use]
    pub fn compute(aggregate: &Aggregate, tasks: &[&Task]) -> AggregateValue {
        let values: Vec<i64> = match Field::from_name(&aggregate.field) {
            Some(field) if field.is_numeric() => tasks.iter().filter_map(|t| field.numeric(t)).collect(),
            _ => Vec::new(),
        };

        match aggregate.func {
            AggregateFunc::Count => AggregateValue::Int(i64::try_from(tasks.len()).unwrap_or(i64::MAX)),
            AggregateFunc::Sum => AggregateValue::Int(values.iter().fold(0i64, |acc, v| acc.saturating_add(*v))),
            AggregateFunc::Avg => {
                if values.is_empty() {
                    AggregateValue::Float(0.0)
                } else {
                    #[allow(clippy::cast_precision_loss)]
                    let avg = values.iter().map(|v| *v as f64).sum::<f64>() / values.len() as f64;
                    AggregateValue::Float(avg)
                }
            }
            AggregateFunc::Max => values.iter().max().map_or(AggregateValue::Empty, |v| AggregateValue::Int(*v)),
            AggregateFunc::Min => values.iter().min().map_or(AggregateValue::Empty, |v| AggregateValue::Int(*v)),
        }
    }

    /// One row of aggregates over the whole filtered set.
    #[must_use]
    pub fn global(tasks: &[Task], aggregates: &[Aggregate]) -> QueryResult {
        let refs: Vec<&Task> = tasks.iter().collect();
        QueryResult::Aggregates {
            columns: aggregates.iter().map(ToString::to_string).collect(),
            values: aggregates.iter().map(|a| Self::compute(a, &refs)).collect(),
        }
    }

    /// Partition by the group-by tuple (first-seen order), aggregate each
    /// group, then order and limit the group rows.
    pub fn grouped(
        tasks: &[Task],
        aggregates: &[Aggregate],
        group_by: &[Field],
        order_by: &[OrderByField],
        order_by_agg: &[AggregateOrder],
        limit: Option<usize>,
    ) -> Result<QueryResult, DqlError> {
        // Plain ORDER BY keys must be group columns: map each to its key index
        let mut key_order = Vec::with_capacity(order_by.len());
        for item in order_by {
            let field = Field::from_name(&item.field)
                .ok_or_else(|| DqlError::Validation(format!("unknown field '{}'", item.field)))?;
            let index = group_by.iter().position(|g| *g == field).ok_or_else(|| {
                DqlError::Validation(format!("ORDER BY field '{}' must appear in GROUP BY", item.field))
            })?;
            key_order.push((index, field.is_numeric(), item.order));
        }

        let mut groups: Vec<Group<'_>> = Vec::new();
        let mut index: HashMap<Vec<String>, usize> = HashMap::new();
        for task in tasks {
            let key: Vec<String> = group_by.iter().map(|f| f.get(task).to_string()).collect();
            match index.get(&key) {
                Some(&i) => groups[i].tasks.push(task),
                None => {
                    index.insert(key.clone(), groups.len());
                    groups.push(Group {
                        key,
                        tasks: vec![task],
                    });
                }
            }
        }

        let mut rows: Vec<(GroupRow, Vec<AggregateValue>)> = groups
            .into_iter()
            .map(|g| {
                let values = aggregates.iter().map(|a| Self::compute(a, &g.tasks)).collect();
                let sort_values = order_by_agg
                    .iter()
                    .map(|o| Self::compute(&o.aggregate, &g.tasks))
                    .collect();
                (GroupRow { key: g.key, values }, sort_values)
            })
            .collect();

        if !key_order.is_empty() {
            rows.sort_by(|(a, _), (b, _)| {
                key_order
                    .iter()
                    .map(|(i, numeric, order)| {
                        directed(compare_key(&a.key[*i], &b.key[*i], *numeric), *order)
                    })
                    .find(|o| o.is_ne())
                    .unwrap_or(Ordering::Equal)
            });
        }
        if !order_by_agg.is_empty() {
            rows = Self::sort_by_aggregates(rows, order_by_agg);
        }

        let mut rows: Vec<GroupRow> = rows.into_iter().map(|(row, _)| row).collect();
        if let Some(n) = limit {
            rows.truncate(n);
        }

        Ok(QueryResult::Groups {
            key_columns: group_by.iter().map(|f| f.name().to_string()).collect(),
            agg_columns: aggregates.iter().map(ToString::to_string).collect(),
            rows,
        })
    }

    /// Stable numeric sort on the aggregate sort values. Rows with a
    /// non-numeric sort value keep their position; the others are sorted
    /// among the remaining positions.
    fn sort_by_aggregates(
        rows: Vec<(GroupRow, Vec<AggregateValue>)>,
        order_by_agg: &[AggregateOrder],
    ) -> Vec<(GroupRow, Vec<AggregateValue>)> {
        let slots: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, (_, values))| values.iter().all(|v| v.as_f64().is_some()))
            .map(|(i, _)| i)
            .collect();

        let mut sorted = slots.clone();
        sorted.sort_by(|&a, &b| {
            order_by_agg
                .iter()
                .enumerate()
                .map(|(k, o)| {
                    let x = rows[a].1[k].as_f64().unwrap_or_default();
                    let y = rows[b].1[k].as_f64().unwrap_or_default();
                    directed(x.total_cmp(&y), o.order)
                })
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        });

        let mut permutation: Vec<usize> = (0..rows.len()).collect();
        for (slot, source) in slots.into_iter().zip(sorted) {
            permutation[slot] = source;
        }

        let mut taken: Vec<Option<(GroupRow, Vec<AggregateValue>)>> = rows.into_iter().map(Some).collect();
        permutation.into_iter().filter_map(|i| taken[i].take()).collect()
    }
}

fn compare_key(a: &str, b: &str, numeric: bool) -> Ordering {
    if numeric && let (Ok(x), Ok(y)) = (a.parse::<i64>(), b.parse::<i64>()) {
        return x.cmp(&y);
    }
    a.cmp(b)
}

const fn directed(ordering: Ordering, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}
