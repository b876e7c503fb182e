use crate::core::FieldValue;

/// Value of one aggregate column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AggregateValue {
    Int(i64),
    Float(f64),
    /// MAX/MIN over a set with no numeric values
    Empty,
}

impl AggregateValue {
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Empty => None,
        }
    }
}

impl std::fmt::Display for AggregateValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v:.2}"),
            Self::Empty => f.write_str("N/A"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupRow {
    /// Group-by field values, in GROUP BY order
    pub key: Vec<String>,
    pub values: Vec<AggregateValue>,
}

/// Outcome of a DELETE
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeleteSummary {
    pub matched: usize,
    pub deleted: usize,
    /// `(task key, error message)` per failed delete
    pub failures: Vec<(String, String)>,
}

/// Structured result of one statement. Rendering is left to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Count(usize),
    /// Global aggregates: one value per column
    Aggregates {
        columns: Vec<String>,
        values: Vec<AggregateValue>,
    },
    Groups {
        key_columns: Vec<String>,
        agg_columns: Vec<String>,
        rows: Vec<GroupRow>,
    },
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<FieldValue>>,
    },
    Inserted {
        object_id: String,
        id: String,
        dag_id: String,
    },
    Updated(usize),
    Deleted(DeleteSummary),
    Message(String),
    Databases(Vec<String>),
}

impl QueryResult {
    /// Number of result rows for row-shaped results.
    #[must_use]
    pub fn row_count(&self) -> Option<usize> {
        match self {
            Self::Rows { rows, .. } => Some(rows.len()),
            Self::Groups { rows, .. } => Some(rows.len()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_value_display() {
        assert_eq!(AggregateValue::Int(12).to_string(), "12");
        assert_eq!(AggregateValue::Float(2.0 / 3.0).to_string(), "0.67");
        assert_eq!(AggregateValue::Empty.to_string(), "N/A");
        assert_eq!(AggregateValue::Empty.as_f64(), None);
    }
}
