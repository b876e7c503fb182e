//! WHERE clause evaluation
//!
//! An [`Expr`] is compiled once per statement into a [`Predicate`] whose
//! leaves hold a resolved [`Field`], so per-row evaluation is a plain match.

use crate::core::{DqlError, Field, FieldValue, Task};
use crate::parser::{CompareOp, Condition, Expr};
use std::cmp::Ordering;

/// Right-hand side of a compiled comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Int(i64),
    /// Lowercased literal
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Compare {
        field: Field,
        op: CompareOp,
        operand: Operand,
    },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

/// Lookup path for loading candidate rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateHint {
    ObjectId(String),
    Dag(String),
    FullScan,
}

pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// Resolve field names and literal types. Unknown fields are a validation error.
    pub fn compile(expr: &Expr) -> Result<Predicate, DqlError> {
        Ok(match expr {
            Expr::Condition(c) => Self::compile_condition(c)?,
            Expr::And(l, r) => Predicate::And(Box::new(Self::compile(l)?), Box::new(Self::compile(r)?)),
            Expr::Or(l, r) => Predicate::Or(Box::new(Self::compile(l)?), Box::new(Self::compile(r)?)),
            Expr::Not(inner) => Predicate::Not(Box::new(Self::compile(inner)?)),
        })
    }

    fn compile_condition(condition: &Condition) -> Result<Predicate, DqlError> {
        let field = Field::from_name(&condition.field)
            .ok_or_else(|| DqlError::Validation(format!("unknown field '{}'", condition.field)))?;

        let operand = match condition.value.trim().parse::<i64>() {
            Ok(n) if field.is_numeric() => Operand::Int(n),
            _ => Operand::Text(condition.value.to_lowercase()),
        };

        Ok(Predicate::Compare {
            field,
            op: condition.op,
            operand,
        })
    }

    /// Compile an optional filter; `None` matches every row.
    pub fn compile_filter(filter: Option<&Expr>) -> Result<Option<Predicate>, DqlError> {
        filter.map(Self::compile).transpose()
    }

    /// Pick the cheapest lookup the filter allows. Only conditions every match
    /// must satisfy (the top-level AND chain) are considered; `_id` wins over `dagid`.
    #[must_use]
    pub fn candidate_hint(filter: Option<&Expr>) -> CandidateHint {
        let Some(expr) = filter else {
            return CandidateHint::FullScan;
        };
        let required = expr.required_conditions();
        let find = |wanted: Field| {
            required.iter().find(|c| {
                c.op == CompareOp::Eq && Field::from_name(&c.field) == Some(wanted)
            })
        };

        if let Some(c) = find(Field::ObjectId) {
            CandidateHint::ObjectId(c.value.clone())
        } else if let Some(c) = find(Field::DagId) {
            CandidateHint::Dag(c.value.clone())
        } else {
            CandidateHint::FullScan
        }
    }
}

impl Predicate {
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        match self {
            Self::Compare { field, op, operand } => {
                let ordering = match (field.get(task), operand) {
                    (FieldValue::Integer(v), Operand::Int(n)) => v.cmp(n),
                    (value, Operand::Text(s)) => value.to_string().to_lowercase().as_str().cmp(s.as_str()),
                    (FieldValue::Text(v), Operand::Int(n)) => v.to_lowercase().cmp(&n.to_string()),
                };
                Self::test(*op, ordering)
            }
            Self::And(l, r) => l.matches(task) && r.matches(task),
            Self::Or(l, r) => l.matches(task) || r.matches(task),
            Self::Not(inner) => !inner.matches(task),
        }
    }

    const fn test(op: CompareOp, ordering: Ordering) -> bool {
        match op {
            CompareOp::Eq => ordering.is_eq(),
            CompareOp::NotEq => ordering.is_ne(),
            CompareOp::Lt => ordering.is_lt(),
            CompareOp::LtEq => ordering.is_le(),
            CompareOp::Gt => ordering.is_gt(),
            CompareOp::GtEq => ordering.is_ge(),
        }
    }
}

/// Apply an optional predicate to a candidate set.
pub fn filter_tasks(tasks: Vec<Task>, predicate: Option<&Predicate>) -> Vec<Task> {
    match predicate {
        Some(p) => tasks.into_iter().filter(|t| p.matches(t)).collect(),
        None => tasks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expression;

    fn task() -> Task {
        Task {
            object_id: "00000001aaaaaaaaaaaa0001".to_string(),
            dag_id: "D1".to_string(),
            id: "t1".to_string(),
            name: "Build".to_string(),
            payload: "{}".to_string(),
            status: "pending".to_string(),
            duration: 10,
            retries: 2,
            dependencies: vec!["t0".to_string()],
        }
    }

    fn eval(text: &str) -> bool {
        let predicate = ConditionEvaluator::compile(&parse_expression(text).unwrap()).unwrap();
        predicate.matches(&task())
    }

    #[test]
    fn test_text_compare_is_case_insensitive() {
        assert!(eval("name = 'build'"));
        assert!(eval("dagid = 'd1'"));
        assert!(eval("STATUS != 'DONE'"));
    }

    #[test]
    fn test_numeric_compare() {
        // 10 > 9 numerically, though "10" < "9" as text
        assert!(eval("duration > 9"));
        assert!(eval("duration >= 10 AND retries <= 2"));
        assert!(!eval("retries < 2"));
    }

    #[test]
    fn test_numeric_field_with_text_literal() {
        assert!(!eval("duration = 'ten'"));
        assert!(eval("duration != 'ten'"));
    }

    #[test]
    fn test_logic() {
        assert!(eval("status = 'done' OR retries = 2"));
        assert!(eval("NOT (status = 'done' OR retries = 3)"));
        assert!(!eval("NOT status = 'pending'"));
    }

    #[test]
    fn test_dependencies_compare_as_json_text() {
        assert!(eval("dependencies = '[\"t0\"]'"));
    }

    #[test]
    fn test_unknown_field() {
        let err = ConditionEvaluator::compile(&parse_expression("owner = 'x'").unwrap()).unwrap_err();
        assert!(matches!(err, DqlError::Validation(_)));
    }

    #[test]
    fn test_candidate_hint() {
        let hint = |text: &str| ConditionEvaluator::candidate_hint(Some(&parse_expression(text).unwrap()));
        assert_eq!(hint("dagid = 'd1' AND _id = 'x'"), CandidateHint::ObjectId("x".to_string()));
        assert_eq!(hint("status = 'a' AND dag_id = 'd1'"), CandidateHint::Dag("d1".to_string()));
        assert_eq!(hint("dagid = 'd1' OR status = 'a'"), CandidateHint::FullScan);
        assert_eq!(hint("NOT dagid = 'd1'"), CandidateHint::FullScan);
        assert_eq!(hint("dagid != 'd1'"), CandidateHint::FullScan);
        assert_eq!(ConditionEvaluator::candidate_hint(None), CandidateHint::FullScan);
    }
}
