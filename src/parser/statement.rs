#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    #[must_use]
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" => Some(Self::Eq),
            "!=" => Some(Self::NotEq),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::LtEq),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::GtEq),
            _ => None,
        }
    }

    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
        }
    }
}

/// Leaf comparison `field op value`. `field` is lowercased, `value` has its quotes stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub field: String,
    pub op: CompareOp,
    pub value: String,
}

impl Condition {
    pub fn new(field: impl Into<String>, op: CompareOp, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }
}

/// Logical WHERE expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Condition(Condition),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    pub fn condition(field: impl Into<String>, op: CompareOp, value: impl Into<String>) -> Self {
        Self::Condition(Condition::new(field, op, value))
    }

    #[must_use]
    pub fn and(left: Self, right: Self) -> Self {
        Self::And(Box::new(left), Box::new(right))
    }

    #[must_use]
    pub fn or(left: Self, right: Self) -> Self {
        Self::Or(Box::new(left), Box::new(right))
    }

    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Self) -> Self {
        Self::Not(Box::new(inner))
    }

    /// Conditions that every matching row must satisfy: the leaves of the
    /// top-level AND chain. Used for index hints.
    #[must_use]
    pub fn required_conditions(&self) -> Vec<&Condition> {
        match self {
            Self::Condition(c) => vec![c],
            Self::And(left, right) => {
                let mut out = left.required_conditions();
                out.extend(right.required_conditions());
                out
            }
            Self::Or(..) | Self::Not(_) => Vec::new(),
        }
    }
}

fn quote_literal(value: &str) -> String {
    if value.contains('\'') && !value.contains('"') {
        format!("\"{value}\"")
    } else {
        format!("'{value}'")
    }
}

/// Canonical text form. Binary nodes are fully parenthesized so that the
/// rendering parses back to the same tree.
impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Condition(c) => write!(f, "{} {} {}", c.field, c.op.symbol(), quote_literal(&c.value)),
            Self::And(l, r) => write!(f, "({l} AND {r})"),
            Self::Or(l, r) => write!(f, "({l} OR {r})"),
            Self::Not(inner) => match inner.as_ref() {
                Self::And(..) | Self::Or(..) => write!(f, "NOT {inner}"),
                _ => write!(f, "NOT ({inner})"),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunc {
    Sum,
    Avg,
    Max,
    Min,
    Count,
}

impl AggregateFunc {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "SUM" => Some(Self::Sum),
            "AVG" => Some(Self::Avg),
            "MAX" => Some(Self::Max),
            "MIN" => Some(Self::Min),
            "COUNT" => Some(Self::Count),
            _ => None,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Max => "MAX",
            Self::Min => "MIN",
            Self::Count => "COUNT",
        }
    }
}

/// `FUNC(field)`; `field` is `*` for `COUNT(*)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Aggregate {
    pub func: AggregateFunc,
    pub field: String,
}

impl Aggregate {
    pub fn new(func: AggregateFunc, field: impl Into<String>) -> Self {
        Self {
            func,
            field: field.into(),
        }
    }
}

impl std::fmt::Display for Aggregate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.func.name(), self.field)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderByField {
    pub field: String,
    pub order: SortOrder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateOrder {
    pub aggregate: Aggregate,
    pub order: SortOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectStatement {
    /// Plain field names, lowercased; `*` is kept as-is
    pub fields: Vec<String>,
    pub table: String,
    pub filter: Option<Expr>,
    pub aggregates: Vec<Aggregate>,
    pub group_by: Vec<String>,
    pub order_by: Vec<OrderByField>,
    pub order_by_agg: Vec<AggregateOrder>,
    /// `None` when absent or when the query asked for `LIMIT n` with `n <= 0`
    pub limit: Option<usize>,
    /// Bare `SELECT COUNT(*)` without GROUP BY
    pub is_count: bool,
}

/// Columns and values are positional and zipped by the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement {
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateStatement {
    pub table: String,
    /// `(field, value)` in query order, field lowercased
    pub set_fields: Vec<(String, String)>,
    pub filter: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteStatement {
    pub table: String,
    pub filter: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Select(SelectStatement),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
    // Namespace meta-commands
    CreateDatabase { name: String },
    UseDatabase { name: String },
    ShowDatabases,
    DropDatabase { name: String },
}
