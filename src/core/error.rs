use thiserror::Error;

#[derive(Error, Debug)]
pub enum DqlError {
    #[error("Parse error at position {position}: {message}")]
    Parse { message: String, position: usize },
    #[error("Not a {expected} statement (found '{found}')")]
    NotThisStatementKind { expected: &'static str, found: String },
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Cycle detected: adding task '{id}' would create a cycle in DAG '{dag_id}'")]
    CycleDetected { dag_id: String, id: String },
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("Store error: {0}")]
    Store(String),
    #[error("Unsupported statement: {0}")]
    UnsupportedStatement(String),
}

impl DqlError {
    pub fn parse(message: impl Into<String>, position: usize) -> Self {
        Self::Parse {
            message: message.into(),
            position,
        }
    }

    /// True for errors caused by the query text itself rather than by stored state.
    #[must_use]
    pub const fn is_parse_error(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::NotThisStatementKind { .. })
    }
}

impl From<std::io::Error> for DqlError {
    fn from(e: std::io::Error) -> Self {
        Self::Store(format!("IO error: {e}"))
    }
}

impl From<bincode::Error> for DqlError {
    fn from(e: bincode::Error) -> Self {
        Self::Store(format!("Binary serialization error: {e}"))
    }
}
