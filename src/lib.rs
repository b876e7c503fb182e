// dagenie - task DAG store queried through DQL
// Modular architecture: parser -> executor -> storage, served over TCP

// Clippy configuration - allow non-critical warnings
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::format_push_string)]
#![allow(clippy::items_after_statements)]

// Task model, field accessors, errors, object ids
pub mod core;

// DQL lexer and parsers (SELECT, INSERT, UPDATE, DELETE, namespace commands)
pub mod parser;

// Statement execution (filters, aggregates, DML, dispatch)
pub mod executor;

// Storage layer (snapshot + WAL per namespace, graph view, registry)
pub mod storage;

// Server configuration (file + env)
pub mod config;

// TCP line protocol and result rendering
pub mod network;

// Re-export commonly used types for convenience
pub use core::{DqlError, Field, FieldValue, ObjectIdGenerator, Task, TaskKey};
pub use executor::{DispatchOutcome, Dispatcher, QueryResult};
pub use network::Server;
pub use parser::{parse_statement, Statement};
pub use storage::{GraphView, NamespaceRegistry, TaskStore};
