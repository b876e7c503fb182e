// Module declarations
mod common;
mod dml;
mod expression;
mod lexer;
mod meta;
mod queries;
mod statement;

// Re-export all public types
pub use expression::parse_expression;
pub use lexer::{tokenize, Token, TokenKind};
pub use statement::{
    Aggregate, AggregateFunc, AggregateOrder, CompareOp, Condition, DeleteStatement, Expr,
    InsertStatement, OrderByField, SelectStatement, SortOrder, Statement, UpdateStatement,
};

use crate::core::DqlError;
use common::TokenCursor;

/// Drop surrounding whitespace and a single trailing `;`.
fn clean(input: &str) -> &str {
    let input = input.trim();
    input.strip_suffix(';').map_or(input, str::trim_end)
}

/// Run `parser` over the whole of `input`, rejecting leftovers.
fn parse_all<T>(
    input: &str,
    parser: impl FnOnce(&mut TokenCursor<'_>) -> Result<T, DqlError>,
) -> Result<T, DqlError> {
    let tokens = tokenize(input)?;
    let mut cursor = TokenCursor::new(&tokens, input.len());
    let parsed = parser(&mut cursor)?;
    cursor.expect_end()?;
    Ok(parsed)
}

/// Check the leading keyword before handing a statement to its parser.
fn expect_kind(input: &str, keyword: &'static str) -> Result<(), DqlError> {
    let first = input.split_whitespace().next().unwrap_or("");
    if first.eq_ignore_ascii_case(keyword) {
        Ok(())
    } else {
        Err(DqlError::NotThisStatementKind {
            expected: keyword,
            found: first.to_string(),
        })
    }
}

pub fn parse_select(input: &str) -> Result<SelectStatement, DqlError> {
    let input = clean(input);
    expect_kind(input, "SELECT")?;
    parse_all(input, queries::select)
}

pub fn parse_insert(input: &str) -> Result<InsertStatement, DqlError> {
    let input = clean(input);
    expect_kind(input, "INSERT")?;
    parse_all(input, dml::insert)
}

pub fn parse_update(input: &str) -> Result<UpdateStatement, DqlError> {
    let input = clean(input);
    expect_kind(input, "UPDATE")?;
    parse_all(input, dml::update)
}

pub fn parse_delete(input: &str) -> Result<DeleteStatement, DqlError> {
    let input = clean(input);
    expect_kind(input, "DELETE")?;
    parse_all(input, dml::delete)
}

/// Classify `input` by its leading keyword and parse it.
pub fn parse_statement(input: &str) -> Result<Statement, DqlError> {
    let input = clean(input);
    let mut words = input.split_whitespace();
    let first = words.next().unwrap_or("").to_ascii_uppercase();
    let second = words.next().unwrap_or("").to_ascii_uppercase();

    match (first.as_str(), second.as_str()) {
        ("", _) => Err(DqlError::parse("empty query", 0)),
        ("SELECT", _) => parse_select(input).map(Statement::Select),
        ("INSERT", _) => parse_insert(input).map(Statement::Insert),
        ("UPDATE", _) => parse_update(input).map(Statement::Update),
        ("DELETE", _) => parse_delete(input).map(Statement::Delete),
        ("CREATE", "DATABASE") => parse_all(input, meta::create_database),
        ("DROP", "DATABASE") => parse_all(input, meta::drop_database),
        ("SHOW", "DATABASES") => parse_all(input, meta::show_databases),
        ("USE", _) => parse_all(input, meta::use_database),
        _ => Err(DqlError::UnsupportedStatement(
            input.split_whitespace().take(2).collect::<Vec<_>>().join(" "),
        )),
    }
}
