use super::common::TokenCursor;
use super::statement::Statement;
use crate::core::DqlError;

// Namespace names are taken verbatim; the registry validates them.
fn namespace_name(cursor: &mut TokenCursor<'_>) -> Result<String, DqlError> {
    cursor.expect_literal("database name")
}

pub fn create_database(cursor: &mut TokenCursor<'_>) -> Result<Statement, DqlError> {
    cursor.expect_keyword("CREATE")?;
    cursor.expect_keyword("DATABASE")?;
    let name = namespace_name(cursor)?;
    Ok(Statement::CreateDatabase { name })
}

pub fn use_database(cursor: &mut TokenCursor<'_>) -> Result<Statement, DqlError> {
    cursor.expect_keyword("USE")?;
    let name = namespace_name(cursor)?;
    Ok(Statement::UseDatabase { name })
}

pub fn show_databases(cursor: &mut TokenCursor<'_>) -> Result<Statement, DqlError> {
    cursor.expect_keyword("SHOW")?;
    cursor.expect_keyword("DATABASES")?;
    Ok(Statement::ShowDatabases)
}

pub fn drop_database(cursor: &mut TokenCursor<'_>) -> Result<Statement, DqlError> {
    cursor.expect_keyword("DROP")?;
    cursor.expect_keyword("DATABASE")?;
    let name = namespace_name(cursor)?;
    Ok(Statement::DropDatabase { name })
}
