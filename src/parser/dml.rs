use super::common::TokenCursor;
use super::expression::expression;
use super::lexer::TokenKind;
use super::statement::{CompareOp, DeleteStatement, Expr, InsertStatement, UpdateStatement};
use crate::core::DqlError;

// INSERT INTO table ( col, ... ) VALUES ( val, ... )
pub fn insert(cursor: &mut TokenCursor<'_>) -> Result<InsertStatement, DqlError> {
    cursor.expect_keyword("INSERT")?;
    cursor.expect_keyword("INTO")?;
    let table = cursor.expect_identifier("table name")?;

    cursor.expect(&TokenKind::LParen, "'(' before column list")?;
    let mut columns = Vec::new();
    loop {
        columns.push(cursor.expect_identifier("column name")?);
        if !cursor.eat(&TokenKind::Comma) {
            break;
        }
    }
    cursor.expect(&TokenKind::RParen, "')' after column list")?;

    cursor.expect_keyword("VALUES")?;
    let values_position = cursor.position();
    cursor.expect(&TokenKind::LParen, "'(' before value list")?;
    let mut values = Vec::new();
    loop {
        values.push(cursor.expect_literal("value")?);
        if !cursor.eat(&TokenKind::Comma) {
            break;
        }
    }
    cursor.expect(&TokenKind::RParen, "')' after value list")?;

    if columns.len() != values.len() {
        return Err(DqlError::parse(
            format!("{} columns but {} values", columns.len(), values.len()),
            values_position,
        ));
    }

    Ok(InsertStatement {
        table,
        columns,
        values,
    })
}

// UPDATE table SET field = value, ... [WHERE expr]
pub fn update(cursor: &mut TokenCursor<'_>) -> Result<UpdateStatement, DqlError> {
    cursor.expect_keyword("UPDATE")?;
    let table = cursor.expect_identifier("table name")?;
    cursor.expect_keyword("SET")?;

    let mut set_fields = Vec::new();
    loop {
        let field = cursor.expect_identifier("field name")?;
        cursor.expect(&TokenKind::Op(CompareOp::Eq), "'='")?;
        let value = cursor.expect_literal("value")?;
        set_fields.push((field, value));
        if !cursor.eat(&TokenKind::Comma) {
            break;
        }
    }

    let filter = where_clause(cursor)?;
    Ok(UpdateStatement {
        table,
        set_fields,
        filter,
    })
}

// DELETE FROM table [WHERE expr]
pub fn delete(cursor: &mut TokenCursor<'_>) -> Result<DeleteStatement, DqlError> {
    cursor.expect_keyword("DELETE")?;
    cursor.expect_keyword("FROM")?;
    let table = cursor.expect_identifier("table name")?;
    let filter = where_clause(cursor)?;
    Ok(DeleteStatement { table, filter })
}

fn where_clause(cursor: &mut TokenCursor<'_>) -> Result<Option<Expr>, DqlError> {
    if cursor.eat_keyword("WHERE") {
        Ok(Some(expression(cursor)?))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_delete, parse_insert, parse_update};

    #[test]
    fn test_insert() {
        let stmt = parse_insert(
            "INSERT INTO dag (id, name, dependencies, payload) VALUES ('t1', n1, '[\"t0\"]', '{\"a\": 1}')",
        )
        .unwrap();
        assert_eq!(stmt.table, "dag");
        assert_eq!(stmt.columns, vec!["id", "name", "dependencies", "payload"]);
        assert_eq!(stmt.values, vec!["t1", "n1", "[\"t0\"]", "{\"a\": 1}"]);
    }

    #[test]
    fn test_insert_count_mismatch() {
        let err = parse_insert("INSERT INTO dag (id, name) VALUES ('t1')").unwrap_err();
        assert!(err.to_string().contains("2 columns but 1 values"));
    }

    #[test]
    fn test_insert_requires_parens() {
        assert!(parse_insert("INSERT INTO dag id VALUES ('t1')").is_err());
        assert!(parse_insert("INSERT INTO dag (id) VALUES 't1'").is_err());
        assert!(parse_insert("INSERT dag (id) VALUES ('t1')").is_err());
    }

    #[test]
    fn test_update() {
        let stmt = parse_update("UPDATE dag SET Status = 'done', retries=2 WHERE id = 't1' OR id = 't2'").unwrap();
        assert_eq!(
            stmt.set_fields,
            vec![
                ("status".to_string(), "done".to_string()),
                ("retries".to_string(), "2".to_string()),
            ]
        );
        assert_eq!(
            stmt.filter,
            Some(Expr::or(
                Expr::condition("id", CompareOp::Eq, "t1"),
                Expr::condition("id", CompareOp::Eq, "t2"),
            ))
        );
    }

    #[test]
    fn test_update_errors() {
        assert!(parse_update("UPDATE dag status = 'done'").is_err());
        assert!(parse_update("UPDATE dag SET status 'done'").is_err());
        assert!(parse_update("UPDATE dag SET status < 'done'").is_err());
    }

    #[test]
    fn test_delete() {
        let stmt = parse_delete("delete from dag").unwrap();
        assert!(stmt.filter.is_none());
        let stmt = parse_delete("DELETE FROM dag WHERE NOT status = 'done'").unwrap();
        assert_eq!(stmt.filter, Some(Expr::not(Expr::condition("status", CompareOp::Eq, "done"))));
        assert!(parse_delete("DELETE dag WHERE id = 't1'").is_err());
    }
}
