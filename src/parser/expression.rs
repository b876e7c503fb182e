//! Boolean WHERE expressions.
//!
//! ```text
//! expression := and ('OR' and)*
//! and        := not ('AND' not)*
//! not        := 'NOT' atom | atom
//! atom       := '(' expression ')' | field op literal
//! ```

use super::common::TokenCursor;
use super::lexer::{tokenize, TokenKind};
use super::statement::Expr;
use crate::core::DqlError;

/// Parse a standalone expression. All of `input` must be consumed.
pub fn parse_expression(input: &str) -> Result<Expr, DqlError> {
    let tokens = tokenize(input)?;
    let mut cursor = TokenCursor::new(&tokens, input.len());
    let expr = expression(&mut cursor)?;
    cursor.expect_end()?;
    Ok(expr)
}

pub(crate) fn expression(cursor: &mut TokenCursor<'_>) -> Result<Expr, DqlError> {
    let mut left = and_expr(cursor)?;
    while cursor.eat_keyword("OR") {
        let right = and_expr(cursor)?;
        left = Expr::or(left, right);
    }
    Ok(left)
}

fn and_expr(cursor: &mut TokenCursor<'_>) -> Result<Expr, DqlError> {
    let mut left = not_expr(cursor)?;
    while cursor.eat_keyword("AND") {
        let right = not_expr(cursor)?;
        left = Expr::and(left, right);
    }
    Ok(left)
}

fn not_expr(cursor: &mut TokenCursor<'_>) -> Result<Expr, DqlError> {
    if cursor.eat_keyword("NOT") {
        Ok(Expr::not(atom(cursor)?))
    } else {
        atom(cursor)
    }
}

fn atom(cursor: &mut TokenCursor<'_>) -> Result<Expr, DqlError> {
    if cursor.eat(&TokenKind::LParen) {
        let inner = expression(cursor)?;
        cursor.expect(&TokenKind::RParen, "')'")?;
        return Ok(inner);
    }

    let field = cursor.expect_identifier("field name")?;

    if cursor.peek_keyword("LIKE") {
        return Err(DqlError::parse("LIKE operator is not supported", cursor.position()));
    }
    let op = match cursor.peek().map(|t| &t.kind) {
        Some(TokenKind::Op(op)) => *op,
        _ => return Err(cursor.unexpected("comparison operator")),
    };
    cursor.next();

    let value = cursor.expect_literal("value")?;
    Ok(Expr::condition(field, op, value))
}
