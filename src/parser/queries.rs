use super::common::TokenCursor;
use super::expression::expression;
use super::lexer::{Token, TokenKind};
use super::statement::{
    Aggregate, AggregateFunc, AggregateOrder, OrderByField, SelectStatement, SortOrder,
};
use crate::core::DqlError;

enum SelectItem {
    Star,
    Field(String),
    Aggregate(Aggregate),
}

// SELECT list FROM table [WHERE expr] [GROUP BY f, ...] [ORDER BY item, ...] [LIMIT n]
pub fn select(cursor: &mut TokenCursor<'_>) -> Result<SelectStatement, DqlError> {
    cursor.expect_keyword("SELECT")?;

    let mut fields = Vec::new();
    let mut aggregates = Vec::new();
    loop {
        match select_item(cursor)? {
            SelectItem::Star => fields.push("*".to_string()),
            SelectItem::Field(f) => fields.push(f),
            SelectItem::Aggregate(a) => aggregates.push(a),
        }
        if !cursor.eat(&TokenKind::Comma) {
            break;
        }
    }

    cursor.expect_keyword("FROM")?;
    let table = cursor.expect_identifier("table name")?;

    let filter = if cursor.eat_keyword("WHERE") {
        Some(expression(cursor)?)
    } else {
        None
    };

    let mut group_by = Vec::new();
    if cursor.eat_keyword("GROUP") {
        cursor.expect_keyword("BY")?;
        loop {
            group_by.push(cursor.expect_identifier("GROUP BY field")?);
            if !cursor.eat(&TokenKind::Comma) {
                break;
            }
        }
    }

    let mut order_by = Vec::new();
    let mut order_by_agg = Vec::new();
    if cursor.eat_keyword("ORDER") {
        cursor.expect_keyword("BY")?;
        loop {
            let item = if starts_aggregate(cursor) {
                OrderItem::Aggregate(aggregate(cursor)?)
            } else {
                OrderItem::Field(cursor.expect_identifier("ORDER BY field")?)
            };
            let order = sort_order(cursor);
            match item {
                OrderItem::Field(field) => order_by.push(OrderByField { field, order }),
                OrderItem::Aggregate(aggregate) => {
                    order_by_agg.push(AggregateOrder { aggregate, order });
                }
            }
            if !cursor.eat(&TokenKind::Comma) {
                break;
            }
        }
    }

    let limit = if cursor.eat_keyword("LIMIT") {
        let position = cursor.position();
        let text = cursor.expect_literal("LIMIT count")?;
        let n: i64 = text
            .parse()
            .map_err(|_| DqlError::parse(format!("invalid LIMIT '{text}'"), position))?;
        usize::try_from(n).ok().filter(|n| *n > 0)
    } else {
        None
    };

    // A lone COUNT(*) is answered from the filtered set's size
    let is_count = fields.is_empty()
        && group_by.is_empty()
        && aggregates.len() == 1
        && aggregates[0].func == AggregateFunc::Count
        && aggregates[0].field == "*";
    if is_count {
        aggregates.clear();
    }

    Ok(SelectStatement {
        fields,
        table,
        filter,
        aggregates,
        group_by,
        order_by,
        order_by_agg,
        limit,
        is_count,
    })
}

enum OrderItem {
    Field(String),
    Aggregate(Aggregate),
}

fn starts_aggregate(cursor: &TokenCursor<'_>) -> bool {
    matches!(
        (cursor.peek(), cursor.peek_nth(1)),
        (
            Some(Token { kind: TokenKind::Word(w), .. }),
            Some(Token { kind: TokenKind::LParen, .. })
        ) if AggregateFunc::from_name(w).is_some()
    )
}

fn select_item(cursor: &mut TokenCursor<'_>) -> Result<SelectItem, DqlError> {
    if starts_aggregate(cursor) {
        return Ok(SelectItem::Aggregate(aggregate(cursor)?));
    }
    if matches!(cursor.peek(), Some(Token { kind: TokenKind::Word(w), .. }) if w == "*") {
        cursor.next();
        return Ok(SelectItem::Star);
    }
    Ok(SelectItem::Field(cursor.expect_identifier("field name")?))
}

// FUNC ( field | * )
fn aggregate(cursor: &mut TokenCursor<'_>) -> Result<Aggregate, DqlError> {
    let position = cursor.position();
    let name = cursor.expect_literal("aggregate function")?;
    let func = AggregateFunc::from_name(&name)
        .ok_or_else(|| DqlError::parse(format!("unknown aggregate function '{name}'"), position))?;
    cursor.expect(&TokenKind::LParen, "'('")?;
    let field = cursor.expect_identifier("aggregate field")?;
    cursor.expect(&TokenKind::RParen, "')'")?;
    Ok(Aggregate::new(func, field))
}

fn sort_order(cursor: &mut TokenCursor<'_>) -> SortOrder {
    if cursor.eat_keyword("DESC") {
        SortOrder::Desc
    } else {
        cursor.eat_keyword("ASC");
        SortOrder::Asc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_select;
    use crate::parser::statement::{CompareOp, Expr};

    #[test]
    fn test_select_star() {
        let stmt = parse_select("SELECT * FROM dag").unwrap();
        assert_eq!(stmt.fields, vec!["*"]);
        assert_eq!(stmt.table, "dag");
        assert!(stmt.filter.is_none());
        assert!(!stmt.is_count);
    }

    #[test]
    fn test_select_all_clauses() {
        let stmt = parse_select(
            "select Id, name from dag where dagid = 'd1' and retries > 1 \
             order by duration desc, id limit 5",
        )
        .unwrap();
        assert_eq!(stmt.fields, vec!["id", "name"]);
        assert_eq!(
            stmt.filter,
            Some(Expr::and(
                Expr::condition("dagid", CompareOp::Eq, "d1"),
                Expr::condition("retries", CompareOp::Gt, "1"),
            ))
        );
        assert_eq!(
            stmt.order_by,
            vec![
                OrderByField { field: "duration".to_string(), order: SortOrder::Desc },
                OrderByField { field: "id".to_string(), order: SortOrder::Asc },
            ]
        );
        assert_eq!(stmt.limit, Some(5));
    }

    #[test]
    fn test_count_star_alone_is_count() {
        let stmt = parse_select("SELECT count(*) FROM dag WHERE status = 'done'").unwrap();
        assert!(stmt.is_count);
        assert!(stmt.aggregates.is_empty());
    }

    #[test]
    fn test_grouped_aggregates() {
        let stmt = parse_select(
            "SELECT status, COUNT(*), avg(duration) FROM dag GROUP BY status ORDER BY AVG(duration) DESC",
        )
        .unwrap();
        assert!(!stmt.is_count);
        assert_eq!(stmt.fields, vec!["status"]);
        assert_eq!(
            stmt.aggregates,
            vec![
                Aggregate::new(AggregateFunc::Count, "*"),
                Aggregate::new(AggregateFunc::Avg, "duration"),
            ]
        );
        assert_eq!(stmt.group_by, vec!["status"]);
        assert_eq!(
            stmt.order_by_agg,
            vec![AggregateOrder {
                aggregate: Aggregate::new(AggregateFunc::Avg, "duration"),
                order: SortOrder::Desc,
            }]
        );
    }

    #[test]
    fn test_non_positive_limit_means_none() {
        assert_eq!(parse_select("SELECT * FROM dag LIMIT 0").unwrap().limit, None);
        assert_eq!(parse_select("SELECT * FROM dag LIMIT -3").unwrap().limit, None);
        assert!(parse_select("SELECT * FROM dag LIMIT ten").is_err());
    }

    #[test]
    fn test_field_named_like_function_without_parens() {
        let stmt = parse_select("SELECT count FROM dag").unwrap();
        assert_eq!(stmt.fields, vec!["count"]);
        assert!(stmt.aggregates.is_empty());
    }

    #[test]
    fn test_clause_errors() {
        assert!(parse_select("SELECT * dag").is_err());
        assert!(parse_select("SELECT * FROM").is_err());
        assert!(parse_select("SELECT * FROM dag GROUP status").is_err());
        assert!(parse_select("SELECT * FROM dag LIMIT 3 WHERE id = 'x'").is_err());
        assert!(parse_select("SELECT SUM(duration FROM dag").is_err());
    }
}
