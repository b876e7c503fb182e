// End-to-end DQL tests: text in, structured results out, against an on-disk store

use dagenie::core::FieldValue;
use dagenie::executor::{AggregateValue, QueryResult};
use dagenie::parser::parse_expression;
use dagenie::{Dispatcher, DqlError, NamespaceRegistry, TaskStore};
use std::sync::Arc;
use tempfile::TempDir;

struct Harness {
    _dir: TempDir,
    registry: NamespaceRegistry,
    store: Arc<TaskStore>,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let registry = NamespaceRegistry::new(dir.path()).unwrap();
        let store = registry.open_or_create("default").unwrap();
        Self {
            _dir: dir,
            registry,
            store,
        }
    }

    fn run(&self, query: &str) -> Result<QueryResult, DqlError> {
        Dispatcher::execute(&self.registry, &self.store, query).map(|o| o.result)
    }

    fn insert(&self, dag: &str, id: &str, status: &str, deps: &str, duration: i64) -> Result<QueryResult, DqlError> {
        self.run(&format!(
            "INSERT INTO dag (id, name, status, payload, dependencies, dagid, duration, retries) \
             VALUES ('{id}', 'n{id}', '{status}', '{{}}', '{deps}', '{dag}', '{duration}', '0')"
        ))
    }

    fn rows(&self, query: &str) -> (Vec<String>, Vec<Vec<FieldValue>>) {
        match self.run(query).unwrap() {
            QueryResult::Rows { columns, rows } => (columns, rows),
            other => panic!("expected rows, got {other:?}"),
        }
    }

    fn ids(&self, query: &str) -> Vec<String> {
        let (columns, rows) = self.rows(query);
        let idx = columns.iter().position(|c| c == "id").unwrap();
        rows.iter().map(|r| r[idx].to_string()).collect()
    }
}

#[test]
fn expression_rendering_round_trips() {
    let cases = [
        ("a = '1' AND b = '2' OR c = '3'", "((a = '1' AND b = '2') OR c = '3')"),
        ("a = '1' OR b = '2' AND c = '3'", "(a = '1' OR (b = '2' AND c = '3'))"),
        ("NOT (a = '1' OR b != '2')", "NOT (a = '1' OR b != '2')"),
        ("(a >= 5 AND b < 3) OR NOT c <= 'x'", "((a >= '5' AND b < '3') OR NOT (c <= 'x'))"),
    ];
    for (input, canonical) in cases {
        let expr = parse_expression(input).unwrap();
        assert_eq!(expr.to_string(), canonical, "rendering of {input}");
        assert_eq!(parse_expression(&expr.to_string()).unwrap(), expr, "round trip of {input}");
    }
}

#[test]
fn insert_then_select_by_dag() {
    let h = Harness::new();
    let QueryResult::Inserted { object_id, .. } = h
        .run(
            "INSERT INTO dag (id,name,status,payload,dependencies,dagid,duration,retries) \
             VALUES ('t1','n1','pending','{}','[]','d1','5','0')",
        )
        .unwrap()
    else {
        panic!("expected insert result");
    };

    let (columns, rows) = h.rows("SELECT * FROM dag WHERE dagid='d1'");
    assert_eq!(rows.len(), 1);
    let row: Vec<String> = rows[0].iter().map(ToString::to_string).collect();
    assert_eq!(
        columns,
        vec!["id", "name", "status", "payload", "dependencies", "dagid", "duration", "retries", "_id"]
    );
    assert_eq!(row, vec!["t1", "n1", "pending", "{}", "[]", "d1", "5", "0", object_id.as_str()]);

    h.insert("d1", "t2", "pending", "[]", 1).unwrap();
    let (_, rows) = h.rows("SELECT _id FROM dag");
    assert_ne!(rows[0][0], rows[1][0]);
}

#[test]
fn cycle_is_rejected_and_store_unchanged() {
    let h = Harness::new();
    h.insert("d1", "a", "p", "[]", 1).unwrap();
    h.insert("d1", "b", "p", r#"["a"]"#, 1).unwrap();
    h.insert("d1", "c", "p", r#"["b"]"#, 1).unwrap();
    let before = h.store.list_all().unwrap();

    let err = h.run(r#"UPDATE dag SET dependencies = '["c"]' WHERE id = 'a'"#).unwrap_err();
    assert!(matches!(err, DqlError::CycleDetected { .. }));
    let err = h.insert("d1", "a", "p", r#"["c"]"#, 1).unwrap_err();
    assert!(matches!(err, DqlError::Validation(_)));

    assert_eq!(h.store.list_all().unwrap(), before);

    // Same ids in another DAG do not form a cycle
    h.insert("d2", "a", "p", r#"["c"]"#, 1).unwrap();
}

#[test]
fn self_dependency_is_a_cycle() {
    let h = Harness::new();
    let err = h.insert("d1", "a", "p", r#"["a"]"#, 1).unwrap_err();
    assert!(matches!(err, DqlError::CycleDetected { .. }));
    assert!(h.store.is_empty());
}

#[test]
fn key_migration_keeps_other_fields() {
    let h = Harness::new();
    h.insert("d1", "y", "pending", "[]", 4).unwrap();
    let before = h.rows("SELECT * FROM dag WHERE id = 'y'").1;

    assert_eq!(h.run("UPDATE dag SET id='x' WHERE id='y'").unwrap(), QueryResult::Updated(1));

    assert!(h.ids("SELECT id FROM dag WHERE id = 'y'").is_empty());
    let after = h.rows("SELECT * FROM dag WHERE id = 'x'").1;
    assert_eq!(after.len(), 1);
    for (i, (b, a)) in before[0].iter().zip(&after[0]).enumerate() {
        if i != 0 {
            assert_eq!(a, b, "column {i} changed");
        }
    }
    assert_eq!(h.run("SELECT COUNT(*) FROM dag").unwrap(), QueryResult::Count(1));
}

#[test]
fn key_migration_onto_existing_key_fails() {
    let h = Harness::new();
    h.insert("d1", "x", "p", "[]", 1).unwrap();
    h.insert("d1", "y", "p", "[]", 1).unwrap();
    assert!(matches!(h.run("UPDATE dag SET id='x' WHERE id='y'"), Err(DqlError::Validation(_))));
    assert_eq!(h.ids("SELECT id FROM dag ORDER BY id"), vec!["x", "y"]);
}

#[test]
fn aggregates_on_empty_set() {
    let h = Harness::new();
    h.insert("d1", "a", "done", "[]", 3).unwrap();

    let result = h
        .run("SELECT SUM(duration), AVG(duration), COUNT(*), MAX(duration), MIN(retries) FROM dag WHERE status = 'nope'")
        .unwrap();
    let QueryResult::Aggregates { values, .. } = result else {
        panic!("expected aggregates, got {result:?}");
    };
    assert_eq!(
        values,
        vec![
            AggregateValue::Int(0),
            AggregateValue::Float(0.0),
            AggregateValue::Int(0),
            AggregateValue::Empty,
            AggregateValue::Empty,
        ]
    );
    assert_eq!(h.run("SELECT COUNT(*) FROM dag WHERE status = 'nope'").unwrap(), QueryResult::Count(0));
}

#[test]
fn group_by_keeps_first_seen_order() {
    let h = Harness::new();
    for (i, status) in ["b", "a", "b", "a"].iter().enumerate() {
        h.insert("d1", &format!("t{i}"), status, "[]", i as i64).unwrap();
    }

    let QueryResult::Groups { rows, .. } = h.run("SELECT COUNT(*), SUM(duration) FROM dag GROUP BY status").unwrap()
    else {
        panic!("expected groups");
    };
    let keys: Vec<&str> = rows.iter().map(|r| r.key[0].as_str()).collect();
    assert_eq!(keys, vec!["b", "a"]);
    // b: t0 + t2, a: t1 + t3
    assert_eq!(rows[0].values, vec![AggregateValue::Int(2), AggregateValue::Int(2)]);
    assert_eq!(rows[1].values, vec![AggregateValue::Int(2), AggregateValue::Int(4)]);

    let QueryResult::Groups { rows, .. } = h
        .run("SELECT SUM(duration) FROM dag GROUP BY status ORDER BY SUM(duration) DESC LIMIT 1")
        .unwrap()
    else {
        panic!("expected groups");
    };
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].key, vec!["a"]);
}

#[test]
fn limit_respects_order_and_zero_means_all() {
    let h = Harness::new();
    for (id, duration) in [("a", 10), ("b", 2), ("c", 7), ("d", 2)] {
        h.insert("d1", id, "p", "[]", duration).unwrap();
    }

    let baseline = h.ids("SELECT id FROM dag ORDER BY duration, id");
    assert_eq!(baseline, vec!["b", "d", "c", "a"]);
    assert_eq!(h.ids("SELECT id FROM dag ORDER BY duration, id LIMIT 2"), baseline[..2]);
    assert_eq!(h.ids("SELECT id FROM dag ORDER BY duration, id LIMIT 0"), baseline);
    assert_eq!(h.ids("SELECT id FROM dag ORDER BY duration, id LIMIT 99"), baseline);
}

#[test]
fn delete_reports_no_match_and_count() {
    let h = Harness::new();
    h.insert("d1", "a", "done", "[]", 1).unwrap();
    h.insert("d1", "b", "done", "[]", 1).unwrap();
    h.insert("d1", "c", "pending", "[]", 1).unwrap();

    let QueryResult::Deleted(none) = h.run("DELETE FROM dag WHERE status = 'gone'").unwrap() else {
        panic!("expected delete summary");
    };
    assert_eq!((none.matched, none.deleted), (0, 0));

    let QueryResult::Deleted(done) = h.run("DELETE FROM dag WHERE dagid = 'd1' AND status = 'done'").unwrap() else {
        panic!("expected delete summary");
    };
    assert_eq!((done.matched, done.deleted), (2, 2));
    assert!(done.failures.is_empty());
    assert_eq!(h.ids("SELECT id FROM dag"), vec!["c"]);
}

#[test]
fn errors_leave_session_usable() {
    let h = Harness::new();
    assert!(h.run("SELECT FROM").unwrap_err().is_parse_error());
    assert!(matches!(h.run("SELECT * FROM dag WHERE name LIKE 'a%'"), Err(DqlError::Parse { .. })));
    assert!(matches!(h.run("MERGE INTO dag"), Err(DqlError::UnsupportedStatement(_))));
    assert!(matches!(h.run("SELECT * FROM jobs"), Err(DqlError::UnsupportedStatement(_))));
    assert!(matches!(h.run("SELECT owner FROM dag"), Err(DqlError::Validation(_))));
    h.insert("d1", "a", "p", "[]", 1).unwrap();
}

#[test]
fn data_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let registry = NamespaceRegistry::with_snapshot_threshold(dir.path(), 2).unwrap();
        let store = registry.open_or_create("proj").unwrap();
        for (id, deps) in [("a", "[]"), ("b", r#"["a"]"#), ("c", r#"["a"]"#)] {
            Dispatcher::execute(
                &registry,
                &store,
                &format!(
                    "INSERT INTO dag (id, name, status, payload, dependencies, dagid, duration, retries) \
                     VALUES ('{id}', 'n', 'p', '{{}}', '{deps}', 'd1', '1', '0')"
                ),
            )
            .unwrap();
        }
        Dispatcher::execute(&registry, &store, "UPDATE dag SET id = 'c2' WHERE id = 'c'").unwrap();
        registry.close_all();
    }

    let registry = NamespaceRegistry::new(dir.path()).unwrap();
    let store = registry.open("proj").unwrap();
    assert_eq!(store.len(), 3);
    assert!(store.get("d1", "c").unwrap().is_none());

    let order: Vec<String> = store.graph().breadth_first("d1", "a").into_iter().map(|t| t.id).collect();
    assert_eq!(order, vec!["a", "b", "c2"]);
}

#[test]
fn namespaces_are_isolated() {
    let h = Harness::new();
    h.insert("d1", "a", "p", "[]", 1).unwrap();
    h.run("CREATE DATABASE other").unwrap();

    let outcome = Dispatcher::execute(&h.registry, &h.store, "USE other").unwrap();
    let (_, other) = outcome.switch_to.unwrap();
    assert_eq!(
        Dispatcher::execute(&h.registry, &other, "SELECT COUNT(*) FROM dag").unwrap().result,
        QueryResult::Count(0)
    );
    assert_eq!(h.run("SELECT COUNT(*) FROM dag").unwrap(), QueryResult::Count(1));
}
