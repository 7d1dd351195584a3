use super::*;
use expr::{Aggregate, CompareOp, Connective};

#[test]
fn create_table_with_primary_key() {
    let stmt = parse_sql("CREATE TABLE users (id INT PRIMARY KEY, name STRING, age INT)").unwrap();
    match stmt {
        Statement::CreateTable { name, columns } => {
            assert_eq!(name, "users");
            assert_eq!(columns.len(), 3);
            assert!(columns[0].primary_key);
            assert_eq!(columns[0].ty, SqlType::Int64);
            assert_eq!(columns[1].ty, SqlType::Text);
        }
        other => panic!("expected CreateTable, got {other:?}"),
    }
}

#[test]
fn create_table_requires_exactly_one_primary_key() {
    let err = parse_sql("CREATE TABLE t (a INT, b INT)").unwrap_err();
    assert!(matches!(err, DbError::ParseError { .. }));
}

#[test]
fn create_table_with_inline_foreign_key() {
    let stmt = parse_sql(
        "CREATE TABLE orders (order_id INT PRIMARY KEY, user_id INT REFERENCES users(id))",
    )
    .unwrap();
    match stmt {
        Statement::CreateTable { columns, .. } => {
            assert_eq!(
                columns[1].foreign_key,
                Some(("users".to_string(), "id".to_string()))
            );
        }
        other => panic!("expected CreateTable, got {other:?}"),
    }
}

#[test]
fn create_table_with_table_level_foreign_key() {
    let stmt = parse_sql(
        "CREATE TABLE orders (order_id INT PRIMARY KEY, user_id INT, FOREIGN KEY (user_id) REFERENCES users(id))",
    )
    .unwrap();
    match stmt {
        Statement::CreateTable { columns, .. } => {
            assert_eq!(
                columns[1].foreign_key,
                Some(("users".to_string(), "id".to_string()))
            );
        }
        other => panic!("expected CreateTable, got {other:?}"),
    }
}

#[test]
fn drop_table() {
    let stmt = parse_sql("DROP TABLE users").unwrap();
    assert_eq!(
        stmt,
        Statement::DropTable {
            name: "users".into()
        }
    );
}

#[test]
fn create_and_drop_index() {
    let stmt = parse_sql("CREATE INDEX idx_name ON users(name)").unwrap();
    assert_eq!(
        stmt,
        Statement::CreateIndex {
            name: "idx_name".into(),
            table: "users".into(),
            column: "name".into(),
        }
    );

    let stmt = parse_sql("DROP INDEX idx_name ON users").unwrap();
    assert_eq!(
        stmt,
        Statement::DropIndex {
            name: "idx_name".into(),
            table: "users".into(),
        }
    );
}

#[test]
fn insert_with_explicit_columns() {
    let stmt = parse_sql("INSERT INTO users (id, name, age) VALUES (1, 'Will', 27)").unwrap();
    match stmt {
        Statement::Insert {
            table,
            columns,
            values,
        } => {
            assert_eq!(table, "users");
            assert_eq!(columns, Some(vec!["id".into(), "name".into(), "age".into()]));
            assert_eq!(
                values,
                vec![Value::Int(1), Value::Text("Will".into()), Value::Int(27)]
            );
        }
        other => panic!("expected Insert, got {other:?}"),
    }
}

#[test]
fn insert_without_columns_covers_full_row() {
    let stmt = parse_sql("INSERT INTO users VALUES (1, 'Will', 27.5)").unwrap();
    match stmt {
        Statement::Insert {
            columns, values, ..
        } => {
            assert_eq!(columns, None);
            assert_eq!(values[2], Value::Double(27.5));
        }
        other => panic!("expected Insert, got {other:?}"),
    }
}

#[test]
fn select_wildcard_with_where() {
    let stmt = parse_sql("SELECT * FROM users WHERE age > 20").unwrap();
    match stmt {
        Statement::Select {
            projections,
            from,
            selection,
            ..
        } => {
            assert_eq!(projections, vec![Projection::Wildcard]);
            assert_eq!(from.name, "users");
            let Predicate::Leaf(cmp) = selection.unwrap() else {
                panic!("expected leaf predicate")
            };
            assert_eq!(cmp.op, CompareOp::Gt);
        }
        other => panic!("expected Select, got {other:?}"),
    }
}

#[test]
fn select_with_compound_predicate() {
    let stmt = parse_sql("SELECT id FROM users WHERE age > 20 AND id = 1").unwrap();
    match stmt {
        Statement::Select { selection, .. } => {
            let Predicate::Compound { op, .. } = selection.unwrap() else {
                panic!("expected compound predicate")
            };
            assert_eq!(op, Connective::And);
        }
        other => panic!("expected Select, got {other:?}"),
    }
}

#[test]
fn select_with_join_and_aggregate_and_group_by() {
    let stmt = parse_sql(
        "SELECT orders.user_id, SUM(orders.amount) FROM orders JOIN users ON orders.user_id = users.id GROUP BY orders.user_id HAVING SUM(orders.amount) > 100",
    )
    .unwrap();
    match stmt {
        Statement::Select {
            projections,
            join,
            group_by,
            having,
            ..
        } => {
            assert_eq!(projections.len(), 2);
            assert!(matches!(
                &projections[1],
                Projection::Aggregate {
                    func: Aggregate::Sum,
                    ..
                }
            ));
            let join = join.expect("join clause expected");
            assert_eq!(join.other.name, "users");
            assert_eq!(group_by.len(), 1);
            assert!(having.is_some());
        }
        other => panic!("expected Select, got {other:?}"),
    }
}

#[test]
fn select_self_join_uses_aliases() {
    let stmt = parse_sql(
        "SELECT e_l.id, e_r.id FROM employees AS e_l JOIN employees AS e_r ON e_l.manager_id = e_r.id",
    )
    .unwrap();
    match stmt {
        Statement::Select { from, join, .. } => {
            assert_eq!(from.logical_name(), "e_l");
            let join = join.unwrap();
            assert_eq!(join.other.logical_name(), "e_r");
            assert_eq!(join.on.0.table.as_deref(), Some("e_l"));
            assert_eq!(join.on.1.table.as_deref(), Some("e_r"));
        }
        other => panic!("expected Select, got {other:?}"),
    }
}

#[test]
fn select_with_order_by() {
    let stmt = parse_sql("SELECT * FROM users ORDER BY age DESC, id ASC").unwrap();
    match stmt {
        Statement::Select { order_by, .. } => {
            assert_eq!(order_by.len(), 2);
            assert_eq!(order_by[0].direction, SortDirection::Desc);
            assert_eq!(order_by[1].direction, SortDirection::Asc);
        }
        other => panic!("expected Select, got {other:?}"),
    }
}

#[test]
fn delete_with_where() {
    let stmt = parse_sql("DELETE FROM users WHERE id = 1").unwrap();
    match stmt {
        Statement::Delete { table, selection } => {
            assert_eq!(table, "users");
            assert!(selection.is_some());
        }
        other => panic!("expected Delete, got {other:?}"),
    }
}

#[test]
fn update_with_where() {
    let stmt = parse_sql("UPDATE users SET age = 30 WHERE id = 1").unwrap();
    match stmt {
        Statement::Update {
            table,
            set,
            selection,
        } => {
            assert_eq!(table, "users");
            assert_eq!(set, vec![("age".to_string(), Value::Int(30))]);
            assert!(selection.is_some());
        }
        other => panic!("expected Update, got {other:?}"),
    }
}

#[test]
fn predicate_with_more_than_two_leaves_is_rejected() {
    let err = parse_sql("SELECT * FROM users WHERE a = 1 AND b = 2 AND c = 3").unwrap_err();
    assert!(matches!(err, DbError::ParseError { .. }));
}

#[test]
fn unsupported_comparison_operator_is_rejected() {
    let err = parse_sql("SELECT * FROM users WHERE age >= 20").unwrap_err();
    assert!(matches!(err, DbError::ParseError { .. }));
}

#[test]
fn statement_batching_is_rejected() {
    let err = parse_sql("SELECT * FROM users; SELECT * FROM orders").unwrap_err();
    assert!(matches!(err, DbError::ParseError { .. }));
}
