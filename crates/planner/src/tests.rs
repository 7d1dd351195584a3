use super::*;
use catalog::Column;
use parser::parse_sql;

fn sample_catalog() -> Catalog {
    let mut catalog = Catalog::new();
    catalog
        .create_table(
            "users",
            vec![
                Column::new("id", SqlType::Int64),
                Column::new("name", SqlType::Text),
            ],
            "id",
            vec![],
        )
        .unwrap();
    catalog
        .create_table(
            "orders",
            vec![
                Column::new("order_id", SqlType::Int64),
                Column::new("user_id", SqlType::Int64),
                Column::new("amount", SqlType::Double),
            ],
            "order_id",
            vec![("user_id".into(), "users".into(), "id".into())],
        )
        .unwrap();
    catalog
}

fn plan(catalog: &Catalog, sql: &str) -> DbResult<BoundStatement> {
    let stmt = parse_sql(sql).unwrap();
    let ctx = PlanningContext::new(catalog);
    Planner::plan(stmt, &ctx)
}

#[test]
fn binds_insert_with_explicit_column_order() {
    let catalog = sample_catalog();
    let bound = plan(&catalog, "INSERT INTO users (name, id) VALUES ('Will', 1)").unwrap();
    match bound {
        BoundStatement::Insert(ins) => {
            assert_eq!(ins.values, vec![Value::Int(1), Value::Text("Will".into())]);
        }
        other => panic!("expected Insert, got {other:?}"),
    }
}

#[test]
fn insert_rejects_wrong_value_type() {
    let catalog = sample_catalog();
    let err = plan(&catalog, "INSERT INTO users (id, name) VALUES ('x', 'Will')").unwrap_err();
    assert!(matches!(err, DbError::TypeMismatch { .. }));
}

#[test]
fn insert_requires_every_column() {
    let catalog = sample_catalog();
    let err = plan(&catalog, "INSERT INTO users (id) VALUES (1)").unwrap_err();
    assert!(matches!(err, DbError::Planner(_)));
}

#[test]
fn insert_into_unknown_table_is_rejected() {
    let catalog = sample_catalog();
    let err = plan(&catalog, "INSERT INTO ghosts (id) VALUES (1)").unwrap_err();
    assert!(matches!(err, DbError::UnknownTable(_)));
}

#[test]
fn select_full_scan_without_indexed_predicate() {
    let catalog = sample_catalog();
    let bound = plan(&catalog, "SELECT * FROM users WHERE name = 'Will'").unwrap();
    match bound {
        BoundStatement::Select(sel) => {
            assert_eq!(sel.driver.access_path, AccessPath::FullScan);
            assert_eq!(sel.projections.len(), 2);
        }
        other => panic!("expected Select, got {other:?}"),
    }
}

#[test]
fn single_table_wildcard_output_labels_are_unqualified() {
    let catalog = sample_catalog();
    let bound = plan(&catalog, "SELECT * FROM users").unwrap();
    match bound {
        BoundStatement::Select(sel) => {
            let labels: Vec<&str> = sel.projections.iter().map(|p| p.label.as_str()).collect();
            assert_eq!(labels, vec!["id", "name"]);
        }
        other => panic!("expected Select, got {other:?}"),
    }
}

#[test]
fn joined_wildcard_output_labels_stay_qualified() {
    let catalog = sample_catalog();
    let bound = plan(
        &catalog,
        "SELECT * FROM orders JOIN users ON orders.user_id = users.id",
    )
    .unwrap();
    match bound {
        BoundStatement::Select(sel) => {
            assert!(sel
                .projections
                .iter()
                .all(|p| p.label.contains('.')));
        }
        other => panic!("expected Select, got {other:?}"),
    }
}

#[test]
fn select_uses_primary_key_index_range() {
    let catalog = sample_catalog();
    let bound = plan(&catalog, "SELECT * FROM users WHERE id = 1").unwrap();
    match bound {
        BoundStatement::Select(sel) => {
            assert_eq!(
                sel.driver.access_path,
                AccessPath::IndexRange {
                    column: 0,
                    bound: IndexBound::Eq(Value::Int(1)),
                }
            );
        }
        other => panic!("expected Select, got {other:?}"),
    }
}

#[test]
fn select_prefers_primary_key_over_secondary_index() {
    let mut catalog = sample_catalog();
    catalog.create_index("users", "name").unwrap();
    let bound = plan(&catalog, "SELECT * FROM users WHERE name = 'Will' AND id = 1").unwrap();
    match bound {
        BoundStatement::Select(sel) => {
            assert!(matches!(
                sel.driver.access_path,
                AccessPath::IndexRange { column: 0, .. }
            ));
        }
        other => panic!("expected Select, got {other:?}"),
    }
}

#[test]
fn join_binds_columns_and_checks_type_equality() {
    let catalog = sample_catalog();
    let bound = plan(
        &catalog,
        "SELECT orders.order_id, users.name FROM orders JOIN users ON orders.user_id = users.id",
    )
    .unwrap();
    match bound {
        BoundStatement::Select(sel) => {
            let join = sel.join.expect("join expected");
            // users.id is the PK, so the probe side drives an index join.
            assert!(join.use_index_join);
            assert_eq!(sel.base_schema.len(), 5);
            assert_eq!(sel.projections.len(), 2);
        }
        other => panic!("expected Select, got {other:?}"),
    }
}

#[test]
fn self_join_disambiguates_sides_with_l_r_suffixes() {
    let mut catalog = Catalog::new();
    catalog
        .create_table(
            "r",
            vec![Column::new("id", SqlType::Int64), Column::new("value", SqlType::Int64)],
            "id",
            vec![],
        )
        .unwrap();
    let bound = plan(
        &catalog,
        "SELECT r_L.id, r_R.id FROM r JOIN r ON r_L.id = r_R.value",
    )
    .unwrap();
    match bound {
        BoundStatement::Select(sel) => {
            assert_eq!(sel.driver.logical_name, "r_L");
            assert_eq!(sel.join.unwrap().probe.logical_name, "r_R");
            let labels: Vec<&str> = sel.projections.iter().map(|p| p.label.as_str()).collect();
            assert_eq!(labels, vec!["r_L.id", "r_R.id"]);
        }
        other => panic!("expected Select, got {other:?}"),
    }
}

#[test]
fn unqualified_where_column_ambiguous_across_a_join_is_rejected() {
    let mut catalog = Catalog::new();
    catalog
        .create_table(
            "a",
            vec![Column::new("id", SqlType::Int64), Column::new("val", SqlType::Int64)],
            "id",
            vec![],
        )
        .unwrap();
    catalog
        .create_table(
            "b",
            vec![
                Column::new("id", SqlType::Int64),
                Column::new("val", SqlType::Int64),
                Column::new("aid", SqlType::Int64),
            ],
            "id",
            vec![("aid".into(), "a".into(), "id".into())],
        )
        .unwrap();

    let err = plan(&catalog, "SELECT val FROM a JOIN b ON a.id = b.aid WHERE val = 5").unwrap_err();
    match err {
        DbError::AmbiguousColumn { column, candidates } => {
            assert_eq!(column, "val");
            assert_eq!(candidates.len(), 2);
        }
        other => panic!("expected AmbiguousColumn, got {other:?}"),
    }
}

#[test]
fn join_with_mismatched_types_is_rejected() {
    let mut catalog = sample_catalog();
    catalog
        .create_table(
            "tags",
            vec![
                Column::new("tag_id", SqlType::Int64),
                Column::new("label", SqlType::Text),
            ],
            "tag_id",
            vec![],
        )
        .unwrap();
    let err = plan(
        &catalog,
        "SELECT * FROM orders JOIN tags ON orders.user_id = tags.label",
    )
    .unwrap_err();
    assert!(matches!(err, DbError::TypeMismatch { .. }));
}

#[test]
fn group_by_requires_non_aggregated_projection_to_be_grouped() {
    let catalog = sample_catalog();
    let err = plan(
        &catalog,
        "SELECT orders.order_id, SUM(orders.amount) FROM orders GROUP BY orders.user_id",
    )
    .unwrap_err();
    assert!(matches!(err, DbError::AggregationMisuse(_)));
}

#[test]
fn aggregate_without_group_by_requires_all_projections_to_be_aggregates() {
    let catalog = sample_catalog();
    let err = plan(&catalog, "SELECT orders.order_id, SUM(orders.amount) FROM orders").unwrap_err();
    assert!(matches!(err, DbError::AggregationMisuse(_)));
}

#[test]
fn sum_over_text_column_is_rejected() {
    let catalog = sample_catalog();
    let err = plan(&catalog, "SELECT SUM(name) FROM users").unwrap_err();
    assert!(matches!(err, DbError::TypeMismatch { .. }));
}

#[test]
fn group_by_with_having_binds_aggregate_reference() {
    let catalog = sample_catalog();
    let bound = plan(
        &catalog,
        "SELECT orders.user_id, SUM(orders.amount) FROM orders GROUP BY orders.user_id HAVING SUM(orders.amount) > 100",
    )
    .unwrap();
    match bound {
        BoundStatement::Select(sel) => {
            assert_eq!(sel.group_by.len(), 1);
            assert_eq!(sel.aggregates.len(), 1);
            assert_eq!(sel.aggregates[0].func, Aggregate::Sum);
            assert!(sel.having.is_some());
            assert_eq!(sel.value_labels, vec!["orders.user_id", "SUM(orders.amount)"]);
        }
        other => panic!("expected Select, got {other:?}"),
    }
}

#[test]
fn having_outside_group_by_or_aggregate_is_rejected() {
    let catalog = sample_catalog();
    let err = plan(
        &catalog,
        "SELECT orders.user_id, SUM(orders.amount) FROM orders GROUP BY orders.user_id HAVING orders.amount > 1",
    )
    .unwrap_err();
    assert!(matches!(err, DbError::AggregationMisuse(_)));
}

#[test]
fn order_by_binds_against_projected_schema() {
    let catalog = sample_catalog();
    let bound = plan(&catalog, "SELECT * FROM users ORDER BY name DESC").unwrap();
    match bound {
        BoundStatement::Select(sel) => {
            assert_eq!(sel.order_by.len(), 1);
            assert_eq!(sel.order_by[0].1, SortDirection::Desc);
        }
        other => panic!("expected Select, got {other:?}"),
    }
}

#[test]
fn update_targeting_primary_key_is_flagged() {
    let catalog = sample_catalog();
    let bound = plan(&catalog, "UPDATE users SET id = 2 WHERE id = 1").unwrap();
    match bound {
        BoundStatement::Update(upd) => assert!(upd.touches_pk),
        other => panic!("expected Update, got {other:?}"),
    }
}

#[test]
fn update_with_wrong_value_type_is_rejected() {
    let catalog = sample_catalog();
    let err = plan(&catalog, "UPDATE users SET name = 1 WHERE id = 1").unwrap_err();
    assert!(matches!(err, DbError::TypeMismatch { .. }));
}

#[test]
fn delete_binds_predicate_against_table_schema() {
    let catalog = sample_catalog();
    let bound = plan(&catalog, "DELETE FROM users WHERE id = 1").unwrap();
    match bound {
        BoundStatement::Delete(del) => assert!(del.predicate.is_some()),
        other => panic!("expected Delete, got {other:?}"),
    }
}

#[test]
fn drop_table_checks_existence() {
    let catalog = sample_catalog();
    let err = plan(&catalog, "DROP TABLE ghosts").unwrap_err();
    assert!(matches!(err, DbError::UnknownTable(_)));
}

#[test]
fn create_index_checks_column_existence() {
    let catalog = sample_catalog();
    let err = plan(&catalog, "CREATE INDEX ix ON users(missing)").unwrap_err();
    assert!(matches!(err, DbError::UnknownColumn(_)));
}

#[test]
fn create_table_passes_through_unchanged() {
    let catalog = sample_catalog();
    let bound = plan(&catalog, "CREATE TABLE t (a INT PRIMARY KEY, b STRING)").unwrap();
    match bound {
        BoundStatement::CreateTable { name, columns } => {
            assert_eq!(name, "t");
            assert_eq!(columns.len(), 2);
        }
        other => panic!("expected CreateTable, got {other:?}"),
    }
}
