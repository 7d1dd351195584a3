//! Integration tests for the `Engine` facade: one statement of SQL text in,
//! one `EngineResponse` out, end to end through a real data directory.

use common::Config;
use database::{Engine, EngineResponse};
use tempfile::tempdir;
use types::Value;

fn engine_at(dir: &std::path::Path) -> Engine {
    let config = Config::builder().data_dir(dir.to_path_buf()).build();
    Engine::open(config).unwrap()
}

/// The result rows are `map<string, value>` per the facade's external
/// result shape — unordered by design — so tests read a named column out
/// of each row rather than assume a positional tuple shape.
fn col<'a>(response: &'a EngineResponse, row: usize, name: &str) -> &'a Value {
    &response.result.as_ref().unwrap()[row][name]
}

#[test]
fn scenario_duplicate_primary_key_is_rejected() {
    let dir = tempdir().unwrap();
    let mut engine = engine_at(dir.path());

    engine.execute("CREATE TABLE u (id INT PRIMARY KEY, name STRING)");
    engine.execute("INSERT INTO u (id, name) VALUES (1, 'a')");
    let second = engine.execute("INSERT INTO u (id, name) VALUES (1, 'b')");
    assert!(second.error.as_deref().unwrap().contains("primary key"));

    let select = engine.execute("SELECT * FROM u");
    assert_eq!(select.result.as_ref().unwrap().len(), 1);
}

#[test]
fn scenario_insert_with_dangling_foreign_key_is_rejected() {
    let dir = tempdir().unwrap();
    let mut engine = engine_at(dir.path());

    engine.execute("CREATE TABLE p (id INT PRIMARY KEY)");
    engine.execute("CREATE TABLE c (id INT PRIMARY KEY, pid INT REFERENCES p(id))");
    let result = engine.execute("INSERT INTO c (id, pid) VALUES (1, 7)");
    assert!(result.error.as_deref().unwrap().to_lowercase().contains("foreign key"));
}

#[test]
fn scenario_drop_table_refused_while_referenced() {
    let dir = tempdir().unwrap();
    let mut engine = engine_at(dir.path());

    engine.execute("CREATE TABLE p (id INT PRIMARY KEY)");
    engine.execute("CREATE TABLE c (id INT PRIMARY KEY, pid INT REFERENCES p(id))");
    engine.execute("INSERT INTO p (id) VALUES (1)");
    engine.execute("INSERT INTO p (id) VALUES (2)");
    engine.execute("INSERT INTO p (id) VALUES (3)");

    let drop_attempt = engine.execute("DROP TABLE p");
    assert!(drop_attempt.error.is_some());

    assert!(engine.execute("DROP TABLE c").error.is_none());
    assert!(engine.execute("DROP TABLE p").error.is_none());
}

#[test]
fn scenario_self_join_orders_by_driver_pk() {
    let dir = tempdir().unwrap();
    let mut engine = engine_at(dir.path());

    engine.execute("CREATE TABLE r (id INT PRIMARY KEY, value INT)");
    engine.execute("INSERT INTO r (id, value) VALUES (1, 2)");
    engine.execute("INSERT INTO r (id, value) VALUES (2, 3)");
    engine.execute("INSERT INTO r (id, value) VALUES (3, 1)");

    let result = engine.execute("SELECT r_L.id, r_R.id FROM r JOIN r ON r_L.id = r_R.value");
    let rows = result.result.as_ref().unwrap();
    assert_eq!(rows.len(), 3);
    let pairs: Vec<(Value, Value)> = (0..3)
        .map(|i| (col(&result, i, "r_L.id").clone(), col(&result, i, "r_R.id").clone()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            (Value::Int(1), Value::Int(3)),
            (Value::Int(2), Value::Int(1)),
            (Value::Int(3), Value::Int(2)),
        ]
    );
}

#[test]
fn scenario_aggregation_with_having() {
    // `id` is the primary key, so grouping by it would trivially produce one
    // singleton group per row; group by `value` instead so a HAVING clause
    // actually has to discard a real multi-row group.
    let dir = tempdir().unwrap();
    let mut engine = engine_at(dir.path());

    engine.execute("CREATE TABLE r (id INT PRIMARY KEY, value INT)");
    engine.execute("INSERT INTO r (id, value) VALUES (1, 10)");
    engine.execute("INSERT INTO r (id, value) VALUES (2, 20)");
    engine.execute("INSERT INTO r (id, value) VALUES (3, 20)");

    let result = engine.execute("SELECT value, SUM(id) FROM r GROUP BY value HAVING SUM(id) > 1");
    assert_eq!(result.result.as_ref().unwrap().len(), 1);
    assert_eq!(col(&result, 0, "value"), &Value::Int(20));
    assert_eq!(col(&result, 0, "SUM(id)"), &Value::Int(5));
}

#[test]
fn scenario_create_index_preserves_result_set_and_is_observable() {
    let dir = tempdir().unwrap();
    let mut engine = engine_at(dir.path());

    engine.execute("CREATE TABLE t (id INT PRIMARY KEY, k INT)");
    for i in 0..200 {
        let k = if i == 42 { 42 } else { i + 1000 };
        engine.execute(&format!("INSERT INTO t (id, k) VALUES ({i}, {k})"));
    }

    let before = engine.execute("SELECT * FROM t WHERE k = 42");
    assert_eq!(before.result.as_ref().unwrap().len(), 1);

    assert!(engine.execute("CREATE INDEX ix ON t(k)").error.is_none());

    let after = engine.execute("SELECT * FROM t WHERE k = 42");
    assert_eq!(after.result, before.result);
}

#[test]
fn reopening_a_data_directory_restores_rows_across_engine_instances() {
    let dir = tempdir().unwrap();
    {
        let mut engine = engine_at(dir.path());
        engine.execute("CREATE TABLE u (id INT PRIMARY KEY, name STRING)");
        engine.execute("INSERT INTO u (id, name) VALUES (1, 'a')");
    }

    let mut engine = engine_at(dir.path());
    let result = engine.execute("SELECT * FROM u");
    assert_eq!(result.result.as_ref().unwrap().len(), 1);
    assert_eq!(col(&result, 0, "id"), &Value::Int(1));
    assert_eq!(col(&result, 0, "name"), &Value::Text("a".into()));
}

#[test]
fn opening_the_same_data_directory_twice_is_rejected() {
    let dir = tempdir().unwrap();
    let config = Config::builder().data_dir(dir.path().to_path_buf()).build();
    let _first = Engine::open(config.clone()).unwrap();

    let second = Engine::open(config);
    assert!(second.is_err());
}

#[test]
fn select_on_unknown_table_surfaces_as_a_typed_error_not_a_panic() {
    let dir = tempdir().unwrap();
    let mut engine = engine_at(dir.path());

    let result = engine.execute("SELECT * FROM ghost");
    assert!(result.error.is_some());
    assert!(result.result.is_none());
}

#[test]
fn update_and_delete_report_rows_affected() {
    let dir = tempdir().unwrap();
    let mut engine = engine_at(dir.path());

    engine.execute("CREATE TABLE u (id INT PRIMARY KEY, name STRING)");
    engine.execute("INSERT INTO u (id, name) VALUES (1, 'a')");
    engine.execute("INSERT INTO u (id, name) VALUES (2, 'b')");

    let updated = engine.execute("UPDATE u SET name = 'z' WHERE id = 1");
    assert_eq!(updated.rows_affected, Some(1));

    let deleted = engine.execute("DELETE FROM u WHERE id = 2");
    assert_eq!(deleted.rows_affected, Some(1));

    let remaining = engine.execute("SELECT * FROM u");
    assert_eq!(remaining.result.as_ref().unwrap().len(), 1);
}
