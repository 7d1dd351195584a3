use super::*;
use std::io;

#[test]
fn config_defaults_are_sane() {
    let cfg = Config::default();
    assert_eq!(cfg.page_size, 4096);
    assert_eq!(cfg.data_dir, PathBuf::from("./db_data"));
}

#[test]
fn config_derives_file_paths() {
    let cfg = Config::builder().data_dir(PathBuf::from("/tmp/db")).build();
    assert_eq!(cfg.catalog_path(), PathBuf::from("/tmp/db/catalog.json"));
    assert_eq!(cfg.lock_path(), PathBuf::from("/tmp/db/LOCK"));
    assert_eq!(
        cfg.index_path("users", "name"),
        PathBuf::from("/tmp/db/users__name.idx")
    );
}

#[test]
fn db_error_formats_cleanly() {
    let err = DbError::Storage("corruption".into());
    assert!(format!("{err}").contains("storage"));

    let err = DbError::TypeMismatch {
        expected: SqlType::Int64,
        found: SqlType::Text,
    };
    assert!(format!("{err}").contains("INT64"));
}

#[test]
fn recordbatch_consistency() {
    let rb = RecordBatch {
        columns: vec!["id".into()],
        rows: vec![Row::new(vec![Value::Int(1)])],
    };
    assert_eq!(rb.columns.len(), 1);
    assert_eq!(rb.rows[0].values.len(), 1);
}

#[test]
fn io_error_converts() {
    let e = io::Error::other("oops");
    let db_err: DbError = e.into();
    assert!(matches!(db_err, DbError::Io(_)));
}
