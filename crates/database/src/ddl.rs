//! DDL Manager: pure orchestration over the Catalog and the ordered index
//! store. Each operation is a catalog mutation paired with an index-file
//! operation; whichever side lands second is the one that can still fail,
//! so on partial failure the catalog edit is rolled back and the error is
//! reported as `DDLFailed`.

use catalog::Catalog;
use common::{Config, DbError, DbResult};
use executor::store::IndexStore;
use parser::ColumnDef;

pub fn create_table(catalog: &mut Catalog, config: &Config, name: &str, columns: Vec<ColumnDef>) -> DbResult<()> {
    let pk = columns
        .iter()
        .find(|c| c.primary_key)
        .map(|c| c.name.clone())
        .ok_or_else(|| DbError::Catalog(format!("table '{name}' declares no primary key")))?;

    let fks = columns
        .iter()
        .filter_map(|c| {
            c.foreign_key
                .as_ref()
                .map(|(ref_table, ref_column)| (c.name.clone(), ref_table.clone(), ref_column.clone()))
        })
        .collect();

    let schema_columns = columns
        .into_iter()
        .map(|c| catalog::Column::new(c.name, c.ty))
        .collect();

    let table_id = catalog.create_table(name, schema_columns, &pk, fks)?;
    tracing::debug!(table = name, "create table");

    let store = IndexStore::new(config);
    let table = catalog.table_by_id(table_id)?;
    if let Err(e) = store.create_table(table) {
        let _ = catalog.drop_table(name);
        return Err(DbError::DDLFailed(format!("create table '{name}' failed: {e}")));
    }
    Ok(())
}

pub fn drop_table(catalog: &mut Catalog, config: &Config, name: &str) -> DbResult<()> {
    let table = catalog.table(name)?.clone();
    catalog.drop_table(name)?;
    tracing::debug!(table = name, "drop table");

    let store = IndexStore::new(config);
    if let Err(e) = store.drop_table(&table) {
        if let Err(restore_err) = catalog.create_table(
            &table.name,
            table.schema.columns.clone(),
            table.schema.primary_key_name(),
            table
                .foreign_keys
                .iter()
                .map(|fk| {
                    (
                        table.schema.columns[fk.column as usize].name.clone(),
                        fk.ref_table.clone(),
                        fk.ref_column.clone(),
                    )
                })
                .collect(),
        ) {
            return Err(DbError::DDLFailed(format!(
                "drop table '{name}' failed to remove index files ({e}), and the catalog rollback also failed: {restore_err}"
            )));
        }
        return Err(DbError::DDLFailed(format!("drop table '{name}' failed: {e}")));
    }
    Ok(())
}

/// The catalog has no separate index-name table — an index is identified
/// by `(table, column)`, same as the implicit PK index. `CREATE INDEX i ON
/// t(c)` and `DROP INDEX i ON t` both name an index `i`, but only the
/// column `c` is ever persisted; `DROP INDEX`'s name token is taken to
/// equal the indexed column name, since nothing else the grammar gives us
/// disambiguates which index `i` refers to.
pub fn create_index(catalog: &mut Catalog, config: &Config, table: &str, column: &str) -> DbResult<()> {
    catalog.create_index(table, column)?;
    tracing::debug!(table, column, "create index");

    let store = IndexStore::new(config);
    let table_meta = catalog.table(table)?;
    if let Err(e) = store.create_secondary_index(table_meta, table_meta.schema.column_index(column).unwrap()) {
        let _ = catalog.drop_index(table, column);
        return Err(DbError::DDLFailed(format!(
            "create index on '{table}.{column}' failed: {e}"
        )));
    }
    Ok(())
}

pub fn drop_index(catalog: &mut Catalog, config: &Config, table: &str, column: &str) -> DbResult<()> {
    catalog.drop_index(table, column)?;
    tracing::debug!(table, column, "drop index");

    let store = IndexStore::new(config);
    if let Err(e) = store.drop_index_file(table, column) {
        let _ = catalog.create_index(table, column);
        return Err(DbError::DDLFailed(format!(
            "drop index on '{table}.{column}' failed: {e}"
        )));
    }
    Ok(())
}
