//! INSERT/UPDATE/DELETE. These run as plain functions rather than
//! `Executor`-trait operators: none of them needs a pull interface beyond
//! a single full-table pass to find matching rows, and a plain function
//! makes the rollback-on-partial-failure control flow easier to read than
//! threading it through `open`/`next`/`close`.

use catalog::{Catalog, TableMeta};
use common::{ColumnId, DbError, DbResult, Row};
use planner::{BoundDelete, BoundInsert, BoundUpdate};
use types::Value;

use crate::filter::eval_predicate;
use crate::store::IndexStore;
use crate::ExecutionContext;

fn pk_value(table: &TableMeta, row: &Row) -> Value {
    row.values[table.schema.primary_key as usize].clone()
}

/// Every table whose own foreign key points back at `table_name`, paired
/// with the column that holds the reference.
fn referencing_tables<'a>(catalog: &'a Catalog, table_name: &str) -> Vec<(&'a TableMeta, ColumnId)> {
    catalog
        .tables()
        .filter_map(|t| {
            t.foreign_keys
                .iter()
                .find(|fk| fk.ref_table == table_name)
                .map(|fk| (t, fk.column))
        })
        .collect()
}

fn check_not_referenced(catalog: &Catalog, store: &IndexStore, table: &TableMeta, pk: &Value) -> DbResult<()> {
    for (referencing, column) in referencing_tables(catalog, &table.name) {
        for (_, row) in store.full_scan(referencing)? {
            if &row.values[column as usize] == pk {
                return Err(DbError::FKViolation(format!(
                    "row '{pk}' in '{}' is referenced by '{}'",
                    table.name, referencing.name
                )));
            }
        }
    }
    Ok(())
}

fn check_fk_targets(catalog: &Catalog, store: &IndexStore, table: &TableMeta, row: &Row) -> DbResult<()> {
    for fk in &table.foreign_keys {
        let ref_table = catalog.table(&fk.ref_table)?;
        let value = &row.values[fk.column as usize];
        if store.get_row(ref_table, value)?.is_none() {
            return Err(DbError::FKViolation(format!(
                "no row in '{}' with {} = {value}",
                fk.ref_table, fk.ref_column
            )));
        }
    }
    Ok(())
}

/// Insert `(pk -> value)` into every secondary index on `table`, rolling
/// back any index already written if a later one fails.
fn insert_secondary_indexes(store: &IndexStore, table: &TableMeta, pk: &Value, row: &Row) -> DbResult<()> {
    let mut done = Vec::new();
    for index in table.indexes() {
        let value = row.values[index.column as usize].clone();
        if let Err(e) = store.secondary_add(table, index.column, &value, pk) {
            for (col, val) in done {
                let _: DbResult<()> = store.secondary_remove(table, col, &val, pk);
            }
            return Err(e);
        }
        done.push((index.column, value));
    }
    Ok(())
}

pub fn execute_insert(insert: &BoundInsert, ctx: &mut ExecutionContext) -> DbResult<u64> {
    let catalog = ctx.catalog;
    let store = &ctx.store;
    let table = catalog.table_by_id(insert.table_id)?;
    let row = Row::new(insert.values.clone());
    let pk = pk_value(table, &row);
    tracing::debug!(table = %table.name, %pk, "insert");

    if store.get_row(table, &pk)?.is_some() {
        return Err(DbError::PKViolation(format!(
            "duplicate primary key {pk} on '{}'",
            table.name
        )));
    }
    check_fk_targets(catalog, store, table, &row)?;

    store.put_row(table, &pk, &row)?;
    if let Err(e) = insert_secondary_indexes(store, table, &pk, &row) {
        let _ = store.delete_row(table, &pk);
        return Err(e);
    }
    ctx.stats.rows_produced += 1;
    Ok(1)
}

pub fn execute_update(update: &BoundUpdate, ctx: &mut ExecutionContext) -> DbResult<u64> {
    let catalog = ctx.catalog;
    let store = &ctx.store;
    let table = catalog.table_by_id(update.table_id)?;
    tracing::debug!(table = %table.name, assignments = update.assignments.len(), "update");

    // Snapshot matched rows before mutating, so a PK rewrite mid-loop
    // can't disturb the set of rows still to be visited.
    let mut matched = Vec::new();
    for (_, row) in store.full_scan(table)? {
        let keep = match &update.predicate {
            Some(pred) => eval_predicate(pred, &row)?,
            None => true,
        };
        if keep {
            matched.push(row);
        }
    }

    let mut affected = 0u64;
    for old_row in matched {
        let old_pk = pk_value(table, &old_row);
        let mut new_values = old_row.values.clone();
        for (column, value) in &update.assignments {
            new_values[*column as usize] = value.clone();
        }
        let new_row = Row::new(new_values);
        let new_pk = pk_value(table, &new_row);
        let pk_changed = new_pk != old_pk;

        if pk_changed {
            if store.get_row(table, &new_pk)?.is_some() {
                return Err(DbError::PKViolation(format!(
                    "duplicate primary key {new_pk} on '{}'",
                    table.name
                )));
            }
            check_not_referenced(catalog, store, table, &old_pk)?;
        }
        check_fk_targets(catalog, store, table, &new_row)?;

        for index in table.indexes() {
            let old_val = &old_row.values[index.column as usize];
            let new_val = &new_row.values[index.column as usize];
            if pk_changed || old_val != new_val {
                store.secondary_remove(table, index.column, old_val, &old_pk)?;
                store.secondary_add(table, index.column, new_val, &new_pk)?;
            }
        }

        if pk_changed {
            store.delete_row(table, &old_pk)?;
        }
        store.put_row(table, &new_pk, &new_row)?;
        affected += 1;
    }
    ctx.stats.rows_produced += affected;
    Ok(affected)
}

pub fn execute_delete(delete: &BoundDelete, ctx: &mut ExecutionContext) -> DbResult<u64> {
    let catalog = ctx.catalog;
    let store = &ctx.store;
    let table = catalog.table_by_id(delete.table_id)?;
    tracing::debug!(table = %table.name, "delete");

    let mut matched = Vec::new();
    for (pk, row) in store.full_scan(table)? {
        let keep = match &delete.predicate {
            Some(pred) => eval_predicate(pred, &row)?,
            None => true,
        };
        if keep {
            matched.push((pk, row));
        }
    }

    for (pk, _) in &matched {
        check_not_referenced(catalog, store, table, pk)?;
    }

    for (pk, row) in &matched {
        for index in table.indexes() {
            let value = &row.values[index.column as usize];
            store.secondary_remove(table, index.column, value, pk)?;
        }
        store.delete_row(table, pk)?;
    }
    ctx.stats.rows_produced += matched.len() as u64;
    Ok(matched.len() as u64)
}
