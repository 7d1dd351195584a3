//! Engine Facade: the single synchronous entry point a caller drives the
//! database through. `Engine::execute` takes one statement of SQL text and
//! runs it end to end — parse, bind/plan, execute — never propagating a
//! `DbError` out of the call; every failure is caught and rendered into
//! the response's `error` field instead.
//!
//! This is also where the DDL Manager (`ddl` module) lives: CREATE/DROP
//! TABLE/INDEX are orchestrated here rather than in the executor, since
//! this is the only crate that links against both `catalog` and
//! `executor`'s store.

mod ddl;

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Instant;

use catalog::Catalog;
use common::{Config, DbError, DbResult, RecordBatch, RowMap};
use executor::store::IndexStore;
use executor::{ExecutionContext, execute_delete, execute_insert, execute_select, execute_update};
use parser::parse_sql;
use planner::{BoundStatement, Planner, PlanningContext};

/// The outcome of one `Engine::execute` call, matching the facade's
/// external result shape: either a row set, a row-affected count, or
/// neither (DDL), plus the statement's wall-clock runtime and an error
/// message when the statement failed.
#[derive(Debug, Clone, Default)]
pub struct EngineResponse {
    pub result: Option<Vec<RowMap>>,
    pub rows_affected: Option<u64>,
    pub runtime: f64,
    pub error: Option<String>,
}

impl EngineResponse {
    fn empty() -> Self {
        Self::default()
    }

    fn rows(batch: RecordBatch) -> Self {
        let result = batch
            .rows
            .into_iter()
            .map(|row| batch.columns.iter().cloned().zip(row.into_values()).collect())
            .collect();
        Self {
            result: Some(result),
            ..Default::default()
        }
    }

    fn affected(count: u64) -> Self {
        Self {
            rows_affected: Some(count),
            ..Default::default()
        }
    }
}

/// Holds the exclusive lock on a data directory for the lifetime of an
/// `Engine`. Released on drop, whether the engine shuts down cleanly or is
/// simply dropped after a panic unwinds past it.
struct DirLock {
    path: PathBuf,
}

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn acquire_lock(config: &Config) -> DbResult<DirLock> {
    let path = config.lock_path();
    match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(_) => Ok(DirLock { path }),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(DbError::Storage(format!(
            "data directory '{}' is already locked by another engine instance",
            config.data_dir.display()
        ))),
        Err(e) => Err(e.into()),
    }
}

/// Open every index file a catalog's tables claim to have, strictly: a
/// missing or corrupt file fails the whole open rather than silently
/// recreating storage state the catalog disagrees with.
fn verify_storage(catalog: &Catalog, config: &Config) -> DbResult<()> {
    let store = IndexStore::new(config);
    for table in catalog.tables() {
        store.verify_table(table)?;
    }
    Ok(())
}

/// A single, synchronous database instance bound to one data directory.
/// One statement runs at a time; there is no internal concurrency to
/// manage, and no suspension points to schedule around.
pub struct Engine {
    config: Config,
    catalog: Catalog,
    _lock: DirLock,
}

impl Engine {
    /// Open (or create) the database at `config.data_dir`. Fails if
    /// another `Engine` already holds the directory's lockfile, or if the
    /// catalog references an index file that is missing or corrupt.
    pub fn open(config: Config) -> DbResult<Self> {
        fs::create_dir_all(&config.data_dir)?;
        let lock = acquire_lock(&config)?;
        let catalog = Catalog::load(&config.catalog_path())?;
        verify_storage(&catalog, &config)?;
        catalog.save(&config.catalog_path())?;
        tracing::debug!(data_dir = %config.data_dir.display(), tables = catalog.tables().count(), "engine opened");
        Ok(Self {
            config,
            catalog,
            _lock: lock,
        })
    }

    /// Run one statement of SQL text to completion. Never returns an
    /// error: parse, planning, and execution failures are all caught and
    /// carried in the response's `error` field instead, per the facade's
    /// no-panic contract.
    pub fn execute(&mut self, sql: &str) -> EngineResponse {
        let start = Instant::now();
        match self.run(sql) {
            Ok(mut response) => {
                response.runtime = start.elapsed().as_secs_f64();
                response
            }
            Err(e) => {
                tracing::debug!(error = %e, "statement failed");
                EngineResponse {
                    runtime: start.elapsed().as_secs_f64(),
                    error: Some(e.to_string()),
                    ..Default::default()
                }
            }
        }
    }

    fn run(&mut self, sql: &str) -> DbResult<EngineResponse> {
        let stmt = parse_sql(sql)?;
        let bound = {
            let ctx = PlanningContext::new(&self.catalog);
            Planner::plan(stmt, &ctx)?
        };

        match bound {
            BoundStatement::CreateTable { name, columns } => {
                ddl::create_table(&mut self.catalog, &self.config, &name, columns)?;
                self.save_catalog()?;
                Ok(EngineResponse::empty())
            }
            BoundStatement::DropTable { name } => {
                ddl::drop_table(&mut self.catalog, &self.config, &name)?;
                self.save_catalog()?;
                Ok(EngineResponse::empty())
            }
            BoundStatement::CreateIndex { table, column, .. } => {
                ddl::create_index(&mut self.catalog, &self.config, &table, &column)?;
                self.save_catalog()?;
                Ok(EngineResponse::empty())
            }
            BoundStatement::DropIndex { table, name: column } => {
                ddl::drop_index(&mut self.catalog, &self.config, &table, &column)?;
                self.save_catalog()?;
                Ok(EngineResponse::empty())
            }
            BoundStatement::Insert(insert) => {
                let mut ctx = ExecutionContext::new(&self.catalog, &self.config);
                let affected = execute_insert(&insert, &mut ctx)?;
                Ok(EngineResponse::affected(affected))
            }
            BoundStatement::Update(update) => {
                let mut ctx = ExecutionContext::new(&self.catalog, &self.config);
                let affected = execute_update(&update, &mut ctx)?;
                Ok(EngineResponse::affected(affected))
            }
            BoundStatement::Delete(delete) => {
                let mut ctx = ExecutionContext::new(&self.catalog, &self.config);
                let affected = execute_delete(&delete, &mut ctx)?;
                Ok(EngineResponse::affected(affected))
            }
            BoundStatement::Select(select) => {
                let mut ctx = ExecutionContext::new(&self.catalog, &self.config);
                let batch = execute_select(&select, &mut ctx)?;
                Ok(EngineResponse::rows(batch))
            }
        }
    }

    fn save_catalog(&self) -> DbResult<()> {
        self.catalog.save(&self.config.catalog_path())
    }

    /// The catalog as of the last successfully applied DDL statement.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}
