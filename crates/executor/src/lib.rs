//! DML Executor: a small Volcano-style (open/next/close) pipeline of
//! physical operators that runs a `planner::BoundStatement` against the
//! ordered index store, plus the INSERT/UPDATE/DELETE entry points that
//! don't need a pull interface.
//!
//! The operator pipeline for a bound `SELECT` is exactly spec.md §4.F's
//! seven stages: access path (built into the leaf scan), join, filter,
//! group+aggregate, having, order by, project.

mod dml;
mod filter;
mod group;
mod join;
mod project;
mod scan;
mod sort;
pub mod store;


use std::time::Instant;

use catalog::Catalog;
use common::{DbResult, ExecutionStats, Row};
pub use dml::{execute_delete, execute_insert, execute_update};
use planner::{AccessPath, BoundSelect};
use store::IndexStore;

/// Pull-based physical operator. Every stage of the pipeline implements
/// this the same way regardless of what it buffers internally.
pub trait Executor {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()>;
    fn next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<Row>>;
    fn close(&mut self, ctx: &mut ExecutionContext) -> DbResult<()>;
}

/// Everything a statement's operators need for the duration of one
/// execution: catalog metadata, a handle to the ordered index store, and
/// the running timing/row-count stats the facade's debug hook surfaces.
pub struct ExecutionContext<'a> {
    pub catalog: &'a Catalog,
    pub store: IndexStore<'a>,
    pub stats: ExecutionStats,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(catalog: &'a Catalog, config: &'a common::Config) -> Self {
        Self {
            catalog,
            store: IndexStore::new(config),
            stats: ExecutionStats::default(),
        }
    }
}

fn describe_access_path(path: &AccessPath) -> String {
    match path {
        AccessPath::FullScan => "FullScan".to_string(),
        AccessPath::IndexRange { column, .. } => format!("IndexRange(column={column})"),
    }
}

fn build_pipeline(sel: &BoundSelect) -> Box<dyn Executor> {
    let mut exec: Box<dyn Executor> = Box::new(scan::ScanExec::new(&sel.driver));

    if let Some(join) = &sel.join {
        exec = Box::new(join::JoinExec::new(exec, join));
    }
    if let Some(pred) = &sel.filter {
        exec = Box::new(filter::FilterExec::new(exec, pred.clone()));
    }
    if !sel.group_by.is_empty() || !sel.aggregates.is_empty() {
        exec = Box::new(group::GroupAggregateExec::new(
            exec,
            sel.group_by.clone(),
            sel.aggregates.clone(),
        ));
    }
    if let Some(pred) = &sel.having {
        exec = Box::new(filter::FilterExec::new(exec, pred.clone()));
    }
    if !sel.order_by.is_empty() {
        exec = Box::new(sort::SortExec::new(exec, sel.order_by.clone()));
    }
    Box::new(project::ProjectExec::new(exec, sel.projections.clone()))
}

/// Run a bound `SELECT` to completion and return its result set.
pub fn execute_select(sel: &BoundSelect, ctx: &mut ExecutionContext) -> DbResult<common::RecordBatch> {
    let mut pipeline = build_pipeline(sel);
    let access_path = describe_access_path(&sel.driver.access_path);
    tracing::debug!(driver = %sel.driver.logical_name, %access_path, "executing select");
    ctx.stats.access_path = Some(access_path);

    let open_start = Instant::now();
    pipeline.open(ctx)?;
    ctx.stats.open_time = open_start.elapsed();

    let mut rows = Vec::new();
    loop {
        let next_start = Instant::now();
        let row = pipeline.next(ctx)?;
        ctx.stats.total_next_time += next_start.elapsed();
        match row {
            Some(row) => rows.push(row),
            None => break,
        }
    }

    let close_start = Instant::now();
    pipeline.close(ctx)?;
    ctx.stats.close_time = close_start.elapsed();

    let columns = sel.projections.iter().map(|p| p.label.clone()).collect();
    Ok(common::RecordBatch { columns, rows })
}
