//! Leaf operator: reads one base table through whichever access path the
//! planner chose, via the ordered index store.

use catalog::TableMeta;
use common::{DbResult, Row};
use planner::{AccessPath, BoundTable, IndexBound};

use crate::store::IndexStore;
use crate::{ExecutionContext, Executor};

/// Materializes one access path's result set up front (the store itself
/// has no lazy cursor to pull from — `BTreeIndex::range`/`full_scan`
/// already return a `Vec`) and streams it out one row at a time.
pub struct ScanExec {
    table_id: common::TableId,
    access_path: AccessPath,
    rows: std::vec::IntoIter<Row>,
}

impl ScanExec {
    pub fn new(table: &BoundTable) -> Self {
        Self {
            table_id: table.table_id,
            access_path: table.access_path.clone(),
            rows: Vec::new().into_iter(),
        }
    }

    fn load(table: &TableMeta, access_path: &AccessPath, store: &IndexStore) -> DbResult<Vec<Row>> {
        let rows = match access_path {
            AccessPath::FullScan => store.full_scan(table)?.into_iter().map(|(_, r)| r).collect(),
            AccessPath::IndexRange { column, bound } => {
                let is_pk = *column == table.schema.primary_key;
                match bound {
                    IndexBound::Eq(value) => {
                        if is_pk {
                            store
                                .get_row(table, value)?
                                .into_iter()
                                .collect::<Vec<_>>()
                        } else {
                            store
                                .secondary_lookup(table, *column, value)?
                                .into_iter()
                                .map(|(_, r)| r)
                                .collect()
                        }
                    }
                    IndexBound::Range { low, high } => {
                        let low_ref = low.as_ref().map(|(v, incl)| (v, *incl));
                        let high_ref = high.as_ref().map(|(v, incl)| (v, *incl));
                        if is_pk {
                            store
                                .pk_range(table, low_ref, high_ref)?
                                .into_iter()
                                .map(|(_, r)| r)
                                .collect()
                        } else {
                            store
                                .secondary_range(table, *column, low_ref, high_ref)?
                                .into_iter()
                                .map(|(_, r)| r)
                                .collect()
                        }
                    }
                }
            }
        };
        Ok(rows)
    }
}

impl Executor for ScanExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        let table = ctx.catalog.table_by_id(self.table_id)?;
        let rows = Self::load(table, &self.access_path, &ctx.store)?;
        self.rows = rows.into_iter();
        Ok(())
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<Row>> {
        let row = self.rows.next();
        if row.is_some() {
            ctx.stats.rows_produced += 1;
        }
        Ok(row)
    }

    fn close(&mut self, _ctx: &mut ExecutionContext) -> DbResult<()> {
        Ok(())
    }
}
