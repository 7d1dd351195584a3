//! Two-table inner equi-join. The driver side streams one row at a time;
//! the probe side is either an index point-lookup per driver row, or (when
//! the join column carries no index) an in-memory multimap built once by
//! streaming the probe table fully. A self-join reads the same physical
//! table through two independent cursors, so no special-casing is needed
//! beyond letting `table_id` repeat between driver and probe.

use std::collections::{HashMap, VecDeque};

use common::{DbResult, Row, TableId};
use planner::BoundJoin;
use types::Value;

use crate::scan::ScanExec;
use crate::{ExecutionContext, Executor};

pub struct JoinExec {
    driver: Box<dyn Executor>,
    probe_table_id: TableId,
    probe_scan: ScanExec,
    driver_join_column: u16,
    probe_join_column: u16,
    use_index_join: bool,
    hash_map: Option<HashMap<Value, Vec<Row>>>,
    pending: VecDeque<Row>,
}

impl JoinExec {
    pub fn new(driver: Box<dyn Executor>, join: &BoundJoin) -> Self {
        Self {
            driver,
            probe_table_id: join.probe.table_id,
            probe_scan: ScanExec::new(&join.probe),
            driver_join_column: join.driver_join_column,
            probe_join_column: join.probe_join_column,
            use_index_join: join.use_index_join,
            hash_map: None,
            pending: VecDeque::new(),
        }
    }

    fn matches_for(&mut self, ctx: &mut ExecutionContext, key: &Value) -> DbResult<Vec<Row>> {
        if self.use_index_join {
            let table = ctx.catalog.table_by_id(self.probe_table_id)?;
            if self.probe_join_column == table.schema.primary_key {
                Ok(ctx.store.get_row(table, key)?.into_iter().collect())
            } else {
                Ok(ctx
                    .store
                    .secondary_lookup(table, self.probe_join_column, key)?
                    .into_iter()
                    .map(|(_, r)| r)
                    .collect())
            }
        } else {
            Ok(self
                .hash_map
                .as_ref()
                .expect("hash multimap built in open()")
                .get(key)
                .cloned()
                .unwrap_or_default())
        }
    }
}

impl Executor for JoinExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.driver.open(ctx)?;
        if !self.use_index_join {
            self.probe_scan.open(ctx)?;
            let mut map: HashMap<Value, Vec<Row>> = HashMap::new();
            while let Some(row) = self.probe_scan.next(ctx)? {
                let key = row.values[self.probe_join_column as usize].clone();
                map.entry(key).or_default().push(row);
            }
            self.probe_scan.close(ctx)?;
            self.hash_map = Some(map);
        }
        Ok(())
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<Row>> {
        loop {
            if let Some(row) = self.pending.pop_front() {
                return Ok(Some(row));
            }
            let Some(driver_row) = self.driver.next(ctx)? else {
                return Ok(None);
            };
            let key = driver_row.values[self.driver_join_column as usize].clone();
            for probe_row in self.matches_for(ctx, &key)? {
                let mut values = driver_row.values.clone();
                values.extend(probe_row.values);
                self.pending.push_back(Row::new(values));
            }
        }
    }

    fn close(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.driver.close(ctx)
    }
}
