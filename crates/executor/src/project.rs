//! Final column selection: emits only the requested output columns, in
//! the order they were requested.

use common::{DbResult, Row};
use planner::BoundProjection;

use crate::{ExecutionContext, Executor};

pub struct ProjectExec {
    input: Box<dyn Executor>,
    projections: Vec<BoundProjection>,
}

impl ProjectExec {
    pub fn new(input: Box<dyn Executor>, projections: Vec<BoundProjection>) -> Self {
        Self { input, projections }
    }
}

impl Executor for ProjectExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.input.open(ctx)
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<Row>> {
        let Some(row) = self.input.next(ctx)? else {
            return Ok(None);
        };
        let values = self.projections.iter().map(|p| row.values[p.index].clone()).collect();
        Ok(Some(Row::new(values)))
    }

    fn close(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.input.close(ctx)
    }
}
