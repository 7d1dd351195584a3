//! ORDER BY. Buffers its entire input and stable-sorts it once, so ties
//! preserve upstream order.

use common::{DbResult, Row};
use parser::SortDirection;

use crate::{ExecutionContext, Executor};

pub struct SortExec {
    input: Box<dyn Executor>,
    keys: Vec<(usize, SortDirection)>,
    output: std::vec::IntoIter<Row>,
}

impl SortExec {
    pub fn new(input: Box<dyn Executor>, keys: Vec<(usize, SortDirection)>) -> Self {
        Self {
            input,
            keys,
            output: Vec::new().into_iter(),
        }
    }
}

impl Executor for SortExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.input.open(ctx)?;
        let mut rows = Vec::new();
        while let Some(row) = self.input.next(ctx)? {
            rows.push(row);
        }
        self.input.close(ctx)?;

        rows.sort_by(|a, b| {
            for (idx, dir) in &self.keys {
                let ord = a.values[*idx]
                    .cmp_same_type(&b.values[*idx])
                    .unwrap_or(std::cmp::Ordering::Equal);
                let ord = match dir {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                };
                if ord != std::cmp::Ordering::Equal {
                    return ord;
                }
            }
            std::cmp::Ordering::Equal
        });

        self.output = rows.into_iter();
        Ok(())
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<Row>> {
        let row = self.output.next();
        if row.is_some() {
            ctx.stats.rows_produced += 1;
        }
        Ok(row)
    }

    fn close(&mut self, _ctx: &mut ExecutionContext) -> DbResult<()> {
        Ok(())
    }
}
