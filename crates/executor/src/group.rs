//! Group + aggregate. Buffers its entire input, per spec §9 ("join and
//! group operators buffer as specified"): there is no way to know a
//! group's final MIN/MAX/SUM until every row that could fall into it has
//! been seen.

use std::collections::HashMap;

use common::{DbError, DbResult, Row};
use expr::Aggregate;
use planner::BoundAggregate;
use types::Value;

use crate::{ExecutionContext, Executor};

#[derive(Clone)]
enum AggAcc {
    MinMax(Option<Value>),
    Sum(Option<Value>),
}

impl AggAcc {
    fn new(func: Aggregate) -> Self {
        match func {
            Aggregate::Min | Aggregate::Max => AggAcc::MinMax(None),
            Aggregate::Sum => AggAcc::Sum(None),
        }
    }

    fn feed(&mut self, func: Aggregate, value: &Value) -> DbResult<()> {
        match self {
            AggAcc::MinMax(slot) => {
                *slot = Some(match slot.take() {
                    None => value.clone(),
                    Some(current) => {
                        let ord = current.cmp_same_type(value).ok_or_else(|| DbError::TypeMismatch {
                            expected: current.sql_type(),
                            found: value.sql_type(),
                        })?;
                        let take_new = match func {
                            Aggregate::Min => ord == std::cmp::Ordering::Greater,
                            Aggregate::Max => ord == std::cmp::Ordering::Less,
                            Aggregate::Sum => unreachable!("MinMax accumulator never holds Sum"),
                        };
                        if take_new { value.clone() } else { current }
                    }
                });
            }
            AggAcc::Sum(slot) => {
                *slot = Some(match slot.take() {
                    None => value.clone(),
                    Some(current) => match (current, value) {
                        (Value::Int(a), Value::Int(b)) => Value::Int(a + b),
                        (Value::Double(a), Value::Double(b)) => Value::Double(a + b),
                        (a, b) => {
                            return Err(DbError::TypeMismatch {
                                expected: a.sql_type(),
                                found: b.sql_type(),
                            })
                        }
                    },
                });
            }
        }
        Ok(())
    }

    fn finish(self) -> Value {
        match self {
            AggAcc::MinMax(v) => v.expect("group always has at least one row"),
            AggAcc::Sum(v) => v.expect("group always has at least one row"),
        }
    }
}

pub struct GroupAggregateExec {
    input: Box<dyn Executor>,
    group_by: Vec<usize>,
    aggregates: Vec<BoundAggregate>,
    output: std::vec::IntoIter<Row>,
}

impl GroupAggregateExec {
    pub fn new(input: Box<dyn Executor>, group_by: Vec<usize>, aggregates: Vec<BoundAggregate>) -> Self {
        Self {
            input,
            group_by,
            aggregates,
            output: Vec::new().into_iter(),
        }
    }
}

impl Executor for GroupAggregateExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.input.open(ctx)?;

        let mut order: Vec<Vec<Value>> = Vec::new();
        let mut groups: HashMap<Vec<Value>, Vec<AggAcc>> = HashMap::new();

        while let Some(row) = self.input.next(ctx)? {
            let key: Vec<Value> = self.group_by.iter().map(|&i| row.values[i].clone()).collect();
            let accs = groups.entry(key.clone()).or_insert_with(|| {
                order.push(key.clone());
                self.aggregates.iter().map(|a| AggAcc::new(a.func)).collect()
            });
            for (acc, agg) in accs.iter_mut().zip(&self.aggregates) {
                acc.feed(agg.func, &row.values[agg.input])?;
            }
        }
        self.input.close(ctx)?;

        let mut rows = Vec::with_capacity(order.len());
        for key in order {
            let accs = groups.remove(&key).expect("group recorded in `order` must exist");
            let mut values = key;
            values.extend(accs.into_iter().map(AggAcc::finish));
            rows.push(Row::new(values));
        }
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
