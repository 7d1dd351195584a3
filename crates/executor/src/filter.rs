//! Positional predicate evaluation. `planner::ResolvedPredicate` already
//! carries row-position indices instead of names, so evaluating it at
//! runtime never looks a label up twice.

use common::{DbError, DbResult, Row};
use expr::{CompareOp, Connective};
use planner::{ResolvedComparison, ResolvedOperand, ResolvedPredicate};
use std::cmp::Ordering;
use types::Value;

use crate::{ExecutionContext, Executor};

fn eval_operand(operand: &ResolvedOperand, row: &Row) -> Value {
    match operand {
        ResolvedOperand::Literal(v) => v.clone(),
        ResolvedOperand::Column(idx) => row.values[*idx].clone(),
    }
}

fn eval_comparison(cmp: &ResolvedComparison, row: &Row) -> DbResult<bool> {
    let l = eval_operand(&cmp.left, row);
    let r = eval_operand(&cmp.right, row);
    let ord = l.cmp_same_type(&r).ok_or_else(|| DbError::TypeMismatch {
        expected: l.sql_type(),
        found: r.sql_type(),
    })?;
    Ok(match cmp.op {
        CompareOp::Eq => ord == Ordering::Equal,
        CompareOp::Lt => ord == Ordering::Less,
        CompareOp::Gt => ord == Ordering::Greater,
    })
}

/// Evaluate a bound predicate against a row whose values already sit at
/// the positions the predicate's operands index into.
pub fn eval_predicate(predicate: &ResolvedPredicate, row: &Row) -> DbResult<bool> {
    match predicate {
        ResolvedPredicate::Leaf(cmp) => eval_comparison(cmp, row),
        ResolvedPredicate::Compound { left, op, right } => {
            let lb = eval_comparison(left, row)?;
            let rb = eval_comparison(right, row)?;
            Ok(match op {
                Connective::And => lb && rb,
                Connective::Or => lb || rb,
            })
        }
    }
}

/// Re-checks a predicate over every row from its input, independent of
/// whatever access path already narrowed the scan — per spec, any
/// conjunct consumed for access-path selection is re-verified here so the
/// operator stays pure.
pub struct FilterExec {
    input: Box<dyn Executor>,
    predicate: ResolvedPredicate,
}

impl FilterExec {
    pub fn new(input: Box<dyn Executor>, predicate: ResolvedPredicate) -> Self {
        Self { input, predicate }
    }
}

impl Executor for FilterExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.input.open(ctx)
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<Row>> {
        while let Some(row) = self.input.next(ctx)? {
            if eval_predicate(&self.predicate, &row)? {
                return Ok(Some(row));
            }
            ctx.stats.rows_filtered += 1;
        }
        Ok(None)
    }

    fn close(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.input.close(ctx)
    }
}
