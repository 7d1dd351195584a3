//! Restricted predicate and aggregate expression trees shared by the
//! planner and executor.
//!
//! Predicates are intentionally shallow: a leaf compares two operands, and
//! at most two leaves may be combined by a single `AND`/`OR`. There is no
//! general recursive expression tree — that keeps access-path selection
//! and HAVING evaluation exhaustive rather than heuristic.


use common::{DbError, DbResult, Row};
use std::cmp::Ordering;
use types::Value;

/// Comparison operators a predicate leaf may use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CompareOp {
    Eq,
    Lt,
    Gt,
}

/// How two leaves in a compound predicate are joined.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Connective {
    And,
    Or,
}

/// One side of a comparison: either a literal or a column reference.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Operand {
    Literal(Value),
    Column {
        /// Optional table/alias qualifier (e.g. `r_L` in a self-join).
        table: Option<String>,
        name: String,
    },
}

/// A single leaf comparison: `left op right`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Comparison {
    pub left: Operand,
    pub op: CompareOp,
    pub right: Operand,
}

/// Predicate grammar: a leaf, or two leaves joined by one connective.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Predicate {
    Leaf(Comparison),
    Compound {
        left: Comparison,
        op: Connective,
        right: Comparison,
    },
}

/// Aggregate functions the executor's group operator supports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Aggregate {
    Min,
    Max,
    Sum,
}

impl Aggregate {
    pub fn name(&self) -> &'static str {
        match self {
            Aggregate::Min => "MIN",
            Aggregate::Max => "MAX",
            Aggregate::Sum => "SUM",
        }
    }
}

/// The column label an aggregate's output is known by, both in the
/// projected result set and in any HAVING predicate referencing it.
pub fn aggregate_label(func: Aggregate, table: Option<&str>, column: &str) -> String {
    match table {
        Some(t) => format!("{}({t}.{column})", func.name()),
        None => format!("{}({column})", func.name()),
    }
}

/// Evaluation context: the row's schema (column names in output order),
/// used to resolve `Operand::Column` references against a flat `Row`.
pub struct EvalContext<'a> {
    pub schema: &'a [String],
}

impl<'a> EvalContext<'a> {
    pub fn eval_operand(&self, operand: &Operand, row: &Row) -> DbResult<Value> {
        match operand {
            Operand::Literal(v) => Ok(v.clone()),
            Operand::Column { table, name } => {
                let idx = self.find_column(table.as_deref(), name)?;
                Ok(row.values[idx].clone())
            }
        }
    }

    fn eval_comparison(&self, cmp: &Comparison, row: &Row) -> DbResult<bool> {
        let l = self.eval_operand(&cmp.left, row)?;
        let r = self.eval_operand(&cmp.right, row)?;
        let ord = l.cmp_same_type(&r).ok_or_else(|| {
            DbError::TypeMismatch {
                expected: l.sql_type(),
                found: r.sql_type(),
            }
        })?;
        Ok(match cmp.op {
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Gt => ord == Ordering::Greater,
        })
    }

    /// Evaluate a predicate against a row, producing a native bool (there
    /// is no `Value::Bool` — boolean-ness never escapes the evaluator).
    pub fn eval_predicate(&self, predicate: &Predicate, row: &Row) -> DbResult<bool> {
        match predicate {
            Predicate::Leaf(cmp) => self.eval_comparison(cmp, row),
            Predicate::Compound { left, op, right } => {
                let lb = self.eval_comparison(left, row)?;
                let rb = self.eval_comparison(right, row)?;
                Ok(match op {
                    Connective::And => lb && rb,
                    Connective::Or => lb || rb,
                })
            }
        }
    }

    /// Find column index in schema, supporting qualified and unqualified references.
    ///
    /// Matching rules:
    /// - Qualified ref (`table.col`): match `"table.col"` exactly.
    /// - Unqualified ref (`col`): match a bare `"col"` or a `".col"` suffix;
    ///   more than one match (e.g. a joined schema carrying both `a.val` and
    ///   `b.val`) is `AmbiguousColumn` rather than a silent first-match.
    pub fn find_column(&self, table: Option<&str>, name: &str) -> DbResult<usize> {
        if let Some(qualifier) = table {
            let full_name = format!("{qualifier}.{name}");
            self.schema
                .iter()
                .position(|c| c.eq_ignore_ascii_case(&full_name))
                .ok_or_else(|| DbError::UnknownColumn(full_name))
        } else {
            let matches: Vec<usize> = self
                .schema
                .iter()
                .enumerate()
                .filter(|(_, c)| {
                    c.eq_ignore_ascii_case(name) || c.to_lowercase().ends_with(&format!(".{}", name.to_lowercase()))
                })
                .map(|(i, _)| i)
                .collect();

            match matches.len() {
                0 => Err(DbError::UnknownColumn(name.to_string())),
                1 => Ok(matches[0]),
                _ => Err(DbError::AmbiguousColumn {
                    column: name.to_string(),
                    candidates: matches.into_iter().map(|i| self.schema[i].clone()).collect(),
                }),
            }
        }
    }
}

pub fn col(name: impl Into<String>) -> Operand {
    Operand::Column {
        table: None,
        name: name.into(),
    }
}

pub fn qualified_col(table: impl Into<String>, name: impl Into<String>) -> Operand {
    Operand::Column {
        table: Some(table.into()),
        name: name.into(),
    }
}

pub fn lit(value: Value) -> Operand {
    Operand::Literal(value)
}
