//! Validator / Binder: turns a parsed `Statement` into a `BoundStatement`
//! the executor can run without any further name resolution.
//!
//! Binding does three things:
//!
//! 1. **Name resolution** — every `ColRef` is resolved against the catalog
//!    to a concrete column position and type.
//! 2. **Static validation** — type compatibility, GROUP BY/aggregate
//!    legality, and the handful of checks that don't require touching
//!    stored rows (see module docs on `BoundInsert`/`BoundUpdate` for what
//!    is deliberately left to the executor instead).
//! 3. **Access path selection** — for each base table scanned, decide
//!    between a full scan and an index range scan, and for a join, which
//!    side drives.
//!
//! This crate has no dependency on the storage layer: anything that
//! requires reading actual rows (PK-uniqueness, FK existence, FK
//! back-references on UPDATE/DELETE) is necessarily left for the executor,
//! which does hold a handle to the ordered index store.

#[cfg(test)]
mod tests;

use catalog::{Catalog, TableMeta};
use common::{ColumnId, DbError, DbResult, TableId};
use expr::{Aggregate, CompareOp, Comparison, Connective, EvalContext, Operand, Predicate};
use parser::{ColRef, ColumnDef, JoinClause, OrderByExpr, Projection, SortDirection, Statement, TableRef};
use types::{SqlType, Value};

/// A base-table column as it appears in a bound plan's row shape: enough
/// to both read the physical value (`table_id`/`ordinal`) and resolve a
/// `ColRef` against it by label.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundColumn {
    pub label: String,
    pub table_id: TableId,
    pub ordinal: ColumnId,
    pub ty: SqlType,
}

/// Concrete means of reading a base table.
#[derive(Clone, Debug, PartialEq)]
pub enum AccessPath {
    FullScan,
    IndexRange {
        column: ColumnId,
        bound: IndexBound,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum IndexBound {
    Eq(Value),
    Range {
        low: Option<(Value, bool)>,
        high: Option<(Value, bool)>,
    },
}

/// A table scanned by a bound plan, with its chosen access path.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundTable {
    pub table_id: TableId,
    pub logical_name: String,
    pub access_path: AccessPath,
}

/// The probe side of a two-table join.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundJoin {
    pub probe: BoundTable,
    pub driver_join_column: ColumnId,
    pub probe_join_column: ColumnId,
    /// True when the probe table carries an index on the join column, in
    /// which case the executor should drive an index lookup per driver
    /// row rather than building an in-memory hash multimap.
    pub use_index_join: bool,
}

/// Operand resolved to a position in whichever row shape it was bound
/// against (a base-table row for `WHERE`, a grouped/aggregate row for
/// `HAVING`) rather than a name, so the executor never looks names up
/// per row.
#[derive(Clone, Debug, PartialEq)]
pub enum ResolvedOperand {
    Literal(Value),
    Column(usize),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedComparison {
    pub left: ResolvedOperand,
    pub op: CompareOp,
    pub right: ResolvedOperand,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ResolvedPredicate {
    Leaf(ResolvedComparison),
    Compound {
        left: ResolvedComparison,
        op: Connective,
        right: ResolvedComparison,
    },
}

/// A single aggregate computed during the group stage.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundAggregate {
    pub func: Aggregate,
    /// Index of the input column within `BoundSelect::base_schema`.
    pub input: usize,
    pub label: String,
}

/// One projected output column, indexing into `BoundSelect::value_labels`.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundProjection {
    pub label: String,
    pub index: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BoundSelect {
    pub driver: BoundTable,
    pub join: Option<BoundJoin>,
    /// Row shape after the join (or the bare scan, if there's no join),
    /// before grouping/aggregation.
    pub base_schema: Vec<BoundColumn>,
    pub filter: Option<ResolvedPredicate>,
    /// Indices into `base_schema`.
    pub group_by: Vec<usize>,
    pub aggregates: Vec<BoundAggregate>,
    /// Labels of the row shape `having`/`order_by`/`projections` are bound
    /// against: `group_by` columns followed by aggregate outputs when
    /// grouping/aggregating, otherwise identical to `base_schema`'s labels.
    pub value_labels: Vec<String>,
    pub having: Option<ResolvedPredicate>,
    pub order_by: Vec<(usize, SortDirection)>,
    pub projections: Vec<BoundProjection>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BoundInsert {
    pub table_id: TableId,
    pub table_name: String,
    /// One value per column, already reordered into schema order and
    /// type-checked. PK-uniqueness and FK-existence are runtime checks
    /// the executor performs against the store.
    pub values: Vec<Value>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BoundUpdate {
    pub table_id: TableId,
    pub table_name: String,
    pub assignments: Vec<(ColumnId, Value)>,
    pub predicate: Option<ResolvedPredicate>,
    /// True if any assignment targets the primary-key column; the
    /// executor must then check no other row already holds the new value
    /// and that no live FK still points at the row's old PK value.
    pub touches_pk: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BoundDelete {
    pub table_id: TableId,
    pub table_name: String,
    pub predicate: Option<ResolvedPredicate>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BoundStatement {
    CreateTable { name: String, columns: Vec<ColumnDef> },
    DropTable { name: String },
    CreateIndex { name: String, table: String, column: String },
    DropIndex { name: String, table: String },
    Insert(BoundInsert),
    Select(BoundSelect),
    Update(BoundUpdate),
    Delete(BoundDelete),
}

/// Read-only planning context: a borrow of the catalog to resolve names
/// and schemas against.
pub struct PlanningContext<'a> {
    pub catalog: &'a Catalog,
}

impl<'a> PlanningContext<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    fn table(&self, name: &str) -> DbResult<&TableMeta> {
        self.catalog.table(name)
    }
}

pub struct Planner;

impl Planner {
    /// Bind a parsed statement against the catalog.
    pub fn plan(stmt: Statement, ctx: &PlanningContext) -> DbResult<BoundStatement> {
        match stmt {
            Statement::CreateTable { name, columns } => {
                Ok(BoundStatement::CreateTable { name, columns })
            }
            Statement::DropTable { name } => {
                ctx.table(&name)?;
                Ok(BoundStatement::DropTable { name })
            }
            Statement::CreateIndex { name, table, column } => {
                let t = ctx.table(&table)?;
                t.schema
                    .column_index(&column)
                    .ok_or_else(|| DbError::UnknownColumn(column.clone()))?;
                Ok(BoundStatement::CreateIndex { name, table, column })
            }
            Statement::DropIndex { name, table } => {
                ctx.table(&table)?;
                Ok(BoundStatement::DropIndex { name, table })
            }
            Statement::Insert { table, columns, values } => {
                Self::bind_insert(ctx, table, columns, values)
            }
            Statement::Update { table, set, selection } => {
                Self::bind_update(ctx, table, set, selection)
            }
            Statement::Delete { table, selection } => Self::bind_delete(ctx, table, selection),
            Statement::Select {
                projections,
                from,
                join,
                selection,
                group_by,
                having,
                order_by,
            } => Self::bind_select(ctx, projections, from, join, selection, group_by, having, order_by),
        }
    }

    fn bind_insert(
        ctx: &PlanningContext,
        table: String,
        columns: Option<Vec<String>>,
        values: Vec<Value>,
    ) -> DbResult<BoundStatement> {
        let t = ctx.table(&table)?;
        let arity = t.schema.columns.len();

        let ordered = match columns {
            None => {
                if values.len() != arity {
                    return Err(DbError::Planner(format!(
                        "table '{table}' has {arity} columns but {} values were supplied",
                        values.len()
                    )));
                }
                values
            }
            Some(names) => {
                if names.len() != arity || values.len() != names.len() {
                    return Err(DbError::Planner(format!(
                        "INSERT into '{table}' must supply a value for every column"
                    )));
                }
                let mut ordered: Vec<Option<Value>> = vec![None; arity];
                for (name, value) in names.into_iter().zip(values.into_iter()) {
                    let ordinal = t
                        .schema
                        .column_index(&name)
                        .ok_or_else(|| DbError::UnknownColumn(name.clone()))?;
                    if ordered[ordinal as usize].is_some() {
                        return Err(DbError::Planner(format!("column '{name}' listed twice")));
                    }
                    ordered[ordinal as usize] = Some(value);
                }
                ordered
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| {
                        v.ok_or_else(|| {
                            DbError::Planner(format!(
                                "missing value for column '{}'",
                                t.schema.columns[i].name
                            ))
                        })
                    })
                    .collect::<DbResult<Vec<_>>>()?
            }
        };

        for (i, value) in ordered.iter().enumerate() {
            let expected = t.schema.columns[i].ty;
            let found = value.sql_type();
            if expected != found {
                return Err(DbError::TypeMismatch { expected, found });
            }
        }

        Ok(BoundStatement::Insert(BoundInsert {
            table_id: t.id,
            table_name: table,
            values: ordered,
        }))
    }

    fn bind_update(
        ctx: &PlanningContext,
        table: String,
        set: Vec<(String, Value)>,
        selection: Option<Predicate>,
    ) -> DbResult<BoundStatement> {
        let t = ctx.table(&table)?;
        let mut touches_pk = false;
        let mut assignments = Vec::with_capacity(set.len());
        for (name, value) in set {
            let ordinal = t
                .schema
                .column_index(&name)
                .ok_or_else(|| DbError::UnknownColumn(name.clone()))?;
            let expected = t.schema.columns[ordinal as usize].ty;
            let found = value.sql_type();
            if expected != found {
                return Err(DbError::TypeMismatch { expected, found });
            }
            if ordinal == t.schema.primary_key {
                touches_pk = true;
            }
            assignments.push((ordinal, value));
        }

        let schema = base_schema_for_table(t, &t.name, true);
        let predicate = selection
            .map(|p| bind_filter_predicate(&p, &schema))
            .transpose()?;

        Ok(BoundStatement::Update(BoundUpdate {
            table_id: t.id,
            table_name: table,
            assignments,
            predicate,
            touches_pk,
        }))
    }

    fn bind_delete(
        ctx: &PlanningContext,
        table: String,
        selection: Option<Predicate>,
    ) -> DbResult<BoundStatement> {
        let t = ctx.table(&table)?;
        let schema = base_schema_for_table(t, &t.name, true);
        let predicate = selection
            .map(|p| bind_filter_predicate(&p, &schema))
            .transpose()?;
        Ok(BoundStatement::Delete(BoundDelete {
            table_id: t.id,
            table_name: table,
            predicate,
        }))
    }

    #[allow(clippy::too_many_arguments)]
    fn bind_select(
        ctx: &PlanningContext,
        projections: Vec<Projection>,
        from: TableRef,
        join: Option<JoinClause>,
        selection: Option<Predicate>,
        group_by: Vec<ColRef>,
        having: Option<Predicate>,
        order_by: Vec<OrderByExpr>,
    ) -> DbResult<BoundStatement> {
        let from_meta = ctx.table(&from.name)?;
        let leaves = selection.as_ref().map(collect_leaves).unwrap_or_default();

        let (driver, bound_join, base_schema) = match &join {
            None => {
                let from_logical = from.logical_name().to_string();
                let from_path = choose_access_path(from_meta, &from_logical, &leaves);
                let driver = BoundTable {
                    table_id: from_meta.id,
                    logical_name: from_logical.clone(),
                    access_path: from_path,
                };
                (driver, None, base_schema_for_table(from_meta, &from_logical, true))
            }
            Some(clause) => {
                let (from_logical, other_logical) = self_join_logical_names(&from, &clause.other);
                let from_path = choose_access_path(from_meta, &from_logical, &leaves);
                let driver = BoundTable {
                    table_id: from_meta.id,
                    logical_name: from_logical.clone(),
                    access_path: from_path,
                };
                let other_meta = ctx.table(&clause.other.name)?;
                let other_path = choose_access_path(other_meta, &other_logical, &leaves);

                let (left_col, right_col) = &clause.on;
                let (driver_side_col, probe_side_col) = resolve_join_sides(
                    from_meta,
                    &from_logical,
                    other_meta,
                    &other_logical,
                    left_col,
                    right_col,
                )?;

                let driver_ty = from_meta.schema.column_type(driver_side_col).copied().unwrap();
                let probe_ty = other_meta.schema.column_type(probe_side_col).copied().unwrap();
                if driver_ty != probe_ty {
                    return Err(DbError::TypeMismatch {
                        expected: driver_ty,
                        found: probe_ty,
                    });
                }

                // Drive from whichever side has the more selective access
                // path (index beats scan); ties favor the left/FROM side.
                let probe_is_more_selective = matches!(other_path, AccessPath::IndexRange { .. })
                    && matches!(driver.access_path, AccessPath::FullScan);

                let (driver_table, probe_table, driver_join_column, probe_join_column) =
                    if probe_is_more_selective {
                        (
                            BoundTable {
                                table_id: other_meta.id,
                                logical_name: other_logical.clone(),
                                access_path: other_path,
                            },
                            BoundTable {
                                table_id: from_meta.id,
                                logical_name: from_logical.clone(),
                                access_path: driver.access_path.clone(),
                            },
                            probe_side_col,
                            driver_side_col,
                        )
                    } else {
                        (
                            driver.clone(),
                            BoundTable {
                                table_id: other_meta.id,
                                logical_name: other_logical.clone(),
                                access_path: other_path,
                            },
                            driver_side_col,
                            probe_side_col,
                        )
                    };

                let probe_table_meta = ctx.catalog.table_by_id(probe_table.table_id)?;
                let use_index_join = probe_table_meta
                    .has_index(&probe_table_meta.schema.columns[probe_join_column as usize].name);

                let mut schema = base_schema_for_table(
                    ctx.catalog.table_by_id(driver_table.table_id)?,
                    &driver_table.logical_name,
                    true,
                );
                schema.extend(base_schema_for_table(
                    probe_table_meta,
                    &probe_table.logical_name,
                    true,
                ));

                (
                    driver_table,
                    Some(BoundJoin {
                        probe: probe_table,
                        driver_join_column,
                        probe_join_column,
                        use_index_join,
                    }),
                    schema,
                )
            }
        };

        let filter = selection
            .as_ref()
            .map(|p| bind_filter_predicate(p, &base_schema))
            .transpose()?;

        let base_labels: Vec<String> = base_schema.iter().map(|c| c.label.clone()).collect();
        let group_by_idx = group_by
            .iter()
            .map(|c| resolve_colref(&base_labels, c))
            .collect::<DbResult<Vec<_>>>()?;

        let has_projected_aggregate = projections
            .iter()
            .any(|p| matches!(p, Projection::Aggregate { .. }));
        let aggregating = !group_by_idx.is_empty() || has_projected_aggregate;

        if !aggregating {
            let is_plain_wildcard =
                projections.len() == 1 && matches!(projections[0], Projection::Wildcard);

            let bound_projections = if is_plain_wildcard {
                (0..base_schema.len())
                    .map(|i| BoundProjection {
                        label: if bound_join.is_some() {
                            base_schema[i].label.clone()
                        } else {
                            unqualified_label(&base_schema[i].label)
                        },
                        index: i,
                    })
                    .collect()
            } else {
                projections
                    .iter()
                    .map(|p| match p {
                        Projection::Wildcard => Err(DbError::Planner(
                            "wildcard cannot be mixed with other projections".into(),
                        )),
                        Projection::Column(c) => {
                            let idx = resolve_colref(&base_labels, c)?;
                            Ok(BoundProjection {
                                label: projection_label(c),
                                index: idx,
                            })
                        }
                        Projection::Aggregate { .. } => unreachable!("covered by `aggregating`"),
                    })
                    .collect::<DbResult<Vec<_>>>()?
            };

            let having_bound = having
                .as_ref()
                .map(|p| bind_predicate_by_labels(p, &base_labels))
                .transpose()?;
            let order_by_idx = order_by
                .iter()
                .map(|o| resolve_colref(&base_labels, &o.column).map(|i| (i, o.direction)))
                .collect::<DbResult<Vec<_>>>()?;

            return Ok(BoundStatement::Select(BoundSelect {
                driver,
                join: bound_join,
                base_schema,
                filter,
                group_by: vec![],
                aggregates: vec![],
                value_labels: base_labels,
                having: having_bound,
                order_by: order_by_idx,
                projections: bound_projections,
            }));
        }

        // Grouping / aggregation path.
        let mut aggregates: Vec<BoundAggregate> = Vec::new();
        let register_aggregate = |aggregates: &mut Vec<BoundAggregate>,
                                       func: Aggregate,
                                       col: &ColRef|
         -> DbResult<usize> {
            let input = resolve_colref(&base_labels, col)?;
            let input_ty = base_schema[input].ty;
            if matches!(func, Aggregate::Sum) && input_ty == SqlType::Text {
                return Err(DbError::TypeMismatch {
                    expected: SqlType::Int64,
                    found: SqlType::Text,
                });
            }
            let label = expr::aggregate_label(func, col.table.as_deref(), &col.name);
            if let Some(pos) = aggregates.iter().position(|a| a.label == label) {
                return Ok(pos);
            }
            aggregates.push(BoundAggregate { func, input, label });
            Ok(aggregates.len() - 1)
        };

        let mut value_labels: Vec<String> =
            group_by_idx.iter().map(|&i| base_labels[i].clone()).collect();

        let mut bound_projections = Vec::with_capacity(projections.len());
        for p in &projections {
            match p {
                Projection::Wildcard => {
                    return Err(DbError::AggregationMisuse(
                        "wildcard projection is not allowed with GROUP BY or aggregates".into(),
                    ))
                }
                Projection::Column(c) => {
                    let idx = resolve_colref(&base_labels, c)?;
                    if !group_by_idx.contains(&idx) {
                        return Err(DbError::AggregationMisuse(format!(
                            "column '{}' must appear in GROUP BY or be aggregated",
                            c.name
                        )));
                    }
                    let pos = value_labels
                        .iter()
                        .position(|l| *l == base_labels[idx])
                        .unwrap();
                    bound_projections.push(BoundProjection {
                        label: projection_label(c),
                        index: pos,
                    });
                }
                Projection::Aggregate { func, column } => {
                    let agg_idx = register_aggregate(&mut aggregates, *func, column)?;
                    let label = aggregates[agg_idx].label.clone();
                    if !value_labels.contains(&label) {
                        value_labels.push(label.clone());
                    }
                    let pos = value_labels.iter().position(|l| *l == label).unwrap();
                    bound_projections.push(BoundProjection { label, index: pos });
                }
            }
        }

        let having_bound = match &having {
            None => None,
            Some(p) => Some(bind_having_with_aggregates(p, &base_labels, &value_labels)?),
        };

        let order_by_idx = order_by
            .iter()
            .map(|o| {
                EvalContext { schema: &value_labels }
                    .find_column(o.column.table.as_deref(), &o.column.name)
                    .map(|i| (i, o.direction))
            })
            .collect::<DbResult<Vec<_>>>()?;

        Ok(BoundStatement::Select(BoundSelect {
            driver,
            join: bound_join,
            base_schema,
            filter,
            group_by: group_by_idx,
            aggregates,
            value_labels,
            having: having_bound,
            order_by: order_by_idx,
            projections: bound_projections,
        }))
    }
}

/// Logical names for a join's two sides. A self-join (same table on both
/// sides, neither side aliased) is disambiguated with the `_L`/`_R`
/// suffixes the query text is expected to reference; anything else just
/// uses each side's own alias-or-name.
fn self_join_logical_names(from: &TableRef, other: &TableRef) -> (String, String) {
    if from.name == other.name && from.alias.is_none() && other.alias.is_none() {
        (format!("{}_L", from.name), format!("{}_R", other.name))
    } else {
        (from.logical_name().to_string(), other.logical_name().to_string())
    }
}

fn projection_label(c: &ColRef) -> String {
    match &c.table {
        Some(t) => format!("{t}.{}", c.name),
        None => c.name.clone(),
    }
}

/// Strip a `table.column` base-schema label back down to a bare column
/// name for single-table wildcard output, where there's no ambiguity to
/// disambiguate and result sets should read the way they were inserted.
fn unqualified_label(label: &str) -> String {
    match label.split_once('.') {
        Some((_, name)) => name.to_string(),
        None => label.to_string(),
    }
}

fn base_schema_for_table(t: &TableMeta, logical_name: &str, qualify: bool) -> Vec<BoundColumn> {
    t.schema
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| BoundColumn {
            label: if qualify {
                format!("{logical_name}.{}", c.name)
            } else {
                c.name.clone()
            },
            table_id: t.id,
            ordinal: i as ColumnId,
            ty: c.ty,
        })
        .collect()
}

fn label_matches(label: &str, table: Option<&str>, name: &str) -> bool {
    match table {
        Some(qualifier) => label.eq_ignore_ascii_case(&format!("{qualifier}.{name}")),
        None => {
            label.eq_ignore_ascii_case(name)
                || label
                    .to_lowercase()
                    .ends_with(&format!(".{}", name.to_lowercase()))
        }
    }
}

fn resolve_colref(labels: &[String], c: &ColRef) -> DbResult<usize> {
    EvalContext { schema: labels }
        .find_column(c.table.as_deref(), &c.name)
        .map_err(|e| match e {
            DbError::AmbiguousColumn { .. } => e,
            _ => DbError::UnknownColumn(projection_label(c)),
        })
}

/// Collect the one or two comparison leaves of a (possibly compound)
/// predicate, in source order.
fn collect_leaves(pred: &Predicate) -> Vec<&Comparison> {
    match pred {
        Predicate::Leaf(c) => vec![c],
        Predicate::Compound { left, right, .. } => vec![left, right],
    }
}

/// Does this comparison's column side belong to `logical_name`, and if so
/// which ordinal and literal value does it pin down?
fn leaf_candidate(
    cmp: &Comparison,
    table_meta: &TableMeta,
    logical_name: &str,
) -> Option<(ColumnId, CompareOp, Value)> {
    let (col_side, lit_side, op) = match (&cmp.left, &cmp.right) {
        (Operand::Column { table, name }, Operand::Literal(v)) => {
            (Some((table, name)), Some(v), cmp.op)
        }
        (Operand::Literal(v), Operand::Column { table, name }) => {
            (Some((table, name)), Some(v), flip(cmp.op))
        }
        _ => (None, None, cmp.op),
    };
    let (table, name) = col_side?;
    let value = lit_side?;
    if let Some(q) = table {
        if q != logical_name {
            return None;
        }
    }
    let ordinal = table_meta.schema.column_index(name)?;
    Some((ordinal, op, value.clone()))
}

fn flip(op: CompareOp) -> CompareOp {
    match op {
        CompareOp::Eq => CompareOp::Eq,
        CompareOp::Lt => CompareOp::Gt,
        CompareOp::Gt => CompareOp::Lt,
    }
}

/// Choose a scan strategy for one base table: an index range beats a full
/// scan when the predicate pins an indexed column down by equality or
/// range; among several such columns, the primary key wins, then the
/// first one mentioned in the predicate.
fn choose_access_path(
    table_meta: &TableMeta,
    logical_name: &str,
    leaves: &[&Comparison],
) -> AccessPath {
    let mut best: Option<(ColumnId, CompareOp, Value, bool)> = None;
    for cmp in leaves {
        let Some((ordinal, op, value)) = leaf_candidate(cmp, table_meta, logical_name) else {
            continue;
        };
        if !table_meta.has_index(&table_meta.schema.columns[ordinal as usize].name) {
            continue;
        }
        let is_pk = ordinal == table_meta.schema.primary_key;
        let better = match &best {
            None => true,
            Some((_, _, _, best_is_pk)) => is_pk && !best_is_pk,
        };
        if better {
            best = Some((ordinal, op, value, is_pk));
        }
    }

    match best {
        None => AccessPath::FullScan,
        Some((column, CompareOp::Eq, value, _)) => AccessPath::IndexRange {
            column,
            bound: IndexBound::Eq(value),
        },
        Some((column, CompareOp::Lt, value, _)) => AccessPath::IndexRange {
            column,
            bound: IndexBound::Range {
                low: None,
                high: Some((value, false)),
            },
        },
        Some((column, CompareOp::Gt, value, _)) => AccessPath::IndexRange {
            column,
            bound: IndexBound::Range {
                low: Some((value, false)),
                high: None,
            },
        },
    }
}

/// Resolve the two `ColRef`s of a JOIN's `ON` clause to `(from_column,
/// other_column)`, tolerating either order (`from.c = other.c2` or
/// `other.c2 = from.c`).
fn resolve_join_sides(
    from_meta: &TableMeta,
    from_logical: &str,
    other_meta: &TableMeta,
    other_logical: &str,
    left: &ColRef,
    right: &ColRef,
) -> DbResult<(ColumnId, ColumnId)> {
    let try_order = |a: &ColRef, b: &ColRef| -> Option<(ColumnId, ColumnId)> {
        if a.table.as_deref() != Some(from_logical) || b.table.as_deref() != Some(other_logical) {
            return None;
        }
        let a_ord = from_meta.schema.column_index(&a.name)?;
        let b_ord = other_meta.schema.column_index(&b.name)?;
        Some((a_ord, b_ord))
    };
    try_order(left, right)
        .or_else(|| try_order(right, left))
        .ok_or_else(|| {
            DbError::Planner(format!(
                "JOIN condition must compare a column of '{from_logical}' to a column of '{other_logical}'"
            ))
        })
}

fn operand_type(op: &Operand, schema: &[BoundColumn]) -> Option<SqlType> {
    match op {
        Operand::Literal(v) => Some(v.sql_type()),
        Operand::Column { table, name } => {
            let labels: Vec<String> = schema.iter().map(|c| c.label.clone()).collect();
            EvalContext { schema: &labels }
                .find_column(table.as_deref(), name)
                .ok()
                .map(|i| schema[i].ty)
        }
    }
}

fn bind_comparison(cmp: &Comparison, labels: &[String]) -> DbResult<ResolvedComparison> {
    Ok(ResolvedComparison {
        left: bind_operand(&cmp.left, labels)?,
        op: cmp.op,
        right: bind_operand(&cmp.right, labels)?,
    })
}

fn bind_operand(op: &Operand, labels: &[String]) -> DbResult<ResolvedOperand> {
    match op {
        Operand::Literal(v) => Ok(ResolvedOperand::Literal(v.clone())),
        Operand::Column { table, name } => {
            let idx = EvalContext { schema: labels }
                .find_column(table.as_deref(), name)
                .map_err(|e| match e {
                    DbError::AmbiguousColumn { .. } => e,
                    _ => DbError::UnknownColumn(name.clone()),
                })?;
            Ok(ResolvedOperand::Column(idx))
        }
    }
}

/// Bind a `WHERE`/`UPDATE`/`DELETE` predicate against a base-table row
/// shape, checking that each leaf's two sides agree in type.
fn bind_filter_predicate(pred: &Predicate, schema: &[BoundColumn]) -> DbResult<ResolvedPredicate> {
    let labels: Vec<String> = schema.iter().map(|c| c.label.clone()).collect();
    let check_types = |cmp: &Comparison| -> DbResult<()> {
        if let (Some(l), Some(r)) = (operand_type(&cmp.left, schema), operand_type(&cmp.right, schema)) {
            if l != r {
                return Err(DbError::TypeMismatch { expected: l, found: r });
            }
        }
        Ok(())
    };
    match pred {
        Predicate::Leaf(cmp) => {
            check_types(cmp)?;
            Ok(ResolvedPredicate::Leaf(bind_comparison(cmp, &labels)?))
        }
        Predicate::Compound { left, op, right } => {
            check_types(left)?;
            check_types(right)?;
            Ok(ResolvedPredicate::Compound {
                left: bind_comparison(left, &labels)?,
                op: *op,
                right: bind_comparison(right, &labels)?,
            })
        }
    }
}

/// Bind a predicate purely by label, with no static type check — used for
/// plain (non-aggregating) `HAVING`, where an operand is just another
/// column in the same row shape.
fn bind_predicate_by_labels(pred: &Predicate, labels: &[String]) -> DbResult<ResolvedPredicate> {
    match pred {
        Predicate::Leaf(cmp) => Ok(ResolvedPredicate::Leaf(bind_comparison(cmp, labels)?)),
        Predicate::Compound { left, op, right } => Ok(ResolvedPredicate::Compound {
            left: bind_comparison(left, labels)?,
            op: *op,
            right: bind_comparison(right, labels)?,
        }),
    }
}

/// Bind `HAVING` against the grouped/aggregate row shape. An
/// `Operand::Column` is resolved first against `value_labels` (group
/// columns and already-registered aggregate outputs); a name that exists
/// in the pre-aggregation row but not there is refused as
/// `AggregationMisuse`, since it names an ungrouped column outside any
/// aggregate.
fn bind_having_with_aggregates(
    pred: &Predicate,
    base_labels: &[String],
    value_labels: &[String],
) -> DbResult<ResolvedPredicate> {
    let resolve = |op: &Operand| -> DbResult<ResolvedOperand> {
        match op {
            Operand::Literal(v) => Ok(ResolvedOperand::Literal(v.clone())),
            Operand::Column { table, name } => {
                match (EvalContext { schema: value_labels }).find_column(table.as_deref(), name) {
                    Ok(idx) => return Ok(ResolvedOperand::Column(idx)),
                    Err(e @ DbError::AmbiguousColumn { .. }) => return Err(e),
                    Err(_) => {}
                }
                if base_labels
                    .iter()
                    .any(|l| label_matches(l, table.as_deref(), name))
                {
                    return Err(DbError::AggregationMisuse(format!(
                        "HAVING may only reference GROUP BY columns or aggregates, found '{name}'"
                    )));
                }
                Err(DbError::UnknownColumn(name.clone()))
            }
        }
    };
    let comparison = |cmp: &Comparison| -> DbResult<ResolvedComparison> {
        Ok(ResolvedComparison {
            left: resolve(&cmp.left)?,
            op: cmp.op,
            right: resolve(&cmp.right)?,
        })
    };
    match pred {
        Predicate::Leaf(cmp) => Ok(ResolvedPredicate::Leaf(comparison(cmp)?)),
        Predicate::Compound { left, op, right } => Ok(ResolvedPredicate::Compound {
            left: comparison(left)?,
            op: *op,
            right: comparison(right)?,
        }),
    }
}
