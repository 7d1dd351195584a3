mod ast;
#[cfg(test)]
mod tests;

pub use ast::*;

use common::{DbError, DbResult};
use expr::{CompareOp, Comparison, Connective, Operand, Predicate};
use sqlparser::ast as sqlast;
use sqlparser::dialect::GenericDialect;
use sqlparser::keywords::Keyword;
use sqlparser::parser::Parser as SqlParser;
use types::{SqlType, Value};

/// Parse a single SQL statement into the internal AST. The engine facade
/// takes one statement per call (no batching), so trailing statements are
/// rejected rather than silently dropped.
pub fn parse_sql(sql: &str) -> DbResult<Statement> {
    let dialect = GenericDialect {};

    if let Some(stmt) = try_parse_drop_index(sql, &dialect)? {
        return Ok(stmt);
    }

    let stmts = SqlParser::parse_sql(&dialect, sql).map_err(|e| parse_err(e.to_string()))?;
    let mut stmts = stmts.into_iter();
    let first = stmts.next().ok_or_else(|| parse_err("empty statement"))?;
    if stmts.next().is_some() {
        return Err(parse_err("statement batching is not supported"));
    }
    map_statement(first)
}

/// `DROP INDEX i ON t` isn't representable by sqlparser's generic DROP
/// grammar (no `ON` clause), so it's recognized directly off the token
/// stream before falling through to the regular statement parser.
fn try_parse_drop_index(sql: &str, dialect: &GenericDialect) -> DbResult<Option<Statement>> {
    let mut parser = SqlParser::new(dialect)
        .try_with_sql(sql)
        .map_err(|e| parse_err(e.to_string()))?;
    if !parser.parse_keywords(&[Keyword::DROP, Keyword::INDEX]) {
        return Ok(None);
    }
    let name = parser
        .parse_identifier(false)
        .map_err(|e| parse_err(e.to_string()))?;
    parser
        .expect_keyword(Keyword::ON)
        .map_err(|e| parse_err(e.to_string()))?;
    let table = parser
        .parse_identifier(false)
        .map_err(|e| parse_err(e.to_string()))?;
    Ok(Some(Statement::DropIndex {
        name: name.value,
        table: table.value,
    }))
}

fn map_statement(stmt: sqlast::Statement) -> DbResult<Statement> {
    use sqlast::Statement as SqlStatement;

    match stmt {
        SqlStatement::CreateTable {
            name,
            columns,
            constraints,
            ..
        } => map_create_table(name, columns, constraints),
        SqlStatement::Drop {
            object_type, names, ..
        } => match object_type {
            sqlast::ObjectType::Table => Ok(Statement::DropTable {
                name: first_name(names)?,
            }),
            other => Err(parse_err(format!("unsupported DROP type: {other:?}"))),
        },
        SqlStatement::CreateIndex {
            name,
            table_name,
            columns,
            ..
        } => {
            let index_name = name
                .ok_or_else(|| parse_err("index name required"))
                .map(|n| normalize_object_name(&n))??;
            let table = normalize_object_name(&table_name)?;
            let column = map_index_column(columns.first())?;
            Ok(Statement::CreateIndex {
                name: index_name,
                table,
                column,
            })
        }
        SqlStatement::Insert {
            table_name,
            columns,
            source,
            ..
        } => {
            let table = normalize_object_name(&table_name)?;
            let columns = (!columns.is_empty())
                .then(|| columns.into_iter().map(normalize_ident_owned).collect());
            let source = source.ok_or_else(|| parse_err("INSERT source missing"))?;
            let values = extract_values(*source)?;
            Ok(Statement::Insert {
                table,
                columns,
                values,
            })
        }
        SqlStatement::Query(query) => map_select(*query),
        SqlStatement::Update {
            table,
            assignments,
            selection,
            ..
        } => {
            let table = table_name_from_with_joins(&table)?;
            let set = assignments
                .into_iter()
                .map(|assign| {
                    let ident = assign
                        .id
                        .last()
                        .ok_or_else(|| parse_err("invalid assignment target"))?;
                    Ok((normalize_ident(ident), map_literal(assign.value)?))
                })
                .collect::<DbResult<Vec<_>>>()?;
            let selection = selection.map(map_predicate).transpose()?;
            Ok(Statement::Update {
                table,
                set,
                selection,
            })
        }
        SqlStatement::Delete {
            from, selection, ..
        } => {
            if from.is_empty() {
                return Err(parse_err("DELETE requires FROM source"));
            }
            if from.len() > 1 {
                return Err(parse_err("multi-table DELETE not supported"));
            }
            let table = table_name_from_with_joins(&from[0])?;
            let selection = selection.map(map_predicate).transpose()?;
            Ok(Statement::Delete { table, selection })
        }
        other => Err(parse_err(format!("unsupported statement: {other:?}"))),
    }
}

fn map_create_table(
    name: sqlast::ObjectName,
    columns: Vec<sqlast::ColumnDef>,
    constraints: Vec<sqlast::TableConstraint>,
) -> DbResult<Statement> {
    let table = normalize_object_name(&name)?;
    let table_level_fk = extract_table_level_fk(&constraints)?;

    let mut mapped = Vec::with_capacity(columns.len());
    for column in columns {
        let col_name = normalize_ident_owned(column.name.clone());
        let ty = map_data_type(&column.data_type)?;

        let mut primary_key = false;
        let mut foreign_key = None;
        for option in &column.options {
            match &option.option {
                sqlast::ColumnOption::Unique {
                    is_primary: true, ..
                } => primary_key = true,
                sqlast::ColumnOption::ForeignKey {
                    foreign_table,
                    referred_columns,
                    ..
                } => {
                    let ref_table = normalize_object_name(foreign_table)?;
                    let ref_column = referred_columns
                        .first()
                        .map(normalize_ident)
                        .ok_or_else(|| parse_err("FOREIGN KEY REFERENCES requires a column"))?;
                    foreign_key = Some((ref_table, ref_column));
                }
                _ => {}
            }
        }
        if foreign_key.is_none() {
            if let Some((ref_table, ref_column)) = table_level_fk.get(&col_name) {
                foreign_key = Some((ref_table.clone(), ref_column.clone()));
            }
        }

        mapped.push(ColumnDef {
            name: col_name,
            ty,
            primary_key,
            foreign_key,
        });
    }

    if mapped.iter().filter(|c| c.primary_key).count() != 1 {
        return Err(parse_err(
            "CREATE TABLE requires exactly one PRIMARY KEY column",
        ));
    }

    Ok(Statement::CreateTable {
        name: table,
        columns: mapped,
    })
}

fn extract_table_level_fk(
    constraints: &[sqlast::TableConstraint],
) -> DbResult<std::collections::HashMap<String, (String, String)>> {
    let mut map = std::collections::HashMap::new();
    for constraint in constraints {
        if let sqlast::TableConstraint::ForeignKey {
            columns,
            foreign_table,
            referred_columns,
            ..
        } = constraint
        {
            let local = columns
                .first()
                .map(normalize_ident)
                .ok_or_else(|| parse_err("FOREIGN KEY requires a local column"))?;
            let ref_table = normalize_object_name(foreign_table)?;
            let ref_column = referred_columns
                .first()
                .map(normalize_ident)
                .ok_or_else(|| parse_err("FOREIGN KEY REFERENCES requires a column"))?;
            map.insert(local, (ref_table, ref_column));
        }
    }
    Ok(map)
}

fn map_data_type(data_type: &sqlast::DataType) -> DbResult<SqlType> {
    use sqlast::DataType;

    match data_type {
        DataType::Int(_) | DataType::BigInt(_) | DataType::Integer(_) => Ok(SqlType::Int64),
        DataType::Double | DataType::Float(_) | DataType::Real => Ok(SqlType::Double),
        DataType::String(_) | DataType::Text | DataType::Varchar(_) | DataType::Char(_) => {
            Ok(SqlType::Text)
        }
        other => Err(parse_err(format!("unsupported column type: {other}"))),
    }
}

fn map_select(query: sqlast::Query) -> DbResult<Statement> {
    use sqlast::SetExpr;

    let select = match *query.body {
        SetExpr::Select(select) => select,
        SetExpr::Values(_) => return Err(parse_err("standalone VALUES not supported")),
        _ => return Err(parse_err("SET operations not supported")),
    };

    let sqlast::Select {
        projection,
        from,
        selection,
        group_by,
        having,
        ..
    } = *select;

    if from.is_empty() {
        return Err(parse_err("SELECT requires FROM clause"));
    }
    if from.len() > 1 {
        return Err(parse_err("comma-joins not supported, use JOIN ... ON"));
    }
    let table_with_joins = &from[0];
    let base = table_ref_from_factor(&table_with_joins.relation)?;

    let join = match table_with_joins.joins.as_slice() {
        [] => None,
        [single] => Some(map_join(single)?),
        _ => return Err(parse_err("at most one JOIN is supported")),
    };

    let projections = projection
        .into_iter()
        .map(map_select_item)
        .collect::<DbResult<Vec<_>>>()?;
    let selection = selection.map(map_predicate).transpose()?;
    let group_by = match group_by {
        sqlast::GroupByExpr::Expressions(exprs) => {
            exprs.into_iter().map(map_colref).collect::<DbResult<_>>()?
        }
        sqlast::GroupByExpr::All => return Err(parse_err("GROUP BY ALL not supported")),
    };
    let having = having.map(map_having_predicate).transpose()?;
    let order_by = query
        .order_by
        .into_iter()
        .map(map_order_by_expr)
        .collect::<DbResult<Vec<_>>>()?;

    Ok(Statement::Select {
        projections,
        from: base,
        join,
        selection,
        group_by,
        having,
        order_by,
    })
}

fn map_join(join: &sqlast::Join) -> DbResult<JoinClause> {
    let other = table_ref_from_factor(&join.relation)?;
    let on_expr = match &join.join_operator {
        sqlast::JoinOperator::Inner(sqlast::JoinConstraint::On(expr)) => expr,
        other => {
            return Err(parse_err(format!(
                "unsupported join type: {other:?} (only INNER JOIN ... ON is supported)"
            )))
        }
    };
    let sqlast::Expr::BinaryOp { left, op, right } = on_expr else {
        return Err(parse_err("JOIN ON must be a single column equality"));
    };
    if !matches!(op, sqlast::BinaryOperator::Eq) {
        return Err(parse_err("JOIN ON must be an equality"));
    }
    let left = map_colref((**left).clone())?;
    let right = map_colref((**right).clone())?;
    Ok(JoinClause {
        other,
        on: (left, right),
    })
}

fn table_ref_from_factor(factor: &sqlast::TableFactor) -> DbResult<TableRef> {
    match factor {
        sqlast::TableFactor::Table { name, alias, .. } => Ok(TableRef {
            name: normalize_object_name(name)?,
            alias: alias.as_ref().map(|a| normalize_ident(&a.name)),
        }),
        other => Err(parse_err(format!("unsupported table factor: {other:?}"))),
    }
}

fn map_order_by_expr(expr: sqlast::OrderByExpr) -> DbResult<OrderByExpr> {
    let column = map_colref(expr.expr)?;
    let direction = match expr.asc {
        Some(false) => SortDirection::Desc,
        _ => SortDirection::Asc,
    };
    Ok(OrderByExpr { column, direction })
}

fn extract_values(query: sqlast::Query) -> DbResult<Vec<Value>> {
    match *query.body {
        sqlast::SetExpr::Values(values) => {
            let mut rows = values.rows.into_iter();
            let row = rows
                .next()
                .ok_or_else(|| parse_err("INSERT requires at least one row"))?;
            if rows.next().is_some() {
                return Err(parse_err("multi-row INSERT not supported"));
            }
            row.into_iter().map(map_literal).collect()
        }
        _ => Err(parse_err("INSERT expects VALUES list")),
    }
}

fn map_select_item(item: sqlast::SelectItem) -> DbResult<Projection> {
    match item {
        sqlast::SelectItem::Wildcard(options) => {
            ensure_plain_wildcard(&options)?;
            Ok(Projection::Wildcard)
        }
        sqlast::SelectItem::QualifiedWildcard(_, _) => {
            Err(parse_err("qualified wildcard not supported"))
        }
        sqlast::SelectItem::UnnamedExpr(expr) => match expr {
            sqlast::Expr::Function(func) => map_aggregate(func),
            other => Ok(Projection::Column(map_colref(other)?)),
        },
        sqlast::SelectItem::ExprWithAlias { .. } => Err(parse_err("select aliases not supported")),
    }
}

fn map_aggregate(func: sqlast::Function) -> DbResult<Projection> {
    let (func, column) = parse_aggregate_call(func)?;
    Ok(Projection::Aggregate { func, column })
}

fn parse_aggregate_call(func: sqlast::Function) -> DbResult<(expr::Aggregate, ColRef)> {
    let name = func.name.0.first().map(|i| i.value.to_uppercase());
    let agg = match name.as_deref() {
        Some("MIN") => expr::Aggregate::Min,
        Some("MAX") => expr::Aggregate::Max,
        Some("SUM") => expr::Aggregate::Sum,
        _ => return Err(parse_err("unsupported function, expected MIN/MAX/SUM")),
    };
    let arg = func
        .args
        .into_iter()
        .next()
        .ok_or_else(|| parse_err("aggregate requires exactly one column argument"))?;
    let column = match arg {
        sqlast::FunctionArg::Unnamed(sqlast::FunctionArgExpr::Expr(expr)) => map_colref(expr)?,
        _ => return Err(parse_err("aggregate argument must be a column")),
    };
    Ok((agg, column))
}

fn map_colref(expr: sqlast::Expr) -> DbResult<ColRef> {
    match expr {
        sqlast::Expr::Identifier(ident) => Ok(ColRef::unqualified(normalize_ident_owned(ident))),
        sqlast::Expr::CompoundIdentifier(mut parts) => {
            if parts.len() != 2 {
                return Err(parse_err("expected table.column reference"));
            }
            let name = normalize_ident_owned(parts.remove(1));
            let table = normalize_ident_owned(parts.remove(0));
            Ok(ColRef::qualified(table, name))
        }
        other => Err(parse_err(format!("expected column reference, got {other:?}"))),
    }
}

/// Predicate grammar: a leaf comparison, or exactly two leaves joined by one
/// AND/OR connective.
fn map_predicate(expr: sqlast::Expr) -> DbResult<Predicate> {
    map_predicate_inner(expr, false)
}

/// Same grammar as `map_predicate`, but operands may reference an aggregate
/// call (`SUM(col) > 100`) — only legal in a HAVING clause.
fn map_having_predicate(expr: sqlast::Expr) -> DbResult<Predicate> {
    map_predicate_inner(expr, true)
}

fn map_predicate_inner(expr: sqlast::Expr, allow_aggregate: bool) -> DbResult<Predicate> {
    let expr = unwrap_nested(expr);
    if let sqlast::Expr::BinaryOp { left, op, right } = &expr {
        if let Some(connective) = map_connective(op) {
            let left = map_comparison(unwrap_nested((**left).clone()), allow_aggregate)?;
            let right = map_comparison(unwrap_nested((**right).clone()), allow_aggregate)?;
            return Ok(Predicate::Compound {
                left,
                op: connective,
                right,
            });
        }
    }
    Ok(Predicate::Leaf(map_comparison(expr, allow_aggregate)?))
}

fn map_comparison(expr: sqlast::Expr, allow_aggregate: bool) -> DbResult<Comparison> {
    match expr {
        sqlast::Expr::BinaryOp { left, op, right } => {
            let op = map_compare_op(&op)?;
            let left = map_operand(unwrap_nested((*left).clone()), allow_aggregate)?;
            let right = map_operand(unwrap_nested((*right).clone()), allow_aggregate)?;
            Ok(Comparison { left, op, right })
        }
        other => Err(parse_err(format!(
            "expected a comparison (col {{=,<,>}} col|literal), got {other:?}"
        ))),
    }
}

fn map_operand(expr: sqlast::Expr, allow_aggregate: bool) -> DbResult<Operand> {
    match expr {
        sqlast::Expr::Value(value) => Ok(Operand::Literal(map_value(value)?)),
        sqlast::Expr::Function(func) if allow_aggregate => {
            let (agg, column) = parse_aggregate_call(func)?;
            let label = expr::aggregate_label(agg, column.table.as_deref(), &column.name);
            Ok(Operand::Column {
                table: None,
                name: label,
            })
        }
        other => {
            let col = map_colref(other)?;
            Ok(Operand::Column {
                table: col.table,
                name: col.name,
            })
        }
    }
}

fn map_connective(op: &sqlast::BinaryOperator) -> Option<Connective> {
    match op {
        sqlast::BinaryOperator::And => Some(Connective::And),
        sqlast::BinaryOperator::Or => Some(Connective::Or),
        _ => None,
    }
}

fn map_compare_op(op: &sqlast::BinaryOperator) -> DbResult<CompareOp> {
    match op {
        sqlast::BinaryOperator::Eq => Ok(CompareOp::Eq),
        sqlast::BinaryOperator::Lt => Ok(CompareOp::Lt),
        sqlast::BinaryOperator::Gt => Ok(CompareOp::Gt),
        other => Err(parse_err(format!(
            "unsupported comparison operator: {other:?} (only =, <, > are supported)"
        ))),
    }
}

fn unwrap_nested(expr: sqlast::Expr) -> sqlast::Expr {
    match expr {
        sqlast::Expr::Nested(inner) => unwrap_nested(*inner),
        other => other,
    }
}

fn map_literal(expr: sqlast::Expr) -> DbResult<Value> {
    match unwrap_nested(expr) {
        sqlast::Expr::Value(value) => map_value(value),
        sqlast::Expr::UnaryOp {
            op: sqlast::UnaryOperator::Minus,
            expr,
        } => match map_value_inner(*expr)? {
            Value::Int(i) => Ok(Value::Int(-i)),
            Value::Double(d) => Ok(Value::Double(-d)),
            other => Err(parse_err(format!("cannot negate {other:?}"))),
        },
        other => Err(parse_err(format!("expected a literal, got {other:?}"))),
    }
}

fn map_value_inner(expr: sqlast::Expr) -> DbResult<Value> {
    match expr {
        sqlast::Expr::Value(value) => map_value(value),
        other => Err(parse_err(format!("expected a literal, got {other:?}"))),
    }
}

fn map_value(value: sqlast::Value) -> DbResult<Value> {
    use sqlast::Value as SqlValue;

    match value {
        SqlValue::Number(num, _) => {
            if num.contains('.') {
                let parsed = num
                    .parse::<f64>()
                    .map_err(|_| parse_err(format!("invalid double literal: {num}")))?;
                Ok(Value::Double(parsed))
            } else {
                let parsed = num
                    .parse::<i64>()
                    .map_err(|_| parse_err(format!("invalid int literal: {num}")))?;
                Ok(Value::Int(parsed))
            }
        }
        SqlValue::SingleQuotedString(s) | SqlValue::DoubleQuotedString(s) => Ok(Value::Text(s)),
        other => Err(parse_err(format!("unsupported literal: {other:?}"))),
    }
}

fn normalize_ident(ident: &sqlast::Ident) -> String {
    ident.value.clone()
}

fn normalize_ident_owned(ident: sqlast::Ident) -> String {
    ident.value
}

fn normalize_object_name(name: &sqlast::ObjectName) -> DbResult<String> {
    name.0
        .first()
        .map(|ident| ident.value.clone())
        .ok_or_else(|| parse_err("invalid object name"))
}

fn first_name(mut names: Vec<sqlast::ObjectName>) -> DbResult<String> {
    if names.is_empty() {
        return Err(parse_err("DROP requires a target"));
    }
    normalize_object_name(&names.remove(0))
}

fn table_name_from_with_joins(table: &sqlast::TableWithJoins) -> DbResult<String> {
    if !table.joins.is_empty() {
        return Err(parse_err("joins not supported here"));
    }
    match &table.relation {
        sqlast::TableFactor::Table { name, .. } => normalize_object_name(name),
        _ => Err(parse_err("unsupported table factor")),
    }
}

fn map_index_column(column: Option<&sqlast::OrderByExpr>) -> DbResult<String> {
    let column = column.ok_or_else(|| parse_err("index column required"))?;
    match &column.expr {
        sqlast::Expr::Identifier(ident) => Ok(normalize_ident(ident)),
        sqlast::Expr::CompoundIdentifier(idents) => idents
            .last()
            .map(normalize_ident)
            .ok_or_else(|| parse_err("invalid identifier")),
        other => Err(parse_err(format!("unsupported index column: {other:?}"))),
    }
}

fn ensure_plain_wildcard(options: &sqlast::WildcardAdditionalOptions) -> DbResult<()> {
    let has_options = options.opt_exclude.is_some()
        || options.opt_except.is_some()
        || options.opt_rename.is_some()
        || options.opt_replace.is_some();
    if has_options {
        Err(parse_err("wildcard options not supported"))
    } else {
        Ok(())
    }
}

fn parse_err(expected: impl Into<String>) -> DbError {
    DbError::ParseError {
        position: 0,
        expected: expected.into(),
    }
}
