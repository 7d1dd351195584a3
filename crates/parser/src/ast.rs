use expr::{Aggregate, Predicate};
use types::Value;

/// A reference to a column, optionally qualified by table (or alias) name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColRef {
    pub table: Option<String>,
    pub name: String,
}

impl ColRef {
    pub fn unqualified(name: impl Into<String>) -> Self {
        Self {
            table: None,
            name: name.into(),
        }
    }

    pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            name: name.into(),
        }
    }
}

/// A single projected item of a SELECT list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Projection {
    Wildcard,
    Column(ColRef),
    Aggregate { func: Aggregate, column: ColRef },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderByExpr {
    pub column: ColRef,
    pub direction: SortDirection,
}

/// `FROM t` or `FROM t JOIN t2 ON t.c = t2.c2`. A join side may carry an
/// alias so the same physical table can appear twice (self-join).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
}

impl TableRef {
    /// The name column references against this side should use.
    pub fn logical_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinClause {
    pub other: TableRef,
    pub on: (ColRef, ColRef),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub ty: types::SqlType,
    pub primary_key: bool,
    pub foreign_key: Option<(String, String)>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    CreateTable {
        name: String,
        columns: Vec<ColumnDef>,
    },
    DropTable {
        name: String,
    },
    CreateIndex {
        name: String,
        table: String,
        column: String,
    },
    DropIndex {
        name: String,
        table: String,
    },
    Insert {
        table: String,
        columns: Option<Vec<String>>,
        values: Vec<Value>,
    },
    Select {
        projections: Vec<Projection>,
        from: TableRef,
        join: Option<JoinClause>,
        selection: Option<Predicate>,
        group_by: Vec<ColRef>,
        having: Option<Predicate>,
        order_by: Vec<OrderByExpr>,
    },
    Delete {
        table: String,
        selection: Option<Predicate>,
    },
    Update {
        table: String,
        set: Vec<(String, Value)>,
        selection: Option<Predicate>,
    },
}
