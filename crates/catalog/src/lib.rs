use std::{
    collections::HashMap,
    fs,
    path::Path,
};

use common::{ColumnId, DbError, DbResult, TableId};
use serde::{Deserialize, Serialize};
use types::SqlType;

/// Persistent catalog that stores table schemas, keys, and index metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Catalog {
    tables: Vec<TableMeta>,
    next_table_id: u64,
    #[serde(skip)]
    #[serde(default)]
    table_name_index: HashMap<String, usize>,
    #[serde(skip)]
    #[serde(default)]
    table_id_index: HashMap<TableId, usize>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        let mut catalog = Self {
            tables: Vec::new(),
            next_table_id: 1,
            table_name_index: HashMap::new(),
            table_id_index: HashMap::new(),
        };
        catalog.rebuild_indexes();
        catalog
    }

    /// Load a catalog from disk, returning an empty catalog if the file does not exist.
    pub fn load(path: &Path) -> DbResult<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let data = fs::read_to_string(path)?;
        let mut catalog: Catalog = serde_json::from_str(&data)
            .map_err(|err| DbError::Catalog(format!("invalid catalog file: {err}")))?;
        catalog.rebuild_indexes();
        Ok(catalog)
    }

    /// Persist the catalog contents as pretty JSON.
    pub fn save(&self, path: &Path) -> DbResult<()> {
        let data = serde_json::to_string_pretty(self)
            .map_err(|err| DbError::Catalog(format!("serialize failed: {err}")))?;
        fs::write(path, data)?;
        Ok(())
    }

    /// Returns an immutable reference to a table by name.
    pub fn table(&self, name: &str) -> DbResult<&TableMeta> {
        let idx = self
            .table_name_index
            .get(name)
            .copied()
            .ok_or_else(|| DbError::UnknownTable(name.to_string()))?;
        self.tables
            .get(idx)
            .ok_or_else(|| DbError::UnknownTable(name.to_string()))
    }

    /// Returns an immutable reference to a table by identifier.
    pub fn table_by_id(&self, id: TableId) -> DbResult<&TableMeta> {
        let idx = self
            .table_id_index
            .get(&id)
            .copied()
            .ok_or_else(|| DbError::Catalog(format!("unknown table id {}", id.0)))?;
        self.tables
            .get(idx)
            .ok_or_else(|| DbError::Catalog(format!("unknown table id {}", id.0)))
    }

    /// Returns true if a table by this name is registered.
    pub fn has_table(&self, name: &str) -> bool {
        self.table_name_index.contains_key(name)
    }

    /// Create a new table with the given columns, primary key and foreign keys.
    ///
    /// `pk` is the name of the primary-key column; `fks` maps a local column
    /// name to the `(table, column)` it references. The referenced column
    /// must be that table's primary key and must share its type.
    pub fn create_table(
        &mut self,
        name: &str,
        columns: Vec<Column>,
        pk: &str,
        fks: Vec<(String, String, String)>,
    ) -> DbResult<TableId> {
        if self.table_name_index.contains_key(name) {
            return Err(DbError::Catalog(format!("table '{name}' already exists")));
        }
        let schema = TableSchema::try_new(columns)?;
        let pk_ordinal = schema
            .column_index(pk)
            .ok_or_else(|| DbError::UnknownColumn(pk.to_string()))?;

        let mut foreign_keys = Vec::with_capacity(fks.len());
        for (local_column, ref_table, ref_column) in fks {
            let local_ordinal = schema
                .column_index(&local_column)
                .ok_or_else(|| DbError::UnknownColumn(local_column.clone()))?;
            let referenced = self.table(&ref_table)?;
            if referenced.schema.primary_key_name() != ref_column {
                return Err(DbError::FKViolation(format!(
                    "'{ref_table}.{ref_column}' is not the primary key of '{ref_table}'"
                )));
            }
            let local_ty = schema.column_type(local_ordinal).copied().unwrap();
            let ref_ty = referenced.schema.column_type(referenced.schema.primary_key).copied().unwrap();
            if local_ty != ref_ty {
                return Err(DbError::TypeMismatch {
                    expected: ref_ty,
                    found: local_ty,
                });
            }
            foreign_keys.push(ForeignKey {
                column: local_ordinal,
                ref_table: ref_table.clone(),
                ref_column: ref_column.clone(),
            });
        }

        let table_id = TableId(self.next_table_id);
        self.next_table_id += 1;
        let table = TableMeta::new(table_id, name.to_string(), schema, pk_ordinal, foreign_keys);
        self.tables.push(table);
        self.rebuild_indexes();
        Ok(table_id)
    }

    /// Remove a table and its associated indexes.
    ///
    /// Refuses with `FKViolation` if another table holds a foreign key into
    /// any column of this table.
    pub fn drop_table(&mut self, name: &str) -> DbResult<()> {
        let idx = self
            .table_name_index
            .get(name)
            .copied()
            .ok_or_else(|| DbError::UnknownTable(name.to_string()))?;

        for other in &self.tables {
            if other.name == name {
                continue;
            }
            if other.foreign_keys.iter().any(|fk| fk.ref_table == name) {
                return Err(DbError::FKViolation(format!(
                    "table '{name}' is referenced by a foreign key on '{}'",
                    other.name
                )));
            }
        }

        self.tables.remove(idx);
        self.rebuild_indexes();
        Ok(())
    }

    /// Create a single-column secondary index. The primary-key column
    /// already has an implicit index and may not be indexed again.
    pub fn create_index(&mut self, table_name: &str, column: &str) -> DbResult<()> {
        let resolved = {
            let table = self.table(table_name)?;
            let ordinal = table
                .schema
                .column_index(column)
                .ok_or_else(|| DbError::UnknownColumn(column.to_string()))?;
            if ordinal == table.schema.primary_key {
                return Err(DbError::Catalog(format!(
                    "column '{column}' is the primary key of '{table_name}' and already indexed"
                )));
            }
            ordinal
        };
        let table = self.table_mut(table_name)?;
        table.add_index(IndexMeta { column: resolved })
    }

    /// Drop a secondary index. The primary-key index may not be dropped.
    pub fn drop_index(&mut self, table_name: &str, column: &str) -> DbResult<()> {
        let table = self.table_mut(table_name)?;
        if table.schema.column_index(column) == Some(table.schema.primary_key) {
            return Err(DbError::Catalog(format!(
                "cannot drop the primary key index on '{table_name}'"
            )));
        }
        table.remove_index(column)
    }

    /// Immutable iterator over all tables.
    pub fn tables(&self) -> impl Iterator<Item = &TableMeta> {
        self.tables.iter()
    }

    pub fn table_mut(&mut self, name: &str) -> DbResult<&mut TableMeta> {
        let idx = self
            .table_name_index
            .get(name)
            .copied()
            .ok_or_else(|| DbError::UnknownTable(name.to_string()))?;
        self.tables
            .get_mut(idx)
            .ok_or_else(|| DbError::UnknownTable(name.to_string()))
    }

    fn rebuild_indexes(&mut self) {
        self.table_name_index.clear();
        self.table_id_index.clear();
        for (idx, table) in self.tables.iter_mut().enumerate() {
            self.table_name_index.insert(table.name.clone(), idx);
            self.table_id_index.insert(table.id, idx);
            table.rebuild_index_lookup();
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

/// Metadata describing a registered table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableMeta {
    pub id: TableId,
    pub name: String,
    pub schema: TableSchema,
    pub foreign_keys: Vec<ForeignKey>,
    pub indexes: Vec<IndexMeta>,
    #[serde(skip)]
    #[serde(default)]
    index_column_lookup: HashMap<ColumnId, usize>,
}

impl TableMeta {
    fn new(
        id: TableId,
        name: String,
        schema: TableSchema,
        pk: ColumnId,
        foreign_keys: Vec<ForeignKey>,
    ) -> Self {
        let mut schema = schema;
        schema.primary_key = pk;
        let mut table = Self {
            id,
            name,
            schema,
            foreign_keys,
            indexes: Vec::new(),
            index_column_lookup: HashMap::new(),
        };
        table.rebuild_index_lookup();
        table
    }

    fn add_index(&mut self, index: IndexMeta) -> DbResult<()> {
        if self.index_column_lookup.contains_key(&index.column) {
            return Err(DbError::Catalog(format!(
                "index on column {} already exists on table '{}'",
                index.column, self.name
            )));
        }
        self.indexes.push(index);
        self.rebuild_index_lookup();
        Ok(())
    }

    fn remove_index(&mut self, column: &str) -> DbResult<()> {
        let ordinal = self
            .schema
            .column_index(column)
            .ok_or_else(|| DbError::UnknownColumn(column.to_string()))?;
        let idx = self
            .index_column_lookup
            .get(&ordinal)
            .copied()
            .ok_or_else(|| {
                DbError::Catalog(format!(
                    "no index on column '{column}' of table '{}'",
                    self.name
                ))
            })?;
        self.indexes.remove(idx);
        self.rebuild_index_lookup();
        Ok(())
    }

    /// Returns true if a secondary (or implicit PK) index exists on `column`.
    pub fn has_index(&self, column: &str) -> bool {
        match self.schema.column_index(column) {
            Some(ordinal) => {
                ordinal == self.schema.primary_key || self.index_column_lookup.contains_key(&ordinal)
            }
            None => false,
        }
    }

    /// All columns carrying a user-defined secondary index.
    pub fn indexed_columns(&self) -> impl Iterator<Item = &IndexMeta> {
        self.indexes.iter()
    }

    /// Returns all indexes defined on this table.
    pub fn indexes(&self) -> &[IndexMeta] {
        &self.indexes
    }

    /// The column name of the primary key.
    pub fn primary_key_name(&self) -> &str {
        self.schema.primary_key_name()
    }

    fn rebuild_index_lookup(&mut self) {
        self.index_column_lookup.clear();
        for (idx, index) in self.indexes.iter().enumerate() {
            self.index_column_lookup.insert(index.column, idx);
        }
    }
}

/// Column layout for a table, along with helpful lookup structures.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableSchema {
    pub columns: Vec<Column>,
    pub primary_key: ColumnId,
    name_to_ordinal: HashMap<String, ColumnId>,
}

impl TableSchema {
    pub fn try_new(columns: Vec<Column>) -> DbResult<Self> {
        if columns.is_empty() {
            return Err(DbError::Catalog(
                "table must contain at least one column".into(),
            ));
        }
        if columns.len() > u16::MAX as usize {
            return Err(DbError::Catalog(
                "too many columns for a single table".into(),
            ));
        }
        let mut name_to_ordinal = HashMap::new();
        for (idx, column) in columns.iter().enumerate() {
            let ordinal = idx as ColumnId;
            if name_to_ordinal
                .insert(column.name.clone(), ordinal)
                .is_some()
            {
                return Err(DbError::Catalog(format!(
                    "duplicate column '{}' found while building schema",
                    column.name
                )));
            }
        }
        Ok(Self {
            columns,
            primary_key: 0,
            name_to_ordinal,
        })
    }

    /// Returns the ordinal for a column name.
    pub fn column_index(&self, name: &str) -> Option<ColumnId> {
        self.name_to_ordinal.get(name).copied()
    }

    /// Returns the SQL type for the provided ordinal.
    pub fn column_type(&self, ordinal: ColumnId) -> Option<&SqlType> {
        self.columns.get(ordinal as usize).map(|c| &c.ty)
    }

    /// Returns the name of the primary-key column.
    pub fn primary_key_name(&self) -> &str {
        &self.columns[self.primary_key as usize].name
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Describes a logical column within a table schema.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub ty: SqlType,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: SqlType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A foreign key: a local column referencing another table's primary key.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForeignKey {
    pub column: ColumnId,
    pub ref_table: String,
    pub ref_column: String,
}

/// Metadata describing a secondary table index. Every index in this
/// engine is a balanced search tree over a single column.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexMeta {
    pub column: ColumnId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_columns() -> Vec<Column> {
        vec![
            Column::new("id", SqlType::Int64),
            Column::new("name", SqlType::Text),
            Column::new("age", SqlType::Int64),
        ]
    }

    #[test]
    fn create_and_lookup_table() {
        let mut catalog = Catalog::new();
        let table_id = catalog
            .create_table("users", sample_columns(), "id", vec![])
            .unwrap();

        assert_eq!(table_id, TableId(1));

        let table = catalog.table("users").unwrap();
        assert_eq!(table.schema.column_index("name"), Some(1));
        assert_eq!(table.schema.column_type(0), Some(&SqlType::Int64));
        assert_eq!(table.primary_key_name(), "id");

        let same_table = catalog.table_by_id(table_id).unwrap();
        assert_eq!(same_table.name, "users");
    }

    #[test]
    fn rejects_duplicate_tables() {
        let mut catalog = Catalog::new();
        catalog
            .create_table("users", sample_columns(), "id", vec![])
            .unwrap();
        let err = catalog
            .create_table("users", sample_columns(), "id", vec![])
            .unwrap_err();

        assert!(matches!(err, DbError::Catalog(_)));
        assert!(format!("{err}").contains("already exists"));
    }

    #[test]
    fn rejects_duplicate_columns() {
        let mut catalog = Catalog::new();
        let err = catalog
            .create_table(
                "bad",
                vec![
                    Column::new("id", SqlType::Int64),
                    Column::new("id", SqlType::Int64),
                ],
                "id",
                vec![],
            )
            .unwrap_err();
        assert!(format!("{err}").contains("duplicate column"));
    }

    #[test]
    fn unknown_primary_key_column_is_rejected() {
        let mut catalog = Catalog::new();
        let err = catalog
            .create_table("bad", sample_columns(), "missing", vec![])
            .unwrap_err();
        assert!(matches!(err, DbError::UnknownColumn(_)));
    }

    #[test]
    fn foreign_key_must_reference_a_primary_key_of_matching_type() {
        let mut catalog = Catalog::new();
        catalog
            .create_table("users", sample_columns(), "id", vec![])
            .unwrap();

        let ok = catalog.create_table(
            "orders",
            vec![
                Column::new("order_id", SqlType::Int64),
                Column::new("user_id", SqlType::Int64),
            ],
            "order_id",
            vec![("user_id".into(), "users".into(), "id".into())],
        );
        assert!(ok.is_ok());

        let mismatched = catalog.create_table(
            "carts",
            vec![
                Column::new("cart_id", SqlType::Int64),
                Column::new("user_id", SqlType::Text),
            ],
            "cart_id",
            vec![("user_id".into(), "users".into(), "id".into())],
        );
        assert!(matches!(mismatched, Err(DbError::TypeMismatch { .. })));

        let non_pk = catalog.create_table(
            "wishlists",
            vec![
                Column::new("wishlist_id", SqlType::Int64),
                Column::new("user_name", SqlType::Text),
            ],
            "wishlist_id",
            vec![("user_name".into(), "users".into(), "name".into())],
        );
        assert!(matches!(non_pk, Err(DbError::FKViolation(_))));
    }

    #[test]
    fn create_and_drop_index() {
        let mut catalog = Catalog::new();
        catalog
            .create_table("users", sample_columns(), "id", vec![])
            .unwrap();

        catalog.create_index("users", "name").unwrap();

        let table = catalog.table("users").unwrap();
        assert!(table.has_index("name"));
        assert_eq!(table.indexes()[0].column, 1u16);

        catalog.drop_index("users", "name").expect("index drop succeeds");
        assert!(!catalog.table("users").unwrap().has_index("name"));
    }

    #[test]
    fn primary_key_index_cannot_be_dropped() {
        let mut catalog = Catalog::new();
        catalog
            .create_table("users", sample_columns(), "id", vec![])
            .unwrap();

        let err = catalog.drop_index("users", "id").unwrap_err();
        assert!(matches!(err, DbError::Catalog(_)));
    }

    #[test]
    fn primary_key_column_cannot_be_reindexed() {
        let mut catalog = Catalog::new();
        catalog
            .create_table("users", sample_columns(), "id", vec![])
            .unwrap();

        let err = catalog.create_index("users", "id").unwrap_err();
        assert!(matches!(err, DbError::Catalog(_)));
    }

    #[test]
    fn index_creation_validates_columns() {
        let mut catalog = Catalog::new();
        catalog
            .create_table("users", sample_columns(), "id", vec![])
            .unwrap();

        let err = catalog.create_index("users", "missing").unwrap_err();
        assert!(matches!(err, DbError::UnknownColumn(_)));
    }

    #[test]
    fn persistence_round_trip() {
        let mut catalog = Catalog::new();
        catalog
            .create_table("users", sample_columns(), "id", vec![])
            .unwrap();
        catalog.create_index("users", "name").unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        catalog.save(&path).unwrap();

        let loaded = Catalog::load(&path).unwrap();
        let table = loaded.table("users").unwrap();
        assert!(table.has_index("name"));
        assert_eq!(loaded.table_by_id(TableId(1)).unwrap().name, "users");
    }

    #[test]
    fn drop_table_removes_metadata() {
        let mut catalog = Catalog::new();
        catalog
            .create_table("users", sample_columns(), "id", vec![])
            .unwrap();

        catalog.drop_table("users").unwrap();
        assert!(catalog.table("users").is_err());
        assert!(catalog.table_by_id(TableId(1)).is_err());

        let next_id = catalog
            .create_table("orders", sample_columns(), "id", vec![])
            .unwrap();
        assert_eq!(next_id, TableId(2));
    }

    #[test]
    fn drop_table_refused_while_referenced_by_foreign_key() {
        let mut catalog = Catalog::new();
        catalog
            .create_table("users", sample_columns(), "id", vec![])
            .unwrap();
        catalog
            .create_table(
                "orders",
                vec![
                    Column::new("order_id", SqlType::Int64),
                    Column::new("user_id", SqlType::Int64),
                ],
                "order_id",
                vec![("user_id".into(), "users".into(), "id".into())],
            )
            .unwrap();

        let err = catalog.drop_table("users").unwrap_err();
        assert!(matches!(err, DbError::FKViolation(_)));

        catalog.drop_table("orders").unwrap();
        catalog.drop_table("users").unwrap();
    }
}
