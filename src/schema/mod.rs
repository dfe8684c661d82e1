//! In-memory schema graph shared by the extractor, resolver, validator and emitter.
//!
//! - Data model for tables, fields and foreign keys (this file)
//! - Table extraction from a flattened diagram (`extract`)
//! - Dependency analysis: cycle detection, deferred FKs, topological order (`graph`)

pub mod extract;
pub mod graph;

pub use graph::{DependencyAnalysis, SchemaGraph};

use ahash::AHashMap;
use std::fmt;

/// Unique identifier for a table within a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub u32);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TableId({})", self.0)
    }
}

/// A column within a table.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    /// Type text as written in the diagram (e.g. `VARCHAR(50)`), or empty if unspecified.
    pub type_text: String,
    /// Free-form constraint suffix (e.g. `"PRIMARY KEY"`, `"NOT NULL"`, `"UNIQUE"`).
    pub constraints: String,
    pub is_fk: bool,
    pub is_unique: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, type_text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_text: type_text.into(),
            constraints: String::new(),
            is_fk: false,
            is_unique: false,
        }
    }

    /// Base type: the portion of `type_text` before any length parenthesis, uppercased.
    /// An empty type is treated as `VARCHAR`, matching the emitter's `VARCHAR(255)` fallback.
    pub fn base_type(&self) -> String {
        base_type(&self.type_text)
    }

    /// Append a constraint token if not already present (verbatim substring match).
    pub fn add_constraint(&mut self, token: &str) {
        if self.constraints.contains(token) {
            return;
        }
        if self.constraints.is_empty() {
            self.constraints = token.to_string();
        } else {
            self.constraints.push(' ');
            self.constraints.push_str(token);
        }
    }

    pub fn has_constraint(&self, token: &str) -> bool {
        self.constraints.contains(token)
    }

    pub fn remove_constraint(&mut self, token: &str) {
        let replaced = self.constraints.replace(token, "");
        self.constraints = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    }
}

/// The base type of a SQL type string: substring before `(`, uppercased.
/// An empty/missing type is treated as `VARCHAR`.
pub fn base_type(type_text: &str) -> String {
    let trimmed = type_text.trim();
    if trimmed.is_empty() {
        return "VARCHAR".to_string();
    }
    trimmed
        .split('(')
        .next()
        .unwrap_or(trimmed)
        .trim()
        .to_uppercase()
}

/// A directed foreign key: an ordered tuple of child fields referencing an
/// ordered tuple of columns in another table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForeignKey {
    pub child_fields: Vec<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
}

impl ForeignKey {
    pub fn single(
        child_field: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self {
            child_fields: vec![child_field.into()],
            referenced_table: table.into(),
            referenced_columns: vec![column.into()],
        }
    }
}

/// A relation: an ordered sequence of fields, an ordered primary-key field-name
/// list, and a duplicate-free set of foreign keys.
#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub id: TableId,
    /// Id of the originating diagram cell, empty for synthesized junction tables.
    pub cell_id: String,
    pub fields: Vec<Field>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl Table {
    pub fn new(name: impl Into<String>, id: TableId, cell_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id,
            cell_id: cell_id.into(),
            fields: Vec::new(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn get_field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    /// Field names already consumed by some existing ForeignKey's child-field tuple.
    pub fn fk_bound_fields(&self) -> ahash::AHashSet<&str> {
        self.foreign_keys
            .iter()
            .flat_map(|fk| fk.child_fields.iter().map(|s| s.as_str()))
            .collect()
    }

    /// Insert a foreign key unless an equal one (by child-field tuple, referenced
    /// table and referenced-column tuple) already exists.
    pub fn add_foreign_key(&mut self, fk: ForeignKey) {
        if !self.foreign_keys.contains(&fk) {
            self.foreign_keys.push(fk);
        }
    }

    pub fn has_foreign_key_to(&self, table: &str, columns: &[String]) -> bool {
        self.foreign_keys
            .iter()
            .any(|fk| fk.referenced_table == table && fk.referenced_columns == columns)
    }

    pub fn has_self_reference(&self) -> bool {
        self.foreign_keys
            .iter()
            .any(|fk| fk.referenced_table == self.name)
    }

    /// Foreign keys in a deterministic order (by child-field tuple), used
    /// everywhere the emitter and analyzer need stable iteration.
    pub fn sorted_foreign_keys(&self) -> Vec<&ForeignKey> {
        let mut fks: Vec<&ForeignKey> = self.foreign_keys.iter().collect();
        fks.sort_by(|a, b| a.child_fields.cmp(&b.child_fields));
        fks
    }
}

/// The complete schema graph produced by extraction and mutated by resolution.
#[derive(Debug, Default)]
pub struct Schema {
    tables: AHashMap<String, TableId>,
    table_list: Vec<Table>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, name: impl Into<String>, cell_id: impl Into<String>) -> TableId {
        let name = name.into();
        let id = TableId(self.table_list.len() as u32);
        self.table_list.push(Table::new(name.clone(), id, cell_id));
        self.tables.insert(name, id);
        id
    }

    pub fn get_table_id(&self, name: &str) -> Option<TableId> {
        if let Some(&id) = self.tables.get(name) {
            return Some(id);
        }
        let lower = name.to_lowercase();
        self.tables
            .iter()
            .find(|(k, _)| k.to_lowercase() == lower)
            .map(|(_, &id)| id)
    }

    pub fn table(&self, id: TableId) -> Option<&Table> {
        self.table_list.get(id.0 as usize)
    }

    pub fn table_mut(&mut self, id: TableId) -> Option<&mut Table> {
        self.table_list.get_mut(id.0 as usize)
    }

    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.get_table_id(name).and_then(|id| self.table(id))
    }

    pub fn get_table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.get_table_id(name)
            .and_then(move |id| self.table_mut(id))
    }

    pub fn len(&self) -> usize {
        self.table_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table_list.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Table> {
        self.table_list.iter()
    }

    pub fn table_ids(&self) -> impl Iterator<Item = TableId> + '_ {
        (0..self.table_list.len()).map(|i| TableId(i as u32))
    }
}
