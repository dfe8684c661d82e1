//! Schema validator: cross-checks a resolved [`Schema`] before DDL emission.
//!
//! For every foreign key (each position of a composite FK) this verifies that
//! the child field exists, the referenced table and column exist, and the
//! base types agree. All errors are accumulated rather than returned on the
//! first failure, matching the teacher's "collect everything, report once"
//! validator design.

use crate::schema::{base_type, Schema};
use serde::Serialize;
use std::fmt;

/// Severity of a validation issue. The validator currently only ever produces
/// errors; `Warning`/`Info` are carried for parity with the teacher's own
/// validator and to leave room for future non-fatal rules (see `--strict`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Info => write!(f, "INFO"),
        }
    }
}

/// A single validation finding, carrying enough context to locate it in the
/// source diagram without re-parsing the schema.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssue {
    pub code: &'static str,
    pub severity: Severity,
    pub table: String,
    pub message: String,
}

impl ValidationIssue {
    fn error(code: &'static str, table: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Error,
            table: table.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] table={}: {}", self.severity, self.code, self.table, self.message)
    }
}

/// Collected result of validating a whole schema.
#[derive(Debug, Serialize)]
pub struct ValidationSummary {
    pub issues: Vec<ValidationIssue>,
    pub tables_checked: usize,
    pub foreign_keys_checked: usize,
}

impl ValidationSummary {
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }
}

/// Validate every foreign key in `schema`. Returns a [`ValidationSummary`]
/// whose `issues` list is empty iff the schema is safe to emit.
pub fn validate(schema: &Schema) -> ValidationSummary {
    let mut issues = Vec::new();
    let mut fk_count = 0;

    for table in schema.iter() {
        for fk in table.sorted_foreign_keys() {
            fk_count += 1;

            let referenced_table = match schema.get_table(&fk.referenced_table) {
                Some(t) => t,
                None => {
                    issues.push(ValidationIssue::error(
                        "FK_MISSING_TABLE",
                        &table.name,
                        format!(
                            "foreign key ({}) references unknown table '{}'",
                            fk.child_fields.join(", "),
                            fk.referenced_table
                        ),
                    ));
                    continue;
                }
            };

            if fk.child_fields.len() != fk.referenced_columns.len() {
                issues.push(ValidationIssue::error(
                    "FK_ARITY_MISMATCH",
                    &table.name,
                    format!(
                        "foreign key has {} child column(s) but {} referenced column(s)",
                        fk.child_fields.len(),
                        fk.referenced_columns.len()
                    ),
                ));
                continue;
            }

            for (child_col, ref_col) in fk.child_fields.iter().zip(fk.referenced_columns.iter()) {
                let child_field = match table.get_field(child_col) {
                    Some(f) => f,
                    None => {
                        issues.push(ValidationIssue::error(
                            "FK_MISSING_CHILD_COLUMN",
                            &table.name,
                            format!("foreign key references its own missing column '{child_col}'"),
                        ));
                        continue;
                    }
                };

                let ref_field = match referenced_table.get_field(ref_col) {
                    Some(f) => f,
                    None => {
                        issues.push(ValidationIssue::error(
                            "FK_MISSING_REFERENCED_COLUMN",
                            &table.name,
                            format!(
                                "foreign key column '{child_col}' references missing column '{}.{ref_col}'",
                                referenced_table.name
                            ),
                        ));
                        continue;
                    }
                };

                let child_type = base_type(&child_field.type_text);
                let ref_type = base_type(&ref_field.type_text);
                if child_type != ref_type {
                    issues.push(ValidationIssue::error(
                        "FK_TYPE_MISMATCH",
                        &table.name,
                        format!(
                            "column '{child_col}' ({child_type}) does not match referenced column '{}.{ref_col}' ({ref_type})",
                            referenced_table.name
                        ),
                    ));
                }
            }
        }

        for pk_col in &table.primary_key {
            if !table.has_field(pk_col) {
                issues.push(ValidationIssue::error(
                    "PK_MISSING_COLUMN",
                    &table.name,
                    format!("primary key lists missing column '{pk_col}'"),
                ));
            }
        }
    }

    ValidationSummary {
        issues,
        tables_checked: schema.len(),
        foreign_keys_checked: fk_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, ForeignKey};

    #[test]
    fn clean_schema_has_no_issues() {
        let mut schema = Schema::new();
        let author = schema.add_table("author", "c1");
        {
            let t = schema.table_mut(author).unwrap();
            t.fields.push(Field::new("id", "INT"));
            t.primary_key.push("id".to_string());
        }
        let book = schema.add_table("book", "c2");
        {
            let t = schema.table_mut(book).unwrap();
            t.fields.push(Field::new("id", "INT"));
            t.primary_key.push("id".to_string());
            let mut fk = Field::new("author_id", "INT");
            fk.is_fk = true;
            t.fields.push(fk);
            t.add_foreign_key(ForeignKey::single("author_id", "author", "id"));
        }

        let summary = validate(&schema);
        assert!(!summary.has_errors());
        assert_eq!(summary.foreign_keys_checked, 1);
    }

    #[test]
    fn missing_referenced_table_is_an_error() {
        let mut schema = Schema::new();
        let book = schema.add_table("book", "c1");
        let t = schema.table_mut(book).unwrap();
        let mut fk = Field::new("author_id", "INT");
        fk.is_fk = true;
        t.fields.push(fk);
        t.add_foreign_key(ForeignKey::single("author_id", "author", "id"));

        let summary = validate(&schema);
        assert!(summary.has_errors());
        assert!(summary.issues.iter().any(|i| i.code == "FK_MISSING_TABLE"));
    }

    #[test]
    fn type_mismatch_is_an_error() {
        let mut schema = Schema::new();
        let author = schema.add_table("author", "c1");
        {
            let t = schema.table_mut(author).unwrap();
            t.fields.push(Field::new("id", "VARCHAR(36)"));
            t.primary_key.push("id".to_string());
        }
        let book = schema.add_table("book", "c2");
        {
            let t = schema.table_mut(book).unwrap();
            let mut fk = Field::new("author_id", "INT");
            fk.is_fk = true;
            t.fields.push(fk);
            t.add_foreign_key(ForeignKey::single("author_id", "author", "id"));
        }

        let summary = validate(&schema);
        assert!(summary.issues.iter().any(|i| i.code == "FK_TYPE_MISMATCH"));
    }

    #[test]
    fn missing_child_column_is_an_error() {
        let mut schema = Schema::new();
        schema.add_table("author", "c1");
        let book = schema.add_table("book", "c2");
        let t = schema.table_mut(book).unwrap();
        t.add_foreign_key(ForeignKey::single("author_id", "author", "id"));

        let summary = validate(&schema);
        assert!(summary
            .issues
            .iter()
            .any(|i| i.code == "FK_MISSING_CHILD_COLUMN"));
    }
}
