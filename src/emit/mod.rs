//! DDL emission: renders a resolved, validated [`Schema`] plus its
//! [`DependencyAnalysis`] into a single SQL text artifact.

use crate::schema::graph::DependencyAnalysis;
use crate::schema::{Schema, Table, TableId};
use std::fmt::Write as _;

/// Render the complete DDL script for `schema` given its dependency analysis.
pub fn emit(schema: &Schema, analysis: &DependencyAnalysis) -> String {
    let mut out = String::new();

    writeln!(out, "-- Database schema generated from draw.io diagram").unwrap();
    writeln!(out, "-- Generated automatically - review before executing").unwrap();
    writeln!(out).unwrap();

    writeln!(out, "-- Drop existing tables (in reverse dependency order)").unwrap();
    if !analysis.deferred.is_empty() {
        writeln!(
            out,
            "-- {} foreign key(s) deferred to break circular dependencies",
            analysis.deferred.len()
        )
        .unwrap();
    }
    for &id in analysis.order.iter().rev() {
        if let Some(table) = schema.table(id) {
            writeln!(out, "DROP TABLE IF EXISTS {} CASCADE;", table.name).unwrap();
        }
    }
    writeln!(out).unwrap();

    for &id in &analysis.order {
        if let Some(table) = schema.table(id) {
            write_create_table(&mut out, schema, table, analysis);
            writeln!(out).unwrap();
        }
    }

    if !analysis.deferred.is_empty() {
        writeln!(out, "-- Deferred foreign key constraints (circular dependencies)").unwrap();
        let mut deferred_sorted = analysis.deferred.clone();
        deferred_sorted.sort_by_key(|&(child, parent)| {
            (
                schema.table(child).map(|t| t.name.clone()).unwrap_or_default(),
                schema.table(parent).map(|t| t.name.clone()).unwrap_or_default(),
            )
        });
        for (child_id, parent_id) in deferred_sorted {
            write_deferred_alter(&mut out, schema, child_id, parent_id);
        }
        writeln!(out).unwrap();
    }

    writeln!(out, "-- Indexes for foreign key columns").unwrap();
    for &id in &analysis.order {
        if let Some(table) = schema.table(id) {
            for fk in table.sorted_foreign_keys() {
                let cols_underscore = fk.child_fields.join("_");
                let cols_comma = fk.child_fields.join(", ");
                writeln!(
                    out,
                    "CREATE INDEX idx_{}_{} ON {}({});",
                    table.name, cols_underscore, table.name, cols_comma
                )
                .unwrap();
            }
        }
    }

    out
}

fn is_deferred(analysis: &DependencyAnalysis, child: TableId, parent: TableId) -> bool {
    analysis.deferred.contains(&(child, parent))
}

fn write_create_table(out: &mut String, schema: &Schema, table: &Table, analysis: &DependencyAnalysis) {
    writeln!(out, "CREATE TABLE {} (", table.name).unwrap();

    let has_pk = !table.primary_key.is_empty();
    let fallback_pk = if !has_pk {
        table
            .fields
            .iter()
            .find(|f| !f.is_fk && f.has_constraint("NOT NULL"))
            .map(|f| f.name.clone())
    } else {
        None
    };

    let mut lines: Vec<String> = Vec::new();

    for field in &table.fields {
        let field_type = if field.type_text.trim().is_empty() {
            "VARCHAR(255)".to_string()
        } else {
            field.type_text.clone()
        };
        let mut constraints = field.constraints.clone();
        if has_pk {
            constraints = constraints.replace("PRIMARY KEY", "");
            constraints = constraints.split_whitespace().collect::<Vec<_>>().join(" ");
        }
        let mut line = format!("    {} {}", field.name, field_type);
        if !constraints.is_empty() {
            line.push(' ');
            line.push_str(&constraints);
        }
        lines.push(line);
    }

    if has_pk {
        lines.push(format!(
            "    PRIMARY KEY ({})",
            table.primary_key.join(", ")
        ));
    } else if let Some(ref pk_field) = fallback_pk {
        lines.push(format!("    PRIMARY KEY ({pk_field})"));
    }

    for field in &table.fields {
        if field.is_unique && !table.primary_key.contains(&field.name) {
            lines.push(format!("    UNIQUE ({})", field.name));
        }
    }

    for fk in table.sorted_foreign_keys() {
        let parent_id = schema.get_table_id(&fk.referenced_table);
        if parent_id.is_some_and(|p| is_deferred(analysis, table.id, p)) {
            continue;
        }
        let action = if fk.referenced_table == table.name {
            "SET NULL"
        } else {
            "CASCADE"
        };
        lines.push(format!(
            "    FOREIGN KEY ({}) REFERENCES {}({}) ON DELETE {}",
            fk.child_fields.join(", "),
            fk.referenced_table,
            fk.referenced_columns.join(", "),
            action
        ));
    }

    writeln!(out, "{}", lines.join(",\n")).unwrap();
    writeln!(out, ");").unwrap();
}

fn write_deferred_alter(out: &mut String, schema: &Schema, child_id: TableId, parent_id: TableId) {
    let (child, parent) = match (schema.table(child_id), schema.table(parent_id)) {
        (Some(c), Some(p)) => (c, p),
        _ => return,
    };
    for fk in child.sorted_foreign_keys() {
        if fk.referenced_table != parent.name {
            continue;
        }
        writeln!(
            out,
            "ALTER TABLE {} ADD CONSTRAINT fk_{}_{} FOREIGN KEY ({}) REFERENCES {}({}) ON DELETE RESTRICT;",
            child.name,
            child.name,
            parent.name,
            fk.child_fields.join(", "),
            parent.name,
            fk.referenced_columns.join(", "),
        )
        .unwrap();
    }
}
