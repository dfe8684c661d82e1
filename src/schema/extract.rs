//! Table extraction: turns a flattened diagram into table/field/PK/FK data.

use super::{Field, ForeignKey, Schema};
use crate::xml::{is_bold_style, is_bold_value, normalize_text, CellData, Diagram};
use once_cell::sync::Lazy;
use regex::Regex;

/// `<name> : <type> <constraints>` grammar used to split a concatenated column/type cell pair.
static FIELD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<name>\w+)\s*:\s*(?P<type>[\w()]+)\s*(?P<constraints>.*)$").unwrap());

/// `fk <table>(<column>)` constraint grammar used to resolve an explicit FK annotation.
static FK_CONSTRAINT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)fk\s+(\w+)\s*\(\s*(\w+)\s*\)").unwrap());

/// A cell is a table iff it's a vertex whose style marks it as a table shape.
pub fn is_table_cell(style: &str, vertex: bool) -> bool {
    if !vertex {
        return false;
    }
    if style.contains("shape=table") {
        return true;
    }
    style.contains("rounded=0") && style.contains("whiteSpace=wrap")
}

/// A row is a direct child of a table cell whose style marks it as a table row.
pub fn is_row_cell(style: &str) -> bool {
    style.contains("shape=tableRow")
}

/// Extract the full table/field/PK/FK schema from a flattened diagram.
///
/// Iterates cells in document order so that table insertion order, and
/// column order within each table, is deterministic and reproducible.
pub fn extract_schema(diagram: &Diagram) -> Schema {
    let mut schema = Schema::new();

    for cell_id in &diagram.order {
        let cell = match diagram.cells.get(cell_id) {
            Some(c) => c,
            None => continue,
        };
        if !is_table_cell(&cell.style, cell.vertex) {
            continue;
        }
        let table_name = normalize_text(&cell.value);
        if table_name.is_empty() {
            continue;
        }
        let table_id = schema.add_table(table_name, cell_id.clone());

        for row_id in &cell.children {
            let row = match diagram.cells.get(row_id) {
                Some(r) => r,
                None => continue,
            };
            if !is_row_cell(&row.style) {
                continue;
            }
            let row_cells: Vec<&CellData> = row
                .children
                .iter()
                .filter_map(|id| diagram.cells.get(id))
                .collect();
            if row_cells.len() < 2 {
                continue;
            }

            let marker = normalize_text(&row_cells[0].value);
            let column_raw = &row_cells[1].value;
            let column_text = normalize_text(column_raw);
            let type_text = row_cells
                .get(2)
                .map(|c| normalize_text(&c.value))
                .unwrap_or_default();

            if column_text.is_empty() {
                continue;
            }

            let bold = is_bold_value(column_raw) || is_bold_style(&row_cells[1].style);

            let table = schema.table_mut(table_id).expect("just inserted");
            process_row(table, &marker, &column_text, &type_text, bold);
        }
    }

    schema
}

/// Parse one table row's (marker, column, type) triple into a Field, annotate
/// it onto `table`, and update the table's PK list / explicit FKs as needed.
fn process_row(
    table: &mut super::Table,
    marker: &str,
    column_text: &str,
    type_text: &str,
    bold: bool,
) {
    let combined = format!("{column_text} : {type_text}");
    let mut field = match FIELD_RE.captures(&combined) {
        Some(caps) => Field::new(
            caps.name("name").unwrap().as_str(),
            caps.name("type").unwrap().as_str(),
        )
        .with_constraints(caps.name("constraints").unwrap().as_str().trim()),
        None => Field::new(column_text, type_text),
    };

    if marker.contains("PK") {
        if !table.primary_key.contains(&field.name) {
            table.primary_key.push(field.name.clone());
        }
        field.add_constraint("PRIMARY KEY");
    }

    if marker.contains("FK") {
        field.is_fk = true;
        if let Some(caps) = FK_CONSTRAINT_RE.captures(&field.constraints) {
            let ref_table = caps.get(1).unwrap().as_str().to_string();
            let ref_column = caps.get(2).unwrap().as_str().to_string();
            table.add_foreign_key(ForeignKey::single(field.name.clone(), ref_table, ref_column));
        }
    }

    if bold {
        field.is_unique = true;
        field.add_constraint("UNIQUE");
    }

    table.fields.push(field);
}

impl Field {
    fn with_constraints(mut self, constraints: &str) -> Self {
        self.constraints = constraints.to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_diagram;

    fn table_row_xml(marker: &str, col: &str, ty: &str) -> String {
        format!(
            r#"<mxCell id="row" parent="t" style="shape=tableRow" />
               <mxCell id="c0" parent="row" value="{marker}" />
               <mxCell id="c1" parent="row" value="{col}" />
               <mxCell id="c2" parent="row" value="{ty}" />"#
        )
    }

    fn diagram_with_row(marker: &str, col: &str, ty: &str) -> Diagram {
        let xml = format!(
            r#"<root>
                <mxCell id="t" value="author" style="shape=table" vertex="1" parent="0" />
                {}
            </root>"#,
            table_row_xml(marker, col, ty)
        );
        parse_diagram(&xml).unwrap()
    }

    #[test]
    fn extracts_a_simple_pk_field() {
        let diagram = diagram_with_row("PK", "id", "INT");
        let schema = extract_schema(&diagram);
        let table = schema.get_table("author").unwrap();
        assert_eq!(table.primary_key, vec!["id".to_string()]);
        let field = table.get_field("id").unwrap();
        assert!(field.has_constraint("PRIMARY KEY"));
        assert_eq!(field.type_text, "INT");
    }

    #[test]
    fn extracts_explicit_fk_annotation() {
        let diagram = diagram_with_row("FK", "dept_ref", "INT fk department(id)");
        let schema = extract_schema(&diagram);
        let table = schema.get_table("author").unwrap();
        let field = table.get_field("dept_ref").unwrap();
        assert!(field.is_fk);
        assert!(table.has_foreign_key_to("department", &["id".to_string()]));
    }

    #[test]
    fn bold_column_is_unique() {
        let diagram = diagram_with_row("", "<b>email</b>", "VARCHAR(255)");
        let schema = extract_schema(&diagram);
        let table = schema.get_table("author").unwrap();
        let field = table.get_field("email").unwrap();
        assert!(field.is_unique);
        assert!(field.has_constraint("UNIQUE"));
    }

    #[test]
    fn row_with_empty_column_is_ignored() {
        let diagram = diagram_with_row("", "", "INT");
        let schema = extract_schema(&diagram);
        let table = schema.get_table("author").unwrap();
        assert!(table.fields.is_empty());
    }

    #[test]
    fn table_without_a_name_is_skipped() {
        let xml = r#"<root><mxCell id="t" value="" style="shape=table" vertex="1" parent="0" /></root>"#;
        let diagram = parse_diagram(xml).unwrap();
        let schema = extract_schema(&diagram);
        assert!(schema.is_empty());
    }

    #[test]
    fn fallback_when_field_grammar_does_not_match() {
        let diagram = diagram_with_row("", "weird name!!", "");
        let schema = extract_schema(&diagram);
        let table = schema.get_table("author").unwrap();
        assert_eq!(table.fields[0].name, "weird name!!");
    }
}
