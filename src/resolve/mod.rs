//! Relationship resolution: turns diagram edges into FK columns or junction
//! tables against an already-extracted [`Schema`].

use crate::schema::{Field, ForeignKey, Schema, Table, TableId};
use crate::xml::{normalize_text, parse_style, Diagram};
use ahash::AHashSet;

/// One side of a cardinality pair: how many parent rows a child row may relate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Multiplicity {
    pub min: u8,
    pub max: Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Max {
    One,
    Many,
}

impl Multiplicity {
    const fn new(min: u8, max: Max) -> Self {
        Self { min, max }
    }

    const ZERO_OR_ONE: Multiplicity = Multiplicity::new(0, Max::One);
    const EXACTLY_ONE: Multiplicity = Multiplicity::new(1, Max::One);
    const ZERO_OR_MANY: Multiplicity = Multiplicity::new(0, Max::Many);
    const ONE_OR_MANY: Multiplicity = Multiplicity::new(1, Max::Many);
}

/// The four relationship shapes an edge can classify as, derived from a pair
/// of endpoint multiplicities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelationKind {
    OneToMany,
    ManyToOne,
    OneToOne,
    ManyToMany,
}

fn classify(source: Multiplicity, target: Multiplicity) -> RelationKind {
    match (source.max, target.max) {
        (Max::Many, Max::Many) => RelationKind::ManyToMany,
        (Max::One, Max::Many) => RelationKind::OneToMany,
        (Max::Many, Max::One) => RelationKind::ManyToOne,
        (Max::One, Max::One) => RelationKind::OneToOne,
    }
}

/// Parse an edge label's `1:N` / `N:1` / `1:1` / `N:N` family into a
/// (source, target) multiplicity pair, if the label expresses one unambiguously.
fn multiplicities_from_label(label: &str) -> Option<(Multiplicity, Multiplicity)> {
    let upper = label.to_uppercase();
    if upper.contains("1:N") {
        Some((Multiplicity::EXACTLY_ONE, Multiplicity::ZERO_OR_MANY))
    } else if upper.contains("N:1") {
        Some((Multiplicity::ZERO_OR_MANY, Multiplicity::EXACTLY_ONE))
    } else if upper.contains("1:1") {
        Some((Multiplicity::EXACTLY_ONE, Multiplicity::EXACTLY_ONE))
    } else if ["N:N", "M:M", "M:N", "N:M"].iter().any(|p| upper.contains(p)) {
        Some((Multiplicity::ZERO_OR_MANY, Multiplicity::ZERO_OR_MANY))
    } else {
        None
    }
}

/// Map a single `startArrow`/`endArrow` style token to a multiplicity.
fn multiplicity_from_arrow(token: &str) -> Option<Multiplicity> {
    match token {
        "ERone" | "ERmandOne" => Some(Multiplicity::EXACTLY_ONE),
        "ERzeroToOne" => Some(Multiplicity::ZERO_OR_ONE),
        "ERmany" | "ERoneToMany" => Some(Multiplicity::ONE_OR_MANY),
        "ERzeroToMany" => Some(Multiplicity::ZERO_OR_MANY),
        _ => None,
    }
}

/// Determine an edge's (source, target) multiplicities from its normalized
/// label first, falling back to its style's arrow tokens.
fn edge_multiplicities(label: &str, style: &str) -> Option<(Multiplicity, Multiplicity)> {
    if let Some(pair) = multiplicities_from_label(label) {
        return Some(pair);
    }
    let parsed = parse_style(style);
    let source = multiplicity_from_arrow(parsed.get("startArrow").copied().unwrap_or(""))?;
    let target = multiplicity_from_arrow(parsed.get("endArrow").copied().unwrap_or(""))?;
    Some((source, target))
}

/// Walk a cell's `parent` chain (via the diagram) until a table's own origin
/// cell id is reached, or the chain runs out / cycles.
fn resolve_endpoint(diagram: &Diagram, cell_id: &str, schema: &Schema) -> Option<TableId> {
    let mut current = cell_id.to_string();
    let mut visited = AHashSet::new();
    loop {
        if let Some(id) = schema.table_ids().find(|&id| {
            schema
                .table(id)
                .is_some_and(|t| t.cell_id == current)
        }) {
            return Some(id);
        }
        if !visited.insert(current.clone()) {
            return None;
        }
        let parent = diagram.cells.get(&current)?.parent.clone()?;
        current = parent;
    }
}

/// Resolve every edge in `diagram` against `schema`, mutating it in place with
/// synthesized FK columns and junction tables.
pub fn resolve_relationships(diagram: &Diagram, schema: &mut Schema) {
    let mut junctions_created: AHashSet<(String, String)> = AHashSet::new();

    for cell_id in diagram.edge_ids() {
        let edge = match diagram.cells.get(cell_id) {
            Some(e) => e,
            None => continue,
        };
        let (source_cell, target_cell) = match (&edge.source, &edge.target) {
            (Some(s), Some(t)) => (s.clone(), t.clone()),
            _ => continue,
        };

        let source_table = match resolve_endpoint(diagram, &source_cell, schema) {
            Some(id) => id,
            None => continue,
        };
        let target_table = match resolve_endpoint(diagram, &target_cell, schema) {
            Some(id) => id,
            None => continue,
        };
        if source_table == target_table {
            continue;
        }

        let label = normalize_text(&edge.value);
        let (source_mult, target_mult) = match edge_multiplicities(&label, &edge.style) {
            Some(pair) => pair,
            None => continue,
        };

        match classify(source_mult, target_mult) {
            RelationKind::ManyToMany => {
                resolve_many_to_many(schema, source_table, target_table, &mut junctions_created)
            }
            RelationKind::OneToMany => ensure_fk(schema, target_table, source_table),
            RelationKind::ManyToOne => ensure_fk(schema, source_table, target_table),
            RelationKind::OneToOne => {
                let (child, parent) = resolve_one_to_one(schema, source_table, target_table, source_mult, target_mult);
                ensure_fk(schema, child, parent);
            }
        }
    }
}

/// One-to-one tie-break: the side with min == 0 is the child; if both (or
/// neither) are optional, the lexicographically earlier table name is the parent.
fn resolve_one_to_one(
    schema: &Schema,
    source: TableId,
    target: TableId,
    source_mult: Multiplicity,
    target_mult: Multiplicity,
) -> (TableId, TableId) {
    match (source_mult.min == 0, target_mult.min == 0) {
        (true, false) => (source, target),
        (false, true) => (target, source),
        _ => {
            let source_name = schema.table(source).map(|t| t.name.as_str()).unwrap_or("");
            let target_name = schema.table(target).map(|t| t.name.as_str()).unwrap_or("");
            if source_name <= target_name {
                (target, source)
            } else {
                (source, target)
            }
        }
    }
}

fn pk_type(table: &Table) -> String {
    table
        .primary_key
        .first()
        .and_then(|name| table.get_field(name))
        .map(|f| f.type_text.clone())
        .unwrap_or_else(|| "INT".to_string())
}

fn pk_column(table: &Table) -> String {
    table
        .primary_key
        .first()
        .cloned()
        .unwrap_or_else(|| "id".to_string())
}

/// Synthesize (at most once per unordered pair) a junction table for a
/// many-to-many edge between `a` and `b`, named from their sorted names.
fn resolve_many_to_many(
    schema: &mut Schema,
    a: TableId,
    b: TableId,
    junctions_created: &mut AHashSet<(String, String)>,
) {
    let a_name = match schema.table(a) {
        Some(t) => t.name.clone(),
        None => return,
    };
    let b_name = match schema.table(b) {
        Some(t) => t.name.clone(),
        None => return,
    };

    let (sorted_first, sorted_second) = if a_name <= b_name {
        (a_name.clone(), b_name.clone())
    } else {
        (b_name.clone(), a_name.clone())
    };
    let key = (sorted_first.clone(), sorted_second.clone());
    if !junctions_created.insert(key) {
        return;
    }

    let junction_name = format!("{sorted_first}_{sorted_second}_rel");
    if schema.get_table_id(&junction_name).is_some() {
        return;
    }

    let a_table = schema.table(a).expect("checked above");
    let b_table = schema.table(b).expect("checked above");
    let a_fk_col = format!("{a_name}_id");
    let b_fk_col = format!("{b_name}_id");
    let a_type = pk_type(a_table);
    let b_type = pk_type(b_table);
    let a_pk_col = pk_column(a_table);
    let b_pk_col = pk_column(b_table);

    let junction_id = schema.add_table(junction_name, "");
    let junction = schema.table_mut(junction_id).expect("just inserted");

    let mut a_field = Field::new(a_fk_col.clone(), a_type);
    a_field.is_fk = true;
    a_field.add_constraint("NOT NULL");
    let mut b_field = Field::new(b_fk_col.clone(), b_type);
    b_field.is_fk = true;
    b_field.add_constraint("NOT NULL");

    // Columns are declared in sorted-table-name order (matching the junction's
    // own name), but the primary key stays in endpoint order.
    if a_name <= b_name {
        junction.fields.push(a_field);
        junction.fields.push(b_field);
    } else {
        junction.fields.push(b_field);
        junction.fields.push(a_field);
    }
    junction.primary_key = vec![a_fk_col.clone(), b_fk_col.clone()];
    junction.add_foreign_key(ForeignKey::single(a_fk_col, a_name, a_pk_col));
    junction.add_foreign_key(ForeignKey::single(b_fk_col, b_name, b_pk_col));
}

/// The five-step FK-injection algorithm: find or create the field(s) on
/// `child` that reference `parent`'s primary key, recording a ForeignKey.
pub fn ensure_fk(schema: &mut Schema, child: TableId, parent: TableId) {
    let parent_name = match schema.table(parent) {
        Some(t) => t.name.clone(),
        None => return,
    };
    let parent_pk: Vec<String> = match schema.table(parent) {
        Some(t) if !t.primary_key.is_empty() => t.primary_key.clone(),
        Some(_) => vec!["id".to_string()],
        None => return,
    };

    {
        let child_table = match schema.table(child) {
            Some(t) => t,
            None => return,
        };
        // Step 1: already has this exact FK.
        if child_table.has_foreign_key_to(&parent_name, &parent_pk) {
            return;
        }
    }

    // Step 2: composite attempt, every parent PK column is already present
    // on the child as an FK-flagged field.
    if parent_pk.len() >= 2 {
        let all_present = {
            let child_table = schema.table(child).expect("checked above");
            parent_pk
                .iter()
                .all(|col| child_table.get_field(col).is_some_and(|f| f.is_fk))
        };
        if all_present {
            let child_table = schema.table_mut(child).expect("checked above");
            for col in &parent_pk {
                let field = child_table.get_field_mut(col).expect("checked above");
                field.add_constraint("NOT NULL");
            }
            child_table.add_foreign_key(ForeignKey {
                child_fields: parent_pk.clone(),
                referenced_table: parent_name,
                referenced_columns: parent_pk,
            });
            return;
        }
    }

    let parent_pk_first = parent_pk[0].clone();
    let parent_lower = parent_name.to_lowercase();
    let parent_pk_lower = parent_pk_first.to_lowercase();

    // Step 3: reuse scan, an unbound FK-flagged field whose name contains the
    // parent table name or its first PK column name.
    let reuse_field = {
        let child_table = schema.table(child).expect("checked above");
        let bound = child_table.fk_bound_fields();
        child_table
            .fields
            .iter()
            .find(|f| {
                f.is_fk
                    && !bound.contains(f.name.as_str())
                    && {
                        let lower = f.name.to_lowercase();
                        lower.contains(&parent_lower) || lower.contains(&parent_pk_lower)
                    }
            })
            .map(|f| f.name.clone())
    };

    // Step 4: named match, exact P, P_id, P_code, or <x>_id/<x>_code == P.
    let named_field = reuse_field.or_else(|| {
        let child_table = schema.table(child).expect("checked above");
        let candidates = [
            parent_name.clone(),
            format!("{parent_name}_id"),
            format!("{parent_name}_code"),
        ];
        if let Some(hit) = child_table
            .fields
            .iter()
            .find(|f| candidates.iter().any(|c| c == &f.name))
        {
            return Some(hit.name.clone());
        }
        child_table
            .fields
            .iter()
            .find(|f| {
                let stripped = f
                    .name
                    .strip_suffix("_id")
                    .or_else(|| f.name.strip_suffix("_code"));
                stripped.is_some_and(|s| s == parent_name)
            })
            .map(|f| f.name.clone())
    });

    match named_field {
        Some(field_name) => {
            let child_table = schema.table_mut(child).expect("checked above");
            let field = child_table.get_field_mut(&field_name).expect("just found");
            field.is_fk = true;
            field.add_constraint("NOT NULL");
            child_table.add_foreign_key(ForeignKey::single(
                field_name,
                parent_name,
                parent_pk_first,
            ));
        }
        None => {
            // Step 5: synthesize a new field.
            let parent_type = {
                let parent_table = schema.table(parent).expect("checked above");
                pk_type(parent_table)
            };
            let field_name = format!("{parent_name}_id");
            let child_table = schema.table_mut(child).expect("checked above");
            let mut field = Field::new(field_name.clone(), parent_type);
            field.is_fk = true;
            field.add_constraint("NOT NULL");
            child_table.fields.push(field);
            child_table.add_foreign_key(ForeignKey::single(
                field_name,
                parent_name,
                parent_pk_first,
            ));
        }
    }
}
