//! Dependency analysis over a resolved schema: cycle detection (which FKs must
//! be deferred to an `ALTER TABLE`), and topological ordering for DDL emission.

use super::{Schema, TableId};

/// A schema paired with its FK-derived parent/child adjacency, the way the
/// emitter and analyzer both need to walk it.
#[derive(Debug)]
pub struct SchemaGraph {
    pub schema: Schema,
}

/// Result of dependency analysis: a DDL-emission-ready table order plus the
/// set of (child, parent) FK pairs that must be broken out into `ALTER TABLE`.
#[derive(Debug)]
pub struct DependencyAnalysis {
    /// Tables in topological order: every table appears after all tables its
    /// non-deferred FKs reference.
    pub order: Vec<TableId>,
    /// (child, parent) table-id pairs whose FK(s) must be emitted as a
    /// post-CREATE `ALTER TABLE` to avoid a forward reference.
    pub deferred: Vec<(TableId, TableId)>,
}

impl SchemaGraph {
    pub fn from_schema(schema: Schema) -> Self {
        Self { schema }
    }

    pub fn len(&self) -> usize {
        self.schema.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schema.is_empty()
    }

    pub fn table_name(&self, id: TableId) -> Option<&str> {
        self.schema.table(id).map(|t| t.name.as_str())
    }

    /// Every (child, parent) table-id pair implied by a non-self FK, in a
    /// deterministic order (by child table id, then by the FK's child-field
    /// tuple) so that cycle-breaking is reproducible across runs.
    fn fk_pairs(&self) -> Vec<(TableId, TableId)> {
        let mut pairs = Vec::new();
        for child_id in self.schema.table_ids() {
            let child = self.schema.table(child_id).expect("valid id");
            for fk in child.sorted_foreign_keys() {
                if let Some(parent_id) = self.schema.get_table_id(&fk.referenced_table) {
                    if parent_id != child_id {
                        pairs.push((child_id, parent_id));
                    }
                }
            }
        }
        pairs
    }

    /// Build the acyclic dependency graph incrementally: for each `(child,
    /// parent)` FK pair (in deterministic order), accept the edge unless the
    /// parent can already reach the child through previously-accepted edges,
    /// in which case accepting it would close a cycle, so it is deferred
    /// instead. Self-references are excluded from `fk_pairs` entirely and are
    /// therefore never deferred.
    pub fn analyze(&self) -> DependencyAnalysis {
        let n = self.len();
        let mut accepted_parents: Vec<Vec<TableId>> = vec![Vec::new(); n];
        let mut deferred = Vec::new();

        for (child, parent) in self.fk_pairs() {
            if accepted_parents[child.0 as usize].contains(&parent) {
                continue; // already accepted this exact pair via another FK
            }
            if self.reaches(parent, child, &accepted_parents) {
                if !deferred.contains(&(child, parent)) {
                    deferred.push((child, parent));
                }
            } else {
                accepted_parents[child.0 as usize].push(parent);
            }
        }

        let order = topological_order(n, &accepted_parents);

        DependencyAnalysis { order, deferred }
    }

    /// Whether `target` is reachable from `start` by following accepted
    /// parent edges (`start`'s parents, their parents, and so on).
    fn reaches(&self, start: TableId, target: TableId, accepted_parents: &[Vec<TableId>]) -> bool {
        if start == target {
            return true;
        }
        let mut stack = vec![start];
        let mut visited = vec![false; self.len()];
        visited[start.0 as usize] = true;
        while let Some(current) = stack.pop() {
            for &parent in &accepted_parents[current.0 as usize] {
                if parent == target {
                    return true;
                }
                if !visited[parent.0 as usize] {
                    visited[parent.0 as usize] = true;
                    stack.push(parent);
                }
            }
        }
        false
    }
}

/// Tables-first depth-first walk over the acyclic `accepted_parents` graph:
/// every parent is visited (and appended) before the child that depends on
/// it. Temporary marks prevent re-entry; since `accepted_parents` is already
/// acyclic by construction this never actually trips, but the guard keeps the
/// walk well-defined even if it were fed a cyclic graph directly.
fn topological_order(n: usize, accepted_parents: &[Vec<TableId>]) -> Vec<TableId> {
    let mut visited = vec![false; n];
    let mut temp_mark = vec![false; n];
    let mut order = Vec::with_capacity(n);

    fn visit(
        id: TableId,
        accepted_parents: &[Vec<TableId>],
        visited: &mut [bool],
        temp_mark: &mut [bool],
        order: &mut Vec<TableId>,
    ) {
        let idx = id.0 as usize;
        if visited[idx] || temp_mark[idx] {
            return;
        }
        temp_mark[idx] = true;
        for &parent in &accepted_parents[idx] {
            visit(parent, accepted_parents, visited, temp_mark, order);
        }
        temp_mark[idx] = false;
        visited[idx] = true;
        order.push(id);
    }

    for i in 0..n {
        visit(
            TableId(i as u32),
            accepted_parents,
            &mut visited,
            &mut temp_mark,
            &mut order,
        );
    }

    order
}
