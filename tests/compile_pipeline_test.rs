//! End-to-end tests driving the full diagram-to-DDL pipeline through the
//! public API, the way `cmd::compile::run` wires it together.

use erd2sql::resolve::resolve_relationships;
use erd2sql::schema::extract::extract_schema;
use erd2sql::schema::SchemaGraph;
use erd2sql::validate::validate;
use erd2sql::xml::parse_diagram;

fn compile(xml: &str) -> String {
    let diagram = parse_diagram(xml).expect("valid diagram xml");
    let mut schema = extract_schema(&diagram);
    resolve_relationships(&diagram, &mut schema);

    let summary = validate(&schema);
    assert!(
        !summary.has_errors(),
        "expected a clean schema, got issues: {:?}",
        summary.issues
    );

    let graph = SchemaGraph::from_schema(schema);
    let analysis = graph.analyze();
    erd2sql::emit::emit(&graph.schema, &analysis)
}

fn table(id: &str, name: &str, rows: &str) -> String {
    format!(
        r#"<mxCell id="{id}" value="{name}" style="shape=table" vertex="1" parent="1" />
           {rows}"#
    )
}

fn row(id: &str, parent: &str, marker: &str, col: &str, ty: &str) -> String {
    format!(
        r#"<mxCell id="{id}" parent="{parent}" style="shape=tableRow" />
           <mxCell id="{id}m" parent="{id}" value="{marker}" />
           <mxCell id="{id}c" parent="{id}" value="{col}" />
           <mxCell id="{id}t" parent="{id}" value="{ty}" />"#
    )
}

fn wrap(body: &str) -> String {
    format!(
        r#"<mxGraphModel><root>
            <mxCell id="0" />
            <mxCell id="1" parent="0" />
            {body}
        </root></mxGraphModel>"#
    )
}

#[test]
fn minimal_one_to_many_produces_valid_fk_and_index() {
    let body = format!(
        "{}{}{}",
        table("author", "author", &row("r1", "author", "PK", "id", "INT")),
        table("book", "book", &row("r2", "book", "PK", "id", "INT")),
        r#"<mxCell id="e1" edge="1" source="author" target="book" value="1:N" parent="1" />"#
    );

    let ddl = compile(&wrap(&body));

    assert!(ddl.contains("CREATE TABLE author"));
    assert!(ddl.contains("CREATE TABLE book"));
    assert!(ddl.contains("FOREIGN KEY (author_id) REFERENCES author(id)"));
    assert!(ddl.contains("CREATE INDEX idx_book_author_id ON book(author_id);"));

    let drop_author = ddl.find("DROP TABLE IF EXISTS author").unwrap();
    let drop_book = ddl.find("DROP TABLE IF EXISTS book").unwrap();
    assert!(drop_book < drop_author, "children drop before their parents");

    let create_author = ddl.find("CREATE TABLE author").unwrap();
    let create_book = ddl.find("CREATE TABLE book").unwrap();
    assert!(create_author < create_book, "parents create before their children");
}

#[test]
fn many_to_many_arrows_synthesize_exactly_one_junction_table() {
    let body = format!(
        "{}{}{}",
        table("student", "student", &row("r1", "student", "PK", "id", "INT")),
        table("course", "course", &row("r2", "course", "PK", "id", "INT")),
        r#"<mxCell id="e1" edge="1" source="student" target="course"
             style="startArrow=ERmany;endArrow=ERmany;" parent="1" />"#
    );

    let ddl = compile(&wrap(&body));

    let junction_count = ddl.matches("CREATE TABLE course_student_rel").count();
    assert_eq!(junction_count, 1, "exactly one junction table regardless of edge direction");
    assert!(ddl.contains("FOREIGN KEY (student_id) REFERENCES student(id)"));
    assert!(ddl.contains("FOREIGN KEY (course_id) REFERENCES course(id)"));

    // Columns declared in sorted table-name order, PK stays in endpoint (source-first) order.
    let create_start = ddl.find("CREATE TABLE course_student_rel").unwrap();
    let create_block = &ddl[create_start..];
    let course_col = create_block.find("course_id").unwrap();
    let student_col = create_block.find("student_id").unwrap();
    assert!(course_col < student_col, "course_id column declared before student_id");
    assert!(create_block.contains("PRIMARY KEY (student_id, course_id)"));
}

#[test]
fn explicit_fk_annotation_is_respected_over_synthesis() {
    let body = format!(
        "{}{}{}",
        table(
            "department",
            "department",
            &row("r1", "department", "PK", "id", "INT")
        ),
        table(
            "employee",
            "employee",
            &format!(
                "{}{}",
                row("r2", "employee", "PK", "id", "INT"),
                row("r3", "employee", "FK", "dept_ref", "INT fk department(id)")
            )
        ),
        ""
    );

    let ddl = compile(&wrap(&body));

    assert!(ddl.contains("FOREIGN KEY (dept_ref) REFERENCES department(id)"));
}

#[test]
fn self_reference_defers_nothing_and_uses_set_null() {
    let body = table(
        "employee",
        "employee",
        &format!(
            "{}{}",
            row("r1", "employee", "PK", "id", "INT"),
            row("r2", "employee", "FK", "manager_id", "INT fk employee(id)")
        ),
    );

    let ddl = compile(&wrap(&body));

    assert!(ddl.contains("FOREIGN KEY (manager_id) REFERENCES employee(id) ON DELETE SET NULL"));
    assert!(!ddl.contains("ALTER TABLE"), "a self-reference never requires deferral");
}

#[test]
fn circular_two_table_reference_defers_exactly_one_fk_via_alter_table() {
    let body = format!(
        "{}{}",
        table(
            "a",
            "a",
            &format!(
                "{}{}",
                row("r1", "a", "PK", "id", "INT"),
                row("r2", "a", "FK", "b_ref", "INT fk b(id)")
            )
        ),
        table(
            "b",
            "b",
            &format!(
                "{}{}",
                row("r3", "b", "PK", "id", "INT"),
                row("r4", "b", "FK", "a_ref", "INT fk a(id)")
            )
        ),
    );

    let ddl = compile(&wrap(&body));

    assert!(ddl.contains("ALTER TABLE"));
    assert!(ddl.contains("ON DELETE RESTRICT"));
    // Exactly one of the two FKs is pulled out of its CREATE TABLE into the deferred block.
    assert_eq!(ddl.matches("ALTER TABLE").count(), 1);
}

#[test]
fn bold_column_becomes_unique_constraint() {
    let body = table(
        "author",
        "author",
        &format!(
            "{}{}",
            row("r1", "author", "PK", "id", "INT"),
            row("r2", "author", "", "<b>email</b>", "VARCHAR(255)")
        ),
    );

    let ddl = compile(&wrap(&body));

    assert!(ddl.contains("UNIQUE (email)"));
}

#[test]
fn recompiling_the_same_diagram_is_byte_identical() {
    let body = format!(
        "{}{}{}",
        table("author", "author", &row("r1", "author", "PK", "id", "INT")),
        table("book", "book", &row("r2", "book", "PK", "id", "INT")),
        r#"<mxCell id="e1" edge="1" source="author" target="book" value="1:N" parent="1" />"#
    );
    let xml = wrap(&body);

    assert_eq!(compile(&xml), compile(&xml));
}
