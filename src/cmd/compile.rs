use crate::emit;
use crate::resolve;
use crate::schema::extract::extract_schema;
use crate::schema::graph::SchemaGraph;
use crate::validate;
use crate::xml;
use anyhow::{bail, Context};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write as _;
use std::path::PathBuf;
use std::time::Instant;

pub fn run(
    input: PathBuf,
    output: PathBuf,
    dry_run: bool,
    progress: bool,
    strict: bool,
    json: bool,
) -> anyhow::Result<()> {
    if !input.exists() {
        bail!("input file does not exist: {}", input.display());
    }

    if !json {
        eprintln!("Compiling diagram: {}", input.display());
    }

    let start_time = Instant::now();

    let pb = if progress && !json {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap()
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb.set_message("Reading diagram...");
        Some(pb)
    } else {
        None
    };

    let diagram = xml::read_diagram(&input).context("failed to read diagram")?;

    if let Some(ref pb) = pb {
        pb.set_message("Extracting tables...");
    }
    let mut schema = extract_schema(&diagram);

    if let Some(ref pb) = pb {
        pb.set_message("Resolving relationships...");
    }
    resolve::resolve_relationships(&diagram, &mut schema);

    if let Some(ref pb) = pb {
        pb.set_message("Validating schema...");
    }
    let validation = validate::validate(&schema);

    if let Some(ref pb) = pb {
        pb.finish_with_message("done");
    }

    let elapsed = start_time.elapsed();

    if json {
        println!("{}", serde_json::to_string_pretty(&validation)?);
    } else {
        for issue in &validation.issues {
            eprintln!("{issue}");
        }
        if !validation.issues.is_empty() {
            eprintln!();
        }
        eprintln!("Validation summary:");
        eprintln!("  Tables checked:       {}", validation.tables_checked);
        eprintln!("  Foreign keys checked: {}", validation.foreign_keys_checked);
        eprintln!("  Time: {elapsed:.3?}");
        eprintln!();
        if validation.has_errors() {
            eprintln!("Result: FAILED");
        } else {
            eprintln!("Result: PASSED");
        }
        eprintln!();
    }

    if validation.has_errors() {
        bail!("schema validation failed, see issues above");
    }

    let graph = SchemaGraph::from_schema(schema);
    let analysis = graph.analyze();

    if strict && !analysis.deferred.is_empty() {
        bail!(
            "{} foreign key(s) require deferred (circular) constraints; rejected in --strict mode",
            analysis.deferred.len()
        );
    }

    let ddl = emit::emit(&graph.schema, &analysis);

    if dry_run {
        if !json {
            eprintln!("Dry run: {} table(s), no output written", graph.len());
        }
        return Ok(());
    }

    let mut file = std::fs::File::create(&output)
        .with_context(|| format!("failed to create output file: {}", output.display()))?;
    file.write_all(ddl.as_bytes())?;

    if !json {
        eprintln!("Wrote DDL for {} table(s) to {}", graph.len(), output.display());
    }

    Ok(())
}
