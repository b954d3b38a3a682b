//! Biocanon CLI
//!
//! - `check`: load and validate a schema (and optional ontology)
//! - `labels`: reverse label table (label, scope, type)
//! - `ancestors`: ancestor chain of a type, alias or ontology class
//! - `resolve`: JSON-lines source records → JSON-lines canonical nodes/edges

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use parking_lot::Mutex;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

use biocanon_ontology::load_ontology_file;
use biocanon_resolve::{
    run_pipeline, Registry, ResolverConfig, RunReport, SkipReason, TracingDiagnostics,
};

mod jsonl;

use jsonl::{JsonLinesSink, RecordReader};

#[derive(Parser)]
#[command(name = "biocanon")]
#[command(
    author,
    version,
    about = "Biocanon: schema-driven canonical resolution of biomedical records"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct SchemaArgs {
    /// Schema configuration (.yaml, .yml or .json)
    #[arg(long, env = "BIOCANON_SCHEMA")]
    schema: PathBuf,
    /// External ontology hierarchy (.nt, .ttl, .owl/.rdf RDF/XML, or a .yaml/.json parent map)
    #[arg(long)]
    ontology: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate a schema; print a summary.
    Check {
        #[command(flatten)]
        schema: SchemaArgs,
        /// Print the summary as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Print the reverse label table (label → type, with scope).
    Labels {
        #[command(flatten)]
        schema: SchemaArgs,
        /// Print as a JSON array instead of tab-separated lines
        #[arg(long)]
        json: bool,
    },

    /// Print the ancestor chain of a type, nearest first.
    Ancestors {
        #[command(flatten)]
        schema: SchemaArgs,
        /// Type, alias, or ontology class name
        #[arg(value_name = "TYPE")]
        type_name: String,
    },

    /// Resolve JSON-lines source records into canonical nodes and edges.
    Resolve(ResolveArgs),
}

#[derive(Args, Debug)]
struct ResolveArgs {
    #[command(flatten)]
    schema: SchemaArgs,
    /// Resolver config (.yaml/.yml or .json)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Input records, one JSON object per line (`-` = stdin)
    #[arg(short, long, default_value = "-")]
    input: String,
    /// Output graph elements, one JSON object per line (`-` = stdout)
    #[arg(short, long, default_value = "-")]
    out: String,
    /// Write the run report as JSON
    #[arg(long)]
    report: Option<PathBuf>,
    /// Suppress repeated node/edge keys
    #[arg(long)]
    dedup: bool,
    /// Process records one at a time, in input order
    #[arg(long)]
    sequential: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { schema, json } => cmd_check(&schema, json),
        Commands::Labels { schema, json } => cmd_labels(&schema, json),
        Commands::Ancestors { schema, type_name } => cmd_ancestors(&schema, &type_name),
        Commands::Resolve(args) => cmd_resolve(&args),
    }
}

/// `BIOCANON_LOG`, then `RUST_LOG`, then `info`. Logs go to stderr so stdout
/// stays machine-readable.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("BIOCANON_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn load_registry(args: &SchemaArgs) -> Result<Registry> {
    let ontology = match &args.ontology {
        Some(path) => Some(
            load_ontology_file(path)
                .with_context(|| format!("failed to load ontology {}", path.display()))?,
        ),
        None => None,
    };
    Registry::from_file(&args.schema, ontology.as_ref())
        .with_context(|| format!("failed to load schema {}", args.schema.display()))
}

// ============================================================================
// check / labels / ancestors
// ============================================================================

#[derive(Debug, Serialize)]
struct CheckSummary {
    schema: String,
    fingerprint: String,
    types: usize,
    entities: usize,
    associations: usize,
    reified: usize,
    aliases: usize,
    labels: usize,
    hierarchy_nodes: usize,
}

fn cmd_check(args: &SchemaArgs, json: bool) -> Result<()> {
    let registry = load_registry(args)?;
    let associations = registry.types().filter(|t| t.is_association()).count();
    let summary = CheckSummary {
        schema: args.schema.display().to_string(),
        fingerprint: registry.fingerprint().to_string(),
        types: registry.len(),
        entities: registry.len() - associations,
        associations,
        reified: registry.types().filter(|t| t.is_reified()).count(),
        aliases: registry.types().map(|t| t.aliases.len()).sum(),
        labels: registry.label_entries().len(),
        hierarchy_nodes: registry.hierarchy().len(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("{} {}", "Valid schema".green().bold(), summary.schema);
    println!("  Fingerprint: {}", summary.fingerprint.cyan());
    println!(
        "  Types: {} ({} entities, {} associations, {} reified)",
        summary.types, summary.entities, summary.associations, summary.reified
    );
    println!("  Aliases: {}", summary.aliases);
    println!("  Labels: {}", summary.labels);
    println!("  Hierarchy nodes: {}", summary.hierarchy_nodes);
    Ok(())
}

fn cmd_labels(args: &SchemaArgs, json: bool) -> Result<()> {
    let registry = load_registry(args)?;
    let entries = registry.label_entries();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for entry in &entries {
        let scope = if entry.scope.is_empty() {
            "*".to_string()
        } else {
            entry.scope.join(",")
        };
        writeln!(out, "{}\t{}\t{}", entry.label, scope, entry.type_name)?;
    }
    Ok(())
}

fn cmd_ancestors(args: &SchemaArgs, type_name: &str) -> Result<()> {
    let registry = load_registry(args)?;
    let ancestors = registry
        .ancestors(type_name)
        .ok_or_else(|| anyhow!("unknown type or ontology class `{type_name}`"))?;

    if ancestors.is_empty() {
        eprintln!("{} `{}` has no ancestors", "info:".yellow().bold(), type_name);
    }
    for name in ancestors {
        println!("{name}");
    }
    Ok(())
}

// ============================================================================
// resolve
// ============================================================================

fn open_input(input: &str) -> Result<Box<dyn BufRead + Send>> {
    if input == "-" {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(input).with_context(|| format!("failed to open input {input}"))?;
    Ok(Box::new(BufReader::new(file)))
}

fn open_output(out: &str) -> Result<Box<dyn Write + Send>> {
    if out == "-" {
        return Ok(Box::new(BufWriter::new(io::stdout())));
    }
    let file = File::create(out).with_context(|| format!("failed to create output {out}"))?;
    Ok(Box::new(BufWriter::new(file)))
}

fn resolver_config(args: &ResolveArgs) -> Result<ResolverConfig> {
    let mut config = match &args.config {
        Some(path) => ResolverConfig::from_file(path)
            .with_context(|| format!("failed to load resolver config {}", path.display()))?,
        None => ResolverConfig::default(),
    };
    if args.dedup {
        config.dedup = true;
    }
    if args.sequential {
        config.parallel = false;
    }
    Ok(config)
}

fn cmd_resolve(args: &ResolveArgs) -> Result<()> {
    let registry = load_registry(&args.schema)?;
    let config = resolver_config(args)?;

    let malformed = AtomicU64::new(0);
    let read_failure = Mutex::new(None);
    let records = RecordReader::new(open_input(&args.input)?, &malformed, &read_failure);
    let sink = JsonLinesSink::new(open_output(&args.out)?);

    let mut report = run_pipeline(&registry, &config, records, &sink, &TracingDiagnostics)
        .context("failed to write graph output")?;
    report.malformed_input = malformed.load(Ordering::Relaxed);

    if let Some(err) = read_failure.lock().take() {
        bail!("failed to read input {}: {err}", args.input);
    }
    if let Some(path) = &args.report {
        write_report(path, &report)?;
    }
    print_summary(&report);
    Ok(())
}

fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json + "\n")
        .with_context(|| format!("failed to write report {}", path.display()))?;
    Ok(())
}

fn print_summary(report: &RunReport) {
    eprintln!(
        "{} {} records: {} accepted, {} partial, {} skipped",
        "Resolved".green().bold(),
        report.records,
        report.accepted,
        report.partial_property_loss,
        report.total_skipped()
    );
    eprintln!(
        "  Emitted: {} nodes, {} edges ({} duplicates suppressed)",
        report.nodes_emitted, report.edges_emitted, report.duplicates_suppressed
    );
    for reason in SkipReason::ALL {
        let count = report.skipped(reason);
        if count > 0 {
            eprintln!("  {}: {}", reason.outcome_name().yellow(), count);
        }
    }
    if report.malformed_input > 0 {
        eprintln!(
            "  {}: {}",
            "malformed-input".red(),
            report.malformed_input
        );
    }
}
