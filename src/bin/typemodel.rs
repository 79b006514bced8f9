//! Type Model CLI
//!
//! Loads an OpenAPI JSON document, applies optional operation filters, builds
//! the type model and prints it as JSON or as a short summary.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use oapi_typemodel::config::{OutputFormat, TypeModelConfig};
use oapi_typemodel::graph::load_from_path;
use oapi_typemodel::{TypeKind, TypeModel};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "typemodel")]
#[command(about = "Build a named, validated type model from an OpenAPI document")]
struct Cli {
    /// OpenAPI document (JSON)
    input: PathBuf,

    /// Config file (defaults: typemodel.toml, .typemodel.toml, config/typemodel.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Keep only operations with this tag (repeatable)
    #[arg(short, long = "tag")]
    tags: Vec<String>,

    /// Keep only operations with this operationId (repeatable)
    #[arg(long = "operation-id")]
    operation_ids: Vec<String>,

    /// Keep unreachable components
    #[arg(long)]
    no_prune: bool,

    /// Treat allOf property overrides as errors
    #[arg(long)]
    strict: bool,

    /// What to print
    #[arg(short, long, value_enum, default_value = "json")]
    format: Format,

    /// Write to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Summary,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = TypeModelConfig::load_from(cli.config.as_deref()).context("Failed to load configuration")?;
    if !cli.tags.is_empty() {
        config.filter.tags = cli.tags;
    }
    if !cli.operation_ids.is_empty() {
        config.filter.operation_ids = cli.operation_ids;
    }
    if cli.no_prune {
        config.pruning.enabled = false;
    }
    if cli.strict {
        config.composition.strict_property_collisions = true;
    }

    let document = load_from_path(&cli.input)?;
    let model = TypeModel::build(document, &config)
        .with_context(|| format!("Failed to build type model for {}", cli.input.display()))?;

    let rendered = match cli.format {
        Format::Json => match config.output.format {
            OutputFormat::Pretty => serde_json::to_string_pretty(&model)?,
            OutputFormat::Compact => serde_json::to_string(&model)?,
        },
        Format::Summary => summary(&model),
    };

    match cli.output {
        Some(path) => {
            fs::write(&path, rendered).with_context(|| format!("Failed to write {}", path.display()))?;
            println!("✓ Wrote {} types to {}", model.type_count(), path.display());
        }
        None => println!("{}", rendered),
    }

    Ok(())
}

fn summary(model: &TypeModel) -> String {
    let mut out = String::new();
    out.push_str(&format!("Types:       {}\n", model.type_count()));
    out.push_str(&format!(
        "Validated:   {}\n",
        model.types.iter().filter(|t| t.needs_validation).count()
    ));
    if let Some(prune) = &model.prune {
        out.push_str(&format!(
            "Pruned:      {} components in {} passes\n",
            prune.total_deleted(),
            prune.pass_count()
        ));
    }
    out.push_str(&format!("Fingerprint: {}\n\n", model.fingerprint()));

    for t in &model.types {
        let kind = match &t.kind {
            TypeKind::Struct { fields, .. } => format!("struct ({} fields)", fields.len()),
            TypeKind::Enum { values, .. } => format!("enum ({} values)", values.len()),
            TypeKind::Union { variants, .. } => format!("union ({} variants)", variants.len()),
            TypeKind::Newtype { .. } => "newtype".to_string(),
            TypeKind::Alias { target } => format!("alias of {}", target),
        };
        let check = if t.needs_validation { " [validated]" } else { "" };
        out.push_str(&format!("  {:<32} {}{}\n", t.name, kind, check));
    }

    if !model.diagnostics.is_empty() {
        out.push('\n');
        out.push_str(&model.diagnostics.format_all());
    }
    out
}
