//! Care-plan catalog CLI
//!
//! Lists, resolves, validates against and exports the care-plan entity catalog.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use careplan_schemas::config::OutputFormat;
use careplan_schemas::{
    catalog, CatalogConfig, CatalogManifest, InheritanceGraph, RecordViolation, SchemaError, SchemaRegistry,
};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "careplan-schemas")]
#[command(about = "Inspect and validate against the care-plan entity catalog")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every entity
    List,

    /// Show the merged descriptor of an entity
    Resolve {
        entity: String,
    },

    /// Validate a JSON record (or array of records) against an entity
    Validate {
        entity: String,
        /// JSON file, or "-" for stdin
        #[arg(default_value = "-")]
        input: String,
        /// Report fields the entity does not declare
        #[arg(long)]
        strict: bool,
        /// Fill declared defaults before validating
        #[arg(long)]
        defaults: bool,
    },

    /// Export all descriptors as JSON
    Export {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Compact JSON
        #[arg(long)]
        compact: bool,
        /// Bare descriptors, without manifest and checksums
        #[arg(long)]
        bare: bool,
    },

    /// Export the entity graph in DOT format
    Graph {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fuzzy search entity names
    Search {
        query: String,
        #[arg(short, long, default_value_t = 5)]
        limit: usize,
    },
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
    let config = CatalogConfig::load_from(cli.config.as_deref()).context("loading configuration")?;
    let registry = catalog::shared()?;

    match cli.command {
        Commands::List => {
            for def in registry.definitions() {
                match &def.extends {
                    Some(parent) => println!("{} : {}", def.name, parent),
                    None => println!("{}", def.name),
                }
            }
            Ok(())
        }

        Commands::Resolve { entity } => {
            let descriptor = registry
                .resolve_entity(&entity)
                .map_err(|e| with_suggestions(registry, e))?;
            println!("{}", config.export.output_format.to_json(&descriptor.to_export())?);
            Ok(())
        }

        Commands::Validate { entity, input, strict, defaults } => {
            let mut options = config.validation.options();
            options.reject_unknown_fields |= strict;
            let apply_defaults = defaults || config.validation.apply_defaults;

            let mut document = read_json(&input)?;
            if apply_defaults {
                let records: Vec<&mut Value> = match &mut document {
                    Value::Array(items) => items.iter_mut().collect(),
                    single => vec![single],
                };
                for record in records {
                    registry
                        .apply_defaults(&entity, record)
                        .map_err(|e| with_suggestions(registry, e))?;
                }
            }

            let violations = match &document {
                Value::Array(items) => registry.validate_collection(&entity, items, &options),
                single => registry.validate_record_with(&entity, single, &options).map(|found| {
                    found
                        .into_iter()
                        .map(|violation| RecordViolation { record: 0, violation })
                        .collect()
                }),
            }
            .map_err(|e| with_suggestions(registry, e))?;

            if violations.is_empty() {
                println!("✅ valid {}", entity);
                return Ok(());
            }
            for violation in &violations {
                println!("❌ {}", violation);
            }
            bail!("{} violation(s) against {}", violations.len(), entity)
        }

        Commands::Export { output, compact, bare } => {
            let format = if compact { OutputFormat::Compact } else { config.export.output_format };
            let descriptors = registry.resolve_all()?;

            let content = if bare || !config.export.include_checksums {
                let entities: Vec<_> = descriptors.iter().map(|d| d.to_export()).collect();
                format.to_json(&entities)?
            } else {
                let manifest = CatalogManifest::new(catalog::CATALOG_VERSION, &descriptors)?;
                format.to_json(&manifest)?
            };

            match output.or(config.export.output) {
                Some(path) => {
                    std::fs::write(&path, content).with_context(|| format!("writing {:?}", path))?;
                    info!(entities = descriptors.len(), path = ?path, "exported descriptors");
                    println!("✅ Exported {} entities to {:?}", descriptors.len(), path);
                }
                None => println!("{}", content),
            }
            Ok(())
        }

        Commands::Graph { output } => {
            let dot = InheritanceGraph::build(registry).to_dot();
            match output {
                Some(path) => {
                    std::fs::write(&path, dot).with_context(|| format!("writing {:?}", path))?;
                    println!("✅ Exported DOT to: {:?}", path);
                }
                None => print!("{}", dot),
            }
            Ok(())
        }

        Commands::Search { query, limit } => {
            for hit in registry.search(&query, limit) {
                println!("{:>4}  {}", hit.score, hit.name);
            }
            Ok(())
        }
    }
}

fn read_json(input: &str) -> anyhow::Result<Value> {
    let content = if input == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(input).with_context(|| format!("reading {}", input))?
    };
    Ok(serde_json::from_str(&content)?)
}

/// Add "did you mean" hints to unknown-entity errors
fn with_suggestions(registry: &SchemaRegistry, err: SchemaError) -> anyhow::Error {
    if let SchemaError::UnknownEntity { entity, .. } = &err {
        let hints: Vec<String> = registry.search(entity, 3).into_iter().map(|h| h.name).collect();
        if !hints.is_empty() {
            return anyhow!("{} (did you mean: {}?)", err, hints.join(", "));
        }
    }
    anyhow::Error::new(err)
}
