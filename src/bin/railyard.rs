//! RailYard CLI
//!
//! Validate, lint and generate from a schema document or a saved session file.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use railyard::editor::document_from_json;
use railyard::executor::list_apps;
use railyard::{lint, validate, RailyardConfig, RailyardError, SchemaDocument, ScriptBuilder, ScriptExecutor};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "railyard")]
#[command(about = "Validate schemas and scaffold Rails apps from them")]
struct Cli {
    /// Config file (defaults to railyard.toml lookup)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a schema document or session file
    Validate {
        file: PathBuf,
    },

    /// Report advisory warnings
    Lint {
        file: PathBuf,
        /// Print warnings as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the scaffolding script for a valid schema
    Script {
        file: PathBuf,
        /// Write the script here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate, build and execute; the app lands in the output directory
    Generate {
        file: PathBuf,
    },

    /// List generated apps
    Apps,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("railyard=warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// `Ok(false)` means the command ran but found problems
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let config = RailyardConfig::load_from(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Validate { file } => {
            let document = load_document(&file)?;
            let errors = validate(&document);
            if errors.is_empty() {
                println!("✅ {} is valid", file.display());
                return Ok(true);
            }
            println!("❌ {} error(s) in {}:", errors.len(), file.display());
            for error in &errors {
                println!("  - {}", error);
            }
            Ok(false)
        }

        Commands::Lint { file, json } => {
            let document = load_document(&file)?;
            let result = lint::lint(&document);
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if result.is_clean() {
                println!("✅ No warnings");
            } else {
                for warning in &result.warnings {
                    println!("⚠️  [{}] {} ({})", warning.code, warning.message, warning.path);
                }
            }
            Ok(true)
        }

        Commands::Script { file, output } => {
            let document = load_valid_document(&file)?;
            let script = ScriptBuilder::new(&document, config.generator.clone()).build();
            match output {
                Some(path) => {
                    std::fs::write(&path, format!("{}\n", script))
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("📝 Wrote {}", path.display());
                }
                None => println!("{}", script),
            }
            Ok(true)
        }

        Commands::Generate { file } => {
            let document = load_valid_document(&file)?;
            let script = ScriptBuilder::new(&document, config.generator.clone()).build();
            let executor = ScriptExecutor::new(&config.executor);

            println!("🔨 Generating {} in {}", document.app_name, executor.output_dir().display());
            let report = executor.execute(&script, &document.app_name).await;
            if !report.log.is_empty() {
                println!("{}", report.log);
            }

            match (report.success, report.path) {
                (true, Some(path)) => {
                    println!("✅ Generated {}", path.display());
                    Ok(true)
                }
                _ => {
                    println!("❌ {}", report.error.unwrap_or_else(|| "Execution failed".to_string()));
                    Ok(false)
                }
            }
        }

        Commands::Apps => {
            let apps = list_apps(&config.executor.output_path());
            if apps.is_empty() {
                println!("No apps in {}", config.executor.output_path().display());
            }
            for app in apps {
                println!("{}", app);
            }
            Ok(true)
        }
    }
}

/// Read a schema document, accepting saved session files too
fn load_document(path: &Path) -> anyhow::Result<SchemaDocument> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    document_from_json(&content).with_context(|| format!("parsing {}", path.display()))
}

fn load_valid_document(path: &Path) -> anyhow::Result<SchemaDocument> {
    let document = load_document(path)?;
    let errors = validate(&document);
    if !errors.is_empty() {
        for error in &errors {
            eprintln!("  - {}", error);
        }
        return Err(RailyardError::Validation(errors).into());
    }
    Ok(document)
}
