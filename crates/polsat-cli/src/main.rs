//! polsat CLI.
//!
//! Finds conflicting ABAC policies and reports the ranges, time windows and
//! identities under which they can hold together.
//!
//! # Quick Start
//!
//! ```bash
//! # Write outputPolicy1.xml ... outputPolicy30.xml into ./policies
//! polsat generate --to 30 --seed 7
//!
//! # Analyze them, appending timings to summary.csv
//! polsat analyze policies
//! ```

mod commands;
mod style;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use polsat_config::{OutputFormat, PolsatConfig};

/// polsat - conflict detection and resolution for ABAC policies.
#[derive(Parser)]
#[command(name = "polsat")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory holding polsat.toml.
    #[arg(long, global = true, default_value = ".")]
    project: PathBuf,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version information.
    Version,

    /// Analyze a policy document or a directory of documents.
    Analyze {
        /// Document or directory (default: analysis.policy_dir).
        path: Option<PathBuf>,

        /// Summary log to append to (default: analysis.summary_file).
        #[arg(short, long)]
        summary: Option<PathBuf>,

        /// Do not append to the summary log.
        #[arg(long, conflicts_with = "summary")]
        no_summary: bool,

        /// Output format (text, json).
        #[arg(short, long, value_parser = ["text", "json"])]
        format: Option<String>,
    },

    /// Generate synthetic conflicted policy documents.
    Generate {
        /// Smallest policy count.
        #[arg(long, default_value = "1")]
        from: usize,

        /// Largest policy count.
        #[arg(long, default_value = "500")]
        to: usize,

        /// Output directory (default: generator.output_dir).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// RNG seed (default: generator.seed, else random).
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Configuration commands.
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the merged configuration.
    Show {
        /// Output format (text, json, toml).
        #[arg(short, long, default_value = "text", value_parser = ["text", "json", "toml"])]
        format: String,
    },

    /// Validate the configuration sources.
    Validate {
        /// Validate a single TOML file instead of the merged sources.
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Logs go to stderr so that JSON on stdout stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    style::set_no_color(cli.no_color);
    let project = cli.project;

    match cli.command {
        Commands::Version => {
            commands::version::run();
            Ok(())
        }
        Commands::Analyze {
            path,
            summary,
            no_summary,
            format,
        } => {
            let config = load_config(&project)?;
            let format = match format.as_deref() {
                Some("json") => OutputFormat::Json,
                Some(_) => OutputFormat::Text,
                None => config.output.format,
            };
            let summary = if no_summary {
                None
            } else {
                Some(summary.unwrap_or_else(|| config.analysis.summary_file.clone()))
            };
            let path = path.unwrap_or_else(|| config.analysis.policy_dir.clone());
            commands::analyze::run(&config, &path, summary.as_deref(), format)
        }
        Commands::Generate {
            from,
            to,
            output,
            seed,
        } => {
            let config = load_config(&project)?;
            let output = output.unwrap_or_else(|| config.generator.output_dir.clone());
            commands::generate::run(&config, from..=to, &output, seed.or(config.generator.seed))
        }
        Commands::Config(ConfigCommands::Show { format }) => {
            commands::config::show(&load_config(&project)?, &format)
        }
        Commands::Config(ConfigCommands::Validate { file }) => {
            commands::config::validate(&project, file.as_deref())
        }
    }
}

fn load_config(project: &Path) -> Result<PolsatConfig> {
    let config = PolsatConfig::load_from_dir(project)
        .with_context(|| format!("Failed to load configuration in {}", project.display()))?;
    if !config.output.color {
        style::set_no_color(true);
    }
    Ok(config)
}
