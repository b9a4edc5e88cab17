//! Configuration management commands.

use std::path::Path;

use anyhow::{Context, Result};
use polsat_config::{ConfigLoader, OutputFormat, Paths, PolsatConfig};
use polsat_document::GeneratorOptions;

use crate::style::{
    print_error, print_header, print_hint, print_labeled, print_spacer, print_success,
};

/// Show the merged configuration.
pub fn show(config: &PolsatConfig, format: &str) -> Result<()> {
    match format {
        "json" => {
            let json = serde_json::to_string_pretty(config)?;
            println!("{json}");
        }
        "toml" => {
            let toml_str = toml::to_string_pretty(config)?;
            println!("{toml_str}");
        }
        _ => {
            print_header("polsat configuration");
            print_spacer();

            print_header("Analysis:");
            print_labeled("Policy directory", &config.analysis.policy_dir.display().to_string());
            print_labeled("Summary file", &config.analysis.summary_file.display().to_string());
            print_labeled("File extension", &config.analysis.file_extension);
            print_labeled(
                "Enumeration limit",
                &config.analysis.enumeration_limit.to_string(),
            );
            print_spacer();

            print_header("Generator:");
            print_labeled("Output directory", &config.generator.output_dir.display().to_string());
            print_labeled("Start min", &config.generator.start_min.to_string());
            print_labeled("Start max", &config.generator.start_max.to_string());
            print_labeled("Start time", &config.generator.start_time);
            print_labeled(
                "Seed",
                &config
                    .generator
                    .seed
                    .map_or("random".to_string(), |s| s.to_string()),
            );
            print_spacer();

            print_header("Output:");
            let format = match config.output.format {
                OutputFormat::Text => "text",
                OutputFormat::Json => "json",
            };
            print_labeled("Format", format);
            print_labeled("Color", &config.output.color.to_string());
        }
    }

    Ok(())
}

/// Validate configuration files.
pub fn validate(project: &Path, file: Option<&Path>) -> Result<()> {
    let loaded = match file {
        Some(file) => {
            println!("Validating {}...", file.display());
            PolsatConfig::from_file(file).map_err(anyhow::Error::from)
        }
        None => {
            let loader = ConfigLoader::new().with_project_dir(project);
            println!("Validating configuration in {}...", project.display());
            for source in loader.sources() {
                print_labeled("Source", &source.display().to_string());
            }
            if !Paths::is_initialized(project) {
                print_hint("No polsat.toml in this project, built-in defaults apply");
            }
            loader.load()
        }
    };
    let result = loaded.and_then(|config| {
        config.validate()?;
        GeneratorOptions::from_parts(
            config.generator.start_min,
            config.generator.start_max,
            &config.generator.start_time,
        )?;
        Ok(())
    });

    match result {
        Ok(()) => {
            print_success("Configuration is valid");
            Ok(())
        }
        Err(e) => {
            print_error("Configuration validation failed:");
            eprintln!("  {e:#}");
            Err(e).context("Invalid configuration")
        }
    }
}
