//! Configuration management for polsat
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. CLI arguments (highest precedence)
//! 2. Environment variables (POLSAT_* prefix, `__` between section and key)
//! 3. polsat.local.toml (gitignored, local overrides)
//! 4. polsat.toml (git-tracked, project config)
//! 5. ~/.config/polsat/config.toml (user defaults)
//! 6. Built-in defaults (lowest precedence)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Main polsat configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolsatConfig {
    pub analysis: AnalysisConfig,
    pub generator: GeneratorConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Directory analyzed when no path is given.
    pub policy_dir: PathBuf,
    /// Summary log, one `elapsed,count` line per conflicted document.
    pub summary_file: PathBuf,
    pub file_extension: String,
    /// Most values enumerated per user or group selector.
    pub enumeration_limit: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            policy_dir: PathBuf::from("policies"),
            summary_file: PathBuf::from("summary.csv"),
            file_extension: "xml".to_string(),
            enumeration_limit: 65_536,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub output_dir: PathBuf,
    pub start_min: i64,
    pub start_max: i64,
    /// `YYYY-MM-DDTHH:MM:SS`, UTC.
    pub start_time: String,
    /// Fixed RNG seed. Random when unset.
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("policies"),
            start_min: -200,
            start_max: 200,
            start_time: "2006-07-16T23:30:30".to_string(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub color: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            color: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    Text,
    Json,
}

impl PolsatConfig {
    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Parse a single TOML file on top of the built-in defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.analysis.enumeration_limit == 0 {
            return Err(ConfigError::ValidationError(
                "analysis.enumeration_limit must be at least 1".to_string(),
            ));
        }
        if self.analysis.file_extension.trim_start_matches('.').is_empty() {
            return Err(ConfigError::ValidationError(
                "analysis.file_extension must not be empty".to_string(),
            ));
        }
        if self.generator.start_min >= self.generator.start_max {
            return Err(ConfigError::ValidationError(format!(
                "generator.start_min ({}) must be below generator.start_max ({})",
                self.generator.start_min, self.generator.start_max
            )));
        }
        Ok(())
    }

    /// Resolve relative paths to absolute
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        let base = base_dir.as_ref();

        for path in [
            &mut self.analysis.policy_dir,
            &mut self.analysis.summary_file,
            &mut self.generator.output_dir,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}
