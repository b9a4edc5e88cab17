//! Configuration loader with multi-source merging

use crate::{Paths, PolsatConfig};
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    include_user_config: bool,
}

impl ConfigLoader {
    /// Create a new config loader with default project directory (current dir)
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "POLSAT".to_string(),
            include_user_config: true,
        }
    }

    /// Set the project directory
    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the environment variable prefix (default: "POLSAT")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Skip ~/.config/polsat/config.toml
    pub fn without_user_config(mut self) -> Self {
        self.include_user_config = false;
        self
    }

    /// Config files that exist, lowest precedence first
    pub fn sources(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        if self.include_user_config {
            if let Ok(user_config_file) = Paths::new().user_config_file() {
                files.push(user_config_file);
            }
        }
        files.push(Paths::project_config_file(&self.project_dir));
        files.push(Paths::local_config_file(&self.project_dir));
        files.retain(|f| f.exists());
        files
    }

    /// Load configuration from all sources with proper precedence
    pub fn load(self) -> Result<PolsatConfig> {
        let mut builder = config::Config::builder();

        // 1. Start with built-in defaults
        let defaults = PolsatConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2-4. User, project and local config files
        for file in self.sources() {
            builder = builder.add_source(
                config::File::from(file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 5. Environment variables (POLSAT_ANALYSIS__SUMMARY_FILE=...)
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // Build and deserialize
        let config = builder.build().context("Failed to build configuration")?;

        let mut polsat_config: PolsatConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        polsat_config
            .validate()
            .context("Configuration failed validation")?;

        // Resolve relative paths
        polsat_config.resolve_paths(&self.project_dir);

        Ok(polsat_config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
