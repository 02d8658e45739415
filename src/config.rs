//! Configuration management for the protocol compiler
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (tachyon.toml)
//! - Environment variables (TACHYON__*)
//!
//! ## Example config file (tachyon.toml):
//! ```toml
//! [source]
//! root = "src/schema"
//! definitions_dir = "definitions"
//!
//! [output]
//! dir = "schema"
//! format = "pretty"
//! include_checksums = true
//! include_meta = true
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::loader::LoadConfig;

/// Main configuration for the compiler
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Where declarations are read from
    #[serde(default)]
    pub source: SourceConfig,

    /// Where and how artifacts are written
    #[serde(default)]
    pub output: OutputConfig,
}

/// Source tree configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Root holding one directory per service
    #[serde(default = "default_source_root")]
    pub root: PathBuf,

    /// Definitions directory, relative to `root`
    #[serde(default = "default_definitions_dir")]
    pub definitions_dir: String,
}

/// Artifact output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output directory
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// JSON layout
    #[serde(default)]
    pub format: OutputFormat,

    /// Write checksums.sha256
    #[serde(default = "default_true")]
    pub include_checksums: bool,

    /// Write meta.json (actor routing and service index)
    #[serde(default = "default_true")]
    pub include_meta: bool,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Four-space indentation
    #[default]
    Pretty,
    Compact,
}

fn default_source_root() -> PathBuf {
    PathBuf::from("src/schema")
}

fn default_definitions_dir() -> String {
    "definitions".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("schema")
}

fn default_true() -> bool {
    true
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            root: default_source_root(),
            definitions_dir: default_definitions_dir(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            format: OutputFormat::Pretty,
            include_checksums: true,
            include_meta: true,
        }
    }
}

impl CompilerConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering an explicit file over the default locations
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        for location in ["tachyon.toml", ".tachyon.toml", "config/tachyon.toml"] {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(dirs) = directories::ProjectDirs::from("info", "beyondallreason", "tachyon") {
            let xdg_config = dirs.config_dir().join("tachyon.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // TACHYON__OUTPUT__DIR=out, TACHYON__OUTPUT__FORMAT=compact, ...
        builder = builder.add_source(
            Environment::with_prefix("TACHYON")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Absolute path of the definitions directory
    pub fn definitions_path(&self) -> PathBuf {
        self.source.root.join(&self.source.definitions_dir)
    }

    /// Loader settings derived from the source section
    pub fn load_config(&self) -> LoadConfig {
        LoadConfig {
            definitions_dir: self.source.definitions_dir.clone(),
            ..LoadConfig::default()
        }
    }
}
