//! Configuration management for the editor shell.
//!
//! Handles:
//! - Command-line argument parsing
//! - Project configuration file (`.rte.toml`)
//! - Default storage and download locations

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::autosave::AUTOSAVE_DELAY;

/// File looked up in the working directory when `--config` is not given
pub const PROJECT_CONFIG_FILE: &str = ".rte.toml";

/// Storage partition used when no origin is configured
pub const DEFAULT_ORIGIN: &str = "local";

/// Command-line arguments for the editor shell
#[derive(Debug, Default, Parser)]
#[command(name = "rte")]
#[command(about = "Rich-text editor with autosave and export")]
#[command(version)]
pub struct Args {
    /// Explicit configuration file
    #[arg(long, help = "Path to a TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Directory holding persisted editor state
    #[arg(long, help = "Directory for the persisted document and theme")]
    pub data_dir: Option<PathBuf>,

    /// Directory receiving exported files
    #[arg(long, help = "Directory where exports are written")]
    pub download_dir: Option<PathBuf>,

    /// Storage partition, one per origin
    #[arg(long, help = "Origin whose storage partition is used")]
    pub origin: Option<String>,

    /// Autosave quiet period in milliseconds
    #[arg(long, help = "Autosave debounce in milliseconds (default 400)")]
    pub autosave_ms: Option<u64>,

    /// Keep everything in memory
    #[arg(long, help = "Do not persist anything to disk")]
    pub ephemeral: bool,

    /// Log level for the shell
    #[arg(long, help = "Log level (trace, debug, info, warn, error)")]
    pub log_level: Option<String>,
}

/// Settings read from the TOML configuration file
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct FileConfig {
    pub data_dir: Option<PathBuf>,
    pub download_dir: Option<PathBuf>,
    pub origin: Option<String>,
    pub autosave_ms: Option<u64>,
    pub log_level: Option<String>,
}

impl FileConfig {
    pub fn parse(content: &str, source: &Path) -> Result<Self> {
        toml::from_str(content)
            .with_context(|| format!("Failed to parse config TOML: {}", source.display()))
    }

    /// Read `path`; a missing file yields the defaults unless `required`
    pub fn load(path: &Path, required: bool) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
                Ok(Self::default())
            }
            Err(e) => {
                Err(e).with_context(|| format!("Failed to read config file: {}", path.display()))
            }
        }
    }
}

/// Combined configuration from all sources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Root of the persisted key-value partitions
    pub data_dir: PathBuf,
    /// Where exports land
    pub download_dir: PathBuf,
    /// Storage partition name
    pub origin: String,
    /// Autosave quiet period
    pub autosave_delay: Duration,
    /// Log level
    pub log_level: String,
    /// Keep storage in memory only
    pub ephemeral: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            download_dir: default_download_dir(),
            origin: DEFAULT_ORIGIN.to_string(),
            autosave_delay: AUTOSAVE_DELAY,
            log_level: "info".to_string(),
            ephemeral: false,
        }
    }
}

impl Config {
    /// Create configuration from command-line arguments
    pub fn from_args_and_env() -> Result<Self> {
        Self::from_args(Args::parse())
    }

    /// Create configuration from explicit arguments (useful for testing)
    pub fn from_args(args: Args) -> Result<Self> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path, true)?,
            None => FileConfig::load(Path::new(PROJECT_CONFIG_FILE), false)?,
        };
        Ok(Self::merge(args, file))
    }

    /// Command-line values win over file values, which win over defaults
    pub fn merge(args: Args, file: FileConfig) -> Self {
        let defaults = Self::default();
        Config {
            data_dir: args.data_dir.or(file.data_dir).unwrap_or(defaults.data_dir),
            download_dir: args
                .download_dir
                .or(file.download_dir)
                .unwrap_or(defaults.download_dir),
            origin: args.origin.or(file.origin).unwrap_or(defaults.origin),
            autosave_delay: args
                .autosave_ms
                .or(file.autosave_ms)
                .map_or(defaults.autosave_delay, Duration::from_millis),
            log_level: args.log_level.or(file.log_level).unwrap_or(defaults.log_level),
            ephemeral: args.ephemeral,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rte")
}

fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}
