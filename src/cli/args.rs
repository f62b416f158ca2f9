//! Command-line argument definitions for the fusion tool
//!
//! This module defines the CLI interface using the clap derive API.

use crate::config::OutputFormat as TableFormat;
use crate::{Error, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::str::FromStr;

/// CLI arguments for the agro-climatic fusion tool
///
/// Fuses NDVI rasters with district rainfall and temperature records into
/// per-district, per-month tables, one file per year.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "agroclim-fusion",
    version,
    about = "Fuse NDVI rasters with district rainfall and temperature records",
    long_about = "Computes district zonal means of NDVI rasters, reconciles district spellings \
                  across sources, aggregates every source to (district, season, month, year) and \
                  left-joins the weather series onto the vegetation series. Output is one table \
                  per year with the crops of each row's cropping season."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Run the fusion pipeline for the configured states
    Fuse(FuseArgs),
    /// Print the effective configuration as JSON
    Config(ConfigArgs),
}

/// Arguments for the fuse command
#[derive(Debug, Clone, Parser)]
pub struct FuseArgs {
    /// Path to a JSON configuration file
    ///
    /// Replaces the built-in Maharashtra and Madhya Pradesh presets. When not
    /// given, the AGROCLIM_CONFIG environment variable is consulted.
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// States to process, by code or name (comma-separated)
    #[arg(short = 's', long = "states", value_name = "LIST")]
    pub states: Option<StateList>,

    /// Directory that relative input and output paths are resolved against
    #[arg(long = "data-root", value_name = "PATH")]
    pub data_root: Option<PathBuf>,

    /// Override the boundary file (single state only)
    #[arg(long = "boundary", value_name = "FILE")]
    pub boundary: Option<PathBuf>,

    /// Override the rainfall table (single state only)
    #[arg(long = "rainfall", value_name = "FILE")]
    pub rainfall: Option<PathBuf>,

    /// Override the temperature table (single state only)
    #[arg(long = "temperature", value_name = "FILE")]
    pub temperature: Option<PathBuf>,

    /// Override the raster directory (single state only)
    #[arg(long = "rasters", value_name = "PATH")]
    pub rasters: Option<PathBuf>,

    /// Override the output directory (single state only)
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Table format of the year files
    #[arg(short = 'f', long = "format", value_enum)]
    pub format: Option<FileFormat>,

    /// File name prefix of the year files
    #[arg(long = "prefix", value_name = "PREFIX")]
    pub prefix: Option<String>,

    /// Number of rasters processed concurrently (0 = number of CPUs)
    #[arg(short = 'j', long = "workers", value_name = "COUNT")]
    pub workers: Option<usize>,

    /// Logging verbosity level
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    /// Only show errors
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable progress bars
    #[arg(long = "no-progress")]
    pub no_progress: bool,

    /// Format of the final run summary
    #[arg(long = "report", value_enum, default_value = "human")]
    pub report: ReportFormat,
}

/// Arguments for the config command
#[derive(Debug, Clone, Parser)]
pub struct ConfigArgs {
    /// Path to a JSON configuration file
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Only print these states
    #[arg(short = 's', long = "states", value_name = "LIST")]
    pub states: Option<StateList>,
}

/// Table format of the year files
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FileFormat {
    Csv,
    Parquet,
}

impl From<FileFormat> for TableFormat {
    fn from(format: FileFormat) -> Self {
        match format {
            FileFormat::Csv => TableFormat::Csv,
            FileFormat::Parquet => TableFormat::Parquet,
        }
    }
}

/// Format of the run summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable output
    Human,
    /// JSON format for scripting
    Json,
    /// CSV format, one row per state
    Csv,
}

/// Comma-separated state selectors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateList {
    pub states: Vec<String>,
}

impl FromStr for StateList {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let states: Vec<String> = s
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if states.is_empty() {
            return Err(Error::configuration("State list cannot be empty"));
        }
        Ok(StateList { states })
    }
}

impl FuseArgs {
    /// Validate argument combinations that clap cannot express
    pub fn validate(&self) -> Result<()> {
        if let Some(config_file) = &self.config_file {
            if !config_file.exists() {
                return Err(Error::configuration(format!(
                    "Config file does not exist: {}",
                    config_file.display()
                )));
            }
        }

        if let Some(data_root) = &self.data_root {
            if !data_root.is_dir() {
                return Err(Error::configuration(format!(
                    "Data root is not a directory: {}",
                    data_root.display()
                )));
            }
        }

        if let Some(prefix) = &self.prefix {
            if prefix.trim().is_empty() {
                return Err(Error::configuration("Output prefix cannot be empty"));
            }
        }

        Ok(())
    }

    /// Whether any single-state path override was given
    pub fn has_path_overrides(&self) -> bool {
        self.boundary.is_some()
            || self.rainfall.is_some()
            || self.temperature.is_some()
            || self.rasters.is_some()
            || self.output.is_some()
    }

    /// Determine the appropriate log level based on verbosity flags
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        }
    }

    /// Progress bars are shown unless quiet or disabled
    pub fn show_progress(&self) -> bool {
        !self.quiet && !self.no_progress
    }
}
