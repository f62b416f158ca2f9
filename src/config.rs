//! Configuration management and validation.
//!
//! Provides the static per-state configuration (input paths, schema mappings
//! for each source, district rename table, crop calendar) and the run-wide
//! processing settings. Configuration is passed explicitly into each pipeline
//! stage; nothing reads ambient state.

use crate::app::models::Season;
use crate::app::services::canonicalizer::DistrictCanonicalizer;
use crate::constants::{DEFAULT_FILE_PREFIX, DEFAULT_WORKERS};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Output table format for year-partitioned files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Comma-separated text, one file per year
    #[default]
    Csv,
    /// Snappy-compressed Parquet, one file per year
    Parquet,
}

impl OutputFormat {
    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Parquet => "parquet",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "parquet" => Ok(OutputFormat::Parquet),
            other => Err(Error::configuration(format!(
                "Unknown output format '{}' (expected csv or parquet)",
                other
            ))),
        }
    }
}

/// Attribute names of the administrative boundary file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundarySchema {
    /// Property holding the district name (e.g. `DISTRICT`, `dtname`)
    pub district_field: String,

    /// Property holding the state name, if the file spans several states
    #[serde(default)]
    pub state_field: Option<String>,

    /// Keep only features whose state property matches this (case-insensitive)
    #[serde(default)]
    pub state_filter: Option<String>,
}

/// Column names of one climate table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateSchema {
    /// Observation date column
    pub date_column: String,

    /// District name column
    pub district_column: String,

    /// Measured value column (mean temperature or rainfall)
    pub value_column: String,

    /// Optional daily minimum column (temperature tables only)
    #[serde(default)]
    pub min_column: Option<String>,

    /// Optional daily maximum column (temperature tables only)
    #[serde(default)]
    pub max_column: Option<String>,
}

impl ClimateSchema {
    /// Schema with only the three required columns
    pub fn new(
        date_column: impl Into<String>,
        district_column: impl Into<String>,
        value_column: impl Into<String>,
    ) -> Self {
        Self {
            date_column: date_column.into(),
            district_column: district_column.into(),
            value_column: value_column.into(),
            min_column: None,
            max_column: None,
        }
    }

    /// Add min/max columns
    pub fn with_range_columns(mut self, min: impl Into<String>, max: impl Into<String>) -> Self {
        self.min_column = Some(min.into());
        self.max_column = Some(max.into());
        self
    }
}

/// Everything needed to fuse the sources of one state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateConfig {
    /// State name written to the `state` column (e.g. "Maharashtra")
    pub name: String,

    /// Short code used for selection on the command line (e.g. "MH")
    pub code: String,

    /// Administrative boundary file (GeoJSON)
    pub boundary_path: PathBuf,

    /// Rainfall table
    pub rainfall_path: PathBuf,

    /// Temperature table
    pub temperature_path: PathBuf,

    /// Directory holding canonically named NDVI rasters
    pub raster_dir: PathBuf,

    /// Directory receiving the year-partitioned tables
    pub output_dir: PathBuf,

    pub boundary_schema: BoundarySchema,
    pub rainfall_schema: ClimateSchema,
    pub temperature_schema: ClimateSchema,

    /// Climate-table spelling (upper-case) -> boundary-file spelling
    #[serde(default)]
    pub district_renames: BTreeMap<String, String>,

    /// Season label -> ordered crop codes
    #[serde(default)]
    pub crops: BTreeMap<String, Vec<String>>,
}

impl StateConfig {
    /// Built-in configuration for Maharashtra
    pub fn maharashtra() -> Self {
        let renames = [
            ("BEED", "BID"),
            ("BULDHANA", "BULDANA"),
            ("NASIK", "NASHIK"),
            ("AHMEDNAGAR", "AHMADNAGAR"),
            ("RAIGAD", "RAIGARH"),
            ("GARHCHIROLI", "GADCHIROLI"),
        ];

        Self {
            name: "Maharashtra".to_string(),
            code: "MH".to_string(),
            boundary_path: PathBuf::from("data/MAHARASHTRA_DISTRICTS.geojson"),
            rainfall_path: PathBuf::from("data/MH_precipitation.csv"),
            temperature_path: PathBuf::from("data/MH_temperature.csv"),
            raster_dir: PathBuf::from("data/tif_files"),
            output_dir: PathBuf::from("analysis_MH"),
            boundary_schema: BoundarySchema {
                district_field: "DISTRICT".to_string(),
                state_field: Some("STATE".to_string()),
                state_filter: Some("MAHARASHTRA".to_string()),
            },
            rainfall_schema: ClimateSchema::new("date", "District", "Rainfall_mm"),
            temperature_schema: ClimateSchema::new("date", "District", "mean"),
            district_renames: renames
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            crops: crop_calendar(&[("Kharif", ["CO", "SB"]), ("Rabi", ["WH", "GM"])]),
        }
    }

    /// Built-in configuration for Madhya Pradesh
    pub fn madhya_pradesh() -> Self {
        Self {
            name: "Madhya Pradesh".to_string(),
            code: "MP".to_string(),
            boundary_path: PathBuf::from("data/MADHYA PRADESH_DISTRICTS.geojson"),
            rainfall_path: PathBuf::from("data/MP_precipitation.csv"),
            temperature_path: PathBuf::from("data/MP_temperature.csv"),
            raster_dir: PathBuf::from("data/tif_files"),
            output_dir: PathBuf::from("analysis_MP"),
            boundary_schema: BoundarySchema {
                district_field: "dtname".to_string(),
                state_field: None,
                state_filter: None,
            },
            rainfall_schema: ClimateSchema::new("date", "District", "rainfall_mm"),
            temperature_schema: ClimateSchema::new("date", "District", "mean")
                .with_range_columns("min", "max"),
            district_renames: BTreeMap::from([(
                "NARSINGPUR".to_string(),
                "NARSIMHAPUR".to_string(),
            )]),
            crops: crop_calendar(&[("Kharif", ["PA", "SB"]), ("Rabi", ["WH", "GM"])]),
        }
    }

    /// Resolve every relative input/output path against `root`
    pub fn rebased(mut self, root: &Path) -> Self {
        for path in [
            &mut self.boundary_path,
            &mut self.rainfall_path,
            &mut self.temperature_path,
            &mut self.raster_dir,
            &mut self.output_dir,
        ] {
            if path.is_relative() {
                *path = root.join(&*path);
            }
        }
        self
    }

    /// Ordered crop codes for a season; empty when unmapped
    pub fn crops_for(&self, season: Season) -> &[String] {
        self.crops
            .get(season.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Build the district canonicalizer for this state
    pub fn canonicalizer(&self) -> Result<DistrictCanonicalizer> {
        DistrictCanonicalizer::new(&self.district_renames)
    }

    /// Validate the state configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::configuration("State name must not be empty"));
        }
        if self.code.trim().is_empty() {
            return Err(Error::configuration(format!(
                "State '{}' has an empty code",
                self.name
            )));
        }
        if self.boundary_schema.district_field.trim().is_empty() {
            return Err(Error::configuration(format!(
                "State '{}' has an empty boundary district field",
                self.name
            )));
        }
        if self.boundary_schema.state_filter.is_some() && self.boundary_schema.state_field.is_none()
        {
            return Err(Error::configuration(format!(
                "State '{}' sets a boundary state filter without a state field",
                self.name
            )));
        }
        for schema in [&self.rainfall_schema, &self.temperature_schema] {
            if schema.min_column.is_some() != schema.max_column.is_some() {
                return Err(Error::configuration(format!(
                    "State '{}': min and max columns must be configured together",
                    self.name
                )));
            }
        }
        for season in self.crops.keys() {
            season.parse::<Season>().map_err(|_| {
                Error::configuration(format!(
                    "State '{}' maps crops to unknown season '{}'",
                    self.name, season
                ))
            })?;
        }

        // Building the canonicalizer validates the rename table
        self.canonicalizer()?;
        Ok(())
    }
}

fn crop_calendar<const N: usize>(entries: &[(&str, [&str; N])]) -> BTreeMap<String, Vec<String>> {
    entries
        .iter()
        .map(|(season, crops)| {
            (
                season.to_string(),
                crops.iter().map(|c| c.to_string()).collect(),
            )
        })
        .collect()
}

/// Run-wide configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Number of raster worker tasks (0 = number of CPUs)
    #[serde(default)]
    pub workers: usize,

    /// Output table format
    #[serde(default)]
    pub output_format: OutputFormat,

    /// Output file prefix (`<prefix>_<year>.<ext>`)
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    /// Show progress bars while processing rasters
    #[serde(default)]
    pub show_progress: bool,

    /// States to process
    pub states: Vec<StateConfig>,
}

fn default_file_prefix() -> String {
    DEFAULT_FILE_PREFIX.to_string()
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            output_format: OutputFormat::Csv,
            file_prefix: default_file_prefix(),
            show_progress: false,
            states: vec![StateConfig::maharashtra(), StateConfig::madhya_pradesh()],
        }
    }
}

impl FusionConfig {
    /// Load configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::io(
                format!("Failed to read config file {}", path.display()),
                e,
            )
        })?;
        let config: FusionConfig = serde_json::from_str(&content)
            .map_err(|e| Error::config_parse(path.display().to_string(), e))?;
        debug!(
            "Loaded configuration for {} states from {}",
            config.states.len(),
            path.display()
        );
        Ok(config)
    }

    /// Create configuration with custom worker count
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the output format
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Set the output file prefix
    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    /// Enable progress bars
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Replace the configured states
    pub fn with_states(mut self, states: Vec<StateConfig>) -> Self {
        self.states = states;
        self
    }

    /// Worker count with 0 resolved to the number of CPUs
    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get().max(1)
        } else {
            self.workers
        }
    }

    /// Find a state by code or name (case-insensitive)
    pub fn state(&self, selector: &str) -> Option<&StateConfig> {
        self.states.iter().find(|state| {
            state.code.eq_ignore_ascii_case(selector) || state.name.eq_ignore_ascii_case(selector)
        })
    }

    /// Validate the whole configuration
    pub fn validate(&self) -> Result<()> {
        if self.states.is_empty() {
            return Err(Error::configuration("No states configured"));
        }
        if self.file_prefix.is_empty()
            || self
                .file_prefix
                .contains(|c: char| c == '/' || c == '\\' || c.is_whitespace())
        {
            return Err(Error::configuration(format!(
                "Invalid output file prefix '{}'",
                self.file_prefix
            )));
        }

        let mut codes = std::collections::HashSet::new();
        for state in &self.states {
            state.validate()?;
            if !codes.insert(state.code.to_ascii_uppercase()) {
                return Err(Error::configuration(format!(
                    "Duplicate state code '{}'",
                    state.code
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = FusionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.states.len(), 2);
    }

    #[test]
    fn test_state_lookup_by_code_and_name() {
        let config = FusionConfig::default();
        assert_eq!(config.state("mh").unwrap().name, "Maharashtra");
        assert_eq!(config.state("Madhya Pradesh").unwrap().code, "MP");
        assert!(config.state("KA").is_none());
    }

    #[test]
    fn test_crops_for_unmapped_season_is_empty() {
        let state = StateConfig::maharashtra();
        assert_eq!(state.crops_for(Season::Kharif), ["CO", "SB"]);
        assert!(state.crops_for(Season::Other).is_empty());
    }

    #[test]
    fn test_validate_rejects_unknown_crop_season() {
        let mut state = StateConfig::maharashtra();
        state.crops.insert("Zaid".to_string(), vec!["MG".to_string()]);
        assert!(matches!(
            state.validate(),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_chained_renames() {
        let mut state = StateConfig::maharashtra();
        state
            .district_renames
            .insert("BID".to_string(), "BEED".to_string());
        assert!(state.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_prefix_and_duplicate_codes() {
        let config = FusionConfig::default().with_file_prefix("out/dir");
        assert!(config.validate().is_err());

        let config =
            FusionConfig::default().with_states(vec![StateConfig::maharashtra(), StateConfig::maharashtra()]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rebased_only_touches_relative_paths() {
        let mut state = StateConfig::maharashtra();
        state.output_dir = PathBuf::from("/abs/out");
        let state = state.rebased(Path::new("/data/root"));

        assert_eq!(
            state.rainfall_path,
            PathBuf::from("/data/root/data/MH_precipitation.csv")
        );
        assert_eq!(state.output_dir, PathBuf::from("/abs/out"));
    }

    #[test]
    fn test_from_json_file_round_trip() {
        let config = FusionConfig::default()
            .with_workers(3)
            .with_output_format(OutputFormat::Parquet);
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = FusionConfig::from_json_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_from_json_file_applies_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        let state = serde_json::to_value(StateConfig::madhya_pradesh()).unwrap();
        write!(file, "{}", serde_json::json!({ "states": [state] })).unwrap();

        let loaded = FusionConfig::from_json_file(file.path()).unwrap();
        assert_eq!(loaded.file_prefix, DEFAULT_FILE_PREFIX);
        assert_eq!(loaded.output_format, OutputFormat::Csv);
        assert_eq!(loaded.workers, 0);
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("CSV".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert_eq!(
            "parquet".parse::<OutputFormat>().unwrap().extension(),
            "parquet"
        );
        assert!("xlsx".parse::<OutputFormat>().is_err());
    }
}
