//! Application constants for the agro-climatic fusion pipeline
//!
//! This module contains the fixed values shared across stages: calendar
//! tables, season month sets, raster encoding, column names and output naming.

// =============================================================================
// Calendar and Seasons
// =============================================================================

/// English three-letter month abbreviations, index 0 = January
pub const MONTH_ABBREVIATIONS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Months of the monsoon-sown cropping season
pub const KHARIF_MONTHS: &[u32] = &[6, 7, 8, 9, 10];

/// Months of the winter-sown cropping season
pub const RABI_MONTHS: &[u32] = &[11, 12, 1, 2, 3, 4];

/// Season labels as written to output tables
pub mod season_labels {
    pub const KHARIF: &str = "Kharif";
    pub const RABI: &str = "Rabi";
    pub const OTHER: &str = "Other";
}

// =============================================================================
// Raster Encoding
// =============================================================================

/// Upstream NDVI rasters encode the index as an 8-bit integer in [0, 255]
pub const NDVI_SCALE: f64 = 255.0;

/// Raster file extensions picked up during discovery (compared lower-case)
pub const RASTER_EXTENSIONS: &[&str] = &["tif", "tiff"];

/// GeoTIFF tag numbers read from raster metadata
pub mod geotiff_tags {
    pub const MODEL_PIXEL_SCALE: u16 = 33550;
    pub const MODEL_TIEPOINT: u16 = 33922;
    pub const MODEL_TRANSFORMATION: u16 = 34264;
    pub const GDAL_NODATA: u16 = 42113;
}

// =============================================================================
// Table Column Names
// =============================================================================

/// Column names used by every aggregated and fused table
pub mod columns {
    pub const DISTRICT: &str = "district";
    pub const SEASON: &str = "season";
    pub const MONTH: &str = "month";
    pub const YEAR: &str = "year";
    pub const MEAN_NDVI: &str = "mean_ndvi";
    pub const MEAN_TEMP: &str = "mean_temp";
    pub const MIN_TEMP: &str = "min_temp";
    pub const MAX_TEMP: &str = "max_temp";
    pub const RAINFALL_MM: &str = "rainfall_mm";
    pub const STATE: &str = "state";
    pub const CROPS: &str = "crops";

    /// The shared join key, in output order
    pub const KEY: [&str; 4] = [DISTRICT, SEASON, MONTH, YEAR];
}

/// Separator used when rendering a crop list into a single text cell
pub const CROP_SEPARATOR: &str = ";";

// =============================================================================
// Output and Processing Defaults
// =============================================================================

/// Default prefix for year-partitioned output files (`climate_<year>.csv`)
pub const DEFAULT_FILE_PREFIX: &str = "climate";

/// Suffix appended to output files while they are being written
pub const PARTIAL_FILE_SUFFIX: &str = ".partial";

/// Default number of raster worker tasks (0 = number of CPUs)
pub const DEFAULT_WORKERS: usize = 0;

/// Environment variable consulted for a configuration file path
pub const CONFIG_ENV_VAR: &str = "AGROCLIM_CONFIG";
