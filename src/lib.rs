//! Agro-climatic Fusion Library
//!
//! A Rust library for fusing per-pixel vegetation-index (NDVI) raster imagery
//! with district-level rainfall and temperature records into one
//! per-district, per-month, per-season table.
//!
//! This library provides tools for:
//! - Decoding canonical raster filenames (`NDVI_apr_2019_01to15.tif`) into temporal keys
//! - Reading GeoTIFF rasters, masking their no-data sentinel and rescaling to [0, 1]
//! - Computing zonal means of a raster within each district polygon
//! - Reconciling district spellings across independently maintained sources
//! - Aggregating each source to a (district, season, month, year) grain
//! - Left-joining the three series without ever narrowing the NDVI rows
//! - Writing one output table per year

pub mod config;
pub mod constants;

// Core application modules
pub mod app {
    pub mod models;
    pub mod services {
        pub mod canonicalizer;
        pub mod climate_reader;
        pub mod crop_annotator;
        pub mod district_registry;
        pub mod filename_decoder;
        pub mod joiner;
        pub mod monthly_aggregator;
        pub mod pipeline;
        pub mod raster_batch;
        pub mod raster_reader;
        pub mod year_writer;
        pub mod zonal_stats;
    }
}

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
}

// Re-export commonly used types
pub use app::models::{RasterKey, Season, TemporalKey, VegetationObservation};
pub use config::{FusionConfig, StateConfig};

/// Result type alias for the fusion pipeline
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for fusion operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Table processing failed inside polars
    #[error("Table processing error: {message}")]
    Polars {
        message: String,
        #[source]
        source: polars::error::PolarsError,
    },

    /// TIFF decoding failed
    #[error("TIFF decoding error in '{file}': {source}")]
    Tiff {
        file: String,
        #[source]
        source: tiff::TiffError,
    },

    /// Raster is readable but unusable (multi-band, no geotransform, ...)
    #[error("Raster error in '{file}': {message}")]
    Raster { file: String, message: String },

    /// Boundary file could not be loaded or contains no usable districts
    #[error("Boundary error: {message}")]
    Boundary { message: String },

    /// GeoJSON parsing failed
    #[error("GeoJSON error in '{file}': {source}")]
    GeoJson {
        file: String,
        #[source]
        source: Box<geojson::Error>,
    },

    /// Climate table is missing expected columns or cannot be read
    #[error("Climate table error in '{file}': {message}")]
    ClimateTable { file: String, message: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Configuration file could not be parsed
    #[error("Configuration parse error in '{file}': {source}")]
    ConfigParse {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    /// Month outside 1..=12 passed to the season classifier
    #[error("Invalid month: {month} (expected 1..=12)")]
    InvalidMonth { month: u32 },

    /// District rename table would make canonicalization non-idempotent or colliding
    #[error("Canonicalization error: {message}")]
    Canonicalization { message: String },

    /// Left join changed the number of anchor rows
    #[error("Join invariant violated: expected {expected} rows, found {found}")]
    JoinInvariant { expected: usize, found: usize },

    /// Directory traversal error
    #[error("Directory traversal error: {message}")]
    DirectoryTraversal {
        message: String,
        #[source]
        source: walkdir::Error,
    },

    /// Processing interrupted
    #[error("Processing interrupted: {reason}")]
    ProcessingInterrupted { reason: String },

    /// One or more states could not be fused
    #[error("Fusion failed for {failed} of {total} states")]
    StatesFailed { failed: usize, total: usize },
}

impl Error {
    /// Create an I/O error with context
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a polars error with context
    pub fn polars(message: impl Into<String>, source: polars::error::PolarsError) -> Self {
        Self::Polars {
            message: message.into(),
            source,
        }
    }

    /// Create a TIFF decoding error
    pub fn tiff(file: impl Into<String>, source: tiff::TiffError) -> Self {
        Self::Tiff {
            file: file.into(),
            source,
        }
    }

    /// Create a raster error
    pub fn raster(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Raster {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Create a boundary error
    pub fn boundary(message: impl Into<String>) -> Self {
        Self::Boundary {
            message: message.into(),
        }
    }

    /// Create a GeoJSON error
    pub fn geojson(file: impl Into<String>, source: geojson::Error) -> Self {
        Self::GeoJson {
            file: file.into(),
            source: Box::new(source),
        }
    }

    /// Create a climate table error
    pub fn climate_table(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ClimateTable {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a configuration parse error
    pub fn config_parse(file: impl Into<String>, source: serde_json::Error) -> Self {
        Self::ConfigParse {
            file: file.into(),
            source,
        }
    }

    /// Create an invalid month error
    pub fn invalid_month(month: u32) -> Self {
        Self::InvalidMonth { month }
    }

    /// Create a canonicalization error
    pub fn canonicalization(message: impl Into<String>) -> Self {
        Self::Canonicalization {
            message: message.into(),
        }
    }

    /// Create a join invariant error
    pub fn join_invariant(expected: usize, found: usize) -> Self {
        Self::JoinInvariant { expected, found }
    }

    /// Create a directory traversal error
    pub fn directory_traversal(message: impl Into<String>, source: walkdir::Error) -> Self {
        Self::DirectoryTraversal {
            message: message.into(),
            source,
        }
    }

    /// Create a processing interrupted error
    pub fn processing_interrupted(reason: impl Into<String>) -> Self {
        Self::ProcessingInterrupted {
            reason: reason.into(),
        }
    }

    /// Create a failed-states error
    pub fn states_failed(failed: usize, total: usize) -> Self {
        Self::StatesFailed { failed, total }
    }

    /// Whether this error is an I/O-class failure for a single input file
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Tiff { .. } | Self::Raster { .. }
        )
    }
}

// Automatic conversions from common error types
impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: "I/O operation failed".to_string(),
            source: error,
        }
    }
}

impl From<polars::error::PolarsError> for Error {
    fn from(error: polars::error::PolarsError) -> Self {
        Self::Polars {
            message: "Table operation failed".to_string(),
            source: error,
        }
    }
}

impl From<walkdir::Error> for Error {
    fn from(error: walkdir::Error) -> Self {
        Self::DirectoryTraversal {
            message: "Directory traversal failed".to_string(),
            source: error,
        }
    }
}
