//! Data models for agro-climatic fusion
//!
//! This module contains the core value types shared by the pipeline stages:
//! cropping seasons, temporal keys, decoded raster keys and per-district
//! vegetation observations.

use crate::constants::{KHARIF_MONTHS, RABI_MONTHS, season_labels};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Season
// =============================================================================

/// Cropping season, a pure function of the calendar month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Season {
    /// Monsoon-sown season, June to October
    Kharif,
    /// Winter-sown season, November to April
    Rabi,
    /// May, between the two harvests
    Other,
}

impl Season {
    /// Classify a calendar month (1..=12)
    ///
    /// Months outside the calendar range are a caller bug and fail with
    /// [`Error::InvalidMonth`] instead of falling back to a default season.
    pub fn from_month(month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::invalid_month(month));
        }

        if KHARIF_MONTHS.contains(&month) {
            Ok(Season::Kharif)
        } else if RABI_MONTHS.contains(&month) {
            Ok(Season::Rabi)
        } else {
            Ok(Season::Other)
        }
    }

    /// Label written to output tables
    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Kharif => season_labels::KHARIF,
            Season::Rabi => season_labels::RABI,
            Season::Other => season_labels::OTHER,
        }
    }

    /// All seasons in label order
    pub fn all() -> [Season; 3] {
        [Season::Kharif, Season::Rabi, Season::Other]
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Season {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kharif" => Ok(Season::Kharif),
            "rabi" => Ok(Season::Rabi),
            "other" => Ok(Season::Other),
            other => Err(Error::configuration(format!("Unknown season '{}'", other))),
        }
    }
}

// =============================================================================
// Temporal Keys
// =============================================================================

/// Temporal key decoded from a raster filename
///
/// The season is derived from the month at construction and cannot be set
/// independently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RasterKey {
    month: u32,
    year: i32,
    season: Season,
    /// Trailing filename segment, e.g. `01to15` for a half-month composite
    pub period: String,
}

impl RasterKey {
    /// Create a raster key, validating the month
    pub fn new(month: u32, year: i32, period: impl Into<String>) -> Result<Self> {
        let season = Season::from_month(month)?;
        Ok(Self {
            month,
            year,
            season,
            period: period.into(),
        })
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn season(&self) -> Season {
        self.season
    }

    /// Attach a canonical district to form the shared join key
    pub fn for_district(&self, district: impl Into<String>) -> TemporalKey {
        TemporalKey {
            district: district.into(),
            season: self.season,
            month: self.month,
            year: self.year,
        }
    }
}

/// The (district, season, month, year) key used to align all sources
///
/// `district` is always the canonical form produced by
/// [`DistrictCanonicalizer`](crate::app::services::canonicalizer::DistrictCanonicalizer).
/// The season is derived from the month, as for [`RasterKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TemporalKey {
    district: String,
    season: Season,
    month: u32,
    year: i32,
}

impl TemporalKey {
    /// Create a key, validating the month
    pub fn new(district: impl Into<String>, month: u32, year: i32) -> Result<Self> {
        Ok(RasterKey::new(month, year, "")?.for_district(district))
    }

    pub fn district(&self) -> &str {
        &self.district
    }

    pub fn season(&self) -> Season {
        self.season
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn year(&self) -> i32 {
        self.year
    }
}

impl fmt::Display for TemporalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{:04}-{:02}",
            self.district, self.season, self.year, self.month
        )
    }
}

// =============================================================================
// Observations
// =============================================================================

/// Zonal NDVI mean for one district and one raster
///
/// `mean_ndvi` is `None` when the district had no valid pixels in the raster
/// (fully masked); this is a different fact from a measured zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VegetationObservation {
    pub key: TemporalKey,
    pub mean_ndvi: Option<f64>,
}

impl VegetationObservation {
    pub fn new(key: TemporalKey, mean_ndvi: Option<f64>) -> Self {
        Self { key, mean_ndvi }
    }
}

/// The three independently produced input series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    Vegetation,
    Temperature,
    Rainfall,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::Vegetation => "vegetation",
            SourceKind::Temperature => "temperature",
            SourceKind::Rainfall => "rainfall",
        };
        f.write_str(name)
    }
}
