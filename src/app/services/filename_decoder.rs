//! Temporal-key decoding for canonical raster filenames
//!
//! Upstream extraction renames every composite to
//! `<PREFIX>_<month>_<year>_<period>.<ext>`, e.g. `NDVI_apr_2019_01to15.tif`.
//! The decoder turns such a name into a [`RasterKey`] or a typed
//! [`DecodeError`]; it never panics and never guesses.

use crate::app::models::RasterKey;
use crate::constants::{MONTH_ABBREVIATIONS, RASTER_EXTENSIONS};
use crate::{Error, Result};
use regex::Regex;
use std::path::Path;

/// Stem grammar: prefix, month and year segments, optional trailing period
const STEM_PATTERN: &str = r"^(?P<prefix>[^_]+)_(?P<month>[^_]+)_(?P<year>[^_]+)(?:_(?P<period>.*))?$";

/// Why a raster filename could not be decoded
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("filename '{name}' has fewer than 3 underscore-delimited segments")]
    TooFewSegments { name: String },

    #[error("'{segment}' is not a known month abbreviation")]
    UnknownMonth { segment: String },

    #[error("'{segment}' is not a positive 4-digit year")]
    InvalidYear { segment: String },
}

/// A successfully decoded raster filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedName {
    pub prefix: String,
    pub key: RasterKey,
}

/// Strict parser for canonical raster filenames
#[derive(Debug, Clone)]
pub struct FilenameDecoder {
    stem: Regex,
}

impl FilenameDecoder {
    pub fn new() -> Result<Self> {
        let stem = Regex::new(STEM_PATTERN)
            .map_err(|e| Error::configuration(format!("Invalid filename grammar: {}", e)))?;
        Ok(Self { stem })
    }

    /// Decode a file name (not a full path) into its temporal key
    pub fn decode(&self, file_name: &str) -> std::result::Result<DecodedName, DecodeError> {
        let stem = Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name);

        let captures = self
            .stem
            .captures(stem)
            .ok_or_else(|| DecodeError::TooFewSegments {
                name: file_name.to_string(),
            })?;

        let month_segment = &captures["month"];
        let month = parse_month(month_segment).ok_or_else(|| DecodeError::UnknownMonth {
            segment: month_segment.to_string(),
        })?;

        let year_segment = &captures["year"];
        let year = parse_year(year_segment).ok_or_else(|| DecodeError::InvalidYear {
            segment: year_segment.to_string(),
        })?;

        let period = captures
            .name("period")
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();

        // parse_month only yields 1..=12, so the season lookup cannot fail
        let key = RasterKey::new(month, year, period).map_err(|_| DecodeError::UnknownMonth {
            segment: month_segment.to_string(),
        })?;

        Ok(DecodedName {
            prefix: captures["prefix"].to_string(),
            key,
        })
    }

    /// Decode the file-name component of a path
    pub fn decode_path(&self, path: &Path) -> std::result::Result<DecodedName, DecodeError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.decode(&name)
    }
}

/// Whether a path has a raster extension (case-insensitive)
pub fn is_raster_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            RASTER_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Month number from a segment starting with a 3-letter English abbreviation
///
/// Upstream names are not consistent about full vs abbreviated month names
/// (`apr`, `April`), so only the first three letters are significant.
fn parse_month(segment: &str) -> Option<u32> {
    if segment.len() < 3 || !segment.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let abbrev = segment[..3].to_ascii_lowercase();
    MONTH_ABBREVIATIONS
        .iter()
        .position(|m| *m == abbrev)
        .map(|index| index as u32 + 1)
}

fn parse_year(segment: &str) -> Option<i32> {
    if segment.len() != 4 || !segment.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    segment.parse::<i32>().ok().filter(|year| *year > 0)
}
