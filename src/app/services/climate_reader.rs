//! Climate table reading
//!
//! Reads a rainfall or temperature CSV through its per-state column mapping
//! and returns a frame on the shared key grain:
//! `district, season, month, year, <value columns>`.
//!
//! Districts are canonicalized and the season is derived from the month here,
//! so downstream stages never see a raw spelling or a free-standing season.

use crate::app::models::{Season, SourceKind};
use crate::app::services::canonicalizer::DistrictCanonicalizer;
use crate::config::ClimateSchema;
use crate::constants::columns;
use crate::{Error, Result};
use polars::prelude::*;
use std::path::Path;
use tracing::{debug, warn};

/// Output names of the value columns a source contributes
pub fn value_columns(kind: SourceKind, schema: &ClimateSchema) -> Result<Vec<(String, &'static str)>> {
    let mut mapping = Vec::new();
    match kind {
        SourceKind::Temperature => {
            mapping.push((schema.value_column.clone(), columns::MEAN_TEMP));
            if let (Some(min), Some(max)) = (&schema.min_column, &schema.max_column) {
                mapping.push((min.clone(), columns::MIN_TEMP));
                mapping.push((max.clone(), columns::MAX_TEMP));
            }
        }
        SourceKind::Rainfall => {
            mapping.push((schema.value_column.clone(), columns::RAINFALL_MM));
        }
        SourceKind::Vegetation => {
            return Err(Error::configuration(
                "Vegetation values come from rasters, not climate tables",
            ));
        }
    }
    Ok(mapping)
}

/// Read one climate table onto the key grain
///
/// Rows without a district or a parseable date are dropped with a warning.
pub fn read_climate_table(
    path: &Path,
    schema: &ClimateSchema,
    kind: SourceKind,
    canonicalizer: &DistrictCanonicalizer,
) -> Result<DataFrame> {
    let label = path.display().to_string();
    let mapping = value_columns(kind, schema)?;

    std::fs::File::open(path)
        .map_err(|e| Error::io(format!("Cannot open climate table {}", label), e))?;

    let raw = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(10_000))
        .map_parse_options(|options| options.with_try_parse_dates(true))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(|e| Error::polars(format!("Failed to read {} table {}", kind, label), e))?;

    let required = [&schema.date_column, &schema.district_column]
        .into_iter()
        .chain(mapping.iter().map(|(source, _)| source));
    let missing: Vec<&str> = required
        .filter(|name| raw.get_column_index(name).is_none())
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(Error::climate_table(
            &label,
            format!("missing column(s) {}", missing.join(", ")),
        ));
    }

    let date = match raw.column(&schema.date_column)?.dtype() {
        DataType::String => col(schema.date_column.as_str())
            .str()
            .to_date(StrptimeOptions::default()),
        _ => col(schema.date_column.as_str()),
    };

    let mut selection = vec![
        col(schema.district_column.as_str())
            .cast(DataType::String)
            .alias(columns::DISTRICT),
        date.clone().dt().month().cast(DataType::Int32).alias(columns::MONTH),
        date.dt().year().cast(DataType::Int32).alias(columns::YEAR),
    ];
    selection.extend(
        mapping
            .iter()
            .map(|(source, target)| col(source.as_str()).cast(DataType::Float64).alias(*target)),
    );

    let rows_read = raw.height();
    let mut frame = raw
        .lazy()
        .select(selection)
        .filter(
            col(columns::DISTRICT)
                .is_not_null()
                .and(col(columns::MONTH).is_not_null())
                .and(col(columns::YEAR).is_not_null()),
        )
        .collect()
        .map_err(|e| Error::polars(format!("Failed to shape {} table {}", kind, label), e))?;

    let dropped = rows_read - frame.height();
    if dropped > 0 {
        warn!(
            "Dropped {} {} rows without a district or date in {}",
            dropped, kind, label
        );
    }

    canonicalize_districts(&mut frame, canonicalizer, kind, &label)?;
    attach_season(&mut frame)?;

    let mut ordered: Vec<Expr> = [
        columns::DISTRICT,
        columns::SEASON,
        columns::MONTH,
        columns::YEAR,
    ]
    .into_iter()
    .map(col)
    .collect();
    ordered.extend(mapping.iter().map(|(_, target)| col(*target)));
    let frame = frame.lazy().select(ordered).collect()?;

    debug!("Read {} {} rows from {}", frame.height(), kind, label);
    Ok(frame)
}

/// Replace raw district spellings with canonical keys
fn canonicalize_districts(
    frame: &mut DataFrame,
    canonicalizer: &DistrictCanonicalizer,
    kind: SourceKind,
    label: &str,
) -> Result<()> {
    let raw = frame.column(columns::DISTRICT)?.str()?;

    for collision in canonicalizer.detect_collisions(raw.into_iter().flatten()) {
        warn!(
            "{} table {} spells district '{}' as {:?}; rows will be averaged together",
            kind, label, collision.canonical, collision.spellings
        );
    }

    let canonical: Vec<Option<String>> = raw
        .into_iter()
        .map(|name| name.map(|name| canonicalizer.canonicalize(name)))
        .collect();
    frame.with_column(Column::new(columns::DISTRICT.into(), canonical))?;
    Ok(())
}

/// Add the season column derived from the month column
pub(crate) fn attach_season(frame: &mut DataFrame) -> Result<()> {
    let months = frame.column(columns::MONTH)?.i32()?;
    let seasons = months
        .into_iter()
        .map(|month| {
            month
                .map(|month| {
                    let month = u32::try_from(month).map_err(|_| Error::invalid_month(0))?;
                    Season::from_month(month).map(|season| season.as_str())
                })
                .transpose()
        })
        .collect::<Result<Vec<Option<&'static str>>>>()?;
    frame.with_column(Column::new(columns::SEASON.into(), seasons))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    fn write_csv(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn nashik() -> DistrictCanonicalizer {
        DistrictCanonicalizer::new(&BTreeMap::from([(
            "NASIK".to_string(),
            "NASHIK".to_string(),
        )]))
        .unwrap()
    }

    #[test]
    fn test_rainfall_table_on_key_grain() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "rain.csv",
            "date,District,Rainfall_mm\n2019-04-01,NASIK,1.5\n2019-07-02, Pune ,10\n",
        );
        let schema = ClimateSchema::new("date", "District", "Rainfall_mm");

        let frame = read_climate_table(&path, &schema, SourceKind::Rainfall, &nashik()).unwrap();

        assert_eq!(
            frame.get_column_names_str(),
            ["district", "season", "month", "year", "rainfall_mm"]
        );
        let districts: Vec<_> = frame
            .column("district")
            .unwrap()
            .str()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(districts, ["nashik", "pune"]);
        let seasons: Vec<_> = frame
            .column("season")
            .unwrap()
            .str()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(seasons, ["Rabi", "Kharif"]);
        let months: Vec<_> = frame
            .column("month")
            .unwrap()
            .i32()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(months, [4, 7]);
    }

    #[test]
    fn test_temperature_range_columns_are_renamed() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "temp.csv",
            "date,District,mean,min,max\n2012-01-15,Indore,20.5,12.0,29.0\n",
        );
        let schema = ClimateSchema::new("date", "District", "mean").with_range_columns("min", "max");

        let frame = read_climate_table(
            &path,
            &schema,
            SourceKind::Temperature,
            &DistrictCanonicalizer::default(),
        )
        .unwrap();

        assert_eq!(
            frame.get_column_names_str(),
            ["district", "season", "month", "year", "mean_temp", "min_temp", "max_temp"]
        );
        let max = frame.column("max_temp").unwrap().f64().unwrap().get(0);
        assert_eq!(max, Some(29.0));
        let year = frame.column("year").unwrap().i32().unwrap().get(0);
        assert_eq!(year, Some(2012));
    }

    #[test]
    fn test_missing_value_column_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "rain.csv", "date,District,rain\n2019-04-01,Pune,1.0\n");
        let schema = ClimateSchema::new("date", "District", "Rainfall_mm");

        let error = read_climate_table(
            &path,
            &schema,
            SourceKind::Rainfall,
            &DistrictCanonicalizer::default(),
        )
        .unwrap_err();

        assert!(matches!(error, Error::ClimateTable { .. }));
        assert!(error.to_string().contains("Rainfall_mm"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let schema = ClimateSchema::new("date", "District", "Rainfall_mm");
        let result = read_climate_table(
            Path::new("/nonexistent/rain.csv"),
            &schema,
            SourceKind::Rainfall,
            &DistrictCanonicalizer::default(),
        );
        assert!(matches!(result, Err(Error::Io { .. })));
    }

    #[test]
    fn test_vegetation_is_not_a_climate_source() {
        let schema = ClimateSchema::new("date", "District", "ndvi");
        assert!(value_columns(SourceKind::Vegetation, &schema).is_err());
    }
}
