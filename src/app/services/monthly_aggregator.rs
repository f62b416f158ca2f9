//! Per-source monthly aggregation
//!
//! Every source is reduced to one row per (district, season, month, year) by
//! averaging its value columns. Several rasters or daily records sharing a
//! key are averaged, never last-write-wins. Nulls are ignored by the mean;
//! a group with only nulls stays null.

use crate::app::models::VegetationObservation;
use crate::constants::columns;
use crate::Result;
use polars::prelude::*;
use tracing::debug;

/// Key expressions in key order
pub(crate) fn key_exprs() -> Vec<Expr> {
    columns::KEY.into_iter().map(col).collect()
}

/// Output ordering: district, then year, then month
pub(crate) fn sort_exprs() -> [Expr; 3] {
    [
        col(columns::DISTRICT),
        col(columns::YEAR),
        col(columns::MONTH),
    ]
}

/// Average every non-key column per key
pub fn aggregate_monthly(frame: DataFrame) -> Result<DataFrame> {
    let rows_in = frame.height();
    let values: Vec<Expr> = frame
        .get_column_names_str()
        .into_iter()
        .filter(|name| !columns::KEY.contains(name))
        .map(|name| col(name).mean())
        .collect();

    let aggregated = frame
        .lazy()
        .group_by(key_exprs())
        .agg(values)
        .sort_by_exprs(sort_exprs(), SortMultipleOptions::default())
        .collect()?;

    debug!(
        "Aggregated {} rows into {} monthly keys",
        rows_in,
        aggregated.height()
    );
    Ok(aggregated)
}

/// Lay out zonal observations as a frame on the key grain
pub fn observations_frame(observations: &[VegetationObservation]) -> Result<DataFrame> {
    let districts: Vec<&str> = observations
        .iter()
        .map(|o| o.key.district())
        .collect();
    let seasons: Vec<&str> = observations.iter().map(|o| o.key.season().as_str()).collect();
    let months: Vec<i32> = observations.iter().map(|o| o.key.month() as i32).collect();
    let years: Vec<i32> = observations.iter().map(|o| o.key.year()).collect();
    let means: Vec<Option<f64>> = observations.iter().map(|o| o.mean_ndvi).collect();

    let frame = DataFrame::new(vec![
        Column::new(columns::DISTRICT.into(), districts),
        Column::new(columns::SEASON.into(), seasons),
        Column::new(columns::MONTH.into(), months),
        Column::new(columns::YEAR.into(), years),
        Column::new(columns::MEAN_NDVI.into(), means),
    ])?;
    Ok(frame)
}

/// Monthly NDVI means from raw zonal observations
pub fn aggregate_vegetation(observations: &[VegetationObservation]) -> Result<DataFrame> {
    aggregate_monthly(observations_frame(observations)?)
}
