//! Cross-source joining anchored on vegetation rows
//!
//! Monthly NDVI is the anchor. Temperature, then rainfall, are left-joined on
//! the full key, so an NDVI row survives even when no weather record matches;
//! its weather columns are then null, never zero-filled.

use crate::app::services::monthly_aggregator::{key_exprs, sort_exprs};
use crate::{Error, Result};
use polars::prelude::*;
use tracing::{debug, warn};

/// Marker columns telling a matched key apart from a matched null value
const TEMPERATURE_MATCHED: &str = "_temperature_matched";
const RAINFALL_MATCHED: &str = "_rainfall_matched";

/// Match statistics of one fused table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinReport {
    /// Anchor (and output) rows
    pub rows: usize,

    /// Rows whose key has no temperature record
    pub unmatched_temperature: usize,

    /// Rows whose key has no rainfall record
    pub unmatched_rainfall: usize,
}

impl JoinReport {
    pub fn fully_matched(&self) -> bool {
        self.unmatched_temperature == 0 && self.unmatched_rainfall == 0
    }
}

/// Left-join temperature and rainfall onto monthly NDVI
///
/// Weather frames must already be unique per key (monthly aggregates are);
/// a duplicate key would multiply anchor rows and is rejected up front.
pub fn join_sources(
    ndvi: DataFrame,
    temperature: DataFrame,
    rainfall: DataFrame,
) -> Result<(DataFrame, JoinReport)> {
    ensure_unique_keys(&temperature, "temperature")?;
    ensure_unique_keys(&rainfall, "rainfall")?;

    let anchor_rows = ndvi.height();
    let joined = ndvi
        .lazy()
        .join(
            temperature
                .lazy()
                .with_column(lit(true).alias(TEMPERATURE_MATCHED)),
            key_exprs(),
            key_exprs(),
            JoinArgs::new(JoinType::Left),
        )
        .join(
            rainfall
                .lazy()
                .with_column(lit(true).alias(RAINFALL_MATCHED)),
            key_exprs(),
            key_exprs(),
            JoinArgs::new(JoinType::Left),
        )
        .sort_by_exprs(sort_exprs(), SortMultipleOptions::default())
        .collect()?;

    if joined.height() != anchor_rows {
        return Err(Error::join_invariant(anchor_rows, joined.height()));
    }

    let report = JoinReport {
        rows: anchor_rows,
        unmatched_temperature: joined.column(TEMPERATURE_MATCHED)?.null_count(),
        unmatched_rainfall: joined.column(RAINFALL_MATCHED)?.null_count(),
    };
    let joined = joined.drop(TEMPERATURE_MATCHED)?.drop(RAINFALL_MATCHED)?;

    if report.unmatched_temperature > 0 {
        warn!(
            "{} of {} NDVI rows have no temperature match",
            report.unmatched_temperature, report.rows
        );
    }
    if report.unmatched_rainfall > 0 {
        warn!(
            "{} of {} NDVI rows have no rainfall match",
            report.unmatched_rainfall, report.rows
        );
    }
    debug!("Joined sources into {} rows", report.rows);

    Ok((joined, report))
}

fn ensure_unique_keys(frame: &DataFrame, source: &str) -> Result<()> {
    let duplicates = frame
        .clone()
        .lazy()
        .group_by(key_exprs())
        .agg([len().alias("rows")])
        .filter(col("rows").gt(lit(1)))
        .collect()?
        .height();

    if duplicates > 0 {
        return Err(Error::configuration(format!(
            "{} table has {} duplicate keys; aggregate it monthly before joining",
            source, duplicates
        )));
    }
    Ok(())
}
