//! Per-state fusion pipeline
//!
//! Wires every stage for one state: boundary loading, the concurrent raster
//! batch, monthly aggregation of all three sources, the anchored joins, crop
//! annotation and year-partitioned output.
//!
//! A boundary failure aborts the state, as does a climate table that exists
//! but does not match its configured schema. A missing raster directory or a
//! missing or unopenable climate table is logged and treated as an empty
//! source, which shows up downstream as missing values rather than dropped
//! rows.

use crate::app::models::SourceKind;
use crate::app::services::canonicalizer::DistrictCanonicalizer;
use crate::app::services::climate_reader::{read_climate_table, value_columns};
use crate::app::services::crop_annotator::annotate_crops;
use crate::app::services::district_registry::{
    DistrictRegistry, GeoJsonBoundarySource, LoadStats,
};
use crate::app::services::joiner::{JoinReport, join_sources};
use crate::app::services::monthly_aggregator::{aggregate_monthly, aggregate_vegetation};
use crate::app::services::raster_batch::{BatchReport, discover_rasters, process_rasters};
use crate::app::services::year_writer::{WrittenTable, YearWriter};
use crate::config::{ClimateSchema, FusionConfig, StateConfig};
use crate::constants::columns;
use crate::{Error, Result};
use polars::prelude::*;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Everything that happened while fusing one state
#[derive(Debug)]
pub struct StateReport {
    pub state: String,
    pub boundary: LoadStats,
    pub batch: BatchReport,
    pub temperature_rows: usize,
    pub rainfall_rows: usize,
    pub join: JoinReport,
    pub written: Vec<WrittenTable>,
    pub duration: Duration,
}

impl StateReport {
    /// Rows written across all year tables
    pub fn rows_written(&self) -> usize {
        self.written.iter().map(|table| table.rows).sum()
    }
}

/// Fusion pipeline for one state
#[derive(Debug, Clone)]
pub struct StatePipeline {
    state: StateConfig,
    workers: usize,
    show_progress: bool,
    writer: YearWriter,
}

impl StatePipeline {
    /// Build a pipeline from a state and the run-wide settings
    pub fn new(state: StateConfig, config: &FusionConfig) -> Self {
        let writer = YearWriter::new(
            state.output_dir.clone(),
            config.file_prefix.clone(),
            config.output_format,
        );
        Self {
            state,
            workers: config.effective_workers(),
            show_progress: config.show_progress,
            writer,
        }
    }

    pub fn state(&self) -> &StateConfig {
        &self.state
    }

    /// Run every stage and write the year tables
    pub async fn run(&self, cancel: CancellationToken) -> Result<StateReport> {
        let start = Instant::now();
        let state = &self.state;
        state.validate()?;
        let canonicalizer = state.canonicalizer()?;

        info!("Fusing sources for {}", state.name);

        let source =
            GeoJsonBoundarySource::new(state.boundary_path.clone(), state.boundary_schema.clone());
        let (registry, boundary) = DistrictRegistry::load(&source, &state.name, &canonicalizer)?;
        let registry = Arc::new(registry);

        let rasters = discover_rasters(&state.raster_dir).unwrap_or_else(|e| {
            warn!("No rasters for {}: {}", state.name, e);
            Vec::new()
        });
        let batch = process_rasters(
            rasters,
            Arc::clone(&registry),
            self.workers,
            cancel,
            self.show_progress,
        )
        .await?;

        if batch.was_cancelled() {
            return Err(Error::processing_interrupted(format!(
                "{} raster batch cancelled after {} files",
                state.name, batch.processed
            )));
        }

        let ndvi = aggregate_vegetation(&batch.observations)?;
        let temperature = monthly_climate(
            &state.temperature_path,
            &state.temperature_schema,
            SourceKind::Temperature,
            &canonicalizer,
        )?;
        let rainfall = monthly_climate(
            &state.rainfall_path,
            &state.rainfall_schema,
            SourceKind::Rainfall,
            &canonicalizer,
        )?;
        let temperature_rows = temperature.height();
        let rainfall_rows = rainfall.height();

        let (fused, join) = join_sources(ndvi, temperature, rainfall)?;
        let annotated = annotate_crops(fused, state)?;
        let written = self.writer.write(&annotated)?;

        let report = StateReport {
            state: state.name.clone(),
            boundary,
            batch,
            temperature_rows,
            rainfall_rows,
            join,
            written,
            duration: start.elapsed(),
        };
        info!(
            "Finished {}: {} rows in {} year tables ({:.1}s)",
            report.state,
            report.rows_written(),
            report.written.len(),
            report.duration.as_secs_f64()
        );
        Ok(report)
    }
}

/// Monthly aggregate of a climate table
///
/// A table that cannot be opened becomes an empty source; any other read
/// failure is returned.
fn monthly_climate(
    path: &Path,
    schema: &ClimateSchema,
    kind: SourceKind,
    canonicalizer: &DistrictCanonicalizer,
) -> Result<DataFrame> {
    match read_climate_table(path, schema, kind, canonicalizer) {
        Ok(frame) => aggregate_monthly(frame),
        Err(e) if e.is_io() => {
            warn!(
                "{} table unavailable, every row will lack {} values: {}",
                kind, kind, e
            );
            empty_climate_frame(kind, schema)
        }
        Err(e) => Err(e),
    }
}

/// A zero-row frame with the columns a climate source would contribute
pub fn empty_climate_frame(kind: SourceKind, schema: &ClimateSchema) -> Result<DataFrame> {
    let mut frame = vec![
        Column::new_empty(columns::DISTRICT.into(), &DataType::String),
        Column::new_empty(columns::SEASON.into(), &DataType::String),
        Column::new_empty(columns::MONTH.into(), &DataType::Int32),
        Column::new_empty(columns::YEAR.into(), &DataType::Int32),
    ];
    for (_, target) in value_columns(kind, schema)? {
        frame.push(Column::new_empty(target.into(), &DataType::Float64));
    }
    Ok(DataFrame::new(frame)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_temperature_frame_has_range_columns() {
        let schema = StateConfig::madhya_pradesh().temperature_schema;
        let frame = empty_climate_frame(SourceKind::Temperature, &schema).unwrap();
        assert_eq!(frame.height(), 0);
        assert_eq!(
            frame.get_column_names_str(),
            ["district", "season", "month", "year", "mean_temp", "min_temp", "max_temp"]
        );
    }

    #[test]
    fn test_pipeline_uses_run_settings() {
        let config = FusionConfig::default().with_workers(3).with_file_prefix("fused");
        let pipeline = StatePipeline::new(StateConfig::maharashtra(), &config);
        assert_eq!(pipeline.workers, 3);
        assert_eq!(
            pipeline.writer.path_for(2019),
            Path::new("analysis_MH/fused_2019.csv")
        );
    }

    #[test]
    fn test_missing_climate_table_becomes_empty_source() {
        let state = StateConfig::maharashtra();
        let frame = monthly_climate(
            Path::new("/nonexistent/MH_temperature.csv"),
            &state.temperature_schema,
            SourceKind::Temperature,
            &state.canonicalizer().unwrap(),
        )
        .unwrap();
        assert_eq!(frame.height(), 0);
        assert!(frame.column(columns::MEAN_TEMP).is_ok());
    }

    #[test]
    fn test_climate_table_with_wrong_columns_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("MH_temperature.csv");
        std::fs::write(&path, "date,District,Mean_Temperature\n2019-04-03,NASHIK,30.0\n").unwrap();
        let state = StateConfig::maharashtra();

        let result = monthly_climate(
            &path,
            &state.temperature_schema,
            SourceKind::Temperature,
            &state.canonicalizer().unwrap(),
        );
        assert!(matches!(result, Err(Error::ClimateTable { .. })));
    }

    #[tokio::test]
    async fn test_missing_boundary_aborts_the_state() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = StateConfig::maharashtra().rebased(dir.path());
        let pipeline = StatePipeline::new(state, &FusionConfig::default());

        let result = pipeline.run(CancellationToken::new()).await;
        assert!(matches!(result, Err(Error::Io { .. })));
    }
}
