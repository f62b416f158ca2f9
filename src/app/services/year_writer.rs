//! Year-partitioned table writing
//!
//! Splits a fused table by its `year` column and writes one file per year,
//! `<prefix>_<year>.<ext>`. Each file is written to a temporary sibling and
//! renamed into place, so a rerun replaces earlier output atomically and a
//! crash never leaves a truncated table under the final name.

use crate::config::OutputFormat;
use crate::constants::{PARTIAL_FILE_SUFFIX, columns};
use crate::{Error, Result};
use polars::prelude::*;
use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One written year table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenTable {
    pub year: i32,
    pub path: PathBuf,
    pub rows: usize,
}

/// Writes one table per distinct year
#[derive(Debug, Clone)]
pub struct YearWriter {
    output_dir: PathBuf,
    prefix: String,
    format: OutputFormat,
}

impl YearWriter {
    pub fn new(output_dir: impl Into<PathBuf>, prefix: impl Into<String>, format: OutputFormat) -> Self {
        Self {
            output_dir: output_dir.into(),
            prefix: prefix.into(),
            format,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Final path of the table for `year`
    pub fn path_for(&self, year: i32) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}.{}", self.prefix, year, self.format.extension()))
    }

    /// Write every year present in `frame`, in ascending year order
    ///
    /// Rows with a null year cannot be placed and are not written.
    pub fn write(&self, frame: &DataFrame) -> Result<Vec<WrittenTable>> {
        let years: BTreeSet<i32> = frame
            .column(columns::YEAR)?
            .i32()?
            .into_iter()
            .flatten()
            .collect();

        if years.is_empty() {
            info!("No rows to write to {}", self.output_dir.display());
            return Ok(Vec::new());
        }

        std::fs::create_dir_all(&self.output_dir).map_err(|e| {
            Error::io(
                format!("Failed to create output directory {}", self.output_dir.display()),
                e,
            )
        })?;

        let mut written = Vec::with_capacity(years.len());
        for year in years {
            let mut partition = frame
                .clone()
                .lazy()
                .filter(col(columns::YEAR).eq(lit(year)))
                .collect()?;
            let path = self.path_for(year);
            self.write_atomic(&mut partition, &path)?;

            debug!("Wrote {} rows to {}", partition.height(), path.display());
            written.push(WrittenTable {
                year,
                path,
                rows: partition.height(),
            });
        }

        info!(
            "Wrote {} year tables to {}",
            written.len(),
            self.output_dir.display()
        );
        Ok(written)
    }

    fn write_atomic(&self, frame: &mut DataFrame, path: &Path) -> Result<()> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = tempfile::Builder::new()
            .prefix(&format!(".{}", file_name))
            .suffix(PARTIAL_FILE_SUFFIX)
            .tempfile_in(&self.output_dir)
            .map_err(|e| Error::io(format!("Failed to create temporary file for {}", path.display()), e))?;

        let file: &File = temp.as_file();
        match self.format {
            OutputFormat::Csv => {
                CsvWriter::new(file)
                    .include_header(true)
                    .finish(frame)
                    .map_err(|e| Error::polars(format!("Failed to write {}", path.display()), e))?;
            }
            OutputFormat::Parquet => {
                ParquetWriter::new(file)
                    .with_compression(ParquetCompression::Snappy)
                    .finish(frame)
                    .map_err(|e| Error::polars(format!("Failed to write {}", path.display()), e))?;
            }
        }

        temp.persist(path)
            .map_err(|e| Error::io(format!("Failed to move table into {}", path.display()), e.error))?;
        Ok(())
    }
}
