//! Command implementations for the fusion CLI
//!
//! This module contains the command execution logic: logging setup,
//! layered configuration loading, the per-state run loop and the final
//! summary report.

use crate::app::services::pipeline::{StatePipeline, StateReport};
use crate::cli::args::{Args, Commands, ConfigArgs, FuseArgs, ReportFormat, StateList};
use crate::config::FusionConfig;
use crate::constants::CONFIG_ENV_VAR;
use crate::{Error, Result};
use colored::Colorize;
use indicatif::HumanDuration;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Outcome of a fuse run across all selected states
#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<StateReport>,
    /// (state, error message) for every state that could not be fused
    pub failures: Vec<(String, String)>,
    pub duration: Duration,
}

impl RunSummary {
    pub fn total_rows(&self) -> usize {
        self.reports.iter().map(StateReport::rows_written).sum()
    }

    pub fn total_files(&self) -> usize {
        self.reports.iter().map(|report| report.written.len()).sum()
    }
}

/// Main command dispatcher
pub async fn run(args: Args, cancel: CancellationToken) -> Result<()> {
    match args.command {
        Some(Commands::Fuse(fuse_args)) => {
            run_fuse(&fuse_args, cancel).await?;
            Ok(())
        }
        Some(Commands::Config(config_args)) => show_config(&config_args),
        None => Err(Error::configuration("No command given")),
    }
}

/// Fuse every selected state
pub async fn run_fuse(args: &FuseArgs, cancel: CancellationToken) -> Result<RunSummary> {
    let start_time = Instant::now();

    setup_logging(args.get_log_level(), args.quiet)?;
    info!("Starting agro-climatic fusion");
    debug!("Command line arguments: {:?}", args);

    args.validate()?;

    let config = load_configuration(args.config_file.as_deref())?;
    let config = apply_cli_overrides(config, args)?;
    config.validate()?;
    debug!("Effective configuration: {:?}", config);

    let mut summary = RunSummary::default();
    for state in &config.states {
        let pipeline = StatePipeline::new(state.clone(), &config);
        match pipeline.run(cancel.clone()).await {
            Ok(report) => summary.reports.push(report),
            Err(e) => {
                error!("Failed to fuse {}: {}", state.name, e);
                if is_critical_error(&e) {
                    return Err(e);
                }
                summary.failures.push((state.name.clone(), e.to_string()));
            }
        }
    }
    summary.duration = start_time.elapsed();

    generate_final_report(args.report, &summary)?;

    if !summary.failures.is_empty() {
        return Err(Error::states_failed(
            summary.failures.len(),
            config.states.len(),
        ));
    }
    Ok(summary)
}

/// Print the effective configuration as JSON
fn show_config(args: &ConfigArgs) -> Result<()> {
    let config = load_configuration(args.config_file.as_deref())?;
    let config = match &args.states {
        Some(list) => {
            let states = select_states(&config, list)?;
            config.with_states(states)
        }
        None => config,
    };

    let json = serde_json::to_string_pretty(&config)
        .map_err(|e| Error::config_parse("<effective configuration>", e))?;
    println!("{}", json);
    Ok(())
}

/// Set up structured logging on stderr
fn setup_logging(log_level: &str, quiet: bool) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("agroclim_fusion={}", log_level)));

    let result = if quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
    result.map_err(|e| Error::configuration(format!("Failed to initialize logging: {}", e)))?;

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

/// Load configuration: explicit file, then the environment variable, then presets
fn load_configuration(config_file: Option<&Path>) -> Result<FusionConfig> {
    let from_env = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
    let path = config_file.map(Path::to_path_buf).or(from_env);

    match path {
        Some(path) => {
            info!("Using config file: {}", path.display());
            FusionConfig::from_json_file(&path)
        }
        None => {
            info!("No config file given, using built-in state presets");
            Ok(FusionConfig::default())
        }
    }
}

/// Resolve state selectors against the configuration
fn select_states(config: &FusionConfig, list: &StateList) -> Result<Vec<crate::StateConfig>> {
    list.states
        .iter()
        .map(|selector| {
            config.state(selector).cloned().ok_or_else(|| {
                let known: Vec<&str> = config.states.iter().map(|s| s.code.as_str()).collect();
                Error::configuration(format!(
                    "Unknown state '{}'. Configured states: {}",
                    selector,
                    known.join(", ")
                ))
            })
        })
        .collect()
}

/// Apply CLI argument overrides to the configuration
fn apply_cli_overrides(mut config: FusionConfig, args: &FuseArgs) -> Result<FusionConfig> {
    if let Some(list) = &args.states {
        config.states = select_states(&config, list)?;
    }

    if args.has_path_overrides() && config.states.len() != 1 {
        return Err(Error::configuration(format!(
            "Path overrides need exactly one selected state, found {}",
            config.states.len()
        )));
    }

    for state in &mut config.states {
        if let Some(path) = &args.boundary {
            state.boundary_path = path.clone();
        }
        if let Some(path) = &args.rainfall {
            state.rainfall_path = path.clone();
        }
        if let Some(path) = &args.temperature {
            state.temperature_path = path.clone();
        }
        if let Some(path) = &args.rasters {
            state.raster_dir = path.clone();
        }
        if let Some(path) = &args.output {
            state.output_dir = path.clone();
        }
    }

    if let Some(root) = &args.data_root {
        config.states = config
            .states
            .into_iter()
            .map(|state| state.rebased(root))
            .collect();
    }

    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(format) = args.format {
        config.output_format = format.into();
    }
    if let Some(prefix) = &args.prefix {
        config.file_prefix = prefix.clone();
    }
    config.show_progress = args.show_progress();

    Ok(config)
}

/// Errors that stop the whole run instead of one state
fn is_critical_error(error: &Error) -> bool {
    matches!(
        error,
        Error::Configuration { .. } | Error::ProcessingInterrupted { .. }
    )
}

/// Generate the final run report
fn generate_final_report(format: ReportFormat, summary: &RunSummary) -> Result<()> {
    match format {
        ReportFormat::Human => generate_human_report(summary),
        ReportFormat::Json => generate_json_report(summary),
        ReportFormat::Csv => generate_csv_report(summary),
    }
}

/// Generate human-readable report
fn generate_human_report(summary: &RunSummary) -> Result<()> {
    println!("\n{}", "Agro-climatic fusion complete".bright_green().bold());
    println!("{}", "=".repeat(40).dimmed());

    for report in &summary.reports {
        println!("{}", report.state.bright_cyan().bold());
        println!(
            "   Districts: {}    Rasters: {} processed, {} skipped, {} failed",
            report.boundary.districts_loaded,
            report.batch.processed,
            report.batch.parse_skipped.len(),
            report.batch.io_failed.len()
        );
        println!(
            "   Rows: {}    Unmatched temperature: {}    Unmatched rainfall: {}",
            report.join.rows, report.join.unmatched_temperature, report.join.unmatched_rainfall
        );
        for table in &report.written {
            println!("   {} ({} rows)", table.path.display(), table.rows);
        }
        if !report.join.fully_matched() {
            println!(
                "   {}",
                "Some rows have no weather match; check district spellings".yellow()
            );
        }
    }

    for (state, message) in &summary.failures {
        println!("{} {}: {}", "Failed".bright_red().bold(), state, message);
    }

    println!(
        "\nWrote {} rows to {} files in {}",
        summary.total_rows(),
        summary.total_files(),
        HumanDuration(summary.duration)
    );
    Ok(())
}

/// Generate JSON report for machine consumption
fn generate_json_report(summary: &RunSummary) -> Result<()> {
    let states: Vec<serde_json::Value> = summary
        .reports
        .iter()
        .map(|report| {
            serde_json::json!({
                "state": report.state,
                "districts": report.boundary.districts_loaded,
                "rasters_processed": report.batch.processed,
                "rasters_skipped": report.batch.parse_skipped.len(),
                "rasters_failed": report.batch.io_failed.len(),
                "rows": report.join.rows,
                "unmatched_temperature": report.join.unmatched_temperature,
                "unmatched_rainfall": report.join.unmatched_rainfall,
                "files": report.written.iter().map(|table| serde_json::json!({
                    "year": table.year,
                    "path": table.path.display().to_string(),
                    "rows": table.rows,
                })).collect::<Vec<_>>(),
            })
        })
        .collect();

    let json = serde_json::json!({
        "finished_at": chrono::Utc::now().to_rfc3339(),
        "processing_time_seconds": summary.duration.as_secs_f64(),
        "states": states,
        "failures": summary.failures.iter().map(|(state, message)| serde_json::json!({
            "state": state,
            "error": message,
        })).collect::<Vec<_>>(),
    });

    let text = serde_json::to_string_pretty(&json)
        .map_err(|e| Error::config_parse("<run report>", e))?;
    println!("{}", text);
    Ok(())
}

/// Generate CSV report, one row per state
fn generate_csv_report(summary: &RunSummary) -> Result<()> {
    println!("state,districts,rasters_processed,rasters_skipped,rasters_failed,rows,unmatched_temperature,unmatched_rainfall,files");
    for report in &summary.reports {
        println!(
            "{},{},{},{},{},{},{},{},{}",
            report.state,
            report.boundary.districts_loaded,
            report.batch.processed,
            report.batch.parse_skipped.len(),
            report.batch.io_failed.len(),
            report.join.rows,
            report.join.unmatched_temperature,
            report.join.unmatched_rainfall,
            report.written.len()
        );
    }
    Ok(())
}
