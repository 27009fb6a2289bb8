//! LandWatch CLI - scheduled land-cover change monitoring

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::error::ErrorKind;
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use landwatch_algorithms::imagery::{
    change_vector_analysis, ndvi_difference, CvaParams, NdviChangeParams,
};
use landwatch_cloud::DateWindow;
use landwatch_core::io::{read_band_image, write_mask};
use landwatch_core::AoiPolygon;
use landwatch_monitor::report::{CvaReport, DetectorReport, DetectorSummary, NdviReport};
use landwatch_monitor::workflow::load_pair;
use landwatch_monitor::{
    notify_all, Alert, ChangeWorkflow, Clock, DetectionSettings, MonitorConfig, MonitoringTask,
    Scheduler, SystemClock,
};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "landwatch")]
#[command(author, version, about = "Scheduled land-cover change monitoring", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults apply when it does not exist)
    #[arg(short, long, global = true, default_value = "landwatch.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run monitoring passes on every tick until Ctrl-C
    Run,
    /// Run a single monitoring pass and print its report
    Pass,
    /// Compare an area between two dates once, without touching the task store
    Check {
        /// GeoJSON polygon, inline or a path to a file
        #[arg(long)]
        geojson: String,
        /// Baseline date (t1), YYYY-MM-DD
        #[arg(long)]
        from: NaiveDate,
        /// Current date (t2), YYYY-MM-DD
        #[arg(long)]
        to: NaiveDate,
        /// Alert threshold as a fraction in (0, 1]
        #[arg(short, long, default_value = "0.25")]
        threshold: f64,
        /// Name used for acquired files and alerts
        #[arg(long, default_value = "adhoc")]
        id: String,
        /// Recipient of the alert email, if one is raised
        #[arg(long)]
        email: Option<String>,
    },
    /// Compare two images with one detector and print a JSON summary
    Detect {
        /// Detector to run
        #[arg(value_enum)]
        method: DetectMethod,
        /// Baseline image (t1)
        before: PathBuf,
        /// Current image (t2)
        after: PathBuf,
        /// Magnitude threshold (cva) or NDVI difference threshold (ndvi)
        #[arg(allow_hyphen_values = true)]
        threshold: Option<String>,
        /// Also write the change mask to this file
        #[arg(long)]
        mask: Option<PathBuf>,
    },
    /// Manage monitoring tasks
    Task {
        #[command(subcommand)]
        action: TaskCommands,
    },
    /// Show information about a multi-band image
    Info {
        /// Input image file
        input: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DetectMethod {
    Cva,
    Ndvi,
}

#[derive(Subcommand)]
enum TaskCommands {
    /// Start monitoring an area
    Add {
        /// AOI identifier (generated when omitted)
        #[arg(long)]
        id: Option<String>,
        /// GeoJSON polygon, inline or a path to a file
        #[arg(long)]
        geojson: String,
        /// Days between checks
        #[arg(short, long, default_value = "7")]
        interval: u32,
        /// Alert threshold as a fraction in (0, 1]
        #[arg(short, long, default_value = "0.25")]
        threshold: f64,
        /// Recipient recorded on alerts
        #[arg(long)]
        email: Option<String>,
    },
    /// List monitored areas
    List,
    /// Stop monitoring an area
    Remove {
        /// AOI identifier
        #[arg(required_unless_present = "all")]
        id: Option<String>,
        /// Remove every task
        #[arg(long, conflicts_with = "id")]
        all: bool,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")
}

fn spinner(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}

fn load_config(path: &Path) -> Result<MonitorConfig> {
    MonitorConfig::load_or_default(Some(path))
        .with_context(|| format!("Failed to load config {}", path.display()))
}

fn build_workflow(config: &MonitorConfig) -> Result<ChangeWorkflow> {
    Ok(ChangeWorkflow::new(
        config.build_gateway().context("Failed to set up acquisition")?,
        config.build_inference().context("Failed to set up inference")?,
        config.detection_settings()?,
    ))
}

fn build_scheduler(config: &MonitorConfig) -> Result<Scheduler> {
    let mut scheduler = Scheduler::new(
        config.task_store(),
        build_workflow(config)?,
        Arc::new(SystemClock),
    )
    .with_tick(config.tick());
    for sink in config.build_sinks().context("Failed to set up alerts")? {
        scheduler = scheduler.with_sink(sink);
    }
    Ok(scheduler)
}

/// Whether the command line names the `detect` subcommand.
fn invoked_detect() -> bool {
    std::env::args().skip(1).any(|a| a == "detect")
}

fn parse_threshold(arg: Option<&str>) -> Result<f64> {
    arg.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|t| t.is_finite())
        .context("Threshold must be a valid number.")
}

/// Inline GeoJSON, or a file holding it.
fn parse_geometry(arg: &str) -> Result<AoiPolygon> {
    let text = if arg.trim_start().starts_with('{') {
        arg.to_string()
    } else {
        std::fs::read_to_string(arg).with_context(|| format!("Failed to read GeoJSON {arg}"))?
    };
    AoiPolygon::from_geojson_str(&text).context("Invalid AOI geometry")
}

fn detect(
    method: DetectMethod,
    before: &Path,
    after: &Path,
    threshold: Option<&str>,
    mask: Option<&Path>,
    settings: &DetectionSettings,
) -> Result<DetectorSummary> {
    let threshold = parse_threshold(threshold)?;
    let (t1, t2) = load_pair(before, after)?;
    let start = Instant::now();
    let summary = match method {
        DetectMethod::Cva => {
            let result = change_vector_analysis(
                &t1,
                &t2,
                &CvaParams {
                    threshold,
                    pixel_area: settings.pixel_area,
                },
            )?;
            if let Some(path) = mask {
                write_mask(&result.mask, path).context("Failed to write mask")?;
            }
            DetectorSummary::Cva(CvaReport::new(&result.summary, threshold))
        }
        DetectMethod::Ndvi => {
            let result = ndvi_difference(
                &t1,
                &t2,
                &NdviChangeParams {
                    threshold,
                    bands: settings.ndvi_bands,
                    pixel_area: settings.pixel_area,
                },
            )?;
            if let Some(path) = mask {
                write_mask(&result.change_mask(), path).context("Failed to write mask")?;
            }
            DetectorSummary::Ndvi(NdviReport::new(&result.summary, threshold))
        }
    };
    info!(elapsed = ?start.elapsed(), "detection finished");
    Ok(summary)
}

fn info_command(input: &Path) -> Result<()> {
    let pb = spinner("Reading image...")?;
    let image = read_band_image(input).context("Failed to read image")?;
    pb.finish_and_clear();

    let (bands, rows, cols) = image.shape();
    let transform = image.transform();
    let bounds = transform.bounds(cols, rows);

    println!("File: {}", input.display());
    println!("Dimensions: {} x {} ({} pixels)", cols, rows, image.pixel_count());
    println!("Bands: {}", bands);
    println!("Cell size: {}", transform.cell_size());
    println!(
        "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
        bounds.0, bounds.1, bounds.2, bounds.3
    );
    if let Some(crs) = image.crs() {
        println!("CRS: {}", crs);
    }
    for b in 0..bands {
        let stats = image.band_raster(b)?.statistics();
        print!("Band {}:", b + 1);
        if let (Some(min), Some(max), Some(mean)) = (stats.min, stats.max, stats.mean) {
            print!(" min {:.4}  max {:.4}  mean {:.4}", min, max, mean);
        }
        println!("  valid {}", stats.valid_count);
    }
    Ok(())
}

async fn check_command(
    config: &MonitorConfig,
    id: String,
    geojson: &str,
    from: NaiveDate,
    to: NaiveDate,
    threshold: f64,
    email: Option<String>,
) -> Result<()> {
    if from > to {
        bail!("--from {from} is after --to {to}");
    }
    let mut task = MonitoringTask::new(id, parse_geometry(geojson)?, 1, threshold);
    task.email_recipient = email;

    let workflow = build_workflow(config)?;
    let sinks = config.build_sinks().context("Failed to set up alerts")?;
    let pb = spinner("Acquiring and comparing images...")?;
    let outcome = workflow
        .compare(&task, DateWindow::single(from), DateWindow::single(to))
        .await;
    pb.finish_and_clear();
    let report = outcome.context("Change check failed")?;

    if report.decision.alerted {
        notify_all(&sinks, &Alert::from_check(&task, &report)).await;
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn task_command(config: &MonitorConfig, action: TaskCommands) -> Result<()> {
    let store = config.task_store();
    match action {
        TaskCommands::Add {
            id,
            geojson,
            interval,
            threshold,
            email,
        } => {
            let aoi_id = id.unwrap_or_else(|| format!("aoi-{}", Utc::now().timestamp_millis()));
            let mut task = MonitoringTask::new(aoi_id, parse_geometry(&geojson)?, interval, threshold);
            task.email_recipient = email;
            let id = task.aoi_id.clone();
            store.add(task).context("Failed to add task")?;
            println!("Monitoring {} every {} days", id, interval);
        }
        TaskCommands::List => {
            let tasks = store.load()?;
            if tasks.is_empty() {
                println!("No monitored areas in {}", store.path().display());
                return Ok(());
            }
            let today = SystemClock.today();
            println!(
                "{:<24} {:>8} {:>9}  {:<12} {:<4} {}",
                "AOI", "INTERVAL", "THRESHOLD", "LAST CHECK", "DUE", "BBOX"
            );
            for t in &tasks {
                let last = t
                    .last_checked_date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "never".into());
                let bbox = match t.geometry.bbox() {
                    Ok(b) => {
                        let [w, s, e, n] = b.to_array();
                        format!("{w:.4},{s:.4},{e:.4},{n:.4}")
                    }
                    Err(_) => "invalid".into(),
                };
                println!(
                    "{:<24} {:>7}d {:>9.2}  {:<12} {:<4} {}",
                    t.aoi_id,
                    t.monitoring_interval_days,
                    t.threshold,
                    last,
                    if t.is_due(today) { "yes" } else { "no" },
                    bbox
                );
            }
        }
        TaskCommands::Remove { id, all } => {
            if all {
                let n = store.clear()?;
                println!("Removed {} tasks", n);
            } else if let Some(id) = id {
                let removed = store.remove(&id)?;
                println!("Stopped monitoring {}", removed.aoi_id);
            }
        }
    }
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // detect answers in JSON on every path, including bad arguments
        Err(e)
            if invoked_detect()
                && !matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) =>
        {
            let rendered = e.to_string();
            let message = rendered
                .lines()
                .next()
                .unwrap_or_default()
                .trim_start_matches("error: ");
            eprintln!("{}", DetectorReport::error(message).to_json_line());
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => e.exit(),
    };
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Run => {
            let config = load_config(&cli.config)?;
            let scheduler = build_scheduler(&config)?;
            scheduler
                .run(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!(error = %e, "cannot listen for Ctrl-C");
                        std::future::pending::<()>().await;
                    }
                })
                .await;
        }

        Commands::Pass => {
            let config = load_config(&cli.config)?;
            let report = build_scheduler(&config)?
                .run_pass()
                .await
                .context("Monitoring pass failed")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Detect {
            method,
            before,
            after,
            threshold,
            mask,
        } => {
            let outcome = load_config(&cli.config)
                .and_then(|c| Ok(c.detection_settings()?))
                .and_then(|s| {
                    detect(method, &before, &after, threshold.as_deref(), mask.as_deref(), &s)
                });
            return Ok(match outcome {
                Ok(summary) => {
                    println!("{}", DetectorReport::success(summary).to_json_line());
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("{}", DetectorReport::error(format!("{e:#}")).to_json_line());
                    ExitCode::FAILURE
                }
            });
        }

        Commands::Check {
            geojson,
            from,
            to,
            threshold,
            id,
            email,
        } => {
            let config = load_config(&cli.config)?;
            check_command(&config, id, &geojson, from, to, threshold, email).await?;
        }

        Commands::Task { action } => {
            let config = load_config(&cli.config)?;
            task_command(&config, action)?;
        }

        Commands::Info { input } => info_command(&input)?,
    }

    Ok(ExitCode::SUCCESS)
}
