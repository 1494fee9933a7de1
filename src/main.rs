use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::Parser;
use skyview_irradiance::dataset::DatasetIO;
use skyview_irradiance::irradiance::{ghi_to_watts, PANEL_EFFICIENCY, PANEL_SURFACE};
use skyview_irradiance::sun_position::SunCalculator;
use skyview_irradiance::{
    CapturePoint, ClassificationMethod, Config, IrradianceEngine, SolarSample, WeatherTable,
};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "skyview-irradiance")]
#[command(about = "Estimate ground-level irradiance from street-view panoramas")]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Output CSV, overrides paths.output
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Classification method, overrides the configured one
    #[arg(short, long, value_enum)]
    method: Option<ClassificationMethod>,

    /// Log level, RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.to_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if args.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn solar_positions(config: &Config, points: &[CapturePoint]) -> Result<Vec<(NaiveDateTime, SolarSample)>> {
    let date = config.day()?;

    if let Some(path) = &config.paths.solar_positions {
        let positions = DatasetIO::read_solar_positions(path, date)
            .with_context(|| format!("Failed to read solar positions from {}", path.display()))?;
        info!(rows = positions.len(), path = %path.display(), "Loaded solar positions");
        return Ok(positions);
    }

    let site = config.site_point(points)?;
    let mut calculator = SunCalculator::new(site.y(), site.x(), config.angle_precision);
    let positions = calculator.day_series(date, config.tz()?, config.interval_minutes);
    info!(
        rows = positions.len(),
        latitude = site.y(),
        longitude = site.x(),
        "Generated solar positions"
    );
    Ok(positions)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args);

    let mut config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config {}", args.config.display()))?;
    if let Some(output) = args.output {
        config.paths.output = output;
    }
    if let Some(method) = args.method {
        config.method = method;
    }
    info!(date = %config.date, method = ?config.method, "Loaded configuration");

    let points = DatasetIO::read_headings(&config.paths.headings).with_context(|| {
        format!("Failed to read headings from {}", config.paths.headings.display())
    })?;
    let weather = DatasetIO::read_weather(&config.paths.weather).with_context(|| {
        format!("Failed to read weather from {}", config.paths.weather.display())
    })?;
    let positions = solar_positions(&config, &points)?;

    let mut table = WeatherTable::merge(&positions, &weather);
    info!(points = points.len(), rows = table.len(), "Merged weather onto solar positions");

    let engine = IrradianceEngine::new(config.clone())?;
    let report = engine.run_batch_from_disk(&points, &table)?;

    for result in &report.results {
        let peak = result
            .irradiance
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(f64::NAN, f64::max);
        info!(
            num_id = %result.num_id,
            svf = result.svf,
            tvf = ?result.tvf,
            peak_irradiance = peak,
            peak_panel_watts = ghi_to_watts(peak, PANEL_EFFICIENCY, PANEL_SURFACE),
            "Point summary"
        );
    }
    for failure in &report.failures {
        warn!(num_id = %failure.num_id, error = %failure.error, "Skipped point");
    }

    table.append_results(&report.results)?;
    DatasetIO::write_csv(&config.paths.output, &table)
        .with_context(|| format!("Failed to write {}", config.paths.output.display()))?;

    info!(
        output = %config.paths.output.display(),
        succeeded = report.results.len(),
        failed = report.failures.len(),
        "Wrote irradiance table"
    );

    Ok(())
}
