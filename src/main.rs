//! enviro_web - Enviro sensor board logger binary
//!
//! Samples the board, persists daily logs and serves readings over HTTP.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use enviro_web::hardware::{open_fan, DisplayPanel, LogDisplay, SharedFan};
use enviro_web::sensors::drivers::{SysfsThermometer, CPU_THERMAL_ZONE};
use enviro_web::sensors::simulated;
use enviro_web::{
    start_web_server, AppState, EnviroConfig, OpenWeatherClient, PersistenceStore, QueryEngine,
    RangeSelector, Reading, ReadingSnapshot, Scheduler, SensorArray, SensorDrivers, Shutdown,
    WeatherCache, DEFAULT_WEB_PORT,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn, Level};
use tracing_subscriber::{filter::LevelFilter, EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "enviro_web")]
#[command(about = "Enviro sensor board logger with daily history")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Austin Couch")]
#[command(long_about = "Samples an Enviro sensor board, keeps daily JSON logs and serves readings over HTTP")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file (defaults to ./enviro.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Web server bind address (overrides the config file)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Web server port (overrides the config file)
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample continuously and serve readings (default)
    Serve,

    /// Take a single reading and exit
    Snapshot(SnapshotArgs),

    /// Print stored readings for a range as JSON
    History(HistoryArgs),
}

#[derive(Args)]
struct SnapshotArgs {
    /// Output format: json or pretty
    #[arg(short, long, default_value = "pretty")]
    format: String,
}

#[derive(Args)]
struct HistoryArgs {
    /// Range to print: day, week, month or year
    #[arg(short, long, default_value = "day")]
    range: RangeSelector,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = EnviroConfig::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;
    apply_overrides(&cli, &mut config);

    init_logging(&cli, &config)?;

    match &cli.command {
        Some(Commands::Serve) | None => {
            print_banner();
            serve_command(config).await?;
        }
        Some(Commands::Snapshot(args)) => snapshot_command(&config, args).await?,
        Some(Commands::History(args)) => history_command(&config, args).await?,
    }

    Ok(())
}

fn apply_overrides(cli: &Cli, config: &mut EnviroConfig) {
    if let Some(host) = &cli.host {
        config.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
}

fn log_level(cli: &Cli, config: &EnviroConfig) -> Level {
    if cli.debug || config.logging.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    }
}

fn init_logging(cli: &Cli, config: &EnviroConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(log_level(cli, config)).into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

fn print_banner() {
    println!("enviro_web - Enviro sensor board logger");
    println!("   Version: {}", env!("CARGO_PKG_VERSION"));
    println!();
}

/// Simulated board, with the real CPU thermometer when the host has one.
fn board_drivers() -> SensorDrivers {
    let mut drivers = simulated::drivers();
    if Path::new(CPU_THERMAL_ZONE).exists() {
        drivers.reference = Box::new(SysfsThermometer::default());
    } else {
        warn!("{} not found, CPU temperature is simulated", CPU_THERMAL_ZONE);
    }
    drivers
}

fn build_sensors(config: &EnviroConfig) -> anyhow::Result<SensorArray> {
    let weather = if config.weather.enabled {
        let client = OpenWeatherClient::new(&config.weather, config.units())
            .context("Failed to build weather client")?;
        info!(
            "Weather integration enabled, refreshing every {:?}",
            config.weather.call_interval()
        );
        Some(Arc::new(WeatherCache::new(
            Box::new(client),
            config.weather.call_interval(),
        )))
    } else {
        None
    };

    Ok(SensorArray::from_config(config, board_drivers(), weather))
}

async fn serve_command(config: EnviroConfig) -> anyhow::Result<()> {
    info!("Starting enviro_web...");

    let store = PersistenceStore::new(&config.sampling.data_dir);
    store
        .init()
        .await
        .with_context(|| format!("Failed to create {}", config.sampling.data_dir.display()))?;
    info!("Daily logs in {}", config.sampling.data_dir.display());

    let shutdown = Shutdown::new();
    let mut sensors = build_sensors(&config)?;
    let initial = sensors
        .sample(&shutdown)
        .await
        .context("Failed to take the initial reading")?;
    let snapshot = Arc::new(ReadingSnapshot::new(initial));

    let mut scheduler = Scheduler::new(
        sensors,
        Arc::clone(&snapshot),
        store.clone(),
        config.sampling.idle_time(),
        config.sampling.save_interval_minutes,
    );
    if config.display.lcd_enabled {
        scheduler =
            scheduler.with_display(DisplayPanel::new(Box::new(LogDisplay::new()), config.units()));
    }

    let fan: Option<SharedFan> = if config.fan.enabled {
        let fan = open_fan(config.fan.gpio_pin).context("Failed to open fan")?;
        Some(Arc::new(Mutex::new(fan)))
    } else {
        None
    };

    let mut state = AppState::new(Arc::clone(&snapshot), QueryEngine::new(store));
    if let Some(fan) = &fan {
        state = state.with_fan(Arc::clone(fan));
    }

    info!("Configuration:");
    info!("  - Bind address: {}", config.server.bind_address());
    info!("  - Units: {}", config.units());
    info!("  - Sample interval: {:?}", config.sampling.idle_time());
    info!(
        "  - Save interval: {} minutes",
        config.sampling.save_interval_minutes
    );

    let handle = scheduler.spawn(shutdown);

    let served = start_web_server(config.server.clone(), state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
        }
        info!("Shutdown requested");
    })
    .await;

    handle.shutdown(fan).await?;
    served?;
    Ok(())
}

async fn snapshot_command(config: &EnviroConfig, args: &SnapshotArgs) -> anyhow::Result<()> {
    let mut sensors = build_sensors(config)?;
    let reading = sensors.sample(&Shutdown::new()).await?;

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&reading)?),
        "pretty" => print_pretty_reading(&reading),
        other => anyhow::bail!("Unsupported format: {}. Use 'json' or 'pretty'", other),
    }

    Ok(())
}

async fn history_command(config: &EnviroConfig, args: &HistoryArgs) -> anyhow::Result<()> {
    let engine = QueryEngine::new(PersistenceStore::new(&config.sampling.data_dir));
    let readings = engine.query(args.range).await?;
    println!("{}", serde_json::to_string_pretty(&readings)?);
    Ok(())
}

fn print_pretty_reading(reading: &Reading) {
    println!("Reading ({})", reading.formatted_time());
    println!("==========================================");
    for (key, value) in reading.iter() {
        match value {
            Some(value) => println!("  {:<8} {}", key, value),
            None => println!("  {:<8} -", key),
        }
    }
}
