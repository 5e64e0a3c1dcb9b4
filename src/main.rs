use std::{path::PathBuf, sync::Arc, thread};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::{
    config::{Settings, PATTERNS_FILE},
    engine::Engine,
    gbfs::{FeedClient, Snapshot},
    patterns::PatternRepository,
    render::Format,
};

mod config;
mod data;
mod engine;
mod error;
mod gbfs;
mod history;
mod locator;
mod patterns;
mod predictor;
mod render;
mod trip;

#[derive(Parser, Debug)]
#[command(
    name = "bikecast",
    version,
    about = "Bike and dock availability forecasts for a home/work bike share commute"
)]
struct Cli {
    /// Verbose output (show debug messages)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    status: StatusArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the live dashboard (the default)
    Status(StatusArgs),
    /// Build a pattern document from trip-log CSV files
    BuildPatterns(BuildArgs),
}

#[derive(Args, Debug, Clone)]
struct StatusArgs {
    /// Evaluate once and exit instead of refreshing
    #[arg(long)]
    once: bool,

    /// Print the dashboard as JSON (implies --once)
    #[arg(long, conflicts_with = "swiftbar")]
    json: bool,

    /// Print the dashboard as a SwiftBar menu (implies --once)
    #[arg(long)]
    swiftbar: bool,

    /// Settings file with Home/Work locations and threshold overrides
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pattern document built by `build-patterns`
    #[arg(long, default_value = PATTERNS_FILE)]
    patterns: PathBuf,

    /// Read station_information from a file instead of the live feed
    #[arg(long, requires = "status_file")]
    info: Option<PathBuf>,

    /// Read station_status from a file instead of the live feed
    #[arg(long = "status", id = "status_file", requires = "info")]
    status_file: Option<PathBuf>,

    /// Seconds between refreshes, overriding the settings file
    #[arg(long)]
    interval: Option<u64>,

    /// Use the earlier model without the floor rule or leave-by times
    #[arg(long)]
    legacy: bool,
}

impl StatusArgs {
    fn format(&self) -> Format {
        if self.json {
            Format::Json
        } else if self.swiftbar {
            Format::Swiftbar
        } else {
            Format::Text
        }
    }

    fn is_watching(&self) -> bool {
        !(self.once || self.json || self.swiftbar)
    }
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// Trip-log CSV files
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Where to write the pattern document
    #[arg(short, long, default_value = PATTERNS_FILE)]
    output: PathBuf,

    /// Weeks of data the logs cover, used for averaging
    #[arg(long, default_value_t = 39)]
    weeks: u32,

    /// Description stored in the document metadata
    #[arg(long, default_value = "Toronto Bike Share Ridership")]
    source: String,
}

enum SnapshotSource {
    Files { info: PathBuf, status: PathBuf },
    Live(FeedClient),
}

impl SnapshotSource {
    fn fetch(&self) -> Result<Snapshot, error::FeedError> {
        match self {
            SnapshotSource::Files { info, status } => Snapshot::from_files(info, status),
            SnapshotSource::Live(client) => client.fetch_snapshot(),
        }
    }
}

fn status(args: StatusArgs) -> Result<()> {
    let settings_path = args.config.clone().unwrap_or_else(Settings::default_path);
    let mut settings = Settings::load(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    if let Some(interval) = args.interval {
        settings.thresholds.refresh_interval_secs = interval;
    }
    if args.legacy {
        settings.thresholds = settings.thresholds.legacy();
    }

    let patterns = PatternRepository::load_available(&args.patterns).map(Arc::new);

    let source = match (&args.info, &args.status_file) {
        (Some(info), Some(status)) => SnapshotSource::Files {
            info: info.to_owned(),
            status: status.to_owned(),
        },
        _ => SnapshotSource::Live(
            FeedClient::new(settings.thresholds.fetch_timeout())
                .context("Failed to create feed client")?,
        ),
    };

    let engine = Engine::new(settings, patterns);
    let format = args.format();

    loop {
        match source.fetch() {
            Ok(snapshot) => {
                let dashboard = engine.evaluate(&snapshot, chrono::Local::now().naive_local());
                println!("{}", render::render(&dashboard, format)?);
            }
            Err(err) => {
                log::error!("{:#}", anyhow::Error::from(err));
                println!("{}", render::render_error("Error fetching data", format));
                if !args.is_watching() {
                    bail!("No dashboard produced");
                }
            }
        }

        if !args.is_watching() {
            return Ok(());
        }
        thread::sleep(engine.thresholds().refresh_interval());
    }
}

fn build_patterns(args: BuildArgs) -> Result<()> {
    log::info!("Building patterns from {} files", args.inputs.len());

    let mut builder = history::PatternBuilder::default();
    for input in &args.inputs {
        builder.read_csv(input)?;
    }

    let document = builder.build(args.weeks, &args.source, chrono::Local::now().naive_local())?;
    if let Some(parent) = args.output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    history::write_document(&document, &args.output)?;

    log::info!(
        "Saved patterns for {} stations to {}",
        document.metadata.total_stations,
        args.output.display()
    );
    for (station, risk) in history::most_draining(&document, "fri", 5) {
        log::info!(
            "  Station {} typically lowest around {} on Fridays (deficit {})",
            station,
            data::format_hour_12h(risk.hour),
            risk.severity
        );
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "info" }),
    )
    .format_timestamp(None)
    .init();

    match cli.command {
        Some(Command::Status(args)) => status(args),
        Some(Command::BuildPatterns(args)) => build_patterns(args),
        None => status(cli.status),
    }
}
