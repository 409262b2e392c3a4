// tagpipe - command line entry point
// Logging goes to a file (and stderr with --dev); stdout belongs to the prompts

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tagpipe::fill::{self, InputEvent, Platform, PlaybackController, SystemLauncher, TerminalConsole};
use tagpipe::{Config, LibraryScanner, MusicLibrary};

#[derive(Parser)]
#[command(name = "tagpipe")]
#[command(about = "Interactively fill in missing tags across your music library")]
struct Args {
    /// Enable developer logging (stderr + debug output)
    #[arg(long, global = true)]
    dev: bool,

    /// Use this config file instead of the default one
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use this library database instead of the configured one
    #[arg(long, global = true)]
    library: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prompt for missing field values on every matching track
    Fillmissing {
        /// Space-separated field names, e.g. 'language mood context'
        #[arg(short = 'f', long, default_value = "")]
        fields: String,

        /// Query terms selecting the tracks
        query: Vec<String>,
    },
    /// Import or refresh the library from music directories
    Scan {
        /// Directories to scan (defaults to the configured ones)
        dirs: Vec<PathBuf>,
    },
    /// List matching tracks
    Ls {
        query: Vec<String>,
    },
}

fn init_logging(log_dir: &Path, dev: bool) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Could not create log directory {}", log_dir.display()))?;

    // Daily rotating file appender
    let file_appender = tracing_appender::rolling::daily(log_dir, "tagpipe.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Base filter: info level for general logs, debug for tagpipe
    let base_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tagpipe=debug"));

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_target(true)
        .with_level(true)
        .with_ansi(false);

    // Dev mode also logs to stderr, never stdout
    let stderr_layer = dev.then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(base_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()?;

    Ok(guard)
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(library) = &args.library {
        config.library_path = library.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    // Keep the guard alive so buffered log lines get flushed on exit
    let _log_guard = init_logging(&config.log_directory, args.dev)?;
    info!("tagpipe starting up");

    let library = MusicLibrary::open(&config.library_path)?;
    debug!("Library at {}", config.library_path.display());

    match args.command {
        Commands::Fillmissing { fields, query } => run_fill(library, &config, fields, query).await,
        Commands::Scan { dirs } => {
            let dirs = if dirs.is_empty() { config.music_directories.clone() } else { dirs };
            let report = LibraryScanner::new().scan(library.database(), &dirs)?;
            println!(
                "Scanned {} file(s): {} added, {} updated, {} failed, {} removed",
                report.total_seen(),
                report.added,
                report.updated,
                report.failed,
                report.removed
            );
            Ok(())
        }
        Commands::Ls { query } => {
            for item in library.query(&query)? {
                println!("{}", fill::summary(&item));
            }
            Ok(())
        }
    }
}

async fn run_fill(library: MusicLibrary, config: &Config, fields: String, query: Vec<String>) -> Result<()> {
    let mut console = TerminalConsole::spawn()?;

    // Ctrl+C lands in the same queue the prompts read from
    let interrupts = console.interrupt_sender();
    let listener = tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            debug!("Ctrl+C received");
            if interrupts.send(InputEvent::Interrupt).is_err() {
                break;
            }
        }
    });

    let player = PlaybackController::new(SystemLauncher, Platform::current(), config.playback.stop_timeout());

    let status = tokio::task::spawn_blocking(move || {
        fill::fill_missing(&library, &fields, &query, &mut console, player)
    })
    .await??;

    listener.abort();
    info!("fillmissing finished: {:?}", status);
    Ok(())
}
