//! modes-viewer: live Mode S / ADS-B viewer.
//!
//! Reads frames from an ADSBSpy feed (or replays a capture), keeps the live
//! plane registry, and streams plane snapshots to browsers over WebSocket.

use std::future::{Future, IntoFuture};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use comfy_table::{Cell, Table};
use tokio::task::JoinHandle;
use tracing_subscriber::{fmt, EnvFilter};

use modes_core::{AdsbLevel, LineProcessor, PlaneRegistry, ProcessorStats};

mod config;
mod error;
mod ingest;
mod mux;
mod web;

use crate::config::{Config, Reference};
use crate::error::{Result, ViewerError};
use crate::ingest::Ingest;
use crate::mux::PlaneUpdates;
use crate::web::AppState;

#[derive(Parser)]
#[command(name = "modes-viewer", version, about = "Live Mode S / ADS-B viewer")]
struct Cli {
    /// Config file [default: ~/.modes-viewer/config.yaml]
    #[arg(long, global = true, env = "MODES_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream live plane updates to WebSocket viewers
    Serve {
        /// Replay this capture file instead of following the live feed
        #[arg(long)]
        file: Option<PathBuf>,

        #[command(flatten)]
        overrides: ServeOverrides,
    },

    /// Process a capture file without timing and print the plane table
    Summarize {
        /// Path to file containing feed lines (one per line)
        file: PathBuf,
    },

    /// Write the default config file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Command-line values that take precedence over the config file.
#[derive(Args, Default)]
struct ServeOverrides {
    /// Feed host
    #[arg(long, env = "MODES_FEED_HOST")]
    feed_host: Option<String>,

    /// Feed port
    #[arg(long, env = "MODES_FEED_PORT")]
    feed_port: Option<u16>,

    /// Address the HTTP server binds to
    #[arg(long, env = "MODES_HOST")]
    host: Option<String>,

    /// HTTP port
    #[arg(long, env = "MODES_PORT")]
    port: Option<u16>,

    /// Directory served for paths other than /events and /api
    #[arg(long, env = "MODES_STATIC_DIR")]
    static_dir: Option<PathBuf>,

    /// Level assumed for planes that haven't reported one
    #[arg(long, env = "MODES_DEFAULT_LEVEL")]
    default_level: Option<AdsbLevel>,

    /// Per-viewer update queue size
    #[arg(long, env = "MODES_QUEUE_CAPACITY")]
    queue_capacity: Option<usize>,

    /// Milliseconds between replayed lines
    #[arg(long, env = "MODES_REPLAY_INTERVAL_MS")]
    replay_interval_ms: Option<u64>,
}

impl ServeOverrides {
    fn apply(self, config: &mut Config) {
        if let Some(host) = self.feed_host {
            config.feed.host = host;
        }
        if let Some(port) = self.feed_port {
            config.feed.port = port;
        }
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(dir) = self.static_dir {
            config.server.static_dir = dir;
        }
        if let Some(level) = self.default_level {
            config.viewer.default_level = level;
        }
        if let Some(capacity) = self.queue_capacity {
            config.viewer.queue_capacity = capacity;
        }
        if let Some(ms) = self.replay_interval_ms {
            config.replay.interval_ms = ms;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "modes-viewer failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("modes_viewer=debug,modes_core=debug,tower_http=debug")
        } else {
            EnvFilter::new("modes_viewer=info,modes_core=info")
        }
    });

    fmt().with_env_filter(filter).with_target(false).init();
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::InitConfig { force } => cmd_init_config(cli.config.as_deref(), force),
        Commands::Summarize { file } => {
            let config = config::load_config(cli.config.as_deref())?;
            cmd_summarize(&config, &file)
        }
        Commands::Serve { file, overrides } => {
            let mut config = config::load_config(cli.config.as_deref())?;
            overrides.apply(&mut config);
            cmd_serve(config, file).await
        }
    }
}

fn processor_for(config: &Config) -> LineProcessor {
    LineProcessor::new(PlaneRegistry::new(config.viewer.default_level))
        .with_reference(config.viewer.reference.map(Reference::as_pair))
}

// ---------------------------------------------------------------------------
// serve
// ---------------------------------------------------------------------------

async fn cmd_serve(config: Config, file: Option<PathBuf>) -> Result<()> {
    let mux: Arc<PlaneUpdates> = Arc::new(PlaneUpdates::new(config.viewer.queue_capacity));
    let ingest = Ingest::new(processor_for(&config), mux.publisher())
        .with_stale_after(config.viewer.stale_after_secs);

    let ingestion: JoinHandle<Result<ProcessorStats>> = match file {
        Some(path) => {
            let interval = Duration::from_millis(config.replay.interval_ms);
            tokio::spawn(async move { ingest::run_replay(ingest, &path, interval).await })
        }
        None => {
            let host = config.feed.host.clone();
            let port = config.feed.port;
            tokio::spawn(async move { ingest::run_feed(ingest, &host, port).await })
        }
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let static_dir = config.server.static_dir.as_path();
    let static_dir = if static_dir.is_dir() {
        Some(static_dir)
    } else {
        tracing::warn!(dir = %static_dir.display(), "static directory not found, viewer page disabled");
        None
    };
    let state = Arc::new(AppState {
        mux: Arc::clone(&mux),
    });
    let app = web::build_router(state, static_dir);

    tracing::info!("viewer listening on http://{addr}");

    let interrupted = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("interrupted"),
            Err(e) => {
                tracing::warn!(error = %e, "ctrl-c handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };
    supervise(axum::serve(listener, app).into_future(), ingestion, interrupted, &mux).await
}

/// Run until the server stops, ingestion fails or `interrupt` resolves.
/// Ingestion is aborted and the multiplexer shut down on every exit path.
async fn supervise<S, I>(
    server: S,
    ingestion: JoinHandle<Result<ProcessorStats>>,
    interrupt: I,
    mux: &PlaneUpdates,
) -> Result<()>
where
    S: Future<Output = std::io::Result<()>>,
    I: Future<Output = ()>,
{
    let stop_ingestion = ingestion.abort_handle();
    let outcome = tokio::select! {
        served = server => served.map_err(ViewerError::from),
        failure = ingestion_failure(ingestion) => Err(failure),
        _ = interrupt => Ok(()),
    };

    stop_ingestion.abort();
    mux.shutdown().await;
    outcome
}

/// Resolves only when ingestion fails. A finished replay leaves the server
/// running.
async fn ingestion_failure(task: JoinHandle<Result<ProcessorStats>>) -> ViewerError {
    match task.await {
        Ok(Ok(_)) => std::future::pending().await,
        Ok(Err(e)) => e,
        Err(e) => e.into(),
    }
}

// ---------------------------------------------------------------------------
// summarize
// ---------------------------------------------------------------------------

fn cmd_summarize(config: &Config, file: &Path) -> Result<()> {
    let bytes = std::fs::read(file)?;
    let mut processor = processor_for(config);

    // Synthetic clock: one replay interval per line
    let step = config.replay.interval_ms as f64 / 1000.0;
    for (i, line) in ingest::capture_lines(&bytes).iter().enumerate() {
        if let Err(e) = processor.process_line(line, i as f64 * step) {
            tracing::debug!(line = i + 1, error = %e, "line discarded");
        }
    }

    print_summary(&processor, config.viewer.reference.map(Reference::as_pair));
    Ok(())
}

fn print_summary(processor: &LineProcessor, reference: Option<(f64, f64)>) {
    let stats = processor.stats();
    let registry = processor.registry();

    println!();
    println!(
        "Lines: {} read, {} frames, {} decoded, {} updates, {} rejected, {} planes",
        stats.lines,
        stats.frames,
        stats.messages,
        stats.updates,
        stats.rejected,
        registry.len()
    );
    println!();

    if registry.is_empty() {
        return;
    }

    let mut table = Table::new();
    table.set_header(vec![
        "ICAO", "Callsign", "Level", "Alt (ft)", "Speed (kts)", "VRate", "Lat", "Lon",
        "Dist (km)",
    ]);

    let mut sorted: Vec<_> = registry.iter().collect();
    sorted.sort_by_key(|plane| plane.address);

    for plane in sorted {
        let position = plane.position();
        let distance = position.zip(reference).map(|((lat, lon), (ref_lat, ref_lon))| {
            modes_core::plane::ground_distance_m(ref_lat, ref_lon, lat, lon) / 1000.0
        });

        table.add_row(vec![
            Cell::new(plane.address),
            Cell::new(if plane.identification.is_empty() {
                "-"
            } else {
                plane.identification.as_str()
            }),
            Cell::new(plane.level.label()),
            Cell::new(if plane.altitude_ft > 0 {
                plane.altitude_ft.to_string()
            } else {
                "-".into()
            }),
            Cell::new(if plane.air_speed_valid {
                plane.air_speed.to_string()
            } else {
                "-".into()
            }),
            Cell::new(if plane.vertical_rate_valid {
                format!("{:+}", plane.vertical_rate)
            } else {
                "-".into()
            }),
            Cell::new(
                position
                    .map(|(lat, _)| format!("{lat:.4}"))
                    .unwrap_or("-".into()),
            ),
            Cell::new(
                position
                    .map(|(_, lon)| format!("{lon:.4}"))
                    .unwrap_or("-".into()),
            ),
            Cell::new(distance.map(|d| format!("{d:.1}")).unwrap_or("-".into())),
        ]);
    }

    println!("{table}");
}

// ---------------------------------------------------------------------------
// init-config
// ---------------------------------------------------------------------------

fn cmd_init_config(path: Option<&Path>, force: bool) -> Result<()> {
    let target = path.map(Path::to_path_buf).unwrap_or_else(config::config_file);
    if target.exists() && !force {
        return Err(ViewerError::Config(format!(
            "{} already exists (use --force to overwrite)",
            target.display()
        )));
    }

    let written = config::save_config(&Config::default(), Some(&target))?;
    println!("Wrote {}", written.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_serve() {
        let cli = Cli::try_parse_from([
            "modes-viewer",
            "serve",
            "--file",
            "capture.txt",
            "--port",
            "9000",
            "--default-level",
            "level0-or-more",
        ])
        .unwrap();

        let Commands::Serve { file, overrides } = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(file, Some(PathBuf::from("capture.txt")));

        let mut config = Config::default();
        overrides.apply(&mut config);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.viewer.default_level, AdsbLevel::Level0OrMore);
        assert_eq!(config.feed.port, 47806);
    }

    #[test]
    fn test_cli_rejects_bad_level() {
        assert!(Cli::try_parse_from(["modes-viewer", "serve", "--default-level", "level7"]).is_err());
    }

    #[test]
    fn test_empty_overrides_keep_config() {
        let mut config = Config::default();
        ServeOverrides::default().apply(&mut config);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_summarize_capture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.txt");
        std::fs::write(
            &path,
            "*8D4840D6202CC371C32CE0576098;1D5D32D0;0A;32AB;\n\
             *8D40621D58C382D690C8AC2863A7;\n\
             *8D40621D58C386435CC412692AD6;\n",
        )
        .unwrap();

        cmd_summarize(&Config::default(), &path).unwrap();
        assert!(cmd_summarize(&Config::default(), &dir.path().join("missing.txt")).is_err());
    }

    #[test]
    fn test_init_config_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        cmd_init_config(Some(&path), false).unwrap();
        assert!(matches!(
            cmd_init_config(Some(&path), false),
            Err(ViewerError::Config(_))
        ));
        cmd_init_config(Some(&path), true).unwrap();
        assert_eq!(config::load_config(Some(&path)).unwrap(), Config::default());
    }

    #[tokio::test]
    async fn test_server_exit_aborts_ingestion() {
        let mux = PlaneUpdates::new(4);
        let mut viewer = mux.subscribe();
        let (running, aborted) = tokio::sync::oneshot::channel::<()>();
        let ingestion = tokio::spawn(async move {
            let _running = running;
            std::future::pending::<Result<ProcessorStats>>().await
        });

        let server = async { std::io::Result::Ok(()) };
        let outcome = supervise(server, ingestion, std::future::pending(), &mux).await;
        assert!(outcome.is_ok());

        let aborted = tokio::time::timeout(Duration::from_secs(5), aborted)
            .await
            .expect("ingestion task still running");
        assert!(aborted.is_err());
        assert!(viewer.next().await.is_none());
    }

    #[tokio::test]
    async fn test_ingestion_failure_is_reported() {
        let mux = PlaneUpdates::new(4);
        let ingestion = tokio::spawn(async {
            Err::<ProcessorStats, _>(ViewerError::FeedClosed("feed:1".into()))
        });

        let outcome = supervise(
            std::future::pending(),
            ingestion,
            std::future::pending(),
            &mux,
        )
        .await;
        assert!(matches!(outcome, Err(ViewerError::FeedClosed(_))));
        assert_eq!(mux.subscriber_count(), 0);
    }
}
