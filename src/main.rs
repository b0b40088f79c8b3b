use clap::{Parser, Subcommand};
use roadwatch::camera;
use roadwatch::config::{self, Config};
use roadwatch::dashboard::{self, DashboardContext, status::StatusParams};
use roadwatch::error::AppError;
use roadwatch::fetch::ImageFetcher;
use roadwatch::incident_log::JsonlIncidentLog;
use roadwatch::pacer::ThreadPacer;
use roadwatch::pipeline::{CameraOrchestrator, Collaborators, PipelineSettings};
use roadwatch::store::FileStateStore;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Traffic camera incident monitor.
#[derive(Debug, Parser)]
#[command(name = "roadwatch", about = "Traffic camera incident monitor")]
struct Cli {
    /// Path to the TOML config
    #[arg(long, env = "ROADWATCH_CONFIG", default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
enum Command {
    /// Check every camera once
    Run,
    /// Check every camera periodically
    Watch,
    /// Serve the status dashboard
    Serve,
}

fn init_tracing(level: tracing::Level) {
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match config::load_from_path(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            init_tracing(tracing::Level::INFO);
            tracing::error!(config_path = %cli.config.display(), error = %err, "Failed to load config");
            return ExitCode::FAILURE;
        }
    };
    let level = match config.log_level() {
        Ok(level) => level,
        Err(err) => {
            init_tracing(tracing::Level::INFO);
            tracing::error!(config_path = %cli.config.display(), error = %err, "Invalid log level");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(level);
    tracing::info!(
        config_path = %cli.config.display(),
        app = %config.app.name,
        command = ?cli.command,
        "roadwatch starting"
    );

    let result = match cli.command {
        Command::Run => run_cameras(&config, false),
        Command::Watch => run_cameras(&config, true),
        Command::Serve => serve_dashboard(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, fatal = err.is_fatal(), "roadwatch failed");
            ExitCode::FAILURE
        }
    }
}

/// Loads the registry and runs the pipeline once, or forever in watch mode.
/// Registry and config problems fail before any camera is touched.
fn run_cameras(config: &Config, watch: bool) -> Result<(), AppError> {
    let cameras = camera::load_registry(config.cameras_path())?;
    tracing::info!(
        count = cameras.len(),
        path = %config.cameras_path().display(),
        "Camera registry loaded"
    );

    let settings = PipelineSettings::from_config(config)?;
    let notifier = config.build_notifier()?;
    let store = FileStateStore::new(config.state_dir());
    let incident_log = JsonlIncidentLog::new(config.incident_log_path());
    let pacer = ThreadPacer;
    let fetcher = ImageFetcher::new(config.build_image_source()?, config.fetch_policy());

    let mut orchestrator = CameraOrchestrator::new(
        fetcher,
        settings,
        Collaborators {
            store: &store,
            notifier: notifier.as_ref(),
            incident_log: &incident_log,
            pacer: &pacer,
        },
    );

    if watch {
        let stop = AtomicBool::new(false);
        orchestrator.watch(&cameras, config.run_interval(), &stop);
    } else {
        orchestrator.run_once(&cameras);
    }
    Ok(())
}

fn serve_dashboard(config: &Config) -> Result<(), AppError> {
    let context = Arc::new(DashboardContext {
        cameras_path: config.cameras_path().to_path_buf(),
        incident_log_path: config.incident_log_path().to_path_buf(),
        params: StatusParams::from_config(config)?,
    });
    let addr = SocketAddr::from(([0, 0, 0, 0], config.dashboard_port()));

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let app = dashboard::router(context);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(%addr, "Dashboard listening");
        axum::serve(listener, app).await
    })?;
    Ok(())
}
