use clap::{Args, Parser, Subcommand};
use rl_core::{watcher, ChangeSource, ExplicitSource, Session, SessionConfig, VcsSource};
use rl_events::bus::EventBus;
use rl_events::signal::round_signal;
use rl_events::types::ReviewEvent;
use rl_vcs::git::GitBackend;
use std::error::Error;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_PORT: u16 = 4830;

#[derive(Parser)]
#[command(name = "rl")]
#[command(about = "Line-anchored review rounds between you and an agent")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Review the given files, or the working tree's changes when none are given
    Serve(ServeArgs),
    /// Print the OpenAPI document
    Openapi,
}

#[derive(Args)]
struct ServeArgs {
    /// Files or directories to review
    files: Vec<PathBuf>,

    /// Listen port on localhost [env: REDLINE_PORT]
    #[arg(short, long)]
    port: Option<u16>,

    /// Review state file, relative to the review root [env: REDLINE_STATE_PATH]
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    json_logs: bool,
}

fn setup_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::registry().with(filter);
    if json {
        subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn env_value<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|value| value.parse().ok())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => {
            setup_logging(&args.log_level, args.json_logs);
            if let Err(err) = serve(args).await {
                error!("{err}");
                return ExitCode::FAILURE;
            }
        }
        Command::Openapi => {
            println!("{}", rl_serve::openapi::generate_spec());
        }
    }
    ExitCode::SUCCESS
}

async fn serve(args: ServeArgs) -> Result<(), Box<dyn Error>> {
    let cwd = std::env::current_dir()?;
    let (root, source) = if args.files.is_empty() {
        let source = VcsSource::<GitBackend>::detect(&cwd)?;
        let root = source.root().to_path_buf();
        (root, Box::new(source) as Box<dyn ChangeSource>)
    } else {
        let source = ExplicitSource::new(cwd.clone(), args.files);
        (cwd, Box::new(source) as Box<dyn ChangeSource>)
    };

    let mut config = SessionConfig::new(root);
    if let Some(path) = args
        .state_file
        .or_else(|| env_value::<PathBuf>("REDLINE_STATE_PATH"))
    {
        config = config.with_state_path(path);
    }
    if let Some(millis) = env_value::<u64>("REDLINE_POLL_MS") {
        config = config.with_poll_interval(Duration::from_millis(millis));
    }

    let event_bus = EventBus::new();
    let session = Session::open(config, source, event_bus.clone())?;
    let (rounds, round_receiver) = round_signal();
    let (stop_watcher, watcher_shutdown) = watch::channel(false);
    let watcher = tokio::spawn(watcher::run(
        session.clone(),
        round_receiver,
        watcher_shutdown,
    ));

    let port = args
        .port
        .or_else(|| env_value("REDLINE_PORT"))
        .unwrap_or(DEFAULT_PORT);
    let listener = TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)).await?;
    info!("Review at http://localhost:{port}, press Ctrl+C to stop");

    let state = rl_serve::AppState {
        session: session.clone(),
        event_bus: event_bus.clone(),
        rounds,
    };
    let shutdown_bus = event_bus.clone();
    let shutdown = async move {
        wait_for_signal().await;
        let _ = stop_watcher.send(true);
        shutdown_bus.publish(ReviewEvent::Shutdown);
        // Ends open event streams so graceful shutdown can finish.
        shutdown_bus.close();
    };
    rl_serve::serve(state, listener, shutdown).await?;

    if let Err(err) = watcher.await {
        error!("watcher task failed: {err}");
    }
    let summary = session.finish()?;
    info!(
        comments = summary.comment_count,
        path = %summary.state_path.display(),
        "review state saved"
    );
    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!("failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
