use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use spark_harvester::agent::Agent;
use spark_harvester::config::{self, Config};

/// Spark stand-alone cluster metrics harvester.
#[derive(Parser)]
#[command(name = "spark-harvester", about)]
struct Cli {
    /// Path to the YAML configuration file. Defaults to
    /// $SPARK_HARVESTER_CONFIG/spark-harvester.yaml, then ./spark-harvester.yaml.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Logging filter (trace, debug, info, warn, error, or an EnvFilter directive).
    /// Overrides `log_level` from the config file.
    #[arg(long)]
    log_level: Option<String>,

    /// Append plain-text logs to this file instead of stderr.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Run a single harvest cycle, flush, and exit.
    #[arg(long)]
    once: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print version information and exit.
    Version,
}

/// Build-time version info, injected via env at build time.
mod version {
    /// Release version string.
    pub const RELEASE: &str = env!("CARGO_PKG_VERSION");

    /// Git commit hash (set at build time via env, or "unknown").
    pub fn git_commit() -> &'static str {
        option_env!("GIT_COMMIT").unwrap_or("unknown")
    }

    /// Full version string with platform info.
    pub fn full() -> String {
        format!(
            "{} (commit: {}, {}/{})",
            RELEASE,
            git_commit(),
            std::env::consts::OS,
            std::env::consts::ARCH,
        )
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle version subcommand before anything else.
    if let Some(Command::Version) = &cli.command {
        println!("spark-harvester {}", version::full());
        return Ok(());
    }

    let config_dir = std::env::var(config::CONFIG_DIR_ENV).ok();
    let config_path = config::resolve_path(cli.config.as_deref(), config_dir.as_deref());

    let cfg = Config::load(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let log_level = cli.log_level.as_deref().unwrap_or(&cfg.log_level);
    init_tracing(log_level, cli.log_file.as_ref())?;

    tracing::info!(
        version = version::RELEASE,
        commit = version::git_commit(),
        config = %config_path.display(),
        master_url = %cfg.spark.master_url,
        cluster_name = %cfg.spark.cluster_name,
        "starting spark-harvester",
    );

    // Cycles are strictly sequential; one thread is enough.
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    rt.block_on(run(cfg, cli.once))
}

fn init_tracing(level: &str, log_file: Option<&PathBuf>) -> Result<()> {
    let filter =
        EnvFilter::try_new(level).with_context(|| format!("invalid log level: {level}"))?;

    let file = match log_file {
        Some(path) => match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!(
                    "opening log file {}: {e}; logging to stderr",
                    path.display()
                );
                None
            }
        },
        None => None,
    };

    match file {
        Some(file) => fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init(),
        None => fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init(),
    }

    Ok(())
}

async fn run(cfg: Config, once: bool) -> Result<()> {
    let mut agent = Agent::from_config(&cfg)?;

    if once {
        let report = agent.run_once().await;
        if report.flushed.is_none() {
            bail!("flushing harvested metrics failed");
        }
        tracing::info!(samples = report.samples, "single harvest cycle complete");
        return Ok(());
    }

    agent.start().await?;

    let cancel = agent.cancel_token();
    tokio::spawn(async move {
        shutdown_signal().await;
        cancel.cancel();
    });

    agent.run().await?;

    // Graceful shutdown.
    agent.stop();

    tracing::info!("spark-harvester stopped");

    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to register SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received SIGINT, shutting down");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM, shutting down");
        }
    }
}
