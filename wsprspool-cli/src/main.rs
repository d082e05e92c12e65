//! wsprspool CLI - spot ingestion daemon.
//!
//! One invocation performs a single download-and-drain cycle by default;
//! `--loop` keeps both pipeline loops running until interrupted.

mod error;

use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use wsprspool::config::ConfigFile;
use wsprspool::logging::{self, LoggingGuard};
use wsprspool::pipeline::{Pipeline, PipelineConfig};
use wsprspool::session::{Credentials, SessionStore};
use wsprspool::sink::{ClickHouseConfig, ClickHouseSink};
use wsprspool::spool::Spool;
use wsprspool::wsprnet::{ReqwestClient, WsprnetClient, WsprnetConfig};

use error::CliError;

#[derive(Parser)]
#[command(name = "wsprspool")]
#[command(about = "Ingest wsprnet.org spots into ClickHouse through a durable spool", long_about = None)]
#[command(version = wsprspool::VERSION)]
struct Args {
    /// Config file path (default: ~/.wsprspool/config.ini)
    #[arg(long)]
    config: Option<PathBuf>,

    /// wsprnet.org account name, needed when no session is cached
    #[arg(long, requires = "password")]
    username: Option<String>,

    /// wsprnet.org account password
    #[arg(long, requires = "username")]
    password: Option<String>,

    /// ClickHouse username, overriding the config file
    #[arg(long)]
    clickhouse_user: Option<String>,

    /// ClickHouse password, overriding the config file
    #[arg(long)]
    clickhouse_password: Option<String>,

    /// Keep polling until interrupted instead of exiting after one cycle
    #[arg(long = "loop")]
    run_loop: bool,

    /// Log to stdout only, without a log file
    #[arg(long)]
    no_log_file: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = run(args).await {
        e.exit();
    }
}

async fn run(args: Args) -> Result<(), CliError> {
    let mut config = match &args.config {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };
    if let Some(user) = &args.clickhouse_user {
        config.clickhouse.user = user.clone();
    }
    if let Some(password) = &args.clickhouse_password {
        config.clickhouse.password = password.clone();
    }

    let _logging_guard = init_logging(&args, &config)?;
    info!("wsprspool v{}", wsprspool::VERSION);

    let credentials = match (&args.username, &args.password) {
        (Some(username), Some(password)) => Some(Credentials {
            username: username.clone(),
            password: password.clone(),
        }),
        _ => None,
    };
    let sessions = SessionStore::new(
        config.session.file.clone(),
        config.wsprnet.login_url.clone(),
        credentials,
    );

    let http = ReqwestClient::with_timeout(config.wsprnet.request_timeout_secs)
        .map_err(CliError::HttpClient)?;
    let client = WsprnetClient::new(http, WsprnetConfig::from(&config.wsprnet));

    let sink =
        ClickHouseSink::new(ClickHouseConfig::from(&config.clickhouse)).map_err(CliError::Sink)?;
    let spool = Spool::open(config.spool.directory.clone()).await?;

    let pipeline = Pipeline::new(client, sessions, sink, spool, PipelineConfig::from(&config)).await;

    if args.run_loop {
        let cancel = CancellationToken::new();
        let signal_cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, finishing current work");
                signal_cancel.cancel();
            }
        });
        pipeline.run(cancel).await;
    } else {
        let mut pipeline = pipeline;
        pipeline.run_once().await?;
    }
    Ok(())
}

/// Set up file-plus-stdout logging from the config, or stdout only.
fn init_logging(args: &Args, config: &ConfigFile) -> Result<LoggingGuard, CliError> {
    if args.no_log_file {
        return Ok(logging::init_console_logging());
    }

    let log_path = &config.logging.file;
    let log_dir = log_path
        .parent()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| ".".to_string());
    let log_file = log_path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "wsprspool.log".to_string());

    logging::init_logging(&log_dir, &log_file).map_err(CliError::LoggingInit)
}
