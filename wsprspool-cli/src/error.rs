//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;
use wsprspool::config::ConfigFileError;
use wsprspool::pipeline::{DownloadError, PipelineError};
use wsprspool::session::SessionError;
use wsprspool::sink::SinkError;
use wsprspool::spool::SpoolError;
use wsprspool::wsprnet::WsprnetError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(std::io::Error),
    /// Configuration error
    Config(ConfigFileError),
    /// Failed to build the upstream HTTP client
    HttpClient(WsprnetError),
    /// Failed to build the sink client
    Sink(SinkError),
    /// The spool directory is unusable
    Spool(SpoolError),
    /// The pipeline run failed
    Pipeline(PipelineError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        // Print additional help for specific errors
        match self {
            CliError::Pipeline(PipelineError::Download(DownloadError::Session(
                SessionError::MissingCredentials,
            ))) => {
                eprintln!();
                eprintln!("No cached wsprnet.org session was found. Pass your account");
                eprintln!("credentials once with --username and --password; the session");
                eprintln!("is cached under ~/.wsprspool for later runs.");
            }
            CliError::Spool(_) => {
                eprintln!();
                eprintln!("The spool directory must be creatable and writable. Check the");
                eprintln!("[spool] directory setting and filesystem permissions.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::HttpClient(e) => write!(f, "Failed to create HTTP client: {}", e),
            CliError::Sink(e) => write!(f, "Failed to create ClickHouse client: {}", e),
            CliError::Spool(e) => write!(f, "Failed to open the spool: {}", e),
            CliError::Pipeline(e) => write!(f, "Pipeline run failed: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::LoggingInit(e) => Some(e),
            CliError::Config(e) => Some(e),
            CliError::HttpClient(e) => Some(e),
            CliError::Sink(e) => Some(e),
            CliError::Spool(e) => Some(e),
            CliError::Pipeline(e) => Some(e),
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<SpoolError> for CliError {
    fn from(e: SpoolError) -> Self {
        CliError::Spool(e)
    }
}

impl From<PipelineError> for CliError {
    fn from(e: PipelineError) -> Self {
        CliError::Pipeline(e)
    }
}
