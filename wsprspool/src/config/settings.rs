//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file. These are
//! pure data types; parsing lives in the sibling modules.

use std::path::PathBuf;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub wsprnet: WsprnetSettings,
    pub session: SessionSettings,
    pub spool: SpoolSettings,
    pub clickhouse: ClickHouseSettings,
    pub pipeline: PipelineSettings,
    pub logging: LoggingSettings,
}

/// Upstream polling configuration (`[wsprnet]`).
#[derive(Debug, Clone, PartialEq)]
pub struct WsprnetSettings {
    /// Spots endpoint returning newly published records as JSON
    pub spots_url: String,
    /// REST login endpoint that issues session cookies
    pub login_url: String,
    /// Band filter forwarded upstream ("All" or a single band name)
    pub band: String,
    /// Exclude special-event callsigns, forwarded upstream as 0 or 1
    pub exclude_special: u8,
    /// Seconds between download ticks in loop mode
    pub poll_interval_secs: u64,
    /// Timeout in seconds for upstream requests
    pub request_timeout_secs: u64,
}

/// Session persistence configuration (`[session]`).
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    /// Where the logged-in session token is cached between runs
    pub file: PathBuf,
}

/// Durable batch queue configuration (`[spool]`).
#[derive(Debug, Clone, PartialEq)]
pub struct SpoolSettings {
    /// Directory holding one file per downloaded batch
    pub directory: PathBuf,
}

/// Sink connection configuration (`[clickhouse]`).
#[derive(Debug, Clone, PartialEq)]
pub struct ClickHouseSettings {
    /// Hostname of the ClickHouse HTTP interface
    pub host: String,
    /// Port of the HTTP interface
    pub port: u16,
    /// Database holding the spots table
    pub database: String,
    /// Destination table name
    pub table: String,
    /// Username sent with every request; empty for the default user
    pub user: String,
    /// Password sent with every request
    pub password: String,
    /// Timeout in seconds for sink requests
    pub request_timeout_secs: u64,
}

/// Consumer pacing configuration (`[pipeline]`).
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    /// Sleep in seconds between polls of an empty spool
    pub idle_interval_secs: u64,
}

/// Log output configuration (`[logging]`).
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}
