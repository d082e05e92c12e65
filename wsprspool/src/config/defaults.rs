//! Default values for all configuration settings.
//!
//! Every key in config.ini is optional; anything missing falls back to the
//! constants defined here.

use super::file::config_directory;
use super::settings::{
    ClickHouseSettings, ConfigFile, LoggingSettings, PipelineSettings, SessionSettings,
    SpoolSettings, WsprnetSettings,
};

// ===== wsprnet.org =====

/// Spots endpoint returning newly published records as JSON.
pub const DEFAULT_SPOTS_URL: &str = "http://www.wsprnet.org/drupal/wsprnet/spots/json";

/// REST login endpoint that issues session cookies.
pub const DEFAULT_LOGIN_URL: &str = "http://www.wsprnet.org/drupal/rest/user/login";

/// Band filter forwarded upstream.
pub const DEFAULT_BAND: &str = "All";

/// Include special-event callsigns by default.
pub const DEFAULT_EXCLUDE_SPECIAL: u8 = 0;

/// Seconds between download ticks in loop mode.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 120;

/// Timeout in seconds for upstream requests. Large batches over slow links
/// can take a while to stream.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

// ===== ClickHouse =====

/// Hostname of the ClickHouse HTTP interface.
pub const DEFAULT_CLICKHOUSE_HOST: &str = "localhost";

/// Port of the ClickHouse HTTP interface.
pub const DEFAULT_CLICKHOUSE_PORT: u16 = 8123;

/// Database holding the spots table.
pub const DEFAULT_CLICKHOUSE_DATABASE: &str = "wsprnet";

/// Destination table name.
pub const DEFAULT_CLICKHOUSE_TABLE: &str = "spots";

/// Timeout in seconds for sink requests.
pub const DEFAULT_SINK_TIMEOUT_SECS: u64 = 60;

// ===== Pipeline =====

/// Sleep in seconds between polls of an empty spool.
pub const DEFAULT_IDLE_INTERVAL_SECS: u64 = 10;

// ===== File names under the config directory =====

/// Cached session token.
pub const SESSION_FILE_NAME: &str = "session.json";

/// Durable batch queue directory.
pub const SPOOL_DIR_NAME: &str = "spool";

/// Log file.
pub const LOG_FILE_NAME: &str = "wsprspool.log";

impl Default for ConfigFile {
    fn default() -> Self {
        let config_dir = config_directory();
        Self {
            wsprnet: WsprnetSettings {
                spots_url: DEFAULT_SPOTS_URL.to_string(),
                login_url: DEFAULT_LOGIN_URL.to_string(),
                band: DEFAULT_BAND.to_string(),
                exclude_special: DEFAULT_EXCLUDE_SPECIAL,
                poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
                request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            },
            session: SessionSettings {
                file: config_dir.join(SESSION_FILE_NAME),
            },
            spool: SpoolSettings {
                directory: config_dir.join(SPOOL_DIR_NAME),
            },
            clickhouse: ClickHouseSettings {
                host: DEFAULT_CLICKHOUSE_HOST.to_string(),
                port: DEFAULT_CLICKHOUSE_PORT,
                database: DEFAULT_CLICKHOUSE_DATABASE.to_string(),
                table: DEFAULT_CLICKHOUSE_TABLE.to_string(),
                user: String::new(),
                password: String::new(),
                request_timeout_secs: DEFAULT_SINK_TIMEOUT_SECS,
            },
            pipeline: PipelineSettings {
                idle_interval_secs: DEFAULT_IDLE_INTERVAL_SECS,
            },
            logging: LoggingSettings {
                file: config_dir.join(LOG_FILE_NAME),
            },
        }
    }
}
