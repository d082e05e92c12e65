//! INI parsing for the configuration file.
//!
//! Parsed values overlay the defaults, so a config file only needs to name
//! the keys it changes.

use std::path::PathBuf;
use std::str::FromStr;

use ini::Ini;

use super::file::ConfigFileError;
use super::settings::ConfigFile;

/// Parse an INI document into a [`ConfigFile`], starting from defaults.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    if let Some(section) = ini.section(Some("wsprnet")) {
        if let Some(v) = section.get("spots_url") {
            config.wsprnet.spots_url = v.to_string();
        }
        if let Some(v) = section.get("login_url") {
            config.wsprnet.login_url = v.to_string();
        }
        if let Some(v) = section.get("band") {
            config.wsprnet.band = v.to_string();
        }
        if let Some(v) = section.get("exclude_special") {
            config.wsprnet.exclude_special = parse_key("wsprnet", "exclude_special", v, "expected 0 or 1")?;
        }
        if let Some(v) = section.get("poll_interval_secs") {
            config.wsprnet.poll_interval_secs =
                parse_key("wsprnet", "poll_interval_secs", v, "expected a whole number of seconds")?;
        }
        if let Some(v) = section.get("request_timeout_secs") {
            config.wsprnet.request_timeout_secs =
                parse_key("wsprnet", "request_timeout_secs", v, "expected a whole number of seconds")?;
        }
    }

    if let Some(section) = ini.section(Some("session")) {
        if let Some(v) = section.get("file") {
            config.session.file = expand_tilde(v);
        }
    }

    if let Some(section) = ini.section(Some("spool")) {
        if let Some(v) = section.get("directory") {
            config.spool.directory = expand_tilde(v);
        }
    }

    if let Some(section) = ini.section(Some("clickhouse")) {
        if let Some(v) = section.get("host") {
            config.clickhouse.host = v.to_string();
        }
        if let Some(v) = section.get("port") {
            config.clickhouse.port = parse_key("clickhouse", "port", v, "expected a port number")?;
        }
        if let Some(v) = section.get("database") {
            config.clickhouse.database = v.to_string();
        }
        if let Some(v) = section.get("table") {
            config.clickhouse.table = v.to_string();
        }
        if let Some(v) = section.get("user") {
            config.clickhouse.user = v.to_string();
        }
        if let Some(v) = section.get("password") {
            config.clickhouse.password = v.to_string();
        }
        if let Some(v) = section.get("request_timeout_secs") {
            config.clickhouse.request_timeout_secs =
                parse_key("clickhouse", "request_timeout_secs", v, "expected a whole number of seconds")?;
        }
    }

    if let Some(section) = ini.section(Some("pipeline")) {
        if let Some(v) = section.get("idle_interval_secs") {
            config.pipeline.idle_interval_secs =
                parse_key("pipeline", "idle_interval_secs", v, "expected a whole number of seconds")?;
        }
    }

    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            config.logging.file = expand_tilde(v);
        }
    }

    Ok(config)
}

fn parse_key<T: FromStr>(
    section: &str,
    key: &str,
    value: &str,
    reason: &str,
) -> Result<T, ConfigFileError> {
    value.trim().parse().map_err(|_| ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    })
}

/// Expand a leading `~/` to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
