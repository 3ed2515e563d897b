use crate::error::ConfigError;
use ini::{Ini, Properties};
use log::trace;
use std::path::Path;
use std::time::Instant;

pub static DEFAULT_CONFIG_FILE: &str = "config.ini";
pub static INFLUXDB_SECTION: &str = "influxdb";
pub const DEFAULT_PORT: u16 = 8086;

/// Connection and target settings for the InfluxDB sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfluxSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub measurement: String,
    pub ssl: bool,
    pub verify_ssl: bool,
}

pub fn load_config(path: &Path) -> Result<Ini, ConfigError> {
    // Read the config file, failing before anything else runs if it is absent

    let function_start = Instant::now();
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let config = Ini::load_from_file_noescape(path).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    trace!("load_config duration: {:?}", function_start.elapsed());
    Ok(config)
}

impl InfluxSettings {
    pub fn from_ini(config: &Ini, path: &Path) -> Result<Self, ConfigError> {
        // Validate the [influxdb] section and fill in defaults

        let function_start = Instant::now();
        let section = config
            .section(Some(INFLUXDB_SECTION))
            .ok_or_else(|| missing(INFLUXDB_SECTION, path))?;

        let settings = InfluxSettings {
            host: required(section, "host", path)?,
            port: match value(section, "port") {
                Some(port) => port.trim().parse().map_err(|_| invalid("port", port, path))?,
                None => DEFAULT_PORT,
            },
            username: required(section, "username", path)?,
            password: required(section, "password", path)?,
            database: required(section, "database", path)?,
            measurement: required(section, "measurement", path)?,
            ssl: optional_bool(section, "ssl", true, path)?,
            verify_ssl: optional_bool(section, "verify_ssl", false, path)?,
        };
        trace!("from_ini duration: {:?}", function_start.elapsed());
        Ok(settings)
    }

    pub fn scheme(&self) -> &'static str {
        if self.ssl {
            "https"
        } else {
            "http"
        }
    }

    pub fn write_url(&self) -> String {
        format!("{}://{}:{}/write", self.scheme(), self.host, self.port)
    }
}

// Option names match regardless of case
fn value<'a>(section: &'a Properties, key: &str) -> Option<&'a str> {
    section
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(key))
        .map(|(_, value)| value)
}

fn required(section: &Properties, key: &str, path: &Path) -> Result<String, ConfigError> {
    value(section, key)
        .map(str::to_string)
        .ok_or_else(|| missing(key, path))
}

fn optional_bool(
    section: &Properties,
    key: &str,
    default: bool,
    path: &Path,
) -> Result<bool, ConfigError> {
    match value(section, key) {
        Some(value) => match value.trim().to_lowercase().as_str() {
            "true" | "t" | "1" | "yes" | "on" => Ok(true),
            "false" | "f" | "0" | "no" | "off" => Ok(false),
            _ => Err(invalid(key, value, path)),
        },
        None => Ok(default),
    }
}

fn missing(key: &str, path: &Path) -> ConfigError {
    ConfigError::Missing {
        key: key.to_string(),
        path: path.to_path_buf(),
    }
}

fn invalid(key: &str, value: &str, path: &Path) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        path: path.to_path_buf(),
    }
}
