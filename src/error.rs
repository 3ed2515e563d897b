use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not find {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    #[error("Missing '{key}' section/value in {}", .path.display())]
    Missing { key: String, path: PathBuf },

    #[error("Invalid value '{value}' for '{key}' in {}", .path.display())]
    InvalidValue {
        key: String,
        value: String,
        path: PathBuf,
    },
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Failed to read CSV record: {0}")]
    Csv(#[from] csv::Error),

    #[error("Record {record} has {len} columns, {column} column expected at position {position}")]
    MissingColumn {
        record: u64,
        column: &'static str,
        position: usize,
        len: usize,
    },

    #[error("Record {record}: {column} value '{value}' is not a number")]
    InvalidNumber {
        record: u64,
        column: &'static str,
        value: String,
        #[source]
        source: std::num::ParseFloatError,
    },
}

#[derive(Debug, Error)]
pub enum SpeedTestError {
    // No server list or no reachable server
    #[error("Network error: {0}")]
    Network(String),

    // Download or upload phase failure
    #[error("Test error: {0}")]
    Test(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse speedtest.net response: {0}")]
    Xml(#[from] quick_xml::DeError),
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Unsupported timestamp '{0}'")]
    Timestamp(String),

    #[error("Point at {0} has no measurement")]
    MissingMeasurement(String),

    #[error("Point at {0} has no fields")]
    EmptyFields(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("InfluxDB rejected the write ({status}): {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },
}
