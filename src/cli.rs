use crate::config::DEFAULT_CONFIG_FILE;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    version,
    about = "Perform a SpeedTest.net test and write the result to InfluxDB",
    long_about = None
)]
pub struct Args {
    /// Imports data from a speedtest-cli CSV file
    #[arg(long = "import", value_name = "FILENAME")]
    pub import_csv: Option<PathBuf>,

    /// Path to an alternative config file
    #[arg(long = "config", value_name = "FILENAME", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// If used with --import, skips the first line (header) of the CSV file
    #[arg(long)]
    pub skip: bool,

    /// Alternative hostname to store data under (defaults to system hostname)
    #[arg(long)]
    pub hostname: Option<String>,
}

#[cfg(test)]
pub mod tests;
