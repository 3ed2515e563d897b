use clap::Parser;
use speedtest_influxdb::{cli::Args, error::ConfigError, logging::init_logger, run};
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode, anyhow::Error> {
    let args = Args::parse();
    init_logger();

    match run(&args).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(error) => match error.downcast_ref::<ConfigError>() {
            Some(missing @ ConfigError::Missing { .. }) => {
                eprintln!("{}", missing);
                Ok(ExitCode::FAILURE)
            }
            _ => Err(error),
        },
    }
}
