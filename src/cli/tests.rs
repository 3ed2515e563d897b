use super::Args;
use anyhow::Error;
use clap::Parser;
use std::path::PathBuf;

#[test]
fn test_defaults() -> Result<(), Error> {
    let args = Args::try_parse_from(["speedtest-influxdb"])?;

    assert_eq!(args.import_csv, None);
    assert_eq!(args.config, PathBuf::from("config.ini"));
    assert!(!args.skip);
    assert_eq!(args.hostname, None);
    Ok(())
}

#[test]
fn test_all_flags() -> Result<(), Error> {
    let args = Args::try_parse_from([
        "speedtest-influxdb",
        "--import",
        "history.csv",
        "--config",
        "/etc/speedtest/config.ini",
        "--skip",
        "--hostname",
        "custom-host",
    ])?;

    assert_eq!(args.import_csv, Some(PathBuf::from("history.csv")));
    assert_eq!(args.config, PathBuf::from("/etc/speedtest/config.ini"));
    assert!(args.skip);
    assert_eq!(args.hostname.as_deref(), Some("custom-host"));
    Ok(())
}

#[test]
fn test_import_requires_filename() {
    assert!(Args::try_parse_from(["speedtest-influxdb", "--import"]).is_err());
}
