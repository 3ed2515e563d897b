use crate::error::ImportError;
use crate::point::{FieldValue, Point};
use csv::StringRecord;
use std::io::Read;

/// Column positions of the speedtest-cli CSV format. The format has no
/// reliable header, so positions are fixed rather than looked up by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnIndex {
    ServerId = 0,
    Sponsor = 1,
    ServerName = 2,
    Timestamp = 3,
    Distance = 4,
    Ping = 5,
    Download = 6,
    Upload = 7,
    Share = 8,
    IpAddress = 9,
}

impl ColumnIndex {
    pub fn position(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            ColumnIndex::ServerId => "Server_ID",
            ColumnIndex::Sponsor => "Sponsor",
            ColumnIndex::ServerName => "Server_Name",
            ColumnIndex::Timestamp => "Timestamp",
            ColumnIndex::Distance => "Distance",
            ColumnIndex::Ping => "Ping",
            ColumnIndex::Download => "Download",
            ColumnIndex::Upload => "Upload",
            ColumnIndex::Share => "Share",
            ColumnIndex::IpAddress => "IP_Address",
        }
    }
}

/// Lazily converts speedtest-cli CSV records into points tagged with
/// `hostname`. When `has_headers` is set the first record is discarded
/// without being inspected.
pub fn import_csv<R: Read>(
    reader: R,
    hostname: &str,
    has_headers: bool,
) -> impl Iterator<Item = Result<Point, ImportError>> {
    let hostname = hostname.to_string();
    let csv_reader = csv::ReaderBuilder::new()
        .has_headers(has_headers)
        .flexible(true)
        .from_reader(reader);

    csv_reader
        .into_records()
        .enumerate()
        .map(move |(index, record)| {
            record
                .map_err(ImportError::from)
                .and_then(|record| record_to_point(index as u64 + 1, &record, &hostname))
        })
}

#[tracing::instrument(skip_all, level = tracing::Level::TRACE)]
fn record_to_point(
    record_number: u64,
    record: &StringRecord,
    hostname: &str,
) -> Result<Point, ImportError> {
    Ok(Point::new(
        vec![
            (String::from("hostname"), hostname.to_string()),
            (
                String::from("server"),
                text_at(record_number, record, ColumnIndex::ServerId)?.to_string(),
            ),
            (
                String::from("ip"),
                text_at(record_number, record, ColumnIndex::IpAddress)?.to_string(),
            ),
        ],
        vec![
            (
                String::from("upload_bps"),
                number_at(record_number, record, ColumnIndex::Upload)?,
            ),
            (
                String::from("download_bps"),
                number_at(record_number, record, ColumnIndex::Download)?,
            ),
            (
                String::from("ping_ms"),
                number_at(record_number, record, ColumnIndex::Ping)?,
            ),
        ],
        text_at(record_number, record, ColumnIndex::Timestamp)?.to_string(),
    ))
}

fn text_at(
    record_number: u64,
    record: &StringRecord,
    column: ColumnIndex,
) -> Result<&str, ImportError> {
    record
        .get(column.position())
        .ok_or(ImportError::MissingColumn {
            record: record_number,
            column: column.name(),
            position: column.position(),
            len: record.len(),
        })
}

fn number_at(
    record_number: u64,
    record: &StringRecord,
    column: ColumnIndex,
) -> Result<FieldValue, ImportError> {
    let value = text_at(record_number, record, column)?;
    value
        .trim()
        .parse::<f64>()
        .map(FieldValue::F64)
        .map_err(|source| ImportError::InvalidNumber {
            record: record_number,
            column: column.name(),
            value: value.to_string(),
            source,
        })
}
