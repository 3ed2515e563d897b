use crate::config::InfluxSettings;
use crate::error::WriteError;
use crate::point::{FieldValue, Point};
use chrono::{DateTime, NaiveDateTime};
use influxdb_line_protocol::LineProtocolBuilder;
use log::{info, trace};
use std::time::Instant;

static NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

// The line protocol builder changes type once a field is written, so the
// per-variant dispatch is expanded in place for each builder state.
macro_rules! add_field {
    ($line:expr, $key:expr, $value:expr) => {
        match $value {
            FieldValue::I64(value) => $line.field($key, *value),
            FieldValue::F64(value) => $line.field($key, *value),
        }
    };
}

#[tracing::instrument(skip_all, level = tracing::Level::TRACE)]
pub fn stamp_measurement(points: &mut [Point], measurement: &str) {
    for point in points.iter_mut() {
        point.set_measurement(measurement);
    }
}

/// Converts a point time into nanoseconds since the Unix epoch. Accepts
/// RFC 3339, naive date-times taken as UTC, or an integer nanosecond value.
pub fn timestamp_nanos(time: &str) -> Result<i64, WriteError> {
    let time = time.trim();
    if let Ok(nanos) = time.parse::<i64>() {
        return Ok(nanos);
    }

    let parsed = DateTime::parse_from_rfc3339(time)
        .map(|datetime| datetime.naive_utc())
        .ok()
        .or_else(|| {
            NAIVE_TIMESTAMP_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(time, format).ok())
        });

    parsed
        .and_then(|datetime| datetime.and_utc().timestamp_nanos_opt())
        .ok_or_else(|| WriteError::Timestamp(time.to_string()))
}

/// Encodes stamped points as one line protocol body.
#[tracing::instrument(skip_all, level = tracing::Level::TRACE)]
pub fn build_line_protocol(points: &[Point]) -> Result<Vec<u8>, WriteError> {
    let mut builder = LineProtocolBuilder::new();

    for point in points {
        let measurement = point
            .measurement()
            .ok_or_else(|| WriteError::MissingMeasurement(point.time().to_string()))?;
        let mut line = builder.measurement(measurement);
        // Line protocol has no empty tag value
        let tags = point.tags().iter().filter(|(_, value)| !value.is_empty());
        for (tag_key, tag_value) in tags {
            line = line.tag(tag_key, tag_value);
        }

        let mut fields = point.fields().iter();
        let (first_key, first_value) = fields
            .next()
            .ok_or_else(|| WriteError::EmptyFields(point.time().to_string()))?;
        let mut line = add_field!(line, first_key, first_value);
        for (field_key, field_value) in fields {
            line = add_field!(line, field_key, field_value);
        }

        builder = line.timestamp(timestamp_nanos(point.time())?).close_line();
    }

    Ok(builder.build())
}

fn http_client(settings: &InfluxSettings) -> Result<reqwest::Client, WriteError> {
    Ok(reqwest::Client::builder()
        .danger_accept_invalid_certs(settings.ssl && !settings.verify_ssl)
        .build()?)
}

/// Stamps `settings.measurement` on the batch and submits it as a single
/// write request. An empty batch sends nothing.
pub async fn write_points(
    mut points: Vec<Point>,
    settings: &InfluxSettings,
) -> Result<(), WriteError> {
    let function_start = Instant::now();
    if points.is_empty() {
        info!("No points to write");
        return Ok(());
    }

    stamp_measurement(&mut points, &settings.measurement);
    let body = build_line_protocol(&points)?;

    let response = http_client(settings)?
        .post(settings.write_url())
        .query(&[("db", settings.database.as_str()), ("precision", "n")])
        .basic_auth(&settings.username, Some(&settings.password))
        .body(body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(WriteError::Rejected { status, body });
    }

    info!(
        "{} points written to measurement {} in database {}",
        points.len(),
        settings.measurement,
        settings.database
    );
    trace!("write_points duration: {:?}", function_start.elapsed());
    Ok(())
}
