use crate::error::SpeedTestError;
use crate::point::{FieldValue, Point};
use crate::speedtest::{run_speed_test, SpeedTestProvider, SpeedTestResults};

/// Runs a live speed test and turns the result into a single point tagged
/// with `hostname`.
pub async fn collect<P>(provider: &P, hostname: &str) -> Result<Point, SpeedTestError>
where
    P: SpeedTestProvider + ?Sized,
{
    let results = run_speed_test(provider).await?;
    Ok(results_to_point(results, hostname))
}

#[tracing::instrument(skip_all, level = tracing::Level::TRACE)]
pub fn results_to_point(results: SpeedTestResults, hostname: &str) -> Point {
    Point::new(
        vec![
            (String::from("hostname"), hostname.to_string()),
            (String::from("server"), results.server.id),
            (String::from("ip"), results.client.ip),
        ],
        vec![
            (String::from("upload_bps"), FieldValue::F64(results.upload_bps)),
            (
                String::from("download_bps"),
                FieldValue::F64(results.download_bps),
            ),
            (String::from("ping_ms"), FieldValue::F64(results.ping_ms)),
            (
                String::from("tx_bytes"),
                FieldValue::I64(byte_count(results.bytes_sent)),
            ),
            (
                String::from("rx_bytes"),
                FieldValue::I64(byte_count(results.bytes_received)),
            ),
        ],
        results.timestamp,
    )
}

// InfluxDB 1.x has no unsigned field type.
fn byte_count(bytes: u64) -> i64 {
    i64::try_from(bytes).unwrap_or(i64::MAX)
}
