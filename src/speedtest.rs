use crate::error::SpeedTestError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, trace};
use rand::{distributions::Alphanumeric, Rng};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::time::{Duration, Instant};

pub static CONFIG_URL: &str = "https://www.speedtest.net/speedtest-config.php";

pub static SERVER_LIST_URLS: [&str; 4] = [
    "https://www.speedtest.net/speedtest-servers-static.php",
    "https://c.speedtest.net/speedtest-servers-static.php",
    "https://www.speedtest.net/speedtest-servers.php",
    "https://c.speedtest.net/speedtest-servers.php",
];

const CLOSEST_SERVER_COUNT: usize = 5;
const LATENCY_PROBES: u32 = 3;
const LATENCY_PENALTY: Duration = Duration::from_secs(3600);
const DOWNLOAD_SIZES: [u32; 10] = [350, 500, 750, 1000, 1500, 2000, 2500, 3000, 3500, 4000];
const UPLOAD_SIZES: [usize; 5] = [262_144, 524_288, 1_048_576, 2_097_152, 4_194_304];
const REQUESTS_PER_SIZE: u32 = 4;
const TEST_LENGTH: Duration = Duration::from_secs(10);
const EARTH_RADIUS_KM: f64 = 6371.0;
const UPLOAD_PREFIX: &[u8] = b"content1=";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientInfo {
    pub ip: String,
    pub lat: f64,
    pub lon: f64,
    pub isp: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeedTestConfig {
    pub client: ClientInfo,
    pub ignore_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Server {
    pub id: String,
    pub url: String,
    pub name: String,
    pub country: String,
    pub sponsor: String,
    pub host: String,
    pub lat: f64,
    pub lon: f64,
    pub distance_km: f64,
}

impl Server {
    // Directory of the upload URL; latency and download files live beside it.
    pub fn base_url(&self) -> &str {
        match self.url.rfind('/') {
            Some(index) => &self.url[..index],
            None => &self.url,
        }
    }
}

/// Bytes moved during one test phase and the wall time it took.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transfer {
    pub bytes: u64,
    pub elapsed: Duration,
}

impl Transfer {
    pub fn bits_per_second(&self) -> f64 {
        let seconds = self.elapsed.as_secs_f64();
        if seconds > 0.0 {
            self.bytes as f64 * 8.0 / seconds
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeedTestResults {
    pub download_bps: f64,
    pub upload_bps: f64,
    pub ping_ms: f64,
    pub server: Server,
    pub client: ClientInfo,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub timestamp: String,
}

/// A network speed-test provider. [`run_speed_test`] calls the steps in
/// declaration order.
#[async_trait]
pub trait SpeedTestProvider {
    async fn configuration(&self) -> Result<SpeedTestConfig, SpeedTestError>;

    /// Candidate servers, closest first.
    async fn servers(&self, config: &SpeedTestConfig) -> Result<Vec<Server>, SpeedTestError>;

    /// Picks the server to test against and its latency in milliseconds.
    async fn best_server(&self, servers: &[Server]) -> Result<(Server, f64), SpeedTestError>;

    async fn download(&self, server: &Server) -> Result<Transfer, SpeedTestError>;

    async fn upload(&self, server: &Server) -> Result<Transfer, SpeedTestError>;
}

pub fn iso_timestamp(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

pub async fn run_speed_test<P>(provider: &P) -> Result<SpeedTestResults, SpeedTestError>
where
    P: SpeedTestProvider + ?Sized,
{
    let function_start = Instant::now();
    let timestamp = iso_timestamp(Utc::now());

    let config = provider.configuration().await?;
    debug!(
        "Testing from {} ({})",
        config.client.isp, config.client.ip
    );

    let servers = provider.servers(&config).await?;
    debug!("Retrieved {} candidate servers", servers.len());

    let (server, ping_ms) = provider.best_server(&servers).await?;
    info!(
        "Selected server {} hosted by {} ({}) [{:.2} km]: {:.3} ms",
        server.id, server.sponsor, server.name, server.distance_km, ping_ms
    );

    let download = provider.download(&server).await?;
    info!(
        "Download: {:.2} Mbit/s",
        download.bits_per_second() / 1_000_000.0
    );

    let upload = provider.upload(&server).await?;
    info!("Upload: {:.2} Mbit/s", upload.bits_per_second() / 1_000_000.0);

    trace!("run_speed_test duration: {:?}", function_start.elapsed());
    Ok(SpeedTestResults {
        download_bps: download.bits_per_second(),
        upload_bps: upload.bits_per_second(),
        ping_ms,
        server,
        client: config.client,
        bytes_sent: upload.bytes,
        bytes_received: download.bytes,
        timestamp,
    })
}

/// Great-circle distance between two `(lat, lon)` pairs in kilometres.
pub fn distance_km(origin: (f64, f64), destination: (f64, f64)) -> f64 {
    let (lat1, lon1) = origin;
    let (lat2, lon2) = destination;
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

#[derive(Debug, Deserialize)]
struct ConfigDocument {
    client: ClientElement,
    #[serde(rename = "server-config")]
    server_config: Option<ServerConfigElement>,
}

#[derive(Debug, Deserialize)]
struct ClientElement {
    #[serde(rename = "@ip")]
    ip: String,
    #[serde(rename = "@lat")]
    lat: f64,
    #[serde(rename = "@lon")]
    lon: f64,
    #[serde(rename = "@isp", default)]
    isp: String,
}

#[derive(Debug, Deserialize)]
struct ServerConfigElement {
    #[serde(rename = "@ignoreids", default)]
    ignoreids: String,
}

#[derive(Debug, Deserialize)]
struct ServerListDocument {
    servers: ServersElement,
}

#[derive(Debug, Deserialize)]
struct ServersElement {
    #[serde(rename = "server", default)]
    server: Vec<ServerElement>,
}

#[derive(Debug, Deserialize)]
struct ServerElement {
    #[serde(rename = "@url")]
    url: String,
    #[serde(rename = "@lat")]
    lat: f64,
    #[serde(rename = "@lon")]
    lon: f64,
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "@country", default)]
    country: String,
    #[serde(rename = "@sponsor", default)]
    sponsor: String,
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@host", default)]
    host: String,
}

#[tracing::instrument(skip_all, level = tracing::Level::TRACE)]
pub fn parse_configuration(xml: &str) -> Result<SpeedTestConfig, SpeedTestError> {
    let document: ConfigDocument = quick_xml::de::from_str(xml)?;
    let ignore_ids = document
        .server_config
        .map(|server_config| {
            server_config
                .ignoreids
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(SpeedTestConfig {
        client: ClientInfo {
            ip: document.client.ip,
            lat: document.client.lat,
            lon: document.client.lon,
            isp: document.client.isp,
        },
        ignore_ids,
    })
}

/// Parses a server list, drops ignored ids and sorts by distance from the
/// client.
#[tracing::instrument(skip_all, level = tracing::Level::TRACE)]
pub fn parse_server_list(
    xml: &str,
    config: &SpeedTestConfig,
) -> Result<Vec<Server>, SpeedTestError> {
    let document: ServerListDocument = quick_xml::de::from_str(xml)?;
    let origin = (config.client.lat, config.client.lon);

    let mut servers: Vec<Server> = document
        .servers
        .server
        .into_iter()
        .filter(|element| !config.ignore_ids.contains(&element.id))
        .map(|element| Server {
            distance_km: distance_km(origin, (element.lat, element.lon)),
            id: element.id,
            url: element.url,
            name: element.name,
            country: element.country,
            sponsor: element.sponsor,
            host: element.host,
            lat: element.lat,
            lon: element.lon,
        })
        .collect();
    servers.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    Ok(servers)
}

/// Latency in milliseconds from cumulative probe time, as speedtest.net
/// reports it.
pub fn latency_ms(cumulative: Duration) -> f64 {
    let ms = cumulative.as_secs_f64() / (2.0 * LATENCY_PROBES as f64) * 1000.0;
    (ms * 1000.0).round() / 1000.0
}

pub fn upload_payload(size: usize) -> Vec<u8> {
    let mut payload = UPLOAD_PREFIX.to_vec();
    payload.extend(
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(size.saturating_sub(UPLOAD_PREFIX.len())),
    );
    payload
}

fn cache_buster(request: u32) -> String {
    format!("{}.{}", Utc::now().timestamp_millis(), request)
}

fn user_agent() -> String {
    format!(
        "Mozilla/5.0 ({}; U; {}; en-us) Rust (KHTML, like Gecko) speedtest-influxdb/{}",
        std::env::consts::OS,
        std::env::consts::ARCH,
        env!("CARGO_PKG_VERSION")
    )
}

/// speedtest.net over its legacy HTTP protocol. Requests run one at a time.
#[derive(Debug, Clone)]
pub struct HttpSpeedTest {
    client: reqwest::Client,
    test_length: Duration,
}

impl HttpSpeedTest {
    pub fn new() -> Result<Self, SpeedTestError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent())
            .build()?;
        Ok(HttpSpeedTest {
            client,
            test_length: TEST_LENGTH,
        })
    }

    async fn fetch_text(&self, url: &str) -> Result<String, reqwest::Error> {
        self.client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }

    // None when every probe failed.
    async fn latency(&self, server: &Server) -> Option<f64> {
        let url = format!("{}/latency.txt", server.base_url());
        let mut cumulative = Duration::ZERO;
        let mut reachable = false;

        for probe in 0..LATENCY_PROBES {
            let start = Instant::now();
            let reply = self
                .client
                .get(&url)
                .query(&[("x", cache_buster(probe))])
                .send()
                .await;
            let elapsed = start.elapsed();

            let body = match reply {
                Ok(response) if response.status().is_success() => response.text().await.ok(),
                _ => None,
            };
            match body {
                Some(text) if text.trim() == "test=test" => {
                    cumulative += elapsed;
                    reachable = true;
                }
                _ => cumulative += LATENCY_PENALTY,
            }
        }

        reachable.then(|| latency_ms(cumulative))
    }
}

#[async_trait]
impl SpeedTestProvider for HttpSpeedTest {
    async fn configuration(&self) -> Result<SpeedTestConfig, SpeedTestError> {
        let body = self.fetch_text(CONFIG_URL).await?;
        parse_configuration(&body)
    }

    async fn servers(&self, config: &SpeedTestConfig) -> Result<Vec<Server>, SpeedTestError> {
        for url in SERVER_LIST_URLS {
            let body = match self.fetch_text(url).await {
                Ok(body) => body,
                Err(error) => {
                    debug!("Failed to retrieve server list from {}: {}", url, error);
                    continue;
                }
            };
            match parse_server_list(&body, config) {
                Ok(servers) if !servers.is_empty() => return Ok(servers),
                Ok(_) => debug!("Server list from {} is empty", url),
                Err(error) => debug!("Failed to parse server list from {}: {}", url, error),
            }
        }

        Err(SpeedTestError::Network(String::from(
            "Unable to retrieve speedtest.net server list",
        )))
    }

    async fn best_server(&self, servers: &[Server]) -> Result<(Server, f64), SpeedTestError> {
        let function_start = Instant::now();
        let mut best: Option<(Server, f64)> = None;

        for server in servers.iter().take(CLOSEST_SERVER_COUNT) {
            let Some(latency) = self.latency(server).await else {
                debug!("Server {} ({}) is unreachable", server.id, server.host);
                continue;
            };
            debug!("Server {} latency: {:.3} ms", server.id, latency);
            if best.as_ref().map_or(true, |(_, best_latency)| latency < *best_latency) {
                best = Some((server.clone(), latency));
            }
        }

        trace!("best_server duration: {:?}", function_start.elapsed());
        best.ok_or_else(|| {
            SpeedTestError::Network(String::from(
                "Unable to connect to servers to test latency",
            ))
        })
    }

    async fn download(&self, server: &Server) -> Result<Transfer, SpeedTestError> {
        let start = Instant::now();
        let deadline = start + self.test_length;
        let mut bytes: u64 = 0;

        'sizes: for size in DOWNLOAD_SIZES {
            let url = format!("{}/random{}x{}.jpg", server.base_url(), size, size);
            for request in 0..REQUESTS_PER_SIZE {
                if Instant::now() >= deadline {
                    break 'sizes;
                }
                let failed = |error: reqwest::Error| {
                    SpeedTestError::Test(format!("Download from {} failed: {}", url, error))
                };
                let mut response = self
                    .client
                    .get(&url)
                    .query(&[("x", cache_buster(request))])
                    .send()
                    .await
                    .and_then(|response| response.error_for_status())
                    .map_err(failed)?;
                while let Some(chunk) = response.chunk().await.map_err(failed)? {
                    bytes += chunk.len() as u64;
                    if Instant::now() >= deadline {
                        break 'sizes;
                    }
                }
            }
        }

        let transfer = Transfer {
            bytes,
            elapsed: start.elapsed(),
        };
        if transfer.bytes == 0 {
            return Err(SpeedTestError::Test(String::from(
                "Download phase received no data",
            )));
        }
        trace!("download duration: {:?}", transfer.elapsed);
        Ok(transfer)
    }

    async fn upload(&self, server: &Server) -> Result<Transfer, SpeedTestError> {
        let start = Instant::now();
        let deadline = start + self.test_length;
        let mut bytes: u64 = 0;

        'sizes: for size in UPLOAD_SIZES {
            let payload = upload_payload(size);
            for request in 0..REQUESTS_PER_SIZE {
                if Instant::now() >= deadline {
                    break 'sizes;
                }
                self.client
                    .post(&server.url)
                    .query(&[("x", cache_buster(request))])
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(payload.clone())
                    .send()
                    .await
                    .and_then(|response| response.error_for_status())
                    .map_err(|error| {
                        SpeedTestError::Test(format!(
                            "Upload to {} failed: {}",
                            server.url, error
                        ))
                    })?;
                bytes += payload.len() as u64;
            }
        }

        let transfer = Transfer {
            bytes,
            elapsed: start.elapsed(),
        };
        if transfer.bytes == 0 {
            return Err(SpeedTestError::Test(String::from(
                "Upload phase sent no data",
            )));
        }
        trace!("upload duration: {:?}", transfer.elapsed);
        Ok(transfer)
    }
}
