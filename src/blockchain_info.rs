//! Collectors for the blockchain.info charting API.
//!
//! Each metric comes back as `{"values": [{x, y}]}` with `x` in epoch
//! seconds. A response without a `values` field is logged and treated as an
//! empty series rather than an error, so one bad metric never blocks the
//! rest of a run.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Duration, TimeZone, Utc};
use format_url::FormatUrl;
use serde::Deserialize;
use tracing::{debug, warn};

const BLOCKCHAIN_INFO_API: &str = "https://api.blockchain.info";

pub const NETWORK_DATA_CSV_PATH: &str = "bitcoin_network_data.csv";
pub const UTXO_DATA_CSV_PATH: &str = "bitcoin_utxo_data.csv";

const NETWORK_METRICS: [&str; 2] = ["hash-rate", "difficulty"];
const UTXO_METRICS: [&str; 2] = ["utxo-count", "total-bitcoins"];

const METRIC_WINDOW_DAYS: i64 = 1825;
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Deserialize)]
struct ChartPoint {
    x: i64,
    y: f64,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    values: Option<Vec<ChartPoint>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MetricPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Fetches one metric's full series. A well-formed response without a
/// `values` field yields an empty series.
pub async fn fetch_metric_series(
    client: &reqwest::Client,
    base_url: &str,
    metric: &str,
    timespan: &str,
) -> Result<Vec<MetricPoint>> {
    let url = FormatUrl::new(base_url)
        .with_path_template(&format!("/charts/{metric}"))
        .with_query_params(vec![
            ("timespan", timespan),
            ("format", "json"),
            ("sampled", "false"),
        ])
        .format_url();

    debug!("sending request to {}", url);

    let body = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json::<ChartResponse>()
        .await?;

    match body.values {
        None => {
            warn!(metric, "chart response missing 'values' field");
            Ok(Vec::new())
        }
        Some(values) => Ok(values
            .into_iter()
            .filter_map(|point| {
                Utc.timestamp_opt(point.x, 0)
                    .single()
                    .map(|timestamp| MetricPoint {
                        timestamp,
                        value: point.y,
                    })
            })
            .collect()),
    }
}

pub fn filter_window(
    points: Vec<MetricPoint>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<MetricPoint> {
    points
        .into_iter()
        .filter(|point| point.timestamp >= start && point.timestamp <= end)
        .collect()
}

/// Writes named series into one table, rows keyed on the first non-empty
/// series' timestamps. Empty series contribute no column, series missing a
/// timestamp leave the cell blank.
pub fn write_metric_table(
    path: impl AsRef<Path>,
    series: &[(String, Vec<MetricPoint>)],
) -> Result<()> {
    let with_data: Vec<&(String, Vec<MetricPoint>)> = series
        .iter()
        .filter(|(_, points)| !points.is_empty())
        .collect();

    let mut csv_writer = csv::Writer::from_path(path.as_ref())?;

    let mut header = vec!["timestamp".to_string()];
    header.extend(with_data.iter().map(|(name, _)| name.clone()));
    csv_writer.write_record(&header)?;

    if let Some((_, primary)) = with_data.first() {
        let lookups: Vec<HashMap<i64, f64>> = with_data[1..]
            .iter()
            .map(|(_, points)| {
                points
                    .iter()
                    .map(|point| (point.timestamp.timestamp(), point.value))
                    .collect()
            })
            .collect();

        for point in primary {
            let mut row = vec![
                point.timestamp.format(DATE_FORMAT).to_string(),
                point.value.to_string(),
            ];
            for lookup in &lookups {
                row.push(
                    lookup
                        .get(&point.timestamp.timestamp())
                        .map(|value| value.to_string())
                        .unwrap_or_default(),
                );
            }
            csv_writer.write_record(&row)?;
        }
    }

    csv_writer.flush()?;
    Ok(())
}

async fn update_metric_table(
    client: &reqwest::Client,
    base_url: &str,
    metrics: &[&str],
    timespan: &str,
    path: impl AsRef<Path>,
) -> Result<()> {
    let end = Utc::now();
    let start = end - Duration::days(METRIC_WINDOW_DAYS);

    let mut series = Vec::new();
    for metric in metrics {
        let points = fetch_metric_series(client, base_url, metric, timespan).await?;
        series.push((metric.to_string(), filter_window(points, start, end)));
    }

    write_metric_table(path, &series)
}

/// Hash-rate and difficulty over the trailing five years.
pub async fn update_network_data() -> Result<()> {
    let client = reqwest::Client::new();
    update_network_data_with(&client, BLOCKCHAIN_INFO_API, NETWORK_DATA_CSV_PATH).await
}

pub async fn update_network_data_with(
    client: &reqwest::Client,
    base_url: &str,
    path: impl AsRef<Path>,
) -> Result<()> {
    update_metric_table(client, base_url, &NETWORK_METRICS, "10years", path).await
}

/// UTXO count and circulating supply over the trailing five years.
pub async fn update_utxo_data() -> Result<()> {
    let client = reqwest::Client::new();
    update_utxo_data_with(&client, BLOCKCHAIN_INFO_API, UTXO_DATA_CSV_PATH).await
}

pub async fn update_utxo_data_with(
    client: &reqwest::Client,
    base_url: &str,
    path: impl AsRef<Path>,
) -> Result<()> {
    update_metric_table(client, base_url, &UTXO_METRICS, "5years", path).await
}
