//! MVRV ratio collector.
//!
//! The MVRV series arrives as a JSON file dropped into the working directory
//! by an external workflow (a browser export of the blockchain.com MVRV
//! chart). The collector only cares that something provides a file with a
//! `mvrv` list of `{x: epoch-ms, y: ratio}` points, so that step sits behind
//! the `MvrvSource` trait and tests feed in their own file.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const MVRV_JSON_PATH: &str = "mvrv.json";
pub const MVRV_RATIO_CSV_PATH: &str = "mvrv_ratio.csv";

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub trait MvrvSource {
    /// Path to a JSON file conforming to the MVRV schema.
    fn mvrv_json(&self) -> Result<PathBuf>;
}

/// A file someone or something already placed at a known path.
pub struct DropInFile {
    path: PathBuf,
}

impl DropInFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for DropInFile {
    fn default() -> Self {
        Self::new(MVRV_JSON_PATH)
    }
}

impl MvrvSource for DropInFile {
    fn mvrv_json(&self) -> Result<PathBuf> {
        Ok(self.path.clone())
    }
}

#[derive(Debug, Deserialize)]
struct MvrvPoint {
    x: i64,
    y: f64,
}

#[derive(Debug, Deserialize)]
struct MvrvFile {
    mvrv: Vec<MvrvPoint>,
}

#[derive(Debug, Serialize)]
struct MvrvRatioRow {
    date: String,
    #[serde(rename = "MVRV")]
    mvrv: f64,
}

pub fn update_mvrv_ratio(source: &impl MvrvSource) -> Result<()> {
    update_mvrv_ratio_with(source, MVRV_RATIO_CSV_PATH)
}

pub fn update_mvrv_ratio_with(source: &impl MvrvSource, output: impl AsRef<Path>) -> Result<()> {
    let json_path = source.mvrv_json()?;
    let file = File::open(&json_path)
        .with_context(|| format!("failed to open MVRV file {}", json_path.display()))?;
    let data: MvrvFile = serde_json::from_reader(file)
        .with_context(|| format!("failed to parse MVRV file {}", json_path.display()))?;

    let mut csv_writer = csv::Writer::from_path(output.as_ref())?;
    for point in &data.mvrv {
        let timestamp = Utc
            .timestamp_millis_opt(point.x)
            .single()
            .with_context(|| format!("MVRV point carries invalid timestamp {}", point.x))?;
        csv_writer.serialize(MvrvRatioRow {
            date: timestamp.format(DATE_FORMAT).to_string(),
            mvrv: point.y,
        })?;
    }
    csv_writer.flush()?;

    info!(
        rows = data.mvrv.len(),
        path = %output.as_ref().display(),
        "wrote MVRV ratio table"
    );
    Ok(())
}
