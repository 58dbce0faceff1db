//! Merges whichever output tables a run produced into one date-indexed
//! table. Inputs that never materialized (a failed collector, a skipped
//! stage) are logged and left out, the merge succeeds with whatever exists.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::blockchain_info::{NETWORK_DATA_CSV_PATH, UTXO_DATA_CSV_PATH};
use crate::exchange_flows::DAILY_SUMMARY_CSV_PATH;
use crate::mvrv::MVRV_RATIO_CSV_PATH;

pub const MERGED_CSV_PATH: &str = "bitcoin_metrics.csv";

#[derive(Clone, Copy, Debug)]
enum Combine {
    /// Flow totals add up within a calendar day.
    Sum,
    /// Point-in-time metrics keep the day's last observation.
    LastObservation,
}

const INPUT_TABLES: [(&str, Combine); 4] = [
    (DAILY_SUMMARY_CSV_PATH, Combine::Sum),
    (NETWORK_DATA_CSV_PATH, Combine::LastObservation),
    (UTXO_DATA_CSV_PATH, Combine::LastObservation),
    (MVRV_RATIO_CSV_PATH, Combine::LastObservation),
];

pub fn merge_metric_tables(dir: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<()> {
    let mut columns: Vec<String> = Vec::new();
    let mut rows: BTreeMap<String, HashMap<String, f64>> = BTreeMap::new();

    for (file_name, combine) in INPUT_TABLES {
        let path = dir.as_ref().join(file_name);
        if !path.exists() {
            warn!(file = file_name, "input table missing, skipping");
            continue;
        }
        merge_table(&path, combine, &mut columns, &mut rows)
            .with_context(|| format!("failed to merge {}", path.display()))?;
    }

    let output = output.as_ref();
    let mut csv_writer = csv::Writer::from_path(output)?;

    let mut header = vec!["date".to_string()];
    header.extend(columns.iter().cloned());
    csv_writer.write_record(&header)?;

    for (day, values) in &rows {
        let mut record = vec![day.clone()];
        for column in &columns {
            record.push(
                values
                    .get(column)
                    .map(|value| value.to_string())
                    .unwrap_or_default(),
            );
        }
        csv_writer.write_record(&record)?;
    }
    csv_writer.flush()?;

    info!(
        days = rows.len(),
        columns = columns.len(),
        path = %output.display(),
        "wrote merged metrics table"
    );
    Ok(())
}

/// Folds one table into the accumulated rows. The first column is the date,
/// keyed down to the calendar day, every other column is numeric.
fn merge_table(
    path: &Path,
    combine: Combine,
    columns: &mut Vec<String>,
    rows: &mut BTreeMap<String, HashMap<String, f64>>,
) -> Result<()> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    for header in headers.iter().skip(1) {
        if !columns.iter().any(|column| column == header) {
            columns.push(header.to_string());
        }
    }

    for record in reader.records() {
        let record = record?;
        let Some(date) = record.get(0) else {
            continue;
        };
        let Some(day) = date.get(..10) else {
            continue;
        };

        let row = rows.entry(day.to_string()).or_default();
        for (header, value) in headers.iter().skip(1).zip(record.iter().skip(1)) {
            let Ok(value) = value.parse::<f64>() else {
                continue;
            };
            match combine {
                Combine::Sum => *row.entry(header.to_string()).or_insert(0.0) += value,
                Combine::LastObservation => {
                    row.insert(header.to_string(), value);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn merges_available_tables_by_calendar_day() {
        let dir = tempfile::tempdir().unwrap();

        fs::write(
            dir.path().join(DAILY_SUMMARY_CSV_PATH),
            "date,sent_amount_btc,received_amount_btc,net\n\
             2024-01-01 08:00:00,3.0,1.0,2.0\n\
             2024-01-01 17:30:00,1.0,0.5,0.5\n\
             2024-01-02 09:00:00,0.0,2.0,-2.0\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(NETWORK_DATA_CSV_PATH),
            "timestamp,hash-rate,difficulty\n\
             2024-01-01 00:00:00,450,62000\n\
             2024-01-01 12:00:00,455,62000\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(MVRV_RATIO_CSV_PATH),
            "date,MVRV\n2024-01-02 00:00:00,1.82\n",
        )
        .unwrap();
        // No UTXO table, the merge must not care.

        let output = dir.path().join(MERGED_CSV_PATH);
        merge_metric_tables(dir.path(), &output).unwrap();

        let contents = fs::read_to_string(&output).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next().unwrap(),
            "date,sent_amount_btc,received_amount_btc,net,hash-rate,difficulty,MVRV"
        );
        // Flows summed within the day, hash-rate keeps the last observation.
        assert_eq!(lines.next().unwrap(), "2024-01-01,4,1.5,2.5,455,62000,");
        assert_eq!(lines.next().unwrap(), "2024-01-02,0,2,-2,,,1.82");
        assert!(lines.next().is_none());
    }

    #[test]
    fn succeeds_with_no_input_tables() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join(MERGED_CSV_PATH);

        merge_metric_tables(dir.path(), &output).unwrap();

        let contents = fs::read_to_string(&output).unwrap();
        assert_eq!(contents, "date\n");
    }
}
