use std::path::Path;

use anyhow::Result;
use tracing::info;

use super::{DailySummaryRecord, FlowRecord};

pub fn write_flow_records(path: impl AsRef<Path>, records: &[FlowRecord]) -> Result<()> {
    let path = path.as_ref();
    let mut csv_writer = csv::Writer::from_path(path)?;
    for record in records {
        csv_writer.serialize(record)?;
    }
    csv_writer.flush()?;
    info!(path = %path.display(), rows = records.len(), "wrote flow records");
    Ok(())
}

pub fn write_daily_summary(path: impl AsRef<Path>, summary: &[DailySummaryRecord]) -> Result<()> {
    let path = path.as_ref();
    let mut csv_writer = csv::Writer::from_path(path)?;
    for row in summary {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    info!(path = %path.display(), rows = summary.len(), "wrote daily summary");
    Ok(())
}
