//! Exchange wallet flow tracking.
//!
//! Walks the transaction history of every tracked address, turns each
//! transaction into a flow record, and writes the per-transaction table plus
//! a per-date summary. Every stage returns its value, nothing accumulates in
//! shared state.

mod export;
mod flows;

pub use export::write_daily_summary;
pub use export::write_flow_records;
pub use flows::daily_summary;
pub use flows::flow_record;
pub use flows::sorted_confirmed;
pub use flows::DailySummaryRecord;
pub use flows::FlowRecord;
pub use flows::SATS_PER_BTC_F64;
pub use flows::UNCONFIRMED;

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::env::ENV_CONFIG;
use crate::mempool_space::{
    transactions_for_address, MempoolApi, MempoolApiHttp, DEFAULT_MAX_TRANSACTIONS,
};

pub const TRANSACTIONS_CSV_PATH: &str = "cex_transactions.csv";
pub const DAILY_SUMMARY_CSV_PATH: &str = "day_sum.csv";

/// Reads the tracked address list, one address per row, first column.
pub fn load_addresses(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open address list {}", path.display()))?;

    let mut addresses = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(address) = record.get(0) {
            if !address.is_empty() {
                addresses.push(address.to_string());
            }
        }
    }
    Ok(addresses)
}

/// Walks every address sequentially and aggregates one flow record per
/// transaction. An address whose walk fails is logged and skipped, the rest
/// still run.
pub async fn collect_flow_records(
    api: &impl MempoolApi,
    addresses: &[String],
    max_transactions: usize,
) -> Vec<FlowRecord> {
    let mut records = Vec::new();

    for address in addresses {
        match transactions_for_address(api, address, max_transactions).await {
            Ok(transactions) => {
                info!(
                    address,
                    count = transactions.len(),
                    "walked address history"
                );
                records.extend(
                    transactions
                        .iter()
                        .map(|transaction| flow_record(transaction, address)),
                );
            }
            Err(err) => {
                warn!(address, %err, "failed to walk address history, skipping");
            }
        }
    }

    records
}

pub async fn sync_exchange_flows() -> Result<()> {
    let addresses = load_addresses(&ENV_CONFIG.addresses_csv)?;
    info!(count = addresses.len(), "loaded tracked addresses");

    let api = MempoolApiHttp::new();
    let records = collect_flow_records(&api, &addresses, DEFAULT_MAX_TRANSACTIONS).await;

    let confirmed = sorted_confirmed(records);
    write_flow_records(TRANSACTIONS_CSV_PATH, &confirmed)?;
    write_daily_summary(DAILY_SUMMARY_CSV_PATH, &daily_summary(&confirmed))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use crate::mempool_space::{FetchError, MockMempoolApi, Transaction, TxOutput, TxStatus};

    use super::*;

    #[test]
    fn load_addresses_takes_first_column() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bc1qfirst,exchange-a").unwrap();
        writeln!(file, "bc1qsecond,exchange-b").unwrap();
        file.flush().unwrap();

        let addresses = load_addresses(file.path()).unwrap();
        assert_eq!(addresses, vec!["bc1qfirst", "bc1qsecond"]);
    }

    #[tokio::test(start_paused = true)]
    async fn collect_skips_failing_address() {
        let mut api = MockMempoolApi::new();
        api.expect_transactions_page()
            .returning(|address, after_txid| match address {
                "bc1qbroken" => Err(FetchError::Request("timed out".to_string())),
                "bc1qgood" => match after_txid {
                    None => Ok(vec![Transaction {
                        txid: "abc".to_string(),
                        vin: vec![],
                        vout: vec![TxOutput {
                            scriptpubkey_address: Some("bc1qgood".to_string()),
                            value: 100_000_000,
                        }],
                        status: TxStatus {
                            confirmed: true,
                            block_time: Some(1_700_000_000),
                        },
                    }]),
                    Some(_) => Ok(vec![]),
                },
                other => panic!("unexpected address {other}"),
            });

        let addresses = vec!["bc1qbroken".to_string(), "bc1qgood".to_string()];
        let records = collect_flow_records(&api, &addresses, 1000).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].wallet_address, "bc1qgood");
        assert_eq!(records[0].received_amount_btc, 1.0);
        assert_eq!(records[0].net, -1.0);
    }
}
