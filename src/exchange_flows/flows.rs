use chrono::{TimeZone, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::mempool_space::Transaction;

pub const SATS_PER_BTC_F64: f64 = 100_000_000.0;

/// Sentinel date for transactions still waiting on a block.
pub const UNCONFIRMED: &str = "Unconfirmed";

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// What one transaction moved in and out of one tracked address.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FlowRecord {
    pub date: String,
    pub wallet_address: String,
    pub sent_amount_btc: f64,
    pub received_amount_btc: f64,
    pub net: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DailySummaryRecord {
    pub date: String,
    pub sent_amount_btc: f64,
    pub received_amount_btc: f64,
    pub net: f64,
}

/// Sums what `address` spent and received in `tx`. Amounts come back in BTC,
/// converted from the satoshi amounts on the wire.
pub fn flow_record(tx: &Transaction, address: &str) -> FlowRecord {
    let sent_sats: u64 = tx
        .vin
        .iter()
        .filter_map(|vin| vin.prevout.as_ref())
        .filter(|prevout| prevout.scriptpubkey_address.as_deref() == Some(address))
        .map(|prevout| prevout.value)
        .sum();

    let received_sats: u64 = tx
        .vout
        .iter()
        .filter(|vout| vout.scriptpubkey_address.as_deref() == Some(address))
        .map(|vout| vout.value)
        .sum();

    let date = tx
        .status
        .block_time
        .and_then(|block_time| Utc.timestamp_opt(block_time, 0).single())
        .map(|timestamp| timestamp.format(DATE_FORMAT).to_string())
        .unwrap_or_else(|| UNCONFIRMED.to_string());

    let sent_amount_btc = sent_sats as f64 / SATS_PER_BTC_F64;
    let received_amount_btc = received_sats as f64 / SATS_PER_BTC_F64;

    FlowRecord {
        date,
        wallet_address: address.to_string(),
        sent_amount_btc,
        received_amount_btc,
        net: sent_amount_btc - received_amount_btc,
    }
}

/// Drops unconfirmed records and sorts the rest date-ascending.
pub fn sorted_confirmed(mut records: Vec<FlowRecord>) -> Vec<FlowRecord> {
    records.retain(|record| record.date != UNCONFIRMED);
    records.sort_by(|a, b| a.date.cmp(&b.date));
    records
}

/// Sums sent, received and net across all records sharing a date, one row
/// per distinct date, date-ascending. Unconfirmed records never contribute.
pub fn daily_summary(records: &[FlowRecord]) -> Vec<DailySummaryRecord> {
    let mut by_date: BTreeMap<String, DailySummaryRecord> = BTreeMap::new();

    for record in records {
        if record.date == UNCONFIRMED {
            continue;
        }
        let entry = by_date
            .entry(record.date.clone())
            .or_insert_with(|| DailySummaryRecord {
                date: record.date.clone(),
                sent_amount_btc: 0.0,
                received_amount_btc: 0.0,
                net: 0.0,
            });
        entry.sent_amount_btc += record.sent_amount_btc;
        entry.received_amount_btc += record.received_amount_btc;
        entry.net += record.net;
    }

    by_date.into_values().collect()
}
