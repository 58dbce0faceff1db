use clap::{Parser, Subcommand};
use tracing::warn;

use btc_analysis::{
    log, merge_metric_tables, sync_exchange_flows, update_mvrv_ratio, update_network_data,
    update_utxo_data, DropInFile, MERGED_CSV_PATH,
};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Walk every tracked address and write the flow tables.
    SyncExchangeFlows {},
    /// Fetch hash-rate and difficulty to CSV.
    UpdateNetworkData {},
    /// Fetch UTXO count and circulating supply to CSV.
    UpdateUtxoData {},
    /// Convert a dropped-in MVRV JSON file to CSV.
    UpdateMvrvRatio {
        /// Path to the MVRV JSON file.
        #[clap(long, default_value = "mvrv.json")]
        input: String,
    },
    /// Merge whichever output tables exist into one date-indexed table.
    MergeMetrics {
        /// Directory holding the collector output tables.
        #[clap(long, default_value = ".")]
        dir: String,
        /// Output file path.
        #[clap(long, default_value = MERGED_CSV_PATH)]
        output: String,
    },
    /// Run every collector, then merge.
    All {},
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    log::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::SyncExchangeFlows {} => {
            sync_exchange_flows().await?;
        }
        Commands::UpdateNetworkData {} => {
            update_network_data().await?;
        }
        Commands::UpdateUtxoData {} => {
            update_utxo_data().await?;
        }
        Commands::UpdateMvrvRatio { input } => {
            update_mvrv_ratio(&DropInFile::new(input))?;
        }
        Commands::MergeMetrics { dir, output } => {
            merge_metric_tables(dir, output)?;
        }
        Commands::All {} => {
            // Collector failures stay contained to the table they would
            // have produced, the merge runs over whatever exists.
            if let Err(err) = sync_exchange_flows().await {
                warn!(%err, "exchange flow sync failed");
            }
            if let Err(err) = update_network_data().await {
                warn!(%err, "network data update failed");
            }
            if let Err(err) = update_utxo_data().await {
                warn!(%err, "utxo data update failed");
            }
            if let Err(err) = update_mvrv_ratio(&DropInFile::default()) {
                warn!(%err, "mvrv ratio update failed");
            }
            merge_metric_tables(".", MERGED_CSV_PATH)?;
        }
    }

    Ok(())
}
