mod blockchain_info;
mod env;
mod exchange_flows;
pub mod log;
mod mempool_space;
mod merge;
mod mvrv;

pub use blockchain_info::update_network_data;
pub use blockchain_info::update_utxo_data;
pub use exchange_flows::sync_exchange_flows;
pub use merge::merge_metric_tables;
pub use merge::MERGED_CSV_PATH;
pub use mvrv::update_mvrv_ratio;
pub use mvrv::DropInFile;
pub use mvrv::MvrvSource;
