#[tokio::main]
pub async fn main() -> Result<(), anyhow::Error> {
    btc_analysis::log::init();
    btc_analysis::sync_exchange_flows().await?;
    Ok(())
}
