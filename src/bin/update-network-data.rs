#[tokio::main]
pub async fn main() -> Result<(), anyhow::Error> {
    btc_analysis::log::init();
    btc_analysis::update_network_data().await?;
    Ok(())
}
