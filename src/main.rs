use flash_arb_bot::{Config, Orchestrator};
use log::{error, info};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    flash_arb_bot::utils::setup_logging().expect("Failed to initialize logging");
    info!("🚀 Flash loan arbitrage bot starting...");

    let config = Arc::new(Config::from_env());
    let orchestrator = match Orchestrator::initialize(config) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            error!("Initialization failed: {}", e);
            return Err(e.into());
        }
    };

    orchestrator.start();
    info!("Bot is running. Press CTRL-C to exit.");

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for ctrl-c");
    orchestrator.stop();

    let status = orchestrator.status().await;
    info!(
        "Final status: processed {}, successful {}, total profit {:.2}",
        status.opportunities_processed, status.successful_trades, status.total_profit
    );
    Ok(())
}
