//! subhuti - IRC bot entry point.

use subhuti::config::Config;
use subhuti::{Bot, telemetry};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "subhuti.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        eprintln!("failed to load {config_path}: {e}");
        e
    })?;

    telemetry::init_logging(&config.log)?;
    info!(
        path = %config_path,
        version = subhuti::version::VERSION,
        "Starting subhuti"
    );

    let mut bot = Bot::new(config);
    bot.start();

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Received shutdown signal");

    bot.shutdown().await;
    Ok(())
}
