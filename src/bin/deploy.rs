//! Deploy MockUSDT and GasSaver to Nile with the key in `PRIVATE_KEY`.
//!
//! Usage: `deploy [PROJECT_ROOT]`. Artifacts are read from
//! `PROJECT_ROOT/contracts/out` (default: current directory).

use anyhow::Result;
use savegas::chain::KeyWallet;
use savegas::config::Config;
use savegas::deploy;
use std::path::PathBuf;
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let root = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let config = Config::from_env()?;
    let wallet = KeyWallet::from_env(&config.wallet_host, config.api_key.as_deref())?;

    println!("Deploying to Tron Nile ({})...", config.wallet_host);
    println!("Deployer address: {}", wallet.account());

    match deploy::deploy_all(&wallet, &root, config.timings.confirmation_timeout).await {
        Ok(deployment) => {
            println!("MockUSDT deployed at: {}", deployment.mock_usdt);
            println!("GasSaver deployed at: {}", deployment.gas_saver);
            Ok(())
        }
        Err(e) => {
            error!("Deployment failed: {:#}", e);
            std::process::exit(1);
        }
    }
}
