//! On-demand check that the two contracts exist on the wallet's node.

use crate::address::TronAddress;
use crate::chain::WalletProvider;
use crate::config::Config;

pub const START_MARKER: &str = "--- Starting Diagnostics ---";
pub const END_MARKER: &str = "--- End Diagnostics ---";

/// Contracts checked by default: MockUSDT and GasSaver.
pub fn default_targets(config: &Config) -> Vec<(&'static str, TronAddress)> {
    vec![
        ("MockUSDT", config.token_address),
        ("GasSaver", config.gas_saver_address),
    ]
}

/// Lines to show in the diagnostics panel. Never fails; errors become lines.
pub async fn run_diagnostics(
    wallet: Option<&dyn WalletProvider>,
    targets: &[(&str, TronAddress)],
) -> Vec<String> {
    let mut lines = vec![START_MARKER.to_string()];

    let Some(wallet) = wallet else {
        lines.push("[!!] Wallet not found".to_string());
        return lines;
    };

    let client = wallet.client();
    let node = wallet
        .active_endpoint_host()
        .unwrap_or_else(|| client.endpoint().to_string());
    lines.push(format!("[..] Current node: {}", node));

    for (name, address) in targets {
        lines.push(format!("[..] Checking {} ({})...", name, address));
        match client.contract_exists(*address).await {
            Ok(true) => lines.push(format!("[OK] {} found on-chain", name)),
            Ok(false) => lines.push(format!("[!!] {} NOT found (empty result)", name)),
            Err(e) => lines.push(format!("[!!] Error checking {}: {}", name, e)),
        }
    }

    lines.push(END_MARKER.to_string());
    lines
}
