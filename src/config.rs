use crate::address::TronAddress;
use anyhow::{anyhow, Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// MockUSDT (TRC20) contract on Nile.
pub const MOCK_USDT_ADDRESS: &str = "TLCuviLXZtgF7JgXxwrUzrHpt4mmbMRTfW";

/// GasSaver bulk-transfer contract on Nile. Spender for MockUSDT approvals.
pub const GAS_SAVER_ADDRESS: &str = "TESHt6Nrd7JtdXWzJUeeA7EGJsS8oma9qK";

/// Canonical Nile full node, also used by the read-only fallback client.
pub const NILE_FULL_HOST: &str = "https://nile.trongrid.io";

/// Substring the wallet's endpoint host must contain to count as Nile.
pub const REQUIRED_ENDPOINT: &str = "nile.trongrid.io";

pub const NILE_EXPLORER_URL: &str = "https://nile.tronscan.org";

/// Both MockUSDT and TRX use 6 decimals.
pub const TOKEN_DECIMALS: u32 = 6;

/// 100 TRX in sun.
pub const DEFAULT_FEE_LIMIT: u64 = 100_000_000;

/// 1000 TRX in sun, used for contract creation.
pub const DEPLOY_FEE_LIMIT: u64 = 1_000_000_000;

pub const DEFAULT_MINT_AMOUNT: &str = "1000";

/// Requested allowance is `total * APPROVAL_MULTIPLIER`.
pub const DEFAULT_APPROVAL_MULTIPLIER: u64 = 1_000_000;

pub const NETWORK_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const BALANCE_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const MAX_POLL_BACKOFF: Duration = Duration::from_secs(160);
pub const CONFIRMATION_FALLBACK_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(30);
pub const WALLET_READY_ATTEMPTS: u32 = 50;
pub const WALLET_READY_INTERVAL: Duration = Duration::from_millis(100);

/// Get the full URL to view a transaction on Tronscan (Nile)
pub fn tx_explorer_url(tx_id: &str) -> String {
    format!("{}/#/transaction/{}", NILE_EXPLORER_URL, tx_id)
}

/// Get the full URL to view an address or contract on Tronscan (Nile)
pub fn address_explorer_url(address: &TronAddress) -> String {
    format!("{}/#/address/{}", NILE_EXPLORER_URL, address)
}

/// Timing knobs for the session's background tasks and the transfer workflow.
#[derive(Clone, Debug)]
pub struct Timings {
    pub network_poll_interval: Duration,
    pub balance_poll_interval: Duration,
    pub max_poll_backoff: Duration,
    pub confirmation_timeout: Duration,
    pub confirmation_fallback_delay: Duration,
    pub wallet_ready_attempts: u32,
    pub wallet_ready_interval: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            network_poll_interval: NETWORK_POLL_INTERVAL,
            balance_poll_interval: BALANCE_POLL_INTERVAL,
            max_poll_backoff: MAX_POLL_BACKOFF,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            confirmation_fallback_delay: CONFIRMATION_FALLBACK_DELAY,
            wallet_ready_attempts: WALLET_READY_ATTEMPTS,
            wallet_ready_interval: WALLET_READY_INTERVAL,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub wallet_host: String,     // Node the wallet routes reads and submissions through
    pub read_host: String,       // Read-only fallback node
    pub required_endpoint: String,
    pub api_key: Option<String>, // TRON-PRO-API-KEY header, if the node wants one
    pub token_address: TronAddress,
    pub gas_saver_address: TronAddress,
    pub decimals: u32,
    pub fee_limit: u64,
    pub approval_multiplier: u64,
    pub mint_amount: String,
    pub timings: Timings,
}

impl Config {
    pub fn new(wallet_host: String) -> Self {
        Self {
            wallet_host,
            read_host: NILE_FULL_HOST.to_string(),
            required_endpoint: REQUIRED_ENDPOINT.to_string(),
            api_key: None,
            token_address: fixed_address(MOCK_USDT_ADDRESS),
            gas_saver_address: fixed_address(GAS_SAVER_ADDRESS),
            decimals: TOKEN_DECIMALS,
            fee_limit: DEFAULT_FEE_LIMIT,
            approval_multiplier: DEFAULT_APPROVAL_MULTIPLIER,
            mint_amount: DEFAULT_MINT_AMOUNT.to_string(),
            timings: Timings::default(),
        }
    }

    /// Defaults overridden by environment variables (`.env` is loaded by the binaries).
    pub fn from_env() -> Result<Self> {
        let wallet_host = env::var("TRON_FULL_HOST").unwrap_or_else(|_| NILE_FULL_HOST.to_string());
        let mut config = Self::new(wallet_host);

        if let Ok(read_host) = env::var("TRON_READ_HOST") {
            config.read_host = read_host;
        }
        config.api_key = env::var("TRON_PRO_API_KEY").ok().filter(|k| !k.trim().is_empty());

        if let Ok(raw) = env::var("APPROVAL_MULTIPLIER") {
            config.approval_multiplier = raw
                .trim()
                .parse()
                .with_context(|| format!("APPROVAL_MULTIPLIER must be a positive integer, got '{}'", raw))?;
        }
        if let Ok(raw) = env::var("CONFIRMATION_TIMEOUT_SECS") {
            let secs: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("CONFIRMATION_TIMEOUT_SECS must be an integer, got '{}'", raw))?;
            config.timings.confirmation_timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, host) in [("wallet host", &self.wallet_host), ("read host", &self.read_host)] {
            let url = Url::parse(host).with_context(|| format!("Invalid {} '{}'", name, host))?;
            if url.host_str().is_none() {
                return Err(anyhow!("Invalid {} '{}': missing host", name, host));
            }
        }
        if self.approval_multiplier == 0 {
            return Err(anyhow!("Approval multiplier must be at least 1"));
        }
        Ok(())
    }

    pub fn wallet_on_required_network(&self) -> bool {
        crate::network::is_required_endpoint(&self.wallet_host, &self.required_endpoint)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(NILE_FULL_HOST.to_string())
    }
}

// The two contract constants are checked by `test_fixed_addresses_parse`.
fn fixed_address(s: &str) -> TronAddress {
    TronAddress::from_str(s).unwrap_or_else(|e| panic!("invalid built-in address {}: {}", s, e))
}
