//! Wallet backed by a local private key.
//!
//! Tron accounts derive from secp256k1 keys exactly like EVM accounts, so the
//! ethers `LocalWallet` gives us both the 20-byte account and the signer.

use super::trongrid::{sign_transaction, DeployRequest, TronGridClient, TronHttpApi};
use super::{CallOptions, ChainClient, ContractCall, InclusionStatus, WalletProvider};
use crate::address::TronAddress;
use crate::types::TxId;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(1500);

pub struct KeyWallet {
    signer: LocalWallet,
    address: TronAddress,
    api: TronHttpApi,
    client: Arc<TronGridClient>,
    connected: AtomicBool,
}

impl KeyWallet {
    /// `private_key` is hex, with or without `0x`.
    pub fn new(private_key: &str, full_host: &str, api_key: Option<&str>) -> Result<Self> {
        let signer: LocalWallet = private_key
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid private key: {}", e))?;
        let address = TronAddress::from_evm(signer.address());
        Ok(Self {
            signer,
            address,
            api: TronHttpApi::new(full_host, api_key)?,
            client: Arc::new(TronGridClient::new(full_host, api_key)?),
            connected: AtomicBool::new(false),
        })
    }

    /// Reads `PRIVATE_KEY` from the environment.
    pub fn from_env(full_host: &str, api_key: Option<&str>) -> Result<Self> {
        let key = std::env::var("PRIVATE_KEY").context("PRIVATE_KEY is missing in .env")?;
        Self::new(&key, full_host, api_key)
    }

    /// Account address, available before `connect`.
    pub fn account(&self) -> TronAddress {
        self.address
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Create a contract and return its address once the transaction is broadcast.
    pub async fn deploy(&self, request: &DeployRequest) -> Result<(TronAddress, TxId)> {
        let (unsigned, contract_address) = self.api.deploy_contract(self.address, request).await?;
        let signed = sign_transaction(&self.signer, &unsigned)?;
        let tx_id = self.api.broadcast(&signed).await?;
        info!("Deployed {} at {} (tx {})", request.name, contract_address, tx_id);
        Ok((contract_address, tx_id))
    }
}

#[async_trait]
impl WalletProvider for KeyWallet {
    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        info!("Wallet connected: {} via {}", self.address, self.api.full_host());
        Ok(())
    }

    fn address(&self) -> Option<TronAddress> {
        self.connected.load(Ordering::SeqCst).then_some(self.address)
    }

    fn active_endpoint_host(&self) -> Option<String> {
        Some(self.api.full_host().to_string())
    }

    fn client(&self) -> Arc<dyn ChainClient> {
        self.client.clone()
    }

    async fn send(&self, call: &ContractCall, options: &CallOptions) -> Result<TxId> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(anyhow!("Wallet is not connected"));
        }
        let unsigned = self.api.trigger_smart_contract(self.address, call, options).await?;
        let signed = sign_transaction(&self.signer, &unsigned)?;
        let tx_id = self.api.broadcast(&signed).await?;
        info!(
            "{} sent to {} (fee limit {}, value {}): {}",
            call.signature, call.contract, options.fee_limit, options.call_value, tx_id
        );
        Ok(tx_id)
    }

    async fn wait_for_inclusion(&self, tx: &TxId, timeout: Duration) -> Result<InclusionStatus> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.api.transaction_status(tx).await {
                Ok(InclusionStatus::Pending) => {}
                Ok(status) => return Ok(status),
                Err(e) => warn!("Receipt lookup for {} failed: {}", tx, e),
            }
            if Instant::now() + RECEIPT_POLL_INTERVAL > deadline {
                return Ok(InclusionStatus::Pending);
            }
            sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_address_derived_from_key() {
        let wallet = KeyWallet::new(TEST_KEY, "https://nile.trongrid.io", None).unwrap();
        // Same 20 bytes as the EVM account for this key.
        assert_eq!(
            format!("{:x}", wallet.account().to_evm()),
            "f39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
        assert!(wallet.account().to_base58().starts_with('T'));
    }

    #[test]
    fn test_connection_lifecycle() {
        let wallet = KeyWallet::new(TEST_KEY, "https://nile.trongrid.io", None).unwrap();
        assert!(wallet.address().is_none());
        tokio_test::block_on(wallet.connect()).unwrap();
        assert_eq!(wallet.address(), Some(wallet.account()));
        assert_eq!(wallet.active_endpoint_host().as_deref(), Some("https://nile.trongrid.io"));
        wallet.disconnect();
        assert!(!wallet.is_connected());
    }

    #[test]
    fn test_invalid_key_rejected() {
        assert!(KeyWallet::new("not-a-key", "https://nile.trongrid.io", None).is_err());
    }

    #[test]
    fn test_send_requires_connection() {
        let wallet = KeyWallet::new(TEST_KEY, "https://nile.trongrid.io", None).unwrap();
        let token = wallet.account();
        let call = crate::chain::abi::approve(token, token, ethers::types::U256::one());
        let result = tokio_test::block_on(wallet.send(&call, &CallOptions::with_fee_limit(1)));
        assert!(result.is_err());
    }
}
