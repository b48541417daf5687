//! Wallet and chain capabilities consumed by the transfer workflow.
//!
//! - `ChainClient` - read-only contract queries against one node
//! - `WalletProvider` - the connected account: identity, active node, submissions
//! - `abi` - contract call descriptions for MockUSDT and GasSaver
//! - `trongrid` - TronGrid JSON-RPC reads and REST submissions
//! - `key_wallet` - `WalletProvider` backed by a local private key

pub mod abi;
pub mod key_wallet;
pub mod trongrid;

pub use abi::ContractCall;
pub use key_wallet::KeyWallet;
pub use trongrid::{TronGridClient, TronHttpApi};

use crate::address::TronAddress;
use crate::types::TxId;
use anyhow::Result;
use async_trait::async_trait;
use ethers::types::U256;
use std::sync::Arc;
use std::time::Duration;

/// Options attached to a state-changing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallOptions {
    /// Maximum fee in sun.
    pub fee_limit: u64,
    /// TRX (in sun) sent along with the call.
    pub call_value: u64,
}

impl CallOptions {
    pub fn with_fee_limit(fee_limit: u64) -> Self {
        Self {
            fee_limit,
            call_value: 0,
        }
    }

    pub fn call_value(mut self, call_value: u64) -> Self {
        self.call_value = call_value;
        self
    }
}

/// Outcome of waiting for a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InclusionStatus {
    Confirmed { block_number: Option<u64> },
    Reverted(String),
    /// Not seen within the timeout, or the wallet cannot tell.
    Pending,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Endpoint this client talks to, for logs and diagnostics.
    fn endpoint(&self) -> &str;

    async fn balance_of(&self, token: TronAddress, owner: TronAddress) -> Result<U256>;

    async fn allowance(&self, token: TronAddress, owner: TronAddress, spender: TronAddress) -> Result<U256>;

    async fn contract_exists(&self, contract: TronAddress) -> Result<bool>;
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Ask the wallet to expose its account. May be refused.
    async fn connect(&self) -> Result<()>;

    /// Current account, once the wallet is unlocked and connected.
    fn address(&self) -> Option<TronAddress>;

    fn is_connected(&self) -> bool {
        self.address().is_some()
    }

    /// Node the wallet is currently routing through, if it reports one.
    fn active_endpoint_host(&self) -> Option<String>;

    /// Read client bound to the wallet's active node.
    fn client(&self) -> Arc<dyn ChainClient>;

    /// Sign and broadcast a state-changing call.
    async fn send(&self, call: &ContractCall, options: &CallOptions) -> Result<TxId>;

    /// Wallets that cannot look up receipts report `Pending` straight away.
    async fn wait_for_inclusion(&self, _tx: &TxId, _timeout: Duration) -> Result<InclusionStatus> {
        Ok(InclusionStatus::Pending)
    }
}
