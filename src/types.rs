//! Common types shared across modules.

use crate::amount;
use ethers::types::U256;
use num_bigint::BigUint;
use std::fmt;

/// What a bulk transfer moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenType {
    /// MockUSDT, moved by the GasSaver contract under an allowance.
    #[default]
    Token,
    /// TRX attached as call value.
    Native,
}

impl TokenType {
    pub fn label(&self) -> &'static str {
        match self {
            TokenType::Token => "MockUSDT",
            TokenType::Native => "Native TRX",
        }
    }
}

/// Last successfully fetched on-chain state for the connected account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccountSnapshot {
    pub balance: U256,
    /// MockUSDT allowance granted to the GasSaver contract.
    pub allowance: U256,
}

impl AccountSnapshot {
    pub fn allowance_covers(&self, total: &BigUint) -> bool {
        amount::u256_to_biguint(self.allowance) >= *total
    }
}

/// Transaction id as returned by the node (hex, no `0x`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TxId(pub String);

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which submission a transaction belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStage {
    Mint,
    Approve,
    BulkTransfer,
}

impl fmt::Display for TxStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxStage::Mint => "Mint",
            TxStage::Approve => "Approve",
            TxStage::BulkTransfer => "Bulk Transfer",
        };
        f.write_str(s)
    }
}
