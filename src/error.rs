//! Errors surfaced by the transfer workflow.

use crate::address::TronAddress;
use crate::types::TxStage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Wallet not ready. Please unlock your wallet and make sure it is connected.")]
    WalletNotReady,

    /// Never returned by a submission; the network monitor reports it as a warning.
    #[error("Wrong network: wallet is using {found}, expected a node on {expected}")]
    WrongNetwork { found: String, expected: String },

    #[error("No valid recipient entries")]
    NoValidEntries,

    #[error("A transaction is already being submitted for {0}")]
    AlreadyPending(TronAddress),

    #[error("Amount {0} is out of range for the contract call")]
    AmountOutOfRange(String),

    #[error("{stage} failed: {message}")]
    TransactionFailed { stage: TxStage, message: String },
}

impl TransferError {
    pub fn failed(stage: TxStage, err: impl std::fmt::Display) -> Self {
        TransferError::TransactionFailed {
            stage,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_failed_message() {
        let err = TransferError::failed(TxStage::Approve, "REVERT opcode executed");
        assert_eq!(err.to_string(), "Approve failed: REVERT opcode executed");
    }

    #[test]
    fn test_wrong_network_message() {
        let err = TransferError::WrongNetwork {
            found: "https://api.trongrid.io".into(),
            expected: "nile.trongrid.io".into(),
        };
        assert!(err.to_string().contains("api.trongrid.io"));
    }
}
