//! SaveGas: bulk MockUSDT and TRX transfers on the Tron Nile testnet through
//! the GasSaver contract.

pub mod address;
pub mod amount;
pub mod balance;
pub mod chain;
pub mod config;
pub mod deploy;
pub mod diagnostics;
pub mod error;
pub mod gui;
pub mod network;
pub mod operation_log;
pub mod orchestrator;
pub mod poll;
pub mod session;
pub mod types;

pub use error::TransferError;
