//! Contract deployment from Foundry build artifacts.

use crate::address::TronAddress;
use crate::chain::trongrid::DeployRequest;
use crate::chain::{InclusionStatus, KeyWallet, WalletProvider};
use crate::config::DEPLOY_FEE_LIMIT;
use crate::types::TxId;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const USER_FEE_PERCENTAGE: u64 = 100;
pub const ORIGIN_ENERGY_LIMIT: u64 = 10_000_000;

/// Artifact paths relative to the project root.
pub const MOCK_USDT_ARTIFACT: &str = "contracts/out/MockUSDT.sol/MockUSDT.json";
pub const GAS_SAVER_ARTIFACT: &str = "contracts/out/SaveGas.sol/GasSaver.json";

#[derive(Debug, Deserialize)]
struct Bytecode {
    object: String,
}

/// The parts of a `forge build` artifact needed to deploy.
#[derive(Debug, Deserialize)]
pub struct ContractArtifact {
    pub abi: Value,
    bytecode: Bytecode,
}

impl ContractArtifact {
    pub fn from_json(contents: &str) -> Result<Self> {
        let artifact: Self = serde_json::from_str(contents).context("Invalid contract artifact")?;
        if artifact.bytecode().is_empty() {
            return Err(anyhow!("Artifact has no bytecode (is the contract abstract?)"));
        }
        Ok(artifact)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_json(&contents).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Creation bytecode as hex without `0x`.
    pub fn bytecode(&self) -> &str {
        self.bytecode.object.trim_start_matches("0x")
    }

    /// Deployment with no constructor arguments and no call value.
    pub fn deploy_request(&self, name: &str) -> DeployRequest {
        DeployRequest {
            name: name.to_string(),
            abi: self.abi.clone(),
            bytecode: self.bytecode().to_string(),
            fee_limit: DEPLOY_FEE_LIMIT,
            user_fee_percentage: USER_FEE_PERCENTAGE,
            origin_energy_limit: ORIGIN_ENERGY_LIMIT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Deployment {
    pub mock_usdt: TronAddress,
    pub gas_saver: TronAddress,
}

pub fn artifact_paths(root: &Path) -> (PathBuf, PathBuf) {
    (root.join(MOCK_USDT_ARTIFACT), root.join(GAS_SAVER_ARTIFACT))
}

/// Account able to create contracts and report when they land.
#[async_trait]
pub trait ContractDeployer: Send + Sync {
    async fn deploy_contract(&self, request: &DeployRequest) -> Result<(TronAddress, TxId)>;

    async fn wait_for_deployment(&self, tx: &TxId, timeout: Duration) -> Result<InclusionStatus>;
}

#[async_trait]
impl ContractDeployer for KeyWallet {
    async fn deploy_contract(&self, request: &DeployRequest) -> Result<(TronAddress, TxId)> {
        KeyWallet::deploy(self, request).await
    }

    async fn wait_for_deployment(&self, tx: &TxId, timeout: Duration) -> Result<InclusionStatus> {
        WalletProvider::wait_for_inclusion(self, tx, timeout).await
    }
}

/// Deploy one contract and wait for its creation to be included.
///
/// A revert is an error. An unconfirmed creation is logged and accepted.
async fn deploy_confirmed<D: ContractDeployer + ?Sized>(
    deployer: &D,
    request: &DeployRequest,
    timeout: Duration,
) -> Result<TronAddress> {
    info!("Deploying {}...", request.name);
    let (address, tx) = deployer.deploy_contract(request).await?;
    match deployer.wait_for_deployment(&tx, timeout).await {
        Ok(InclusionStatus::Confirmed { block_number }) => {
            info!("{} included in block {:?}", request.name, block_number);
        }
        Ok(InclusionStatus::Reverted(reason)) => {
            bail!("{} deployment {} reverted: {}", request.name, tx, reason);
        }
        Ok(InclusionStatus::Pending) => {
            warn!("{} deployment {} not confirmed within {:?}", request.name, tx, timeout);
        }
        Err(e) => warn!("Could not confirm {} deployment {}: {:#}", request.name, tx, e),
    }
    Ok(address)
}

/// Deploy MockUSDT, then GasSaver once MockUSDT is in a block. Both artifacts
/// are loaded before anything is sent.
pub async fn deploy_all<D: ContractDeployer + ?Sized>(deployer: &D, root: &Path, timeout: Duration) -> Result<Deployment> {
    let (usdt_path, saver_path) = artifact_paths(root);
    let usdt = ContractArtifact::load(&usdt_path)?;
    let saver = ContractArtifact::load(&saver_path)?;

    let mock_usdt = deploy_confirmed(deployer, &usdt.deploy_request("MockUSDT"), timeout).await?;
    let gas_saver = deploy_confirmed(deployer, &saver.deploy_request("GasSaver"), timeout).await?;

    Ok(Deployment { mock_usdt, gas_saver })
}
