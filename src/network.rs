//! Watches which node the wallet routes through.

use crate::chain::WalletProvider;
use crate::error::TransferError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Substring match: hosts may carry a scheme or path (`https://nile.trongrid.io/jsonrpc`).
pub fn is_required_endpoint(host: &str, required: &str) -> bool {
    host.contains(required)
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NetworkStatus {
    /// No wallet, or the wallet does not report its node.
    #[default]
    Unknown,
    Correct { host: String },
    Wrong { host: String },
}

impl NetworkStatus {
    pub fn classify(host: Option<String>, required: &str) -> Self {
        match host {
            None => NetworkStatus::Unknown,
            Some(host) if is_required_endpoint(&host, required) => NetworkStatus::Correct { host },
            Some(host) => NetworkStatus::Wrong { host },
        }
    }

    pub fn host(&self) -> Option<&str> {
        match self {
            NetworkStatus::Unknown => None,
            NetworkStatus::Correct { host } | NetworkStatus::Wrong { host } => Some(host),
        }
    }

    pub fn display_host(&self) -> &str {
        self.host().unwrap_or("Unknown")
    }

    pub fn is_wrong(&self) -> bool {
        matches!(self, NetworkStatus::Wrong { .. })
    }

    /// Non-fatal warning to show while the wallet is on another network.
    pub fn warning(&self, required: &str) -> Option<TransferError> {
        match self {
            NetworkStatus::Wrong { host } => Some(TransferError::WrongNetwork {
                found: host.clone(),
                expected: required.to_string(),
            }),
            _ => None,
        }
    }
}

/// Publishes the wallet's current node on a fixed interval.
pub struct NetworkMonitor {
    required: String,
    status: watch::Sender<NetworkStatus>,
}

impl NetworkMonitor {
    pub fn new(required: impl Into<String>) -> Self {
        let (status, _) = watch::channel(NetworkStatus::Unknown);
        Self {
            required: required.into(),
            status,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<NetworkStatus> {
        self.status.subscribe()
    }

    pub fn current(&self) -> NetworkStatus {
        self.status.borrow().clone()
    }

    /// Read the wallet's node once and publish it. Returns the new status.
    pub fn check(&self, wallet: &dyn WalletProvider) -> NetworkStatus {
        let next = NetworkStatus::classify(wallet.active_endpoint_host(), &self.required);
        let changed = self.status.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next.clone();
            true
        });
        if changed {
            match &next {
                NetworkStatus::Wrong { host } => warn!(
                    "WRONG NETWORK: wallet node is {}, switch it to a node on {}",
                    host, self.required
                ),
                NetworkStatus::Correct { host } => info!("Wallet node: {}", host),
                NetworkStatus::Unknown => info!("Wallet node unknown"),
            }
        }
        next
    }

    /// Poll until `shutdown` fires or its sender is dropped.
    pub async fn run(
        self: Arc<Self>,
        wallet: Arc<dyn WalletProvider>,
        interval: Duration,
        mut shutdown: watch::Receiver<()>,
    ) {
        loop {
            self.check(wallet.as_ref());
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => break,
            }
        }
        info!("Network monitor stopped");
    }
}
