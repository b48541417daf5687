//! A connected wallet and the background work tied to it.
//!
//! `Session::connect` asks the wallet for its account, waits until it is
//! usable, and starts the network and balance pollers. Both pollers stop when
//! the session is disconnected or dropped.

use crate::address::TronAddress;
use crate::balance::{BalanceTracker, FetchOutcome};
use crate::chain::{ChainClient, WalletProvider};
use crate::config::Config;
use crate::diagnostics;
use crate::error::TransferError;
use crate::network::{NetworkMonitor, NetworkStatus};
use crate::orchestrator::{AccountLocks, BulkTransferOrchestrator};
use crate::types::AccountSnapshot;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub struct Session {
    wallet: Arc<dyn WalletProvider>,
    owner: TronAddress,
    config: Config,
    tracker: Arc<BalanceTracker>,
    network: Arc<NetworkMonitor>,
    locks: Arc<AccountLocks>,
    shutdown_tx: watch::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

/// Poll `wallet.address()` until it appears or the attempts run out.
async fn wait_until_ready(wallet: &dyn WalletProvider, config: &Config) -> Result<TronAddress, TransferError> {
    let timings = &config.timings;
    for attempt in 0..timings.wallet_ready_attempts {
        if let Some(address) = wallet.address() {
            return Ok(address);
        }
        if attempt + 1 < timings.wallet_ready_attempts {
            tokio::time::sleep(timings.wallet_ready_interval).await;
        }
    }
    Err(TransferError::WalletNotReady)
}

impl Session {
    /// Must be called from within a tokio runtime.
    pub async fn connect(
        wallet: Arc<dyn WalletProvider>,
        fallback: Arc<dyn ChainClient>,
        locks: Arc<AccountLocks>,
        config: Config,
    ) -> Result<Self> {
        // A refused request is not fatal; the wallet may already expose an account.
        if let Err(e) = wallet.connect().await {
            warn!("Wallet connection request failed: {:#}", e);
        }
        let owner = wait_until_ready(wallet.as_ref(), &config).await?;
        info!("Session started for {}", owner);

        let tracker = Arc::new(BalanceTracker::new(
            config.token_address,
            config.gas_saver_address,
            fallback,
        ));
        let network = Arc::new(NetworkMonitor::new(config.required_endpoint.clone()));
        let (shutdown_tx, _) = watch::channel(());

        let timings = &config.timings;
        let tasks = vec![
            tokio::spawn(network.clone().run(
                wallet.clone(),
                timings.network_poll_interval,
                shutdown_tx.subscribe(),
            )),
            tokio::spawn(tracker.clone().run(
                wallet.clone(),
                owner,
                timings.balance_poll_interval,
                timings.max_poll_backoff,
                shutdown_tx.subscribe(),
            )),
        ];

        Ok(Self {
            wallet,
            owner,
            config,
            tracker,
            network,
            locks,
            shutdown_tx,
            tasks,
        })
    }

    pub fn owner(&self) -> TronAddress {
        self.owner
    }

    pub fn wallet(&self) -> Arc<dyn WalletProvider> {
        self.wallet.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn snapshot(&self) -> AccountSnapshot {
        self.tracker.snapshot()
    }

    pub fn subscribe_snapshot(&self) -> watch::Receiver<AccountSnapshot> {
        self.tracker.subscribe()
    }

    pub fn network_status(&self) -> NetworkStatus {
        self.network.current()
    }

    pub fn subscribe_network(&self) -> watch::Receiver<NetworkStatus> {
        self.network.subscribe()
    }

    /// Warning to show while the wallet is on another network.
    pub fn network_warning(&self) -> Option<TransferError> {
        self.network.current().warning(&self.config.required_endpoint)
    }

    pub fn is_pending(&self) -> bool {
        self.locks.is_locked(self.owner)
    }

    pub fn orchestrator(&self) -> BulkTransferOrchestrator {
        BulkTransferOrchestrator::new(
            self.wallet.clone(),
            self.owner,
            self.tracker.clone(),
            self.locks.clone(),
            self.config.clone(),
        )
    }

    pub async fn refresh(&self) -> FetchOutcome {
        self.tracker.refresh(self.wallet.as_ref(), self.owner).await
    }

    pub async fn diagnostics(&self) -> Vec<String> {
        let targets = diagnostics::default_targets(&self.config);
        diagnostics::run_diagnostics(Some(self.wallet.as_ref()), &targets).await
    }

    pub fn disconnect(self) {
        info!("Session for {} disconnected", self.owner);
    }

    fn stop(&mut self) {
        if self.shutdown_tx.send(()).is_err() {
            warn!("Pollers for {} had already stopped", self.owner);
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::testing::{FakeClient, FakeWallet};
    use ethers::types::U256;
    use std::str::FromStr;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn owner() -> TronAddress {
        TronAddress::from_str("TNPeeaaFB7K9cmo4uQpcU32zGK8G1NYqeL").unwrap()
    }

    fn fast_config() -> Config {
        let mut config = Config::default();
        config.timings.network_poll_interval = Duration::from_millis(5);
        config.timings.balance_poll_interval = Duration::from_millis(5);
        config.timings.max_poll_backoff = Duration::from_millis(20);
        config.timings.wallet_ready_attempts = 3;
        config.timings.wallet_ready_interval = Duration::from_millis(1);
        config
    }

    #[tokio::test]
    async fn test_wallet_not_ready() {
        let mut wallet = FakeWallet::new(owner(), Arc::new(FakeClient::new("https://nile.trongrid.io")));
        wallet.address = None;
        let wallet = Arc::new(wallet);

        let result = Session::connect(
            wallet.clone(),
            Arc::new(FakeClient::new("nile")),
            Arc::new(AccountLocks::new()),
            fast_config(),
        )
        .await;
        let err = result.err().expect("session should not start");
        assert!(matches!(err.downcast_ref::<TransferError>(), Some(TransferError::WalletNotReady)));
        assert_eq!(wallet.connect_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refused_connect_uses_exposed_account() {
        let mut wallet = FakeWallet::new(owner(), Arc::new(FakeClient::new("https://nile.trongrid.io")));
        wallet.reject_connect = true;
        let wallet = Arc::new(wallet);

        let session = Session::connect(
            wallet.clone(),
            Arc::new(FakeClient::new("nile")),
            Arc::new(AccountLocks::new()),
            fast_config(),
        )
        .await
        .unwrap();
        assert_eq!(session.owner(), owner());
        assert_eq!(wallet.connect_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refused_connect_without_account_is_not_ready() {
        let mut wallet = FakeWallet::new(owner(), Arc::new(FakeClient::new("https://nile.trongrid.io")));
        wallet.reject_connect = true;
        wallet.address = None;

        let result = Session::connect(
            Arc::new(wallet),
            Arc::new(FakeClient::new("nile")),
            Arc::new(AccountLocks::new()),
            fast_config(),
        )
        .await;
        let err = result.err().expect("session should not start");
        assert!(matches!(err.downcast_ref::<TransferError>(), Some(TransferError::WalletNotReady)));
    }

    #[tokio::test]
    async fn test_pollers_run_and_stop_with_session() {
        let client = Arc::new(FakeClient::with_values("https://api.trongrid.io", 3_000_000, 0));
        let wallet = Arc::new(FakeWallet::new(owner(), client.clone()));

        let session = Session::connect(
            wallet,
            Arc::new(FakeClient::new("nile")),
            Arc::new(AccountLocks::new()),
            fast_config(),
        )
        .await
        .unwrap();
        assert_eq!(session.owner(), owner());

        let mut snapshot = session.subscribe_snapshot();
        tokio::time::timeout(Duration::from_secs(1), snapshot.wait_for(|s| s.balance == U256::from(3_000_000u64)))
            .await
            .expect("no balance fetched")
            .unwrap();
        let mut network = session.subscribe_network();
        tokio::time::timeout(Duration::from_secs(1), network.wait_for(|n| n.is_wrong()))
            .await
            .expect("network never checked")
            .unwrap();
        assert!(matches!(session.network_warning(), Some(TransferError::WrongNetwork { .. })));

        session.disconnect();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let calls = client.balance_call_count();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(client.balance_call_count(), calls);
    }
}
