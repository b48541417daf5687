use crate::address::TronAddress;
use crate::chain::{ChainClient, WalletProvider};
use crate::poll::Backoff;
use crate::types::AccountSnapshot;
use anyhow::Result;
use ethers::types::U256;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Which fields a refresh managed to update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOutcome {
    pub balance: bool,
    pub allowance: bool,
}

impl FetchOutcome {
    pub fn any(&self) -> bool {
        self.balance || self.allowance
    }
}

/// Keeps the connected account's token balance and GasSaver allowance current.
///
/// Reads go to the wallet's own client first. A failed read is retried once
/// against `fallback`, a client pinned to the public Nile node, so a wallet
/// node that rejects unauthenticated calls still yields numbers. Values that
/// cannot be read either way stay at their last known value.
pub struct BalanceTracker {
    token: TronAddress,
    spender: TronAddress,
    fallback: Arc<dyn ChainClient>,
    snapshot: watch::Sender<AccountSnapshot>,
}

impl BalanceTracker {
    pub fn new(token: TronAddress, spender: TronAddress, fallback: Arc<dyn ChainClient>) -> Self {
        let (snapshot, _) = watch::channel(AccountSnapshot::default());
        Self {
            token,
            spender,
            fallback,
            snapshot,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AccountSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn snapshot(&self) -> AccountSnapshot {
        *self.snapshot.borrow()
    }

    async fn read_balance(&self, primary: &dyn ChainClient, owner: TronAddress) -> Result<U256> {
        match primary.balance_of(self.token, owner).await {
            Ok(value) => Ok(value),
            Err(e) => {
                debug!("balanceOf via {} failed ({}), using {}", primary.endpoint(), e, self.fallback.endpoint());
                self.fallback.balance_of(self.token, owner).await
            }
        }
    }

    async fn read_allowance(&self, primary: &dyn ChainClient, owner: TronAddress) -> Result<U256> {
        match primary.allowance(self.token, owner, self.spender).await {
            Ok(value) => Ok(value),
            Err(e) => {
                debug!("allowance via {} failed ({}), using {}", primary.endpoint(), e, self.fallback.endpoint());
                self.fallback.allowance(self.token, owner, self.spender).await
            }
        }
    }

    /// One refresh cycle. Balance and allowance succeed or fail independently.
    pub async fn fetch(&self, primary: &dyn ChainClient, owner: TronAddress) -> FetchOutcome {
        let mut outcome = FetchOutcome::default();

        match self.read_balance(primary, owner).await {
            Ok(balance) => {
                self.snapshot.send_modify(|s| s.balance = balance);
                outcome.balance = true;
            }
            Err(e) => warn!("Could not read token balance of {}: {}", owner, e),
        }

        match self.read_allowance(primary, owner).await {
            Ok(allowance) => {
                self.snapshot.send_modify(|s| s.allowance = allowance);
                outcome.allowance = true;
            }
            Err(e) => warn!("Could not read allowance of {}: {}", owner, e),
        }

        outcome
    }

    /// On-demand refresh through the wallet's current client.
    pub async fn refresh(&self, wallet: &dyn WalletProvider, owner: TronAddress) -> FetchOutcome {
        let client = wallet.client();
        self.fetch(client.as_ref(), owner).await
    }

    /// Fetch now, then every `interval` until `shutdown` fires. Cycles where
    /// nothing could be read stretch the delay up to `max_backoff`.
    pub async fn run(
        self: Arc<Self>,
        wallet: Arc<dyn WalletProvider>,
        owner: TronAddress,
        interval: Duration,
        max_backoff: Duration,
        mut shutdown: watch::Receiver<()>,
    ) {
        let mut backoff = Backoff::new(interval, max_backoff);
        loop {
            if self.refresh(wallet.as_ref(), owner).await.any() {
                backoff.record_success();
            } else {
                backoff.record_failure();
                debug!(
                    "Balance refresh failed {} time(s) in a row, next attempt in {:?}",
                    backoff.failures(),
                    backoff.next_delay()
                );
            }
            tokio::select! {
                _ = tokio::time::sleep(backoff.next_delay()) => {}
                _ = shutdown.changed() => break,
            }
        }
        info!("Balance tracker for {} stopped", owner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::testing::{FakeClient, FakeWallet};
    use std::str::FromStr;

    fn addr(s: &str) -> TronAddress {
        TronAddress::from_str(s).unwrap()
    }

    fn token() -> TronAddress {
        addr(crate::config::MOCK_USDT_ADDRESS)
    }

    fn spender() -> TronAddress {
        addr(crate::config::GAS_SAVER_ADDRESS)
    }

    fn owner() -> TronAddress {
        addr("TNPeeaaFB7K9cmo4uQpcU32zGK8G1NYqeL")
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let primary = FakeClient::with_values("wallet", 5_000_000, 7);
        let fallback = Arc::new(FakeClient::with_values("nile", 1, 1));
        let tracker = BalanceTracker::new(token(), spender(), fallback.clone());

        let outcome = tracker.fetch(&primary, owner()).await;
        assert!(outcome.balance && outcome.allowance);
        assert_eq!(tracker.snapshot().balance, U256::from(5_000_000u64));
        assert_eq!(tracker.snapshot().allowance, U256::from(7u64));
        assert_eq!(fallback.balance_call_count(), 0);
        assert_eq!(fallback.allowance_call_count(), 0);
    }

    #[tokio::test]
    async fn test_fallback_called_once_with_same_pair() {
        let primary = FakeClient::new("wallet");
        let fallback = Arc::new(FakeClient::with_values("nile", 42, 9));
        let tracker = BalanceTracker::new(token(), spender(), fallback.clone());

        let outcome = tracker.fetch(&primary, owner()).await;
        assert!(outcome.balance && outcome.allowance);
        assert_eq!(tracker.snapshot().balance, U256::from(42u64));
        assert_eq!(*fallback.balance_calls.lock().unwrap(), vec![(token(), owner())]);
        assert_eq!(
            *fallback.allowance_calls.lock().unwrap(),
            vec![(token(), owner(), spender())]
        );
        assert_eq!(primary.balance_call_count(), 1);
    }

    #[tokio::test]
    async fn test_fields_update_independently() {
        let primary = FakeClient::new("wallet");
        *primary.balance.lock().unwrap() = Some(U256::from(100u64));
        let fallback = Arc::new(FakeClient::new("nile"));
        let tracker = BalanceTracker::new(token(), spender(), fallback);
        tracker.snapshot.send_modify(|s| s.allowance = U256::from(3u64));

        let outcome = tracker.fetch(&primary, owner()).await;
        assert!(outcome.balance);
        assert!(!outcome.allowance);
        assert!(outcome.any());
        assert_eq!(tracker.snapshot().balance, U256::from(100u64));
        // Stale value kept.
        assert_eq!(tracker.snapshot().allowance, U256::from(3u64));
    }

    #[tokio::test]
    async fn test_total_failure_keeps_snapshot() {
        let tracker = BalanceTracker::new(token(), spender(), Arc::new(FakeClient::new("nile")));
        tracker.snapshot.send_modify(|s| s.balance = U256::from(8u64));
        let outcome = tracker.fetch(&FakeClient::new("wallet"), owner()).await;
        assert!(!outcome.any());
        assert_eq!(tracker.snapshot().balance, U256::from(8u64));
    }

    #[tokio::test]
    async fn test_run_fetches_immediately_and_stops() {
        let client = Arc::new(FakeClient::with_values("https://nile.trongrid.io", 11, 22));
        let wallet: Arc<dyn WalletProvider> = Arc::new(FakeWallet::new(owner(), client.clone()));
        let tracker = Arc::new(BalanceTracker::new(
            token(),
            spender(),
            Arc::new(FakeClient::new("nile")),
        ));
        let mut rx = tracker.subscribe();
        let (shutdown_tx, shutdown_rx) = watch::channel(());

        let handle = tokio::spawn(tracker.clone().run(
            wallet,
            owner(),
            Duration::from_secs(3600),
            Duration::from_secs(3600),
            shutdown_rx,
        ));
        tokio::time::timeout(Duration::from_secs(1), rx.wait_for(|s| s.allowance == U256::from(22u64)))
            .await
            .expect("no immediate fetch")
            .unwrap();
        assert_eq!(tracker.snapshot().balance, U256::from(11u64));

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("tracker did not stop")
            .unwrap();
        assert_eq!(client.balance_call_count(), 1);
    }
}
