//! Mint, approve and bulk-transfer submissions for the connected account.
//!
//! A bulk transfer runs `Idle -> Parsing -> (Approving) -> Transferring`, then
//! ends in `Succeeded` or `Failed`. Approval is only requested for MockUSDT
//! batches whose total exceeds the current allowance.

use crate::address::TronAddress;
use crate::amount::{self, biguint_to_u256, format_units, parse_batch, RecipientEntry};
use crate::balance::BalanceTracker;
use crate::chain::{abi, CallOptions, ContractCall, InclusionStatus, WalletProvider};
use crate::config::Config;
use crate::error::TransferError;
use crate::types::{AccountSnapshot, TokenType, TxId, TxStage};
use ethers::types::{Address, U256};
use num_bigint::BigUint;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, OwnedMutexGuard};
use tracing::{debug, info, warn};

/// At most one in-flight submission per account.
#[derive(Default)]
pub struct AccountLocks {
    locks: Mutex<HashMap<TronAddress, Arc<tokio::sync::Mutex<()>>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, account: TronAddress) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(account).or_default().clone()
    }

    /// Held until the guard is dropped.
    pub fn try_acquire(&self, account: TronAddress) -> Result<OwnedMutexGuard<()>, TransferError> {
        self.lock_for(account)
            .try_lock_owned()
            .map_err(|_| TransferError::AlreadyPending(account))
    }

    pub fn is_locked(&self, account: TronAddress) -> bool {
        self.lock_for(account).try_lock().is_err()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferPhase {
    #[default]
    Idle,
    Parsing,
    Approving,
    Transferring,
    Succeeded,
    Failed,
}

impl TransferPhase {
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            TransferPhase::Parsing | TransferPhase::Approving | TransferPhase::Transferring
        )
    }

    /// Label for the submit button while a run is active.
    pub fn label(&self) -> &'static str {
        match self {
            TransferPhase::Idle => "Idle",
            TransferPhase::Parsing => "Preparing...",
            TransferPhase::Approving => "Approving...",
            TransferPhase::Transferring => "Transferring...",
            TransferPhase::Succeeded => "Done",
            TransferPhase::Failed => "Failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferProgress {
    Phase(TransferPhase),
    Submitted { stage: TxStage, tx: TxId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub token_type: TokenType,
    pub approval_tx: Option<TxId>,
    pub transfer_tx: TxId,
    pub recipients: usize,
    pub skipped: usize,
    pub total: BigUint,
}

impl TransferReceipt {
    pub fn summary(&self, decimals: u32) -> String {
        format!(
            "Sent {} {} to {} recipient(s)",
            format_units(&self.total, decimals),
            self.token_type.label(),
            self.recipients
        )
    }
}

/// Only MockUSDT moves under an allowance; TRX travels as call value.
pub fn needs_approval(token_type: TokenType, snapshot: &AccountSnapshot, total: &BigUint) -> bool {
    token_type == TokenType::Token && !snapshot.allowance_covers(total)
}

/// Allowance requested before a MockUSDT batch: `total * multiplier`.
pub fn approval_amount(total: &BigUint, multiplier: u64) -> Result<U256, TransferError> {
    let requested = total * BigUint::from(multiplier);
    biguint_to_u256(&requested).ok_or_else(|| TransferError::AmountOutOfRange(requested.to_string()))
}

pub struct BulkTransferOrchestrator {
    wallet: Arc<dyn WalletProvider>,
    owner: TronAddress,
    tracker: Arc<BalanceTracker>,
    locks: Arc<AccountLocks>,
    config: Config,
}

fn emit(progress: &mpsc::UnboundedSender<TransferProgress>, event: TransferProgress) {
    // The receiver going away (window closed) must not abort a submission.
    let _ = progress.send(event);
}

impl BulkTransferOrchestrator {
    pub fn new(
        wallet: Arc<dyn WalletProvider>,
        owner: TronAddress,
        tracker: Arc<BalanceTracker>,
        locks: Arc<AccountLocks>,
        config: Config,
    ) -> Self {
        Self {
            wallet,
            owner,
            tracker,
            locks,
            config,
        }
    }

    pub fn owner(&self) -> TronAddress {
        self.owner
    }

    pub fn is_pending(&self) -> bool {
        self.locks.is_locked(self.owner)
    }

    fn ensure_ready(&self) -> Result<(), TransferError> {
        match self.wallet.address() {
            Some(address) if address == self.owner => Ok(()),
            _ => Err(TransferError::WalletNotReady),
        }
    }

    /// Run one bulk transfer for the listed recipients.
    pub async fn submit(
        &self,
        entries: &[RecipientEntry],
        token_type: TokenType,
        progress: &mpsc::UnboundedSender<TransferProgress>,
    ) -> Result<TransferReceipt, TransferError> {
        let _guard = self.locks.try_acquire(self.owner)?;
        let result = self.run_transfer(entries, token_type, progress).await;
        match &result {
            Ok(receipt) => {
                info!("{} (tx {})", receipt.summary(self.config.decimals), receipt.transfer_tx);
                emit(progress, TransferProgress::Phase(TransferPhase::Succeeded));
            }
            Err(e) => {
                warn!("Bulk transfer failed: {}", e);
                emit(progress, TransferProgress::Phase(TransferPhase::Failed));
            }
        }
        result
    }

    async fn run_transfer(
        &self,
        entries: &[RecipientEntry],
        token_type: TokenType,
        progress: &mpsc::UnboundedSender<TransferProgress>,
    ) -> Result<TransferReceipt, TransferError> {
        self.ensure_ready()?;

        emit(progress, TransferProgress::Phase(TransferPhase::Parsing));
        let batch = parse_batch(entries, self.config.decimals);
        if batch.is_empty() {
            return Err(TransferError::NoValidEntries);
        }
        if batch.skipped > 0 {
            warn!("{} recipient row(s) skipped: invalid amount", batch.skipped);
        }
        // Checked before the approval so a bad address costs no allowance.
        let recipients = batch
            .resolve_recipients()
            .map_err(|e| TransferError::failed(TxStage::BulkTransfer, format!("{:#}", e)))?;
        debug!(
            "Batch of {} recipient(s), total {} {}",
            batch.len(),
            format_units(&batch.total, self.config.decimals),
            token_type.label()
        );

        let options = CallOptions::with_fee_limit(self.config.fee_limit);
        let (tokens, options) = match token_type {
            TokenType::Token => (vec![self.config.token_address.to_evm(); batch.len()], options),
            TokenType::Native => {
                let value = u64::try_from(&batch.total)
                    .map_err(|_| TransferError::AmountOutOfRange(batch.total.to_string()))?;
                (vec![Address::zero(); batch.len()], options.call_value(value))
            }
        };

        let mut approval_tx = None;
        let snapshot = self.tracker.snapshot();
        if needs_approval(token_type, &snapshot, &batch.total) {
            emit(progress, TransferProgress::Phase(TransferPhase::Approving));
            let amount = approval_amount(&batch.total, self.config.approval_multiplier)?;
            info!(
                "Allowance {} is below {}, approving {}",
                amount::format_u256(snapshot.allowance, self.config.decimals),
                format_units(&batch.total, self.config.decimals),
                amount::format_u256(amount, self.config.decimals)
            );
            let call = abi::approve(self.config.token_address, self.config.gas_saver_address, amount);
            let tx = self
                .send_and_confirm(TxStage::Approve, &call, &CallOptions::with_fee_limit(self.config.fee_limit), progress)
                .await?;
            approval_tx = Some(tx);
        }

        emit(progress, TransferProgress::Phase(TransferPhase::Transferring));
        let call = abi::bulk_transfer(self.config.gas_saver_address, &tokens, &recipients, &batch.amounts);
        let transfer_tx = self
            .send_and_confirm(TxStage::BulkTransfer, &call, &options, progress)
            .await?;

        Ok(TransferReceipt {
            token_type,
            approval_tx,
            transfer_tx,
            recipients: batch.len(),
            skipped: batch.skipped,
            total: batch.total,
        })
    }

    /// Mint the configured amount of MockUSDT to the connected account.
    pub async fn mint(&self, progress: &mpsc::UnboundedSender<TransferProgress>) -> Result<TxId, TransferError> {
        let _guard = self.locks.try_acquire(self.owner)?;
        self.ensure_ready()?;

        let units = amount::parse_units(&self.config.mint_amount, self.config.decimals)
            .map_err(|_| TransferError::AmountOutOfRange(self.config.mint_amount.clone()))?;
        let value = biguint_to_u256(&units).ok_or_else(|| TransferError::AmountOutOfRange(units.to_string()))?;

        let call = abi::mint(self.config.token_address, self.owner, value);
        let options = CallOptions::with_fee_limit(self.config.fee_limit);
        let result = self.send_and_confirm(TxStage::Mint, &call, &options, progress).await;
        match &result {
            Ok(tx) => info!("Minted {} MockUSDT to {} (tx {})", self.config.mint_amount, self.owner, tx),
            Err(e) => warn!("Mint failed: {}", e),
        }
        result
    }

    /// Submit, wait for inclusion, then refresh the snapshot.
    ///
    /// A revert fails the stage. When the wallet cannot report inclusion the
    /// fixed fallback delay is used before moving on.
    async fn send_and_confirm(
        &self,
        stage: TxStage,
        call: &ContractCall,
        options: &CallOptions,
        progress: &mpsc::UnboundedSender<TransferProgress>,
    ) -> Result<TxId, TransferError> {
        let tx = self
            .wallet
            .send(call, options)
            .await
            .map_err(|e| TransferError::failed(stage, e))?;
        info!("{} submitted: {}", stage, tx);
        emit(progress, TransferProgress::Submitted { stage, tx: tx.clone() });

        let timings = &self.config.timings;
        match self.wallet.wait_for_inclusion(&tx, timings.confirmation_timeout).await {
            Ok(InclusionStatus::Confirmed { block_number }) => {
                debug!("{} {} included in block {:?}", stage, tx, block_number);
            }
            Ok(InclusionStatus::Reverted(reason)) => {
                return Err(TransferError::failed(stage, format!("transaction {} reverted: {}", tx, reason)));
            }
            Ok(InclusionStatus::Pending) => {
                debug!("{} {} not confirmed yet, waiting {:?}", stage, tx, timings.confirmation_fallback_delay);
                tokio::time::sleep(timings.confirmation_fallback_delay).await;
            }
            Err(e) => {
                warn!("Could not confirm {} {}: {}", stage, tx, e);
                tokio::time::sleep(timings.confirmation_fallback_delay).await;
            }
        }

        self.tracker.refresh(self.wallet.as_ref(), self.owner).await;
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::testing::{FakeClient, FakeWallet};
    use ethers::abi::Token;
    use std::str::FromStr;
    use std::time::Duration;

    const A: &str = "TNPeeaaFB7K9cmo4uQpcU32zGK8G1NYqeL";
    const B: &str = "TLCuviLXZtgF7JgXxwrUzrHpt4mmbMRTfW";

    fn owner() -> TronAddress {
        TronAddress::from_str("TESHt6Nrd7JtdXWzJUeeA7EGJsS8oma9qK").unwrap()
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.timings.confirmation_timeout = Duration::from_millis(10);
        config.timings.confirmation_fallback_delay = Duration::from_millis(1);
        config
    }

    fn entries() -> Vec<RecipientEntry> {
        vec![RecipientEntry::new(A, "10"), RecipientEntry::new(B, "5")]
    }

    struct Harness {
        wallet: Arc<FakeWallet>,
        client: Arc<FakeClient>,
        tracker: Arc<BalanceTracker>,
        orchestrator: BulkTransferOrchestrator,
        locks: Arc<AccountLocks>,
    }

    async fn harness_with(allowance: u64, customize: impl FnOnce(&mut FakeWallet)) -> Harness {
        let config = test_config();
        let client = Arc::new(FakeClient::with_values("https://nile.trongrid.io", 1_000_000_000, allowance));
        let mut wallet = FakeWallet::new(owner(), client.clone());
        customize(&mut wallet);
        let wallet = Arc::new(wallet);
        let tracker = Arc::new(BalanceTracker::new(
            config.token_address,
            config.gas_saver_address,
            Arc::new(FakeClient::new("nile")),
        ));
        tracker.refresh(wallet.as_ref(), owner()).await;
        let locks = Arc::new(AccountLocks::new());
        let orchestrator =
            BulkTransferOrchestrator::new(wallet.clone(), owner(), tracker.clone(), locks.clone(), config);
        Harness {
            wallet,
            client,
            tracker,
            orchestrator,
            locks,
        }
    }

    async fn harness(allowance: u64) -> Harness {
        harness_with(allowance, |_| {}).await
    }

    fn drain(mut rx: mpsc::UnboundedReceiver<TransferProgress>) -> Vec<TransferProgress> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_needs_approval() {
        let snapshot = AccountSnapshot {
            balance: U256::zero(),
            allowance: U256::from(15_000_000u64),
        };
        assert!(!needs_approval(TokenType::Token, &snapshot, &BigUint::from(15_000_000u64)));
        assert!(needs_approval(TokenType::Token, &snapshot, &BigUint::from(15_000_001u64)));
        assert!(!needs_approval(TokenType::Native, &AccountSnapshot::default(), &BigUint::from(1u32)));
    }

    #[test]
    fn test_approval_amount() {
        let amount = approval_amount(&BigUint::from(15_000_000u64), 1_000_000).unwrap();
        assert_eq!(amount, U256::from(15_000_000_000_000u64));
        let huge = BigUint::from(10u32).pow(74);
        assert!(matches!(
            approval_amount(&huge, 1_000_000),
            Err(TransferError::AmountOutOfRange(_))
        ));
    }

    #[test]
    fn test_account_locks() {
        let locks = AccountLocks::new();
        let guard = locks.try_acquire(owner()).unwrap();
        assert!(locks.is_locked(owner()));
        assert!(matches!(locks.try_acquire(owner()), Err(TransferError::AlreadyPending(_))));
        let other = TronAddress::from_str(A).unwrap();
        assert!(locks.try_acquire(other).is_ok());
        drop(guard);
        assert!(!locks.is_locked(owner()));
    }

    #[tokio::test]
    async fn test_token_transfer_approves_first() {
        let h = harness(0).await;
        let (tx, rx) = mpsc::unbounded_channel();
        let receipt = h.orchestrator.submit(&entries(), TokenType::Token, &tx).await.unwrap();

        assert_eq!(h.wallet.sent_functions(), vec!["approve", "bulkTransfer"]);
        assert_eq!(receipt.approval_tx, Some(TxId("tx1".into())));
        assert_eq!(receipt.transfer_tx, TxId("tx2".into()));
        assert_eq!(receipt.total, BigUint::from(15_000_000u64));
        assert_eq!(receipt.recipients, 2);

        let sent = h.wallet.sent.lock().unwrap();
        let (approve, _) = &sent[0];
        assert_eq!(approve.contract, h.orchestrator.config.token_address);
        assert_eq!(approve.params[1], Token::Uint(U256::from(15_000_000_000_000u64)));

        let (bulk, options) = &sent[1];
        assert_eq!(bulk.contract, h.orchestrator.config.gas_saver_address);
        assert_eq!(options.call_value, 0);
        assert_eq!(options.fee_limit, 100_000_000);
        let usdt = Token::Address(h.orchestrator.config.token_address.to_evm());
        assert_eq!(bulk.params[0], Token::Array(vec![usdt.clone(), usdt]));
        assert_eq!(
            bulk.params[2],
            Token::Array(vec![
                Token::Uint(U256::from(10_000_000u64)),
                Token::Uint(U256::from(5_000_000u64))
            ])
        );
        drop(sent);

        let events = drain(rx);
        assert_eq!(
            events,
            vec![
                TransferProgress::Phase(TransferPhase::Parsing),
                TransferProgress::Phase(TransferPhase::Approving),
                TransferProgress::Submitted { stage: TxStage::Approve, tx: TxId("tx1".into()) },
                TransferProgress::Phase(TransferPhase::Transferring),
                TransferProgress::Submitted { stage: TxStage::BulkTransfer, tx: TxId("tx2".into()) },
                TransferProgress::Phase(TransferPhase::Succeeded),
            ]
        );
        assert!(!h.orchestrator.is_pending());
    }

    #[tokio::test]
    async fn test_sufficient_allowance_skips_approval() {
        let h = harness(15_000_000).await;
        let (tx, _rx) = mpsc::unbounded_channel();
        let receipt = h.orchestrator.submit(&entries(), TokenType::Token, &tx).await.unwrap();
        assert_eq!(h.wallet.sent_functions(), vec!["bulkTransfer"]);
        assert!(receipt.approval_tx.is_none());
    }

    #[tokio::test]
    async fn test_native_never_approves() {
        let h = harness(0).await;
        let (tx, _rx) = mpsc::unbounded_channel();
        h.orchestrator.submit(&entries(), TokenType::Native, &tx).await.unwrap();

        assert_eq!(h.wallet.sent_functions(), vec!["bulkTransfer"]);
        let sent = h.wallet.sent.lock().unwrap();
        let (bulk, options) = &sent[0];
        assert_eq!(options.call_value, 15_000_000);
        let zero = Token::Address(Address::zero());
        assert_eq!(bulk.params[0], Token::Array(vec![zero.clone(), zero]));
    }

    #[tokio::test]
    async fn test_no_valid_entries() {
        let h = harness(0).await;
        let (tx, rx) = mpsc::unbounded_channel();
        let rows = vec![
            RecipientEntry::new("", "10"),
            RecipientEntry::new(A, "abc"),
            RecipientEntry::new("not-an-address", "-1"),
        ];
        let err = h.orchestrator.submit(&rows, TokenType::Token, &tx).await.unwrap_err();
        assert!(matches!(err, TransferError::NoValidEntries));
        assert!(h.wallet.sent_functions().is_empty());
        assert_eq!(drain(rx).last(), Some(&TransferProgress::Phase(TransferPhase::Failed)));
    }

    #[tokio::test]
    async fn test_invalid_address_fails_transfer_stage() {
        let h = harness(0).await;
        let (tx, rx) = mpsc::unbounded_channel();
        let rows = vec![RecipientEntry::new("Txxx1", "10"), RecipientEntry::new(B, "5")];
        let err = h.orchestrator.submit(&rows, TokenType::Token, &tx).await.unwrap_err();
        match err {
            TransferError::TransactionFailed { stage, message } => {
                assert_eq!(stage, TxStage::BulkTransfer);
                assert!(message.contains("Txxx1"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(h.wallet.sent_functions().is_empty());
        assert_eq!(
            drain(rx),
            vec![
                TransferProgress::Phase(TransferPhase::Parsing),
                TransferProgress::Phase(TransferPhase::Failed),
            ]
        );
        assert!(!h.orchestrator.is_pending());
    }

    #[tokio::test]
    async fn test_malformed_rows_are_skipped() {
        let h = harness(u64::MAX).await;
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut rows = entries();
        rows.insert(1, RecipientEntry::new(A, "-1"));
        let receipt = h.orchestrator.submit(&rows, TokenType::Token, &tx).await.unwrap();
        assert_eq!(receipt.recipients, 2);
        assert_eq!(receipt.skipped, 1);
    }

    #[tokio::test]
    async fn test_second_submission_rejected_while_pending() {
        let h = harness(0).await;
        let (tx, _rx) = mpsc::unbounded_channel();
        let _held = h.locks.try_acquire(owner()).unwrap();
        assert!(h.orchestrator.is_pending());
        let err = h.orchestrator.submit(&entries(), TokenType::Token, &tx).await.unwrap_err();
        assert!(matches!(err, TransferError::AlreadyPending(a) if a == owner()));
        assert!(matches!(h.orchestrator.mint(&tx).await, Err(TransferError::AlreadyPending(_))));
        assert!(h.wallet.sent_functions().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_approval_stops_run() {
        let h = harness_with(0, |w| w.reject = vec!["approve"]).await;
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = h.orchestrator.submit(&entries(), TokenType::Token, &tx).await.unwrap_err();
        match err {
            TransferError::TransactionFailed { stage, message } => {
                assert_eq!(stage, TxStage::Approve);
                assert!(message.contains("declined"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(h.wallet.sent_functions().is_empty());
        assert!(!h.orchestrator.is_pending());
    }

    #[tokio::test]
    async fn test_reverted_approval_stops_run() {
        let h = harness_with(0, |w| w.inclusion = InclusionStatus::Reverted("REVERT".into())).await;
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = h.orchestrator.submit(&entries(), TokenType::Token, &tx).await.unwrap_err();
        assert!(matches!(err, TransferError::TransactionFailed { stage: TxStage::Approve, .. }));
        assert_eq!(h.wallet.sent_functions(), vec!["approve"]);
    }

    #[tokio::test]
    async fn test_unconfirmed_approval_falls_back_to_delay() {
        let h = harness_with(0, |w| {
            w.inclusion = InclusionStatus::Pending;
            w.allowance_after_approve = Some(u64::MAX);
        })
        .await;
        let (tx, _rx) = mpsc::unbounded_channel();
        h.orchestrator.submit(&entries(), TokenType::Token, &tx).await.unwrap();
        assert_eq!(h.wallet.sent_functions(), vec!["approve", "bulkTransfer"]);
        // Snapshot refreshed after the approval.
        assert_eq!(h.tracker.snapshot().allowance, U256::from(u64::MAX));
        assert!(h.client.allowance_call_count() >= 2);
    }

    #[tokio::test]
    async fn test_oversized_approval_is_reported() {
        let h = harness(0).await;
        let (tx, _rx) = mpsc::unbounded_channel();
        let rows = vec![RecipientEntry::new(A, format!("1{}", "0".repeat(68)))];
        let err = h.orchestrator.submit(&rows, TokenType::Token, &tx).await.unwrap_err();
        assert!(matches!(err, TransferError::AmountOutOfRange(_)));
        assert!(h.wallet.sent_functions().is_empty());
    }

    #[tokio::test]
    async fn test_mint_sends_configured_amount() {
        let h = harness(0).await;
        let (tx, rx) = mpsc::unbounded_channel();
        let id = h.orchestrator.mint(&tx).await.unwrap();
        assert_eq!(id, TxId("tx1".into()));

        let sent = h.wallet.sent.lock().unwrap();
        let (call, options) = &sent[0];
        assert_eq!(call.function_name(), "mint");
        assert_eq!(call.params[0], Token::Address(owner().to_evm()));
        assert_eq!(call.params[1], Token::Uint(U256::from(1_000_000_000u64)));
        assert_eq!(options.fee_limit, 100_000_000);
        drop(sent);
        assert_eq!(
            drain(rx),
            vec![TransferProgress::Submitted { stage: TxStage::Mint, tx: TxId("tx1".into()) }]
        );
    }

    #[tokio::test]
    async fn test_disconnected_wallet_not_ready() {
        let h = harness_with(0, |w| w.address = None).await;
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = h.orchestrator.submit(&entries(), TokenType::Token, &tx).await.unwrap_err();
        assert!(matches!(err, TransferError::WalletNotReady));
    }
}
