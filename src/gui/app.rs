//! Application state and the per-frame update loop.

use crate::amount::{parse_batch, ParsedBatch, RecipientEntry};
use crate::chain::{ChainClient, KeyWallet, TronGridClient, WalletProvider};
use crate::config::Config;
use crate::network::NetworkStatus;
use crate::operation_log;
use crate::orchestrator::{AccountLocks, TransferPhase, TransferProgress, TransferReceipt};
use crate::session::Session;
use crate::types::{TokenType, TxId, TxStage};
use anyhow::{anyhow, Result};
use eframe::{egui, App, Frame, NativeOptions};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::async_job::{is_running, AsyncJob};
use super::notifications::{describe_error, Notifications};
use super::theme::{configure_style, AppTheme};

/// Recipient rows and the batch derived from them.
pub(crate) struct TransferForm {
    pub(crate) rows: Vec<RecipientEntry>,
    pub(crate) token_type: TokenType,
    pub(crate) preview: ParsedBatch,
}

impl TransferForm {
    fn new() -> Self {
        Self {
            rows: vec![RecipientEntry::default()],
            token_type: TokenType::default(),
            preview: ParsedBatch::default(),
        }
    }

    /// Call after any row or token-type change.
    pub(crate) fn recompute(&mut self, decimals: u32) {
        self.preview = parse_batch(&self.rows, decimals);
    }

    pub(crate) fn replace_rows(&mut self, rows: Vec<RecipientEntry>, decimals: u32) {
        self.rows = if rows.is_empty() { vec![RecipientEntry::default()] } else { rows };
        self.recompute(decimals);
    }
}

/// Latest submitted transactions, for explorer links.
#[derive(Default)]
pub(crate) struct TxHistory {
    pub(crate) entries: Vec<(TxStage, TxId)>,
}

impl TxHistory {
    pub(crate) fn record(&mut self, stage: TxStage, tx: TxId) {
        self.entries.push((stage, tx));
        if self.entries.len() > 10 {
            self.entries.remove(0);
        }
    }
}

pub struct SaveGasApp {
    pub(crate) runtime: Runtime,
    pub(crate) config: Config,
    pub(crate) theme: AppTheme,
    pub(crate) notifications: Notifications,
    pub(crate) locks: Arc<AccountLocks>,

    pub(crate) session: Option<Session>,
    pub(crate) connect_job: Option<AsyncJob<Session>>,
    pub(crate) connect_error: Option<String>,

    pub(crate) last_network: NetworkStatus,
    pub(crate) banner_dismissed: bool,
    pub(crate) show_network_help: bool,

    pub(crate) form: TransferForm,
    pub(crate) phase: TransferPhase,
    pub(crate) transfer_job: Option<AsyncJob<TransferReceipt>>,
    pub(crate) mint_job: Option<AsyncJob<TxId>>,
    pub(crate) progress_rx: Option<mpsc::UnboundedReceiver<TransferProgress>>,
    pub(crate) status: Option<String>,
    pub(crate) history: TxHistory,

    pub(crate) diagnostics_job: Option<AsyncJob<Vec<String>>>,
    pub(crate) diagnostics_log: Vec<String>,
    pub(crate) show_operation_log: bool,
    pub(crate) operation_log_text: String,
}

impl SaveGasApp {
    fn new(config: Config, runtime: Runtime, ctx: &egui::Context) -> Self {
        let theme = AppTheme::default();
        configure_style(ctx, &theme);

        let mut form = TransferForm::new();
        form.recompute(config.decimals);

        Self {
            runtime,
            config,
            theme,
            notifications: Notifications::default(),
            locks: Arc::new(AccountLocks::new()),
            session: None,
            connect_job: None,
            connect_error: None,
            last_network: NetworkStatus::Unknown,
            banner_dismissed: false,
            show_network_help: false,
            form,
            phase: TransferPhase::Idle,
            transfer_job: None,
            mint_job: None,
            progress_rx: None,
            status: None,
            history: TxHistory::default(),
            diagnostics_job: None,
            diagnostics_log: Vec::new(),
            show_operation_log: false,
            operation_log_text: String::new(),
        }
    }

    pub(crate) fn spawn_job<T, F>(&self, future: F) -> AsyncJob<T>
    where
        T: Send + 'static,
        F: std::future::Future<Output = Result<T>> + Send + 'static,
    {
        AsyncJob::spawn(self.runtime.handle(), future)
    }

    /// A mint or transfer is being prepared or submitted.
    pub(crate) fn is_busy(&self) -> bool {
        is_running(&self.transfer_job)
            || is_running(&self.mint_job)
            || self.session.as_ref().map(Session::is_pending).unwrap_or(false)
    }

    pub(crate) fn start_connect(&mut self) {
        if is_running(&self.connect_job) {
            return;
        }
        self.connect_error = None;
        let config = self.config.clone();
        let locks = self.locks.clone();
        self.connect_job = Some(self.spawn_job(async move {
            let api_key = config.api_key.clone();
            let wallet: Arc<dyn WalletProvider> =
                Arc::new(KeyWallet::from_env(&config.wallet_host, api_key.as_deref())?);
            let fallback: Arc<dyn ChainClient> =
                Arc::new(TronGridClient::new(&config.read_host, api_key.as_deref())?);
            Session::connect(wallet, fallback, locks, config).await
        }));
    }

    pub(crate) fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            self.notifications.info(format!("Disconnected {}", session.owner()));
            session.disconnect();
        }
        self.last_network = NetworkStatus::Unknown;
        self.banner_dismissed = false;
    }

    pub(crate) fn start_transfer(&mut self) {
        let Some(session) = &self.session else {
            self.notifications.warning("Connect a wallet first");
            return;
        };
        let orchestrator = session.orchestrator();
        let rows = self.form.rows.clone();
        let token_type = self.form.token_type;
        let (tx, rx) = mpsc::unbounded_channel();
        self.progress_rx = Some(rx);
        self.status = None;
        self.phase = TransferPhase::Parsing;
        self.transfer_job = Some(self.spawn_job(async move {
            Ok(orchestrator.submit(&rows, token_type, &tx).await?)
        }));
    }

    pub(crate) fn start_mint(&mut self) {
        let Some(session) = &self.session else {
            self.notifications.warning("Connect a wallet first");
            return;
        };
        let orchestrator = session.orchestrator();
        let (tx, rx) = mpsc::unbounded_channel();
        self.progress_rx = Some(rx);
        self.status = None;
        self.mint_job = Some(self.spawn_job(async move { Ok(orchestrator.mint(&tx).await?) }));
    }

    pub(crate) fn start_diagnostics(&mut self) {
        if is_running(&self.diagnostics_job) {
            return;
        }
        let wallet = self.session.as_ref().map(Session::wallet);
        let targets = crate::diagnostics::default_targets(&self.config);
        self.diagnostics_job = Some(self.spawn_job(async move {
            Ok(crate::diagnostics::run_diagnostics(wallet.as_deref(), &targets).await)
        }));
    }

    pub(crate) fn refresh_operation_log(&mut self) {
        self.operation_log_text = match operation_log::read_log() {
            Ok(text) if text.trim().is_empty() => "No operations logged yet.".to_string(),
            Ok(text) => text,
            Err(e) => format!("Failed to read {}: {}", operation_log::log_file_path(), e),
        };
    }

    fn log_operation(&mut self, operation: &str, details: String) {
        if let Err(e) = operation_log::append_log(operation, &self.config.required_endpoint, details) {
            warn!("Failed to write operation log: {}", e);
        }
    }

    pub(crate) fn open_url(&mut self, url: &str) {
        if let Err(e) = open::that(url) {
            self.notifications.error(format!("Failed to open {}: {}", url, e));
        }
    }

    fn poll_jobs(&mut self) {
        if let Some(res) = self.connect_job.as_mut().and_then(AsyncJob::poll) {
            self.connect_job = None;
            match res {
                Ok(session) => {
                    self.notifications.success(format!("Connected {}", session.owner()));
                    self.session = Some(session);
                }
                Err(e) => {
                    let message = describe_error(&e);
                    self.notifications.error(format!("Connection failed: {:#}", e));
                    self.connect_error = Some(message);
                }
            }
        }

        if let Some(rx) = &mut self.progress_rx {
            while let Ok(event) = rx.try_recv() {
                match event {
                    TransferProgress::Phase(phase) => self.phase = phase,
                    TransferProgress::Submitted { stage, tx } => {
                        self.notifications.info(format!("{} submitted: {}", stage, tx));
                        self.history.record(stage, tx);
                    }
                }
            }
        }

        if let Some(res) = self.transfer_job.as_mut().and_then(AsyncJob::poll) {
            self.transfer_job = None;
            self.progress_rx = None;
            match res {
                Ok(receipt) => {
                    let summary = receipt.summary(self.config.decimals);
                    let mut details = format!(
                        "token={}\nrecipients={}\nskipped={}\ntotal_units={}\ntransfer_tx={}",
                        receipt.token_type.label(),
                        receipt.recipients,
                        receipt.skipped,
                        receipt.total,
                        receipt.transfer_tx
                    );
                    if let Some(approval) = &receipt.approval_tx {
                        details.push_str(&format!("\napproval_tx={}", approval));
                    }
                    self.log_operation("bulk_transfer", details);
                    self.notifications.success(summary.clone());
                    self.status = Some(format!("[OK] {}", summary));
                    self.phase = TransferPhase::Succeeded;
                }
                Err(e) => {
                    self.notifications.error(format!("Bulk transfer failed: {:#}", e));
                    self.status = Some(format!("[!!] {}", describe_error(&e)));
                    self.phase = TransferPhase::Failed;
                }
            }
        }

        if let Some(res) = self.mint_job.as_mut().and_then(AsyncJob::poll) {
            self.mint_job = None;
            self.progress_rx = None;
            match res {
                Ok(tx) => {
                    let amount = self.config.mint_amount.clone();
                    self.log_operation("mint", format!("amount={}\ntx={}", amount, tx));
                    self.notifications.success(format!("Minted {} MockUSDT", amount));
                    self.status = Some(format!("[OK] Minted {} MockUSDT", amount));
                }
                Err(e) => {
                    self.notifications.error(format!("Mint failed: {:#}", e));
                    self.status = Some(format!("[!!] {}", describe_error(&e)));
                }
            }
        }

        if let Some(res) = self.diagnostics_job.as_mut().and_then(AsyncJob::poll) {
            self.diagnostics_job = None;
            self.diagnostics_log = match res {
                Ok(lines) => lines,
                Err(e) => vec![format!("[!!] Diagnostics failed: {}", e)],
            };
        }

        self.track_network();
    }

    /// Re-show the banner whenever the wallet's node changes.
    fn track_network(&mut self) {
        let status = self
            .session
            .as_ref()
            .map(Session::network_status)
            .unwrap_or_default();
        if status != self.last_network {
            if status.is_wrong() {
                self.notifications.warning(format!(
                    "Wallet node {} is not on {}",
                    status.display_host(),
                    self.config.required_endpoint
                ));
            }
            self.last_network = status;
            self.banner_dismissed = false;
        }
    }
}

impl App for SaveGasApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        self.poll_jobs();

        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.add_space(self.theme.spacing_sm);
            self.render_top_bar(ui);
            ui.add_space(self.theme.spacing_sm);
        });

        egui::SidePanel::right("notifications")
            .resizable(true)
            .default_width(300.0)
            .show(ctx, |ui| self.render_notifications(ui));

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                self.render_network_banner(ui);
                self.render_account_panel(ui);
                ui.add_space(self.theme.spacing_md);
                self.render_transfer_panel(ui);
                ui.add_space(self.theme.spacing_md);
                self.render_diagnostics_panel(ui);
            });
        });

        self.render_network_help(ctx);
        self.render_operation_log_window(ctx);

        ctx.request_repaint_after(Duration::from_millis(100));
    }
}

pub fn launch(config: Config) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| anyhow!("Failed to create async runtime: {}", e))?;
    info!(
        "Starting SaveGas v{} (wallet node {}, read node {})",
        env!("CARGO_PKG_VERSION"),
        config.wallet_host,
        config.read_host
    );

    let app_creator = move |cc: &eframe::CreationContext<'_>| {
        Box::new(SaveGasApp::new(config, runtime, &cc.egui_ctx)) as Box<dyn App>
    };

    let native_options = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 760.0])
            .with_min_inner_size([760.0, 520.0]),
        persist_window: true,
        ..Default::default()
    };

    eframe::run_native("SaveGas - Tron Nile bulk transfers", native_options, Box::new(app_creator))
        .map_err(|e| anyhow!("Failed to start GUI: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "TNPeeaaFB7K9cmo4uQpcU32zGK8G1NYqeL";

    #[test]
    fn test_form_recompute_tracks_rows() {
        let mut form = TransferForm::new();
        form.recompute(6);
        assert!(form.preview.is_empty());

        form.rows[0] = RecipientEntry::new(A, "10");
        form.rows.push(RecipientEntry::new(A, "5"));
        form.recompute(6);
        assert_eq!(form.preview.len(), 2);
        assert_eq!(form.preview.total, num_bigint::BigUint::from(15_000_000u64));
    }

    #[test]
    fn test_replace_rows_keeps_one_editable_row() {
        let mut form = TransferForm::new();
        form.replace_rows(Vec::new(), 6);
        assert_eq!(form.rows.len(), 1);
        form.replace_rows(vec![RecipientEntry::new(A, "1")], 6);
        assert_eq!(form.preview.len(), 1);
    }

    #[test]
    fn test_history_keeps_latest() {
        let mut history = TxHistory::default();
        for i in 0..12 {
            history.record(TxStage::Mint, TxId(format!("{}", i)));
        }
        assert_eq!(history.entries.len(), 10);
        assert_eq!(history.entries[0].1, TxId("2".into()));
    }
}
