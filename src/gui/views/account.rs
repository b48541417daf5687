//! Top bar, account panel, wrong-network banner and the notification feed.

use crate::amount::format_u256;
use crate::config::{address_explorer_url, NILE_FULL_HOST};
use crate::gui::app::SaveGasApp;
use crate::gui::async_job::is_running;
use crate::gui::notifications::Level;
use crate::network::NetworkStatus;
use eframe::egui::{self, RichText};

impl SaveGasApp {
    pub(crate) fn render_top_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading(RichText::new("SaveGas").strong().color(self.theme.primary));
            ui.label(
                RichText::new(format!("v{} · Tron Nile", env!("CARGO_PKG_VERSION")))
                    .small()
                    .color(self.theme.text_secondary),
            );

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if let Some(session) = &self.session {
                    let owner = session.owner();
                    if ui.add(self.theme.button_secondary("Disconnect")).clicked() {
                        self.disconnect();
                    }
                    ui.label(RichText::new(owner.to_base58()).monospace());
                } else if is_running(&self.connect_job) {
                    ui.spinner();
                    ui.label("Connecting...");
                } else if ui.add(self.theme.button_primary("Connect Wallet")).clicked() {
                    self.start_connect();
                }
            });
        });
    }

    /// Dismissible strip shown while the wallet's node is not on Nile.
    pub(crate) fn render_network_banner(&mut self, ui: &mut egui::Ui) {
        let NetworkStatus::Wrong { host } = &self.last_network else {
            return;
        };
        if self.banner_dismissed {
            return;
        }
        let host = host.clone();

        self.theme.frame_warning().show(ui, |ui| {
            ui.set_width(ui.available_width());
            ui.horizontal_wrapped(|ui| {
                ui.label(
                    RichText::new(format!(
                        "[!!] Wrong network: your wallet uses {}. SaveGas contracts live on {}.",
                        host, self.config.required_endpoint
                    ))
                    .color(self.theme.warning),
                );
                if ui.add(self.theme.button_small("How to switch")).clicked() {
                    self.show_network_help = true;
                }
                if ui.add(self.theme.button_small("Dismiss")).clicked() {
                    self.banner_dismissed = true;
                }
            });
        });
        ui.add_space(self.theme.spacing_md);
    }

    pub(crate) fn render_network_help(&mut self, ctx: &egui::Context) {
        let mut open = self.show_network_help;
        egui::Window::new("Switch to Tron Nile")
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                ui.label("SaveGas only works against the Nile testnet.");
                ui.add_space(self.theme.spacing_sm);
                ui.label("1. Open the .env file next to the application.");
                ui.label(format!("2. Set TRON_FULL_HOST={}", NILE_FULL_HOST));
                ui.label("3. Disconnect and connect again.");
                ui.add_space(self.theme.spacing_sm);
                ui.label(
                    RichText::new(format!("Current node: {}", self.last_network.display_host()))
                        .small()
                        .color(self.theme.text_secondary),
                );
            });
        self.show_network_help = open;
    }

    pub(crate) fn render_account_panel(&mut self, ui: &mut egui::Ui) {
        self.theme.frame_panel().show(ui, |ui| {
            ui.set_width(ui.available_width());
            self.theme.section_header(ui, "Account");

            let Some(session) = &self.session else {
                ui.label("No wallet connected.");
                if let Some(err) = &self.connect_error {
                    ui.add_space(self.theme.spacing_xs);
                    ui.label(RichText::new(err).color(self.theme.error));
                }
                return;
            };

            let owner = session.owner();
            let snapshot = session.snapshot();
            let network = session.network_status();
            let decimals = self.config.decimals;
            let mut open_owner = false;

            egui::Grid::new("account_grid")
                .num_columns(2)
                .spacing([self.theme.spacing_md, self.theme.spacing_xs])
                .show(ui, |ui| {
                    ui.label(RichText::new("Address").color(self.theme.text_secondary));
                    if ui.link(RichText::new(owner.to_base58()).monospace()).clicked() {
                        open_owner = true;
                    }
                    ui.end_row();

                    ui.label(RichText::new("Node").color(self.theme.text_secondary));
                    let color = if network.is_wrong() { self.theme.warning } else { self.theme.success };
                    ui.label(RichText::new(network.display_host()).color(color));
                    ui.end_row();

                    ui.label(RichText::new("MockUSDT balance").color(self.theme.text_secondary));
                    ui.label(RichText::new(format_u256(snapshot.balance, decimals)).strong());
                    ui.end_row();

                    ui.label(RichText::new("GasSaver allowance").color(self.theme.text_secondary));
                    ui.label(format_u256(snapshot.allowance, decimals));
                    ui.end_row();
                });

            if open_owner {
                self.open_url(&address_explorer_url(&owner));
            }

            ui.add_space(self.theme.spacing_sm);
            let busy = self.is_busy();
            ui.horizontal(|ui| {
                let label = format!("Mint {} MockUSDT", self.config.mint_amount);
                if ui.add_enabled(!busy, self.theme.button_secondary(&label)).clicked() {
                    self.start_mint();
                }
                if is_running(&self.mint_job) {
                    ui.spinner();
                    ui.label("Minting...");
                }
            });
        });
    }

    pub(crate) fn render_notifications(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            self.theme.section_header(ui, "Notifications");
            if !self.notifications.is_empty() && ui.small_button("Clear").clicked() {
                self.notifications.clear();
            }
        });
        ui.separator();

        egui::ScrollArea::vertical().id_source("notification_scroll").show(ui, |ui| {
            if self.notifications.is_empty() {
                ui.label(RichText::new("Nothing yet.").color(self.theme.text_secondary));
            }
            for entry in self.notifications.recent() {
                let color = match entry.level {
                    Level::Info => self.theme.text_primary,
                    Level::Success => self.theme.success,
                    Level::Warning => self.theme.warning,
                    Level::Error => self.theme.error,
                };
                ui.label(RichText::new(format!("{} {}", entry.level.marker(), entry.message)).color(color));
                ui.label(RichText::new(entry.time_ago()).small().color(self.theme.text_secondary));
                ui.add_space(self.theme.spacing_xs);
            }
        });
    }
}
