//! Recipient editor, token selection and the approve/transfer button.

use crate::amount::{format_units, parse_recipient_csv, RecipientEntry};
use crate::config::tx_explorer_url;
use crate::gui::app::SaveGasApp;
use crate::orchestrator::{needs_approval, TransferPhase};
use crate::types::TokenType;
use eframe::egui::{self, RichText};
use std::path::Path;

impl SaveGasApp {
    pub(crate) fn render_transfer_panel(&mut self, ui: &mut egui::Ui) {
        self.theme.frame_panel().show(ui, |ui| {
            ui.set_width(ui.available_width());
            self.theme.section_header(ui, "Bulk Transfer");

            let decimals = self.config.decimals;
            let mut changed = false;

            ui.horizontal(|ui| {
                ui.label("Send:");
                for token_type in [TokenType::Token, TokenType::Native] {
                    changed |= ui
                        .radio_value(&mut self.form.token_type, token_type, token_type.label())
                        .changed();
                }
            });
            ui.add_space(self.theme.spacing_sm);

            changed |= self.render_recipient_rows(ui);

            ui.add_space(self.theme.spacing_xs);
            ui.horizontal(|ui| {
                if ui.add(self.theme.button_small("+ Add row")).clicked() {
                    self.form.rows.push(RecipientEntry::default());
                }
                if ui.add(self.theme.button_small("Import CSV")).clicked() {
                    if let Some(path) = rfd::FileDialog::new().add_filter("CSV files", &["csv"]).pick_file() {
                        self.import_csv(&path);
                    }
                }
                if ui.add(self.theme.button_small("Clear")).clicked() {
                    self.form.replace_rows(Vec::new(), decimals);
                }
            });

            if changed {
                self.form.recompute(decimals);
            }

            ui.add_space(self.theme.spacing_sm);
            self.render_batch_summary(ui);
            ui.add_space(self.theme.spacing_sm);
            self.render_submit(ui);
            self.render_transactions(ui);
        });
    }

    /// Returns true when any row was edited or removed.
    fn render_recipient_rows(&mut self, ui: &mut egui::Ui) -> bool {
        let mut changed = false;
        let mut remove = None;
        let can_remove = self.form.rows.len() > 1;

        egui::Grid::new("recipient_rows")
            .num_columns(3)
            .spacing([self.theme.spacing_sm, self.theme.spacing_xs])
            .show(ui, |ui| {
                ui.label(RichText::new("Recipient (T...)").color(self.theme.text_secondary));
                ui.label(RichText::new("Amount").color(self.theme.text_secondary));
                ui.label("");
                ui.end_row();

                for (i, row) in self.form.rows.iter_mut().enumerate() {
                    changed |= ui
                        .add(
                            egui::TextEdit::singleline(&mut row.address)
                                .desired_width(360.0)
                                .font(egui::TextStyle::Monospace)
                                .hint_text("TNPeeaaFB7K9cmo4uQpcU32zGK8G1NYqeL"),
                        )
                        .changed();
                    changed |= ui
                        .add(egui::TextEdit::singleline(&mut row.amount).desired_width(120.0).hint_text("0.0"))
                        .changed();
                    if ui.add_enabled(can_remove, egui::Button::new("x").small()).clicked() {
                        remove = Some(i);
                    }
                    ui.end_row();
                }
            });

        if let Some(i) = remove {
            self.form.rows.remove(i);
            changed = true;
        }
        changed
    }

    fn render_batch_summary(&self, ui: &mut egui::Ui) {
        let preview = &self.form.preview;
        let total = format_units(&preview.total, self.config.decimals);
        ui.horizontal(|ui| {
            ui.label(format!("{} recipient(s), total", preview.len()));
            ui.label(RichText::new(format!("{} {}", total, self.form.token_type.label())).strong());
        });
        if preview.skipped > 0 {
            ui.label(
                RichText::new(format!(
                    "[!!] {} row(s) ignored: invalid amount",
                    preview.skipped
                ))
                .color(self.theme.warning),
            );
        }
        let invalid = preview.invalid_recipients();
        if !invalid.is_empty() {
            ui.label(
                RichText::new(format!(
                    "[!!] Not a Tron address: {}. The transfer will be refused.",
                    invalid.join(", ")
                ))
                .color(self.theme.warning),
            );
        }
    }

    fn render_submit(&mut self, ui: &mut egui::Ui) {
        let busy = self.is_busy();
        let approval = self
            .session
            .as_ref()
            .map(|s| needs_approval(self.form.token_type, &s.snapshot(), &self.form.preview.total))
            .unwrap_or(false);

        let label = if busy && self.phase.is_busy() {
            self.phase.label().to_string()
        } else if approval {
            "Approve & Transfer".to_string()
        } else {
            "Transfer".to_string()
        };
        let enabled = self.session.is_some() && !busy && !self.form.preview.is_empty();

        ui.horizontal(|ui| {
            if ui.add_enabled(enabled, self.theme.button_large(&label)).clicked() {
                self.start_transfer();
            }
            if busy {
                ui.spinner();
            }
            if approval && !busy {
                ui.label(
                    RichText::new("Allowance is below the total; an approval is sent first.")
                        .small()
                        .color(self.theme.text_secondary),
                );
            }
        });

        if let Some(status) = &self.status {
            let color = if self.phase == TransferPhase::Failed || status.starts_with("[!!]") {
                self.theme.error
            } else {
                self.theme.success
            };
            ui.add_space(self.theme.spacing_xs);
            ui.label(RichText::new(status).color(color));
        }
    }

    fn render_transactions(&mut self, ui: &mut egui::Ui) {
        if self.history.entries.is_empty() {
            return;
        }
        ui.add_space(self.theme.spacing_sm);
        ui.label(RichText::new("Recent transactions").color(self.theme.text_secondary));
        let mut clicked = None;
        for (stage, tx) in self.history.entries.iter().rev() {
            ui.horizontal(|ui| {
                ui.label(format!("{}:", stage));
                if ui.link(RichText::new(tx.to_string()).monospace().small()).clicked() {
                    clicked = Some(tx_explorer_url(&tx.0));
                }
            });
        }
        if let Some(url) = clicked {
            self.open_url(&url);
        }
    }

    fn import_csv(&mut self, path: &Path) {
        let decimals = self.config.decimals;
        let result = std::fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(|contents| parse_recipient_csv(&contents));
        match result {
            Ok(rows) if rows.is_empty() => {
                self.notifications.warning("No recipients found in CSV file");
            }
            Ok(rows) => {
                let count = rows.len();
                self.form.replace_rows(rows, decimals);
                self.notifications.success(format!(
                    "Loaded {} row(s) from {}, {} valid",
                    count,
                    path.display(),
                    self.form.preview.len()
                ));
            }
            Err(e) => {
                self.notifications.error(format!("Failed to load CSV file: {:#}", e));
            }
        }
    }
}
