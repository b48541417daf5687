//! Network diagnostics output and the operation log viewer.

use crate::gui::app::SaveGasApp;
use crate::gui::async_job::is_running;
use crate::operation_log;
use eframe::egui::{self, RichText};

impl SaveGasApp {
    pub(crate) fn render_diagnostics_panel(&mut self, ui: &mut egui::Ui) {
        self.theme.frame_panel().show(ui, |ui| {
            ui.set_width(ui.available_width());
            self.theme.section_header(ui, "Diagnostics");

            ui.horizontal(|ui| {
                let running = is_running(&self.diagnostics_job);
                if ui
                    .add_enabled(!running, self.theme.button_secondary("Run Network Diagnostics"))
                    .clicked()
                {
                    self.start_diagnostics();
                }
                if running {
                    ui.spinner();
                }
                if ui.add(self.theme.button_secondary("Operation Log")).clicked() {
                    self.refresh_operation_log();
                    self.show_operation_log = true;
                }
            });

            if !self.diagnostics_log.is_empty() {
                ui.add_space(self.theme.spacing_sm);
                let mut text = self.diagnostics_log.join("\n");
                ui.add(
                    egui::TextEdit::multiline(&mut text)
                        .font(egui::TextStyle::Monospace)
                        .desired_width(f32::INFINITY)
                        .interactive(false),
                );
            }
        });
    }

    pub(crate) fn render_operation_log_window(&mut self, ctx: &egui::Context) {
        let mut open = self.show_operation_log;
        let mut reload = false;
        egui::Window::new("Operation Log")
            .open(&mut open)
            .default_size([640.0, 420.0])
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(
                        RichText::new(operation_log::log_file_path())
                            .small()
                            .color(self.theme.text_secondary),
                    );
                    if ui.small_button("Reload").clicked() {
                        reload = true;
                    }
                });
                ui.separator();
                egui::ScrollArea::vertical().stick_to_bottom(true).show(ui, |ui| {
                    ui.label(RichText::new(&self.operation_log_text).monospace());
                });
            });
        if reload {
            self.refresh_operation_log();
        }
        self.show_operation_log = open;
    }
}
