//! Colors, spacing and styled widget factories for the SaveGas window.

use eframe::egui;

#[derive(Clone, Copy)]
pub struct AppTheme {
    pub background: egui::Color32,
    pub surface: egui::Color32,
    pub surface_hover: egui::Color32,
    pub surface_active: egui::Color32,
    pub panel_fill: egui::Color32,
    pub text_primary: egui::Color32,
    pub text_secondary: egui::Color32,

    pub primary: egui::Color32,
    pub secondary: egui::Color32,
    pub success: egui::Color32,
    pub warning: egui::Color32,
    pub error: egui::Color32,
    pub link: egui::Color32,

    pub spacing_xs: f32,
    pub spacing_sm: f32,
    pub spacing_md: f32,
    pub spacing_lg: f32,

    pub button_small: egui::Vec2,
    pub button_medium: egui::Vec2,
    pub button_large: egui::Vec2,
}

impl Default for AppTheme {
    fn default() -> Self {
        Self {
            // Dark slate with Tron red accents
            background: egui::Color32::from_rgb(14, 16, 22),
            surface: egui::Color32::from_rgb(24, 27, 36),
            surface_hover: egui::Color32::from_rgb(34, 38, 50),
            surface_active: egui::Color32::from_rgb(46, 51, 66),
            panel_fill: egui::Color32::from_rgb(18, 20, 28),
            text_primary: egui::Color32::from_rgb(232, 234, 240),
            text_secondary: egui::Color32::from_rgb(150, 156, 172),

            primary: egui::Color32::from_rgb(235, 0, 41),
            secondary: egui::Color32::from_rgb(90, 96, 112),
            success: egui::Color32::from_rgb(46, 204, 113),
            warning: egui::Color32::from_rgb(241, 196, 15),
            error: egui::Color32::from_rgb(231, 76, 60),
            link: egui::Color32::from_rgb(93, 173, 226),

            spacing_xs: 4.0,
            spacing_sm: 8.0,
            spacing_md: 16.0,
            spacing_lg: 24.0,

            button_small: egui::vec2(80.0, 24.0),
            button_medium: egui::vec2(140.0, 32.0),
            button_large: egui::vec2(220.0, 40.0),
        }
    }
}

impl AppTheme {
    /// Main call-to-action (connect, transfer)
    pub fn button_primary(&self, text: &str) -> egui::Button<'_> {
        egui::Button::new(egui::RichText::new(text).color(egui::Color32::WHITE).strong())
            .fill(self.primary)
            .min_size(self.button_medium)
    }

    pub fn button_large(&self, text: &str) -> egui::Button<'_> {
        egui::Button::new(egui::RichText::new(text).color(egui::Color32::WHITE).strong().size(16.0))
            .fill(self.primary)
            .min_size(self.button_large)
    }

    pub fn button_secondary(&self, text: &str) -> egui::Button<'_> {
        egui::Button::new(egui::RichText::new(text).color(self.text_primary))
            .fill(self.surface)
            .stroke(egui::Stroke::new(1.0, self.secondary))
            .min_size(self.button_medium)
    }

    pub fn button_small(&self, text: &str) -> egui::Button<'_> {
        egui::Button::new(egui::RichText::new(text).color(self.text_primary))
            .fill(self.surface_active)
            .min_size(self.button_small)
    }

    pub fn frame_panel(&self) -> egui::Frame {
        egui::Frame::none()
            .fill(self.panel_fill)
            .rounding(6.0)
            .inner_margin(self.spacing_md)
            .stroke(egui::Stroke::new(1.0, self.surface_active))
    }

    /// Amber strip used for the wrong-network banner.
    pub fn frame_warning(&self) -> egui::Frame {
        egui::Frame::none()
            .fill(egui::Color32::from_rgb(60, 48, 8))
            .rounding(4.0)
            .inner_margin(self.spacing_sm)
            .stroke(egui::Stroke::new(1.0, self.warning))
    }

    pub fn section_header(&self, ui: &mut egui::Ui, title: &str) {
        ui.label(egui::RichText::new(title).size(18.0).strong().color(self.text_primary));
        ui.add_space(self.spacing_xs);
    }
}

pub fn configure_style(ctx: &egui::Context, theme: &AppTheme) {
    let mut visuals = egui::Visuals::dark();
    visuals.window_fill = theme.background;
    visuals.panel_fill = theme.panel_fill;
    visuals.override_text_color = Some(theme.text_primary);
    visuals.hyperlink_color = theme.link;

    visuals.widgets.noninteractive.bg_fill = theme.surface;
    visuals.widgets.inactive.bg_fill = theme.surface;
    visuals.widgets.hovered.bg_fill = theme.surface_hover;
    visuals.widgets.active.bg_fill = theme.surface_active;
    visuals.widgets.open.bg_fill = theme.surface_active;
    visuals.widgets.inactive.bg_stroke = egui::Stroke::new(1.0, theme.secondary);
    visuals.widgets.active.bg_stroke = egui::Stroke::new(2.0, theme.primary);
    visuals.selection.bg_fill = theme.primary.linear_multiply(0.6);

    ctx.set_visuals(visuals);

    let mut style = (*ctx.style()).clone();
    style.spacing.item_spacing = egui::vec2(8.0, 6.0);
    style.spacing.button_padding = egui::vec2(12.0, 6.0);
    style.text_styles.insert(
        egui::TextStyle::Heading,
        egui::FontId::new(22.0, egui::FontFamily::Proportional),
    );
    style.text_styles.insert(
        egui::TextStyle::Monospace,
        egui::FontId::new(13.0, egui::FontFamily::Monospace),
    );
    ctx.set_style(style);
}
