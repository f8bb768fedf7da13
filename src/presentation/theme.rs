use crate::domain::models::{ConnectionState, MessageSeverity};
use eframe::egui;

pub struct Palette {
    pub bg: egui::Color32,
    pub fg: egui::Color32,
    pub stroke: egui::Color32,
    pub highlight: egui::Color32,
    pub online: egui::Color32,
    pub warning: egui::Color32,
    pub offline: egui::Color32,
    pub info: egui::Color32,
}

impl Palette {
    pub fn new(is_dark: bool) -> Self {
        if is_dark {
            Self {
                bg: egui::Color32::from_rgb(25, 25, 25),
                fg: egui::Color32::WHITE,
                stroke: egui::Color32::WHITE,
                highlight: egui::Color32::from_rgb(255, 200, 0),
                online: egui::Color32::from_rgb(46, 204, 113),
                warning: egui::Color32::from_rgb(243, 156, 18),
                offline: egui::Color32::from_rgb(231, 76, 60),
                info: egui::Color32::from_rgb(52, 152, 219),
            }
        } else {
            Self {
                bg: egui::Color32::from_rgb(245, 245, 245),
                fg: egui::Color32::BLACK,
                stroke: egui::Color32::BLACK,
                highlight: egui::Color32::from_rgb(255, 220, 0),
                online: egui::Color32::from_rgb(39, 174, 96),
                warning: egui::Color32::from_rgb(211, 84, 0),
                offline: egui::Color32::from_rgb(192, 57, 43),
                info: egui::Color32::from_rgb(41, 128, 185),
            }
        }
    }

    pub fn for_connection(&self, state: ConnectionState) -> egui::Color32 {
        match state {
            ConnectionState::Connected => self.online,
            ConnectionState::Searching => self.warning,
            ConnectionState::Disconnected => self.offline,
        }
    }

    pub fn for_severity(&self, severity: MessageSeverity) -> egui::Color32 {
        match severity {
            MessageSeverity::Info => self.info,
            MessageSeverity::Success => self.online,
            MessageSeverity::Warning => self.warning,
            MessageSeverity::Error => self.offline,
        }
    }
}

pub fn apply_theme(ctx: &egui::Context, is_dark: bool) {
    let mut style = (*ctx.style()).clone();
    let palette = Palette::new(is_dark);

    style
        .text_styles
        .iter_mut()
        .for_each(|(text_style, font_id)| {
            font_id.size = match text_style {
                egui::TextStyle::Heading => 26.0,
                egui::TextStyle::Body | egui::TextStyle::Button => 15.0,
                egui::TextStyle::Monospace => 13.0,
                _ => font_id.size,
            };
        });

    style.spacing.item_spacing = egui::vec2(10.0, 10.0);
    style.spacing.button_padding = egui::vec2(14.0, 8.0);

    let widgets = &mut style.visuals.widgets;
    for (visuals, width) in [
        (&mut widgets.noninteractive, 2.0),
        (&mut widgets.inactive, 2.0),
        (&mut widgets.hovered, 2.5),
        (&mut widgets.active, 3.0),
    ] {
        visuals.bg_stroke = egui::Stroke::new(width, palette.stroke);
        visuals.rounding = egui::Rounding::ZERO;
    }
    widgets.noninteractive.bg_fill = palette.bg;
    widgets.noninteractive.fg_stroke = egui::Stroke::new(1.0, palette.fg);
    widgets.inactive.bg_fill = if is_dark {
        egui::Color32::from_gray(30)
    } else {
        egui::Color32::WHITE
    };
    widgets.inactive.fg_stroke = egui::Stroke::new(1.0, palette.fg);
    widgets.hovered.bg_fill = palette.highlight;
    widgets.hovered.fg_stroke = egui::Stroke::new(1.0, egui::Color32::BLACK);
    widgets.active.bg_fill = palette.online;
    widgets.active.fg_stroke = egui::Stroke::new(1.0, egui::Color32::BLACK);

    style.visuals.selection.stroke = egui::Stroke::new(1.0, palette.stroke);
    style.visuals.selection.bg_fill = palette.info;

    style.visuals.window_rounding = egui::Rounding::ZERO;
    style.visuals.window_stroke = egui::Stroke::new(2.0, palette.stroke);
    style.visuals.window_shadow = egui::Shadow {
        offset: egui::vec2(6.0, 6.0),
        blur: 0.0,
        spread: 0.0,
        color: palette.stroke,
    };
    style.visuals.window_fill = palette.bg;
    style.visuals.panel_fill = palette.bg;
    style.visuals.override_text_color = Some(palette.fg);

    ctx.set_style(style);
}
