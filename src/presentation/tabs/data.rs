use crate::domain::models::ReceivedFrame;
use crate::presentation::app::PrinterMonitorApp;
use crate::presentation::components::Components;
use crate::presentation::theme::Palette;
use eframe::egui;

pub fn render(app: &mut PrinterMonitorApp, ui: &mut egui::Ui) {
    Components::heading(ui, "Received Data");
    ui.add_space(20.0);

    ui_statistics_panel(app, ui);
    ui.add_space(15.0);

    ui_actions_panel(app, ui);
    ui.add_space(15.0);

    ui_frames_panel(app, ui);
}

fn ui_statistics_panel(app: &mut PrinterMonitorApp, ui: &mut egui::Ui) {
    let stats = app.session.activity.statistics();

    Components::brutalist_card(ui, "Statistics", |ui| {
        egui::Grid::new("stats_grid")
            .spacing([40.0, 8.0])
            .show(ui, |ui| {
                Components::readout(ui, "Frames received:", stats.frames_received.to_string());
                Components::readout(
                    ui,
                    "Bytes received:",
                    stats.total_bytes_received.to_string(),
                );
                Components::readout(ui, "Errors:", stats.error_count.to_string());
                Components::readout(ui, "Success rate:", format!("{}%", stats.success_rate));
                Components::readout(ui, "Uptime:", format!("{} min", stats.uptime_minutes()));
            });
    });
}

fn ui_actions_panel(app: &mut PrinterMonitorApp, ui: &mut egui::Ui) {
    let has_data = !app.session.activity.received().is_empty();
    let connected = app.session.is_connected();

    Components::brutalist_card(ui, "Actions", |ui| {
        ui.horizontal_wrapped(|ui| {
            if ui.add_enabled(has_data, egui::Button::new("Save")).clicked() {
                app.save_data();
            }
            if ui.add_enabled(has_data, egui::Button::new("Export")).clicked() {
                app.export_data();
            }
            if ui.add_enabled(has_data, egui::Button::new("Clear")).clicked() {
                app.confirm_clear = true;
            }
            if ui
                .add_enabled(connected, egui::Button::new("Send Test Print"))
                .clicked()
            {
                app.send_test_data();
            }
        });

        if let Some(store) = &app.store {
            ui.label(
                egui::RichText::new(format!("Store: {}", store.path().display())).size(12.0),
            );
        }
    });
}

fn ui_frames_panel(app: &mut PrinterMonitorApp, ui: &mut egui::Ui) {
    let palette = Palette::new(app.is_dark_mode);
    let frames = app.session.activity.recent_frames();

    Components::brutalist_card(ui, "Latest Frames", |ui| {
        if frames.is_empty() {
            ui.label(egui::RichText::new("No data received").italics());
            return;
        }

        egui::ScrollArea::vertical()
            .id_salt("received_frames")
            .max_height(400.0)
            .show(ui, |ui| {
                for frame in frames.iter().rev() {
                    frame_entry(ui, palette.online, frame);
                }
            });
    });
}

fn frame_entry(ui: &mut egui::Ui, accent: egui::Color32, frame: &ReceivedFrame) {
    Components::packet_entry(
        ui,
        accent,
        &format!(
            "{} | {} bytes",
            frame.timestamp.format("%H:%M:%S"),
            frame.bytes
        ),
        &frame.decoded_text,
        &frame.hex,
    );
}
