use crate::domain::models::ConnectionState;
use crate::infrastructure::bluetooth::protocol::PrinterCommand;
use crate::presentation::app::PrinterMonitorApp;
use crate::presentation::components::Components;
use crate::presentation::theme::Palette;
use eframe::egui;

pub fn render(app: &mut PrinterMonitorApp, ui: &mut egui::Ui) {
    Components::heading(ui, "Mini-Printer Monitor");
    ui.add_space(20.0);

    ui_connection_panel(app, ui);
    ui.add_space(15.0);

    ui_printer_panel(app, ui);
    ui.add_space(15.0);

    ui_session_panel(app, ui);
}

fn ui_connection_panel(app: &mut PrinterMonitorApp, ui: &mut egui::Ui) {
    let palette = Palette::new(app.is_dark_mode);
    let state = app.session.connection_state;

    Components::brutalist_card(ui, "Connection", |ui| {
        let text = match state {
            ConnectionState::Connected => "CONNECTED",
            ConnectionState::Searching => "SEARCHING...",
            ConnectionState::Disconnected => "DISCONNECTED",
        };
        Components::status_banner(
            ui,
            text,
            palette.for_connection(state),
            egui::Color32::BLACK,
        );

        ui.add_space(10.0);

        ui.horizontal(|ui| match state {
            ConnectionState::Disconnected => {
                if ui.button("Connect Printer").clicked() {
                    app.connect();
                }
            }
            ConnectionState::Searching => {
                ui.spinner();
                if ui.button("Cancel").clicked() {
                    app.cancel_connect();
                }
            }
            ConnectionState::Connected => {
                if ui.button("Disconnect").clicked() {
                    app.disconnect();
                }
                if ui.button("Refresh Status").clicked() {
                    app.send_command(PrinterCommand::QueryStatus);
                }
            }
        });
    });
}

fn ui_printer_panel(app: &mut PrinterMonitorApp, ui: &mut egui::Ui) {
    let palette = Palette::new(app.is_dark_mode);

    Components::brutalist_card(ui, "Printer Status", |ui| {
        let Some(status) = app.session.status else {
            ui.label(egui::RichText::new("No status received yet").italics());
            return;
        };

        egui::Grid::new("printer_status_grid")
            .spacing([40.0, 8.0])
            .show(ui, |ui| {
                let (paper, color) = if status.paper_ok {
                    ("Normal", palette.online)
                } else {
                    ("Out of paper", palette.offline)
                };
                Components::readout(
                    ui,
                    "Paper:",
                    egui::RichText::new(paper).color(color).strong(),
                );
                Components::readout(
                    ui,
                    "Head temperature:",
                    format!("{}°C", status.head_temperature_c),
                );
                Components::readout(ui, "Battery:", format!("{}%", status.battery_percent));
            });
    });
}

fn ui_session_panel(app: &mut PrinterMonitorApp, ui: &mut egui::Ui) {
    let session = &app.session;

    Components::brutalist_card(ui, "Session", |ui| {
        egui::Grid::new("session_grid")
            .spacing([40.0, 8.0])
            .show(ui, |ui| {
                Components::readout(
                    ui,
                    "Device:",
                    session.device_name.as_deref().unwrap_or("Not connected"),
                );
                Components::readout(ui, "Connections:", session.connection_count.to_string());
                let last = session
                    .last_activity
                    .map(|t| t.format("%H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string());
                Components::readout(ui, "Last activity:", last);
            });
    });
}
