use crate::infrastructure::bluetooth::protocol::PrinterCommand;
use crate::presentation::app::PrinterMonitorApp;
use crate::presentation::components::Components;
use crate::presentation::theme::Palette;
use eframe::egui;

pub fn render(app: &mut PrinterMonitorApp, ui: &mut egui::Ui) {
    Components::heading(ui, "Printer Commands");
    ui.add_space(20.0);

    let connected = app.session.is_connected();

    Components::brutalist_card(ui, "Control", |ui| {
        if !connected {
            ui.label(egui::RichText::new("Connect the printer to send commands.").italics());
        }
        ui.horizontal_wrapped(|ui| {
            for command in PrinterCommand::ALL {
                let button = egui::Button::new(command.label());
                let response = ui
                    .add_enabled(connected, button)
                    .on_hover_text(command.to_string());
                if response.clicked() {
                    app.send_command(command);
                }
            }
        });
    });

    ui.add_space(15.0);

    let palette = Palette::new(app.is_dark_mode);
    let recent = app.session.activity.recent_commands();
    let total_sent = app.session.activity.sent().len();

    Components::brutalist_card(ui, "Sent Commands", |ui| {
        ui.label(format!("Commands sent: {}", total_sent));
        if recent.is_empty() {
            ui.label(egui::RichText::new("Nothing sent yet").italics());
            return;
        }

        egui::ScrollArea::vertical()
            .id_salt("sent_commands")
            .max_height(300.0)
            .show(ui, |ui| {
                for record in recent.iter().rev() {
                    Components::packet_entry(
                        ui,
                        palette.info,
                        &format!(
                            "{} | {} bytes",
                            record.timestamp.format("%H:%M:%S"),
                            record.length
                        ),
                        &record.command_name,
                        &record.hex,
                    );
                }
            });
    });
}
