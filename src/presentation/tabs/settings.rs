use crate::domain::settings::TransportBackend;
use crate::presentation::app::PrinterMonitorApp;
use crate::presentation::components::Components;
use eframe::egui;

pub fn render(app: &mut PrinterMonitorApp, ui: &mut egui::Ui) {
    Components::heading(ui, "Settings");
    ui.add_space(20.0);

    let settings_mut = app.settings.get_mut();

    Components::brutalist_card(ui, "Printer", |ui| {
        egui::Grid::new("printer_settings")
            .spacing([10.0, 10.0])
            .show(ui, |ui| {
                ui.label("Advertised name:");
                ui.text_edit_singleline(&mut settings_mut.device_name_filter);
                ui.end_row();
                ui.label("Display label:");
                ui.text_edit_singleline(&mut settings_mut.device_label);
                ui.end_row();
            });

        ui.horizontal(|ui| {
            ui.label("Backend:");
            egui::ComboBox::from_id_salt("transport_backend")
                .selected_text(format!("{:?}", settings_mut.transport_backend))
                .show_ui(ui, |ui| {
                    ui.selectable_value(
                        &mut settings_mut.transport_backend,
                        TransportBackend::Native,
                        "Native",
                    );
                    ui.selectable_value(
                        &mut settings_mut.transport_backend,
                        TransportBackend::Simulated,
                        "Simulated",
                    );
                });
        });

        ui.horizontal(|ui| {
            ui.label("Connect timeout (s, 0 = none):");
            ui.add(egui::DragValue::new(&mut settings_mut.connect_timeout_secs).range(0..=300));
        });

        ui.checkbox(
            &mut settings_mut.auto_query_on_connect,
            "Query status after connecting",
        );
        if settings_mut.auto_query_on_connect {
            ui.indent("auto_query", |ui| {
                ui.horizontal(|ui| {
                    ui.label("Delay (ms):");
                    ui.add(
                        egui::DragValue::new(&mut settings_mut.auto_query_delay_ms)
                            .range(0..=10_000),
                    );
                });
                ui.horizontal(|ui| {
                    ui.label("Command:");
                    ui.text_edit_singleline(&mut settings_mut.auto_query_command);
                });
            });
        }

        ui.collapsing("Override Service UUIDs", |ui| {
            ui.label(
                egui::RichText::new("⚠️ Warning: Altering these may break device discovery.")
                    .color(egui::Color32::from_rgb(255, 200, 0)),
            );

            egui::Grid::new("ble_uuids")
                .spacing([10.0, 10.0])
                .show(ui, |ui| {
                    ui.label("Service:");
                    ui.text_edit_singleline(&mut settings_mut.ble_service_uuid);
                    ui.end_row();
                    ui.label("Characteristic:");
                    ui.text_edit_singleline(&mut settings_mut.ble_characteristic_uuid);
                    ui.end_row();
                });
        });
    });

    ui.add_space(10.0);

    Components::brutalist_card(ui, "Export", |ui| {
        let mut dir = settings_mut.export_dir.clone().unwrap_or_default();
        ui.horizontal(|ui| {
            ui.label("Export folder:");
            if ui.text_edit_singleline(&mut dir).changed() {
                let dir = dir.trim();
                settings_mut.export_dir = (!dir.is_empty()).then(|| dir.to_string());
            }
        });
        ui.label(
            egui::RichText::new(format!(
                "Files go to {}",
                settings_mut.resolved_export_dir().display()
            ))
            .size(12.0),
        );
    });

    ui.add_space(10.0);

    Components::brutalist_card(ui, "Logging & Debug", |ui| {
        ui.horizontal(|ui| {
            ui.label("Verbosity Level:");
            egui::ComboBox::from_id_salt("log_level")
                .selected_text(&settings_mut.log_settings.level)
                .show_ui(ui, |ui| {
                    for level in &["trace", "debug", "info", "warn", "error"] {
                        ui.selectable_value(
                            &mut settings_mut.log_settings.level,
                            level.to_string(),
                            *level,
                        );
                    }
                });
        });

        ui.checkbox(
            &mut settings_mut.log_settings.console_logging_enabled,
            "Standard Console Logs",
        );
        ui.checkbox(
            &mut settings_mut.log_settings.file_logging_enabled,
            "Persistent File Logs",
        );

        if settings_mut.log_settings.file_logging_enabled {
            ui.indent("file_logs", |ui| {
                ui.horizontal(|ui| {
                    ui.label("Save Path:");
                    ui.text_edit_singleline(&mut settings_mut.log_settings.log_dir);
                });
                ui.horizontal(|ui| {
                    ui.label("Rotation:");
                    egui::ComboBox::from_id_salt("log_rot")
                        .selected_text(&settings_mut.log_settings.rotation)
                        .show_ui(ui, |ui| {
                            for rot in &["daily", "hourly", "minutely", "never"] {
                                ui.selectable_value(
                                    &mut settings_mut.log_settings.rotation,
                                    rot.to_string(),
                                    *rot,
                                );
                            }
                        });
                });
            });
        }
        ui.label(
            egui::RichText::new("Restart required for Bluetooth and log changes.")
                .italics()
                .size(12.0),
        );
    });

    ui.add_space(10.0);

    if ui.button("Save Settings").clicked() {
        app.save_settings();
    }
}
