use crate::domain::models::{AppEvent, GatewayCommand, MessageSeverity, StatusMessage, Tab};
use crate::domain::session::PrinterSession;
use crate::domain::settings::SettingsService;
use crate::infrastructure::bluetooth::protocol::{test_print_text, PrinterCommand};
use crate::infrastructure::bluetooth::BluetoothService;
use crate::infrastructure::logging::LoggingGuard;
use crate::infrastructure::storage::{self, DataStore};
use chrono::Local;
use eframe::egui;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};

pub struct PrinterMonitorApp {
    // Services
    pub(crate) settings: SettingsService,
    pub(crate) bluetooth: BluetoothService,
    pub(crate) store: Option<DataStore>,
    pub(crate) events_rx: mpsc::UnboundedReceiver<AppEvent>,

    // State
    pub(crate) session: PrinterSession,
    pub(crate) status_message: Option<StatusMessage>,

    // UI State
    pub(crate) selected_tab: Tab,
    pub(crate) confirm_clear: bool,
    pub(crate) is_dark_mode: bool,

    // Logging guard
    pub(crate) _logging_guard: Option<LoggingGuard>,
}

impl PrinterMonitorApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        settings: SettingsService,
        logging_guard: Option<LoggingGuard>,
    ) -> anyhow::Result<Self> {
        let is_dark_mode = settings.get().dark_mode;
        crate::presentation::theme::apply_theme(&cc.egui_ctx, is_dark_mode);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let bluetooth = BluetoothService::spawn(settings.get(), events_tx)?;

        let store = DataStore::open_default()
            .map_err(|e| error!("Data store unavailable: {:#}", e))
            .ok();

        Ok(Self {
            settings,
            bluetooth,
            store,
            events_rx,
            session: PrinterSession::new(),
            status_message: None,
            selected_tab: Tab::Status,
            confirm_clear: false,
            is_dark_mode,
            _logging_guard: logging_guard,
        })
    }

    pub(crate) fn notify(&mut self, message: impl Into<String>, severity: MessageSeverity) {
        self.status_message = Some(StatusMessage::new(message, severity));
    }

    pub(crate) fn connect(&mut self) {
        self.bluetooth.send(GatewayCommand::Connect);
    }

    pub(crate) fn disconnect(&mut self) {
        self.bluetooth.send(GatewayCommand::Disconnect);
    }

    pub(crate) fn cancel_connect(&mut self) {
        self.bluetooth.cancel_connect();
    }

    pub(crate) fn send_command(&mut self, command: PrinterCommand) {
        self.bluetooth.send(GatewayCommand::Send(command));
    }

    pub(crate) fn send_test_data(&mut self) {
        let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        self.bluetooth
            .send(GatewayCommand::SendText(test_print_text(&now)));
    }

    pub(crate) fn save_data(&mut self) {
        if self.session.activity.received().is_empty() {
            self.notify("No data to save", MessageSeverity::Warning);
            return;
        }
        let Some(store) = &self.store else {
            self.notify("Data store is unavailable", MessageSeverity::Error);
            return;
        };

        let batch = self.session.save_batch(self.settings.get(), Local::now());
        match store.append(batch) {
            Ok(saved) => {
                info!("Saved {} frames to {:?}", saved, store.path());
                self.notify(format!("Saved {} records", saved), MessageSeverity::Success);
            }
            Err(e) => {
                error!("Save failed: {:#}", e);
                self.notify(format!("Save failed: {}", e), MessageSeverity::Error);
            }
        }
    }

    pub(crate) fn export_data(&mut self) {
        if self.session.activity.received().is_empty() {
            self.notify("No data to export", MessageSeverity::Warning);
            return;
        }

        let doc = self
            .session
            .export_document(self.settings.get(), Local::now());
        let dir = self.settings.get().resolved_export_dir();
        match storage::write_export(&dir, &doc) {
            Ok(path) => self.notify(
                format!("Exported {} records to {}", doc.total_packets, path.display()),
                MessageSeverity::Success,
            ),
            Err(e) => {
                error!("Export failed: {:#}", e);
                self.notify(format!("Export failed: {}", e), MessageSeverity::Error);
            }
        }
    }

    pub(crate) fn clear_data(&mut self) {
        self.session.clear();
        self.notify("Data cleared", MessageSeverity::Info);
    }

    pub(crate) fn save_settings(&mut self) {
        match self.settings.save() {
            Ok(()) => self.notify(
                "Settings saved. Bluetooth changes apply after restart.",
                MessageSeverity::Success,
            ),
            Err(e) => {
                error!("Failed to save settings: {:#}", e);
                self.notify(format!("Failed to save settings: {}", e), MessageSeverity::Error);
            }
        }
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            if let Some(message) = self.session.apply(event) {
                self.status_message = Some(message);
            }
        }
    }

    fn confirm_clear_window(&mut self, ctx: &egui::Context) {
        if !self.confirm_clear {
            return;
        }

        let mut confirmed = false;
        let mut dismissed = false;
        egui::Window::new("Clear Data")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label("Clear all received data?");
                ui.horizontal(|ui| {
                    confirmed = ui.button("Clear").clicked();
                    dismissed = ui.button("Cancel").clicked();
                });
            });

        if confirmed {
            self.clear_data();
        }
        if confirmed || dismissed {
            self.confirm_clear = false;
        }
    }
}

impl eframe::App for PrinterMonitorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events();

        // Worker events and the uptime readout both need polling
        ctx.request_repaint_after(Duration::from_millis(100));

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.selectable_value(&mut self.selected_tab, Tab::Status, "Status");
                ui.selectable_value(&mut self.selected_tab, Tab::Commands, "Commands");
                ui.selectable_value(&mut self.selected_tab, Tab::Data, "Data");
                ui.selectable_value(&mut self.selected_tab, Tab::Settings, "Settings");

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let switch_icon = if self.is_dark_mode {
                        "☀ Light"
                    } else {
                        "🌙 Dark"
                    };
                    if ui.button(switch_icon).clicked() {
                        self.is_dark_mode = !self.is_dark_mode;
                        self.settings.get_mut().dark_mode = self.is_dark_mode;
                        crate::presentation::theme::apply_theme(ctx, self.is_dark_mode);
                    }
                    ui.label(
                        egui::RichText::new(format!("backend: {}", self.bluetooth.backend()))
                            .small(),
                    );
                });
            });
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            let palette = crate::presentation::theme::Palette::new(self.is_dark_mode);
            match &self.status_message {
                Some(msg) => {
                    ui.label(
                        egui::RichText::new(&msg.message)
                            .color(palette.for_severity(msg.severity))
                            .strong(),
                    );
                }
                None => {
                    ui.label("Ready");
                }
            }
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.vertical_centered(|ui| {
                    ui.set_max_width(800.0);
                    ui.add_space(20.0);

                    use crate::presentation::tabs;
                    match self.selected_tab {
                        Tab::Status => tabs::status::render(self, ui),
                        Tab::Commands => tabs::commands::render(self, ui),
                        Tab::Data => tabs::data::render(self, ui),
                        Tab::Settings => tabs::settings::render(self, ui),
                    }

                    ui.add_space(50.0);
                });
            });
        });

        self.confirm_clear_window(ctx);
    }
}
