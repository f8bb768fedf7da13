mod domain;
mod infrastructure;
mod presentation;

use domain::settings::SettingsService;
use eframe::egui;
use presentation::app::PrinterMonitorApp;
use tracing::info;

fn main() -> anyhow::Result<()> {
    let settings = SettingsService::new()?;

    let logging_guard = infrastructure::logging::init_logger(&settings.get().log_settings)
        .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
        .ok();

    info!("Starting Mini-Printer Monitor");
    info!("Settings file: {:?}", settings.path());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([900.0, 700.0])
            .with_title("Mini-Printer Monitor"),
        ..Default::default()
    };

    eframe::run_native(
        "Mini-Printer Monitor",
        options,
        Box::new(move |cc| {
            let app = PrinterMonitorApp::new(cc, settings, logging_guard)?;
            Ok(Box::new(app))
        }),
    )
    .map_err(|e| anyhow::anyhow!("UI exited with an error: {}", e))
}
