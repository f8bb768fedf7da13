use crate::infrastructure::bluetooth::protocol::{self, PrinterCommand};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_false")]
    pub show_file_line: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_true(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

/// Which BLE stack the worker talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportBackend {
    /// The platform Bluetooth stack
    Native,
    /// In-process printer simulator
    Simulated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // Device
    #[serde(default = "default_device_name")]
    pub device_name_filter: String,
    #[serde(default = "default_device_label")]
    pub device_label: String,
    #[serde(default = "default_service_uuid")]
    pub ble_service_uuid: String,
    #[serde(default = "default_characteristic_uuid")]
    pub ble_characteristic_uuid: String,

    // Connection
    #[serde(default = "default_backend")]
    pub transport_backend: TransportBackend,
    /// 0 disables the timeout
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub auto_query_on_connect: bool,
    #[serde(default = "default_auto_query_delay_ms")]
    pub auto_query_delay_ms: u64,
    /// Command table name sent by the auto query
    #[serde(default = "default_auto_query_command")]
    pub auto_query_command: String,

    // Data
    #[serde(default)]
    pub export_dir: Option<String>,

    #[serde(default)]
    pub log_settings: LogSettings,

    #[serde(default = "default_false")]
    pub dark_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device_name_filter: default_device_name(),
            device_label: default_device_label(),
            ble_service_uuid: default_service_uuid(),
            ble_characteristic_uuid: default_characteristic_uuid(),
            transport_backend: default_backend(),
            connect_timeout_secs: default_connect_timeout_secs(),
            auto_query_on_connect: default_true(),
            auto_query_delay_ms: default_auto_query_delay_ms(),
            auto_query_command: default_auto_query_command(),
            export_dir: None,
            log_settings: LogSettings::default(),
            dark_mode: false,
        }
    }
}

impl Settings {
    pub fn connect_timeout(&self) -> Option<Duration> {
        match self.connect_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Where exports go when no directory is configured
    pub fn resolved_export_dir(&self) -> PathBuf {
        self.export_dir
            .as_ref()
            .map(PathBuf::from)
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "mini_printer_monitor".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}
fn default_device_name() -> String {
    protocol::DEVICE_NAME.to_string()
}
fn default_device_label() -> String {
    protocol::DEVICE_LABEL.to_string()
}
fn default_service_uuid() -> String {
    protocol::SERVICE_UUID.to_string()
}
fn default_characteristic_uuid() -> String {
    protocol::CHARACTERISTIC_UUID.to_string()
}
fn default_backend() -> TransportBackend {
    TransportBackend::Native
}
fn default_auto_query_command() -> String {
    PrinterCommand::QueryStatus.name().to_string()
}
fn default_connect_timeout_secs() -> u64 {
    30
}
fn default_auto_query_delay_ms() -> u64 {
    1000
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::load_from(settings_path))
    }

    /// Load from an explicit path, falling back to defaults when the file
    /// is missing or unreadable
    pub fn load_from(settings_path: PathBuf) -> Self {
        let settings = match Self::load_from_file(&settings_path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::debug!("Using default settings ({}): {}", settings_path.display(), e);
                Settings::default()
            }
        };

        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("MiniPrinterMonitor");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }
}
