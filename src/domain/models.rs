use crate::infrastructure::bluetooth::protocol::{self, CommandSpec, PrinterCommand};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// One inbound notification from the printer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedFrame {
    pub timestamp: DateTime<Local>,
    /// Best-effort UTF-8 rendering of the payload
    #[serde(rename = "data")]
    pub decoded_text: String,
    pub hex: String,
    /// Payload length in bytes
    pub bytes: usize,
    #[serde(rename = "rawData")]
    pub raw_bytes: Vec<u8>,
}

impl ReceivedFrame {
    pub fn new(raw_bytes: Vec<u8>) -> Self {
        Self::at(Local::now(), raw_bytes)
    }

    pub fn at(timestamp: DateTime<Local>, raw_bytes: Vec<u8>) -> Self {
        Self {
            timestamp,
            decoded_text: String::from_utf8_lossy(&raw_bytes).into_owned(),
            hex: protocol::to_hex(&raw_bytes),
            bytes: raw_bytes.len(),
            raw_bytes,
        }
    }
}

/// A command that was written to the printer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentCommandRecord {
    pub timestamp: DateTime<Local>,
    pub command_name: String,
    pub bytes: Vec<u8>,
    pub hex: String,
    pub length: usize,
}

impl SentCommandRecord {
    pub fn new(command_name: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            timestamp: Local::now(),
            command_name: command_name.into(),
            bytes: bytes.to_vec(),
            hex: protocol::to_hex(bytes),
            length: bytes.len(),
        }
    }
}

/// Decoded printer telemetry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRecord {
    pub paper_ok: bool,
    pub head_temperature_c: u8,
    /// Always within 0..=100
    pub battery_percent: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Searching,
    Connected,
}

/// What the gateway learned about the peripheral it connected to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub id: String,
}

/// Events published from the Bluetooth worker to the UI
#[derive(Debug, Clone)]
pub enum AppEvent {
    ConnectionState(ConnectionState),
    Connected(DeviceInfo),
    FrameReceived(ReceivedFrame),
    /// A table command was written successfully
    CommandSent(CommandSpec),
    /// Free-form payload (test print) written successfully
    TextSent { length: usize },
    OperationFailed { operation: String, message: String },
    LogMessage(StatusMessage),
}

/// Requests from the UI to the Bluetooth worker
#[derive(Debug, Clone)]
pub enum GatewayCommand {
    Connect,
    Disconnect,
    Send(PrinterCommand),
    SendText(String),
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

impl StatusMessage {
    pub fn new(message: impl Into<String>, severity: MessageSeverity) -> Self {
        Self {
            message: message.into(),
            severity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Status,
    Commands,
    Data,
    Settings,
}
