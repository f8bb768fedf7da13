//! Mini-Printer Protocol
//!
//! This module contains the protocol definitions for communicating with
//! the Mini-Printer: GATT identifiers, the outbound command table and the
//! status frame decoder.

use crate::domain::models::StatusRecord;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Advertised name the printer is discovered by
pub const DEVICE_NAME: &str = "Printer";

/// Name shown to the user, and recorded in saved batches and exports
pub const DEVICE_LABEL: &str = "Mini-Printer";

/// Printer BLE Service UUID
pub const SERVICE_UUID: &str = "4fafc201-1fb5-459e-8fcc-c5c9c331914b";

/// Characteristic used both for writes and for notifications
pub const CHARACTERISTIC_UUID: &str = "beb5483e-36e1-4688-b7f5-ea07361b26a8";

/// First byte of every status response
pub const STATUS_TAG: u8 = 0x10;

/// Battery level reported when the status frame carries no battery byte
pub const DEFAULT_BATTERY_PERCENT: u8 = 80;

/// Shortest frame that still carries a temperature byte
pub const MIN_STATUS_FRAME_LEN: usize = 3;

/// Printer control commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrinterCommand {
    /// Ask the printer to report paper / temperature / battery
    QueryStatus,
    /// Advance the paper by three lines
    FeedPaper,
    /// Full cut
    CutPaper,
    /// Reinitialize the printer
    Reset,
    /// Sound the buzzer
    Beep,
    /// Print the built-in self test page
    PrintTest,
}

/// A named, fixed byte sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub bytes: &'static [u8],
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown printer command: {0}")]
pub struct UnknownCommand(pub String);

impl PrinterCommand {
    /// Every command, in table order
    pub const ALL: [PrinterCommand; 6] = [
        Self::QueryStatus,
        Self::FeedPaper,
        Self::CutPaper,
        Self::Reset,
        Self::Beep,
        Self::PrintTest,
    ];

    /// Get the raw bytes for this command
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            Self::QueryStatus => &[0x10, 0x04, 0x01],
            Self::FeedPaper => &[0x1B, 0x64, 0x03],
            Self::CutPaper => &[0x1D, 0x56, 0x00],
            Self::Reset => &[0x1B, 0x40],
            Self::Beep => &[0x1B, 0x42, 0x03, 0x01],
            Self::PrintTest => &[0x12, 0x54],
        }
    }

    /// Table name, e.g. `FEED_PAPER`
    pub fn name(&self) -> &'static str {
        match self {
            Self::QueryStatus => "QUERY_STATUS",
            Self::FeedPaper => "FEED_PAPER",
            Self::CutPaper => "CUT_PAPER",
            Self::Reset => "RESET",
            Self::Beep => "BEEP",
            Self::PrintTest => "PRINT_TEST",
        }
    }

    /// Human readable button label
    pub fn label(&self) -> &'static str {
        match self {
            Self::QueryStatus => "Query Status",
            Self::FeedPaper => "Feed Paper",
            Self::CutPaper => "Cut Paper",
            Self::Reset => "Reset",
            Self::Beep => "Beep",
            Self::PrintTest => "Print Test Page",
        }
    }

    pub fn spec(&self) -> CommandSpec {
        CommandSpec {
            name: self.name(),
            label: self.label(),
            bytes: self.as_bytes(),
        }
    }
}

impl fmt::Display for PrinterCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PrinterCommand {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|cmd| cmd.name() == s)
            .ok_or_else(|| UnknownCommand(s.to_string()))
    }
}

/// Look up a command by its table name
pub fn lookup(name: &str) -> Result<CommandSpec, UnknownCommand> {
    name.parse::<PrinterCommand>().map(|cmd| cmd.spec())
}

/// Decode a status response
///
/// # Status Frame Structure
///
/// ```text
/// [0] : Tag, always 0x10
/// [1] : Flags
///       bit 0: paper out
/// [2] : Print head temperature (°C, raw)
/// [3] : Battery percentage (optional, clamped to 100, defaults to 80)
/// ```
///
/// Returns `None` for anything that is not a status frame, including
/// tagged frames too short to carry a temperature.
pub fn decode_status(bytes: &[u8]) -> Option<StatusRecord> {
    if bytes.first() != Some(&STATUS_TAG) || bytes.len() < MIN_STATUS_FRAME_LEN {
        return None;
    }

    let paper_ok = bytes[1] & 0x01 == 0;
    let head_temperature_c = bytes[2];
    let battery_percent = bytes
        .get(3)
        .copied()
        .unwrap_or(DEFAULT_BATTERY_PERCENT)
        .min(100);

    Some(StatusRecord {
        paper_ok,
        head_temperature_c,
        battery_percent,
    })
}

/// Lowercase two-digit hex, space separated: `1b 64 03`
pub fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Payload of the free-form test print
pub fn test_print_text(time: &str) -> String {
    format!(
        "=== Test Print ===\nTime: {}\nDevice: {}\n================\n\n",
        time, DEVICE_LABEL
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_bytes() {
        assert_eq!(PrinterCommand::QueryStatus.as_bytes(), &[0x10, 0x04, 0x01]);
        assert_eq!(PrinterCommand::FeedPaper.as_bytes(), &[0x1B, 0x64, 0x03]);
        assert_eq!(PrinterCommand::CutPaper.as_bytes(), &[0x1D, 0x56, 0x00]);
        assert_eq!(PrinterCommand::Reset.as_bytes(), &[0x1B, 0x40]);
        assert_eq!(PrinterCommand::Beep.as_bytes(), &[0x1B, 0x42, 0x03, 0x01]);
        assert_eq!(PrinterCommand::PrintTest.as_bytes(), &[0x12, 0x54]);
    }

    #[test]
    fn test_lookup_by_name() {
        for cmd in PrinterCommand::ALL {
            let spec = lookup(cmd.name()).unwrap();
            assert_eq!(spec.bytes, cmd.as_bytes());
            assert_eq!(spec.name, cmd.name());
        }
        assert_eq!(lookup("BEEP").unwrap().bytes, &[0x1B, 0x42, 0x03, 0x01]);
    }

    #[test]
    fn test_lookup_unknown() {
        assert_eq!(
            lookup("SELF_DESTRUCT"),
            Err(UnknownCommand("SELF_DESTRUCT".to_string()))
        );
        // names are case sensitive
        assert!(lookup("beep").is_err());
    }

    #[test]
    fn test_decode_paper_out() {
        let status = decode_status(&[0x10, 0x01, 37, 90]).unwrap();
        assert!(!status.paper_ok);
        assert_eq!(status.head_temperature_c, 37);
        assert_eq!(status.battery_percent, 90);
    }

    #[test]
    fn test_decode_battery_fallback() {
        let status = decode_status(&[0x10, 0x00, 20]).unwrap();
        assert!(status.paper_ok);
        assert_eq!(status.head_temperature_c, 20);
        assert_eq!(status.battery_percent, DEFAULT_BATTERY_PERCENT);
    }

    #[test]
    fn test_decode_battery_clamp() {
        assert_eq!(decode_status(&[0x10, 0x00, 0, 150]).unwrap().battery_percent, 100);
        assert_eq!(decode_status(&[0x10, 0x00, 0, 255]).unwrap().battery_percent, 100);
        assert_eq!(decode_status(&[0x10, 0x00, 0, 0]).unwrap().battery_percent, 0);
    }

    #[test]
    fn test_decode_rejects_non_status() {
        assert_eq!(decode_status(&[]), None);
        assert_eq!(decode_status(&[0x11, 0x00, 20, 50]), None);
        assert_eq!(decode_status(&[0x10]), None);
        assert_eq!(decode_status(&[0x10, 0x00]), None);
    }

    #[test]
    fn test_decode_ignores_other_flag_bits() {
        let status = decode_status(&[0x10, 0xFE, 30, 50]).unwrap();
        assert!(status.paper_ok);
    }

    #[test]
    fn test_hex() {
        assert_eq!(to_hex(&[0x1B, 0x64, 0x03]), "1b 64 03");
        assert_eq!(to_hex(&[]), "");
    }

    #[test]
    fn test_print_text_layout() {
        let text = test_print_text("2026-01-01 10:00:00");
        assert!(text.starts_with("=== Test Print ===\n"));
        assert!(text.contains("Device: Mini-Printer"));
        assert!(text.ends_with("\n\n"));
    }
}
