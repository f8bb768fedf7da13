use crate::domain::activity::ActivityLog;
use crate::domain::models::{
    AppEvent, ConnectionState, MessageSeverity, StatusMessage, StatusRecord,
};
use crate::domain::settings::Settings;
use crate::infrastructure::storage::{ExportDocument, SaveBatch};
use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

/// Everything the UI knows about the printer, built up from [`AppEvent`]s
pub struct PrinterSession {
    pub connection_state: ConnectionState,
    pub device_name: Option<String>,
    pub status: Option<StatusRecord>,
    pub activity: ActivityLog,
    pub connection_count: u32,
    pub last_activity: Option<DateTime<Local>>,
}

impl Default for PrinterSession {
    fn default() -> Self {
        Self::new()
    }
}

impl PrinterSession {
    pub fn new() -> Self {
        Self {
            connection_state: ConnectionState::Disconnected,
            device_name: None,
            status: None,
            activity: ActivityLog::new(),
            connection_count: 0,
            last_activity: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state == ConnectionState::Connected
    }

    /// Fold one event into the session. Returns a message worth showing
    /// to the user, if any.
    pub fn apply(&mut self, event: AppEvent) -> Option<StatusMessage> {
        match event {
            AppEvent::ConnectionState(state) => {
                debug!("Connection state: {:?}", state);
                self.connection_state = state;
                match state {
                    ConnectionState::Searching => Some(StatusMessage::new(
                        "Searching for Mini-Printer...",
                        MessageSeverity::Info,
                    )),
                    ConnectionState::Disconnected => {
                        Some(StatusMessage::new("Device disconnected", MessageSeverity::Info))
                    }
                    ConnectionState::Connected => None,
                }
            }
            AppEvent::Connected(device) => {
                self.connection_count += 1;
                let message = format!("Connected: {}", device.name);
                self.device_name = Some(device.name);
                Some(StatusMessage::new(message, MessageSeverity::Success))
            }
            AppEvent::FrameReceived(frame) => {
                self.last_activity = Some(frame.timestamp);
                if let Some(status) = self.activity.record_received(frame) {
                    self.status = Some(status);
                }
                None
            }
            AppEvent::CommandSent(spec) => {
                self.activity.record_sent_command(spec.name, spec.bytes);
                None
            }
            AppEvent::TextSent { length } => Some(StatusMessage::new(
                format!("Test data sent ({} bytes)", length),
                MessageSeverity::Success,
            )),
            AppEvent::OperationFailed { operation, message } => {
                warn!("{} failed: {}", operation, message);
                self.activity.record_error();
                Some(StatusMessage::new(
                    format!("{} failed: {}", operation, message),
                    MessageSeverity::Error,
                ))
            }
            AppEvent::LogMessage(msg) => Some(msg),
        }
    }

    /// Received frames as a batch for the persistent store. Batches are
    /// labelled with the configured device label, not the advertised name.
    pub fn save_batch(&self, settings: &Settings, now: DateTime<Local>) -> SaveBatch {
        self.activity.save_batch(&settings.device_label, now)
    }

    pub fn export_document(&self, settings: &Settings, now: DateTime<Local>) -> ExportDocument {
        self.activity.export_document(&settings.device_label, now)
    }

    /// Empty the received-frame log
    pub fn clear(&mut self) {
        info!(
            "Clearing {} received frames",
            self.activity.received().len()
        );
        self.activity.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{DeviceInfo, ReceivedFrame};
    use crate::infrastructure::bluetooth::protocol::PrinterCommand;

    #[test]
    fn test_status_tracks_latest_status_frame() {
        let mut session = PrinterSession::new();
        session.apply(AppEvent::FrameReceived(ReceivedFrame::new(vec![0x10, 0x01, 30, 50])));
        session.apply(AppEvent::FrameReceived(ReceivedFrame::new(b"noise".to_vec())));

        let status = session.status.unwrap();
        assert!(!status.paper_ok);
        assert_eq!(status.battery_percent, 50);

        session.apply(AppEvent::FrameReceived(ReceivedFrame::new(vec![0x10, 0x00, 41])));
        let status = session.status.unwrap();
        assert!(status.paper_ok);
        assert_eq!(status.head_temperature_c, 41);
        assert_eq!(status.battery_percent, 80);
        assert_eq!(session.activity.received().len(), 3);
        assert!(session.last_activity.is_some());
    }

    #[test]
    fn test_failure_counts_as_error() {
        let mut session = PrinterSession::new();
        let msg = session
            .apply(AppEvent::OperationFailed {
                operation: "Feed Paper".to_string(),
                message: "Not connected to device".to_string(),
            })
            .unwrap();

        assert_eq!(msg.severity, MessageSeverity::Error);
        assert_eq!(session.activity.statistics().error_count, 1);
    }

    #[test]
    fn test_connection_counter() {
        let mut session = PrinterSession::new();
        for _ in 0..2 {
            session.apply(AppEvent::Connected(DeviceInfo {
                name: "Printer".to_string(),
                id: "sim".to_string(),
            }));
            session.apply(AppEvent::ConnectionState(ConnectionState::Connected));
        }
        assert_eq!(session.connection_count, 2);
        assert_eq!(session.device_name.as_deref(), Some("Printer"));
        assert!(session.is_connected());
    }

    #[test]
    fn test_sent_commands_are_logged() {
        let mut session = PrinterSession::new();
        session.apply(AppEvent::CommandSent(PrinterCommand::CutPaper.spec()));
        assert_eq!(session.activity.sent().len(), 1);
        assert_eq!(session.activity.sent()[0].command_name, "CUT_PAPER");
        assert_eq!(session.activity.sent()[0].bytes, vec![0x1D, 0x56, 0x00]);
    }

    #[test]
    fn test_saved_and_exported_data_use_configured_label() {
        let mut session = PrinterSession::new();
        session.apply(AppEvent::Connected(DeviceInfo {
            name: "Printer".to_string(),
            id: "sim-1".to_string(),
        }));
        session.apply(AppEvent::FrameReceived(ReceivedFrame::new(vec![0x10, 0x00, 30])));
        let settings = Settings::default();

        let batch = session.save_batch(&settings, Local::now());
        assert_eq!(batch.device, "Mini-Printer");
        assert_eq!(batch.data.len(), 1);

        let doc = session.export_document(&settings, Local::now());
        assert_eq!(doc.device, "Mini-Printer");
        assert_eq!(doc.total_packets, 1);
    }
}
